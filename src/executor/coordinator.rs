// Virtual 0–1000 coordinates → device pixels.
use crate::action::types::Point;

/// Size of the virtual coordinate space the model works in, per axis.
pub const VIRTUAL_SCALE: f64 = 1000.0;

/// Converts one virtual point to absolute pixels: `round(v / 1000 * dim)`.
/// Out-of-range values extrapolate; nothing is clamped.
pub fn to_pixels(point: Point, width: u32, height: u32) -> (i32, i32) {
    (scale_axis(point.x, width), scale_axis(point.y, height))
}

/// Converts a start/end pair, as used by swipes.
pub fn pair_to_pixels(from: Point, to: Point, width: u32, height: u32) -> ((i32, i32), (i32, i32)) {
    (to_pixels(from, width, height), to_pixels(to, width, height))
}

fn scale_axis(value: i32, dimension: u32) -> i32 {
    (value as f64 / VIRTUAL_SCALE * dimension as f64).round() as i32
}
