// Screenshot capture over ADB, with a black placeholder when capture is impossible.
use base64::Engine as _;
use once_cell::sync::Lazy;

use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::adb::Adb;
use crate::perception::types::{Screenshot, PLACEHOLDER_HEIGHT, PLACEHOLDER_WIDTH};

const REMOTE_PATH: &str = "/sdcard/droidclaw_screenshot.png";

static PLACEHOLDER_PNG_B64: Lazy<String> = Lazy::new(|| {
    let canvas = image::RgbImage::new(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
    let mut out = Vec::new();
    if let Err(e) = image::DynamicImage::ImageRgb8(canvas)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
    {
        tracing::error!(error = %e, "placeholder PNG encode failed");
    }
    base64::engine::general_purpose::STANDARD.encode(&out)
});

/// Black frame at the default resolution.
pub fn placeholder(is_sensitive: bool) -> Screenshot {
    Screenshot {
        base64_png: PLACEHOLDER_PNG_B64.clone(),
        width: PLACEHOLDER_WIDTH,
        height: PLACEHOLDER_HEIGHT,
        is_sensitive,
        is_placeholder: true,
    }
}

/// `screencap` refuses secure windows with a status line instead of failing.
/// Other adb or screencap errors are not refusals.
pub fn is_secure_refusal(output: &str) -> bool {
    output.contains("Status: -1") || output.to_lowercase().contains("secure")
}

/// Capture the current screen. Secure windows yield a sensitive placeholder;
/// other failures are returned as errors for the caller to degrade.
///
/// The on-device staging file and the local temp file are removed on every path.
pub async fn capture(adb: &Adb) -> DroidClawResult<Screenshot> {
    let local = std::env::temp_dir().join(format!("droidclaw_{}.png", uuid::Uuid::new_v4()));
    let result = capture_into(adb, &local).await;

    if let Err(e) = adb.shell(&["rm", "-f", REMOTE_PATH]).await {
        tracing::debug!(error = %e, "remote screenshot cleanup failed");
    }
    if local.exists() {
        if let Err(e) = tokio::fs::remove_file(&local).await {
            tracing::debug!(error = %e, path = %local.display(), "local screenshot cleanup failed");
        }
    }

    result
}

async fn capture_into(adb: &Adb, local: &std::path::Path) -> DroidClawResult<Screenshot> {
    let output = adb.run(&["shell", "screencap", "-p", REMOTE_PATH]).await?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    if is_secure_refusal(&text) {
        tracing::info!("screencap refused (secure window); using sensitive placeholder");
        return Ok(placeholder(true));
    }
    if !output.status.success() {
        return Err(DroidClawError::Device(format!(
            "screencap exited with {}: {}",
            output.status,
            text.trim()
        )));
    }

    let local_str = local.to_string_lossy().into_owned();
    adb.run_checked(&["pull", REMOTE_PATH, local_str.as_str()]).await?;

    let bytes = tokio::fs::read(local).await?;
    from_png_bytes(&bytes)
}

/// Wraps raw PNG bytes, reading the dimensions from the image header.
pub fn from_png_bytes(bytes: &[u8]) -> DroidClawResult<Screenshot> {
    if bytes.is_empty() {
        return Err(DroidClawError::Perception("empty screenshot".into()));
    }
    let img = image::load_from_memory(bytes)?;
    Ok(Screenshot {
        base64_png: base64::engine::general_purpose::STANDARD.encode(bytes),
        width: img.width(),
        height: img.height(),
        is_sensitive: false,
        is_placeholder: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_a_decodable_black_frame() {
        let shot = placeholder(false);
        assert_eq!((shot.width, shot.height), (1080, 2400));
        assert!(shot.is_placeholder);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&shot.base64_png)
            .unwrap();
        let img = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (1080, 2400));
        assert_eq!(img.get_pixel(540, 1200).0, [0, 0, 0]);
    }

    #[test]
    fn reads_dimensions_from_png() {
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(72, 160))
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        let shot = from_png_bytes(&out).unwrap();
        assert_eq!((shot.width, shot.height), (72, 160));
        assert!(!shot.is_sensitive);
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(from_png_bytes(&[]).is_err());
        assert!(from_png_bytes(b"not a png").is_err());
    }

    #[test]
    fn detects_secure_window_refusal() {
        assert!(is_secure_refusal("Status: -1\n"));
        assert!(is_secure_refusal("Capturing failed: window is secure"));
        assert!(!is_secure_refusal(""));
    }

    #[test]
    fn generic_failures_are_not_refusals() {
        assert!(!is_secure_refusal("adb: Failed to open /sdcard/tmp.png"));
        assert!(!is_secure_refusal("error: device offline"));
    }
}
