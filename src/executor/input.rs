// Device input primitives over `adb shell input` / `monkey` / `dumpsys`.
use std::time::Duration;

use crate::errors::DroidClawResult;
use crate::executor::adb::Adb;

const KEYCODE_BACK: &str = "4";
const KEYCODE_HOME: &str = "KEYCODE_HOME";
const DOUBLE_TAP_GAP_MS: u64 = 100;
const MIN_SWIPE_MS: i64 = 1000;
const MAX_SWIPE_MS: i64 = 2000;

pub fn tap_args(x: i32, y: i32) -> Vec<String> {
    vec!["input".into(), "tap".into(), x.to_string(), y.to_string()]
}

/// A long press is a zero-length swipe held for `duration_ms`.
pub fn long_press_args(x: i32, y: i32, duration_ms: u64) -> Vec<String> {
    swipe_args((x, y), (x, y), duration_ms)
}

pub fn swipe_args(from: (i32, i32), to: (i32, i32), duration_ms: u64) -> Vec<String> {
    vec![
        "input".into(),
        "swipe".into(),
        from.0.to_string(),
        from.1.to_string(),
        to.0.to_string(),
        to.1.to_string(),
        duration_ms.to_string(),
    ]
}

/// Longer strokes get more time so flings don't overshoot.
pub fn swipe_duration_ms(from: (i32, i32), to: (i32, i32)) -> u64 {
    let dx = (from.0 - to.0) as i64;
    let dy = (from.1 - to.1) as i64;
    let dist_sq = dx * dx + dy * dy;
    (dist_sq / 1000).clamp(MIN_SWIPE_MS, MAX_SWIPE_MS) as u64
}

pub fn launch_args(package: &str) -> Vec<String> {
    vec![
        "monkey".into(),
        "-p".into(),
        package.into(),
        "-c".into(),
        "android.intent.category.LAUNCHER".into(),
        "1".into(),
    ]
}

pub async fn tap(adb: &Adb, x: i32, y: i32) -> DroidClawResult<()> {
    adb.shell(&tap_args(x, y)).await?;
    Ok(())
}

pub async fn double_tap(adb: &Adb, x: i32, y: i32) -> DroidClawResult<()> {
    tap(adb, x, y).await?;
    tokio::time::sleep(Duration::from_millis(DOUBLE_TAP_GAP_MS)).await;
    tap(adb, x, y).await
}

pub async fn long_press(adb: &Adb, x: i32, y: i32, duration_ms: u64) -> DroidClawResult<()> {
    adb.shell(&long_press_args(x, y, duration_ms)).await?;
    Ok(())
}

pub async fn swipe(adb: &Adb, from: (i32, i32), to: (i32, i32)) -> DroidClawResult<()> {
    adb.shell(&swipe_args(from, to, swipe_duration_ms(from, to))).await?;
    Ok(())
}

pub async fn back(adb: &Adb) -> DroidClawResult<()> {
    adb.shell(&["input", "keyevent", KEYCODE_BACK]).await?;
    Ok(())
}

pub async fn home(adb: &Adb) -> DroidClawResult<()> {
    adb.shell(&["input", "keyevent", KEYCODE_HOME]).await?;
    Ok(())
}

pub async fn launch(adb: &Adb, package: &str) -> DroidClawResult<()> {
    let out = adb.shell(&launch_args(package)).await?;
    if out.contains("No activities found") || out.contains("monkey aborted") {
        return Err(crate::errors::DroidClawError::Device(format!(
            "could not launch {package}: {}",
            out.trim()
        )));
    }
    Ok(())
}

/// Package id of the focused window, if any.
pub async fn focused_package(adb: &Adb) -> DroidClawResult<Option<String>> {
    let out = adb.shell(&["dumpsys", "window"]).await?;
    Ok(parse_focused_package(&out))
}

/// Reads the package from `mCurrentFocus=`/`mFocusedApp=` lines of `dumpsys window`.
pub fn parse_focused_package(dumpsys: &str) -> Option<String> {
    dumpsys
        .lines()
        .filter(|l| l.contains("mCurrentFocus") || l.contains("mFocusedApp"))
        .find_map(|line| {
            line.split_whitespace()
                .find(|tok| tok.contains('/') && tok.contains('.'))
                .and_then(|tok| tok.split('/').next())
                .map(|pkg| pkg.trim_start_matches('{').to_string())
                .filter(|pkg| !pkg.is_empty())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_and_long_press_args() {
        assert_eq!(tap_args(540, 1200), vec!["input", "tap", "540", "1200"]);
        assert_eq!(
            long_press_args(10, 20, 3000),
            vec!["input", "swipe", "10", "20", "10", "20", "3000"]
        );
    }

    #[test]
    fn swipe_duration_is_clamped() {
        assert_eq!(swipe_duration_ms((0, 0), (0, 10)), 1000);
        // 1500² / 1000 = 2250 → clamped
        assert_eq!(swipe_duration_ms((540, 1900), (540, 400)), 2000);
        // 1200² / 1000 = 1440
        assert_eq!(swipe_duration_ms((540, 1800), (540, 600)), 1440);
    }

    #[test]
    fn launch_uses_monkey_launcher_intent() {
        assert_eq!(
            launch_args("com.android.settings"),
            vec![
                "monkey",
                "-p",
                "com.android.settings",
                "-c",
                "android.intent.category.LAUNCHER",
                "1"
            ]
        );
    }

    #[test]
    fn parses_focused_package() {
        let out = "  mDisplayId=0\n  mCurrentFocus=Window{3c1a u0 com.android.settings/com.android.settings.Settings}\n  mFocusedApp=ActivityRecord{9f u0 com.android.settings/.Settings t12}\n";
        assert_eq!(parse_focused_package(out).as_deref(), Some("com.android.settings"));
        assert_eq!(parse_focused_package("mCurrentFocus=null"), None);
    }
}
