// Text entry through the ADB Keyboard IME.
// The IME accepts base64 over a broadcast, so any Unicode text survives; plain
// `input text` is only a fallback for ASCII when the IME is not installed.
use base64::Engine as _;

use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::adb::Adb;

pub const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";

/// Text that `adb shell input text` cannot deliver.
pub fn needs_ime(text: &str) -> bool {
    text.chars().any(|c| !c.is_ascii() || c.is_ascii_control())
}

pub fn clear_args() -> Vec<String> {
    vec!["am".into(), "broadcast".into(), "-a".into(), "ADB_CLEAR_TEXT".into()]
}

pub fn broadcast_args(text: &str) -> Vec<String> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    vec![
        "am".into(),
        "broadcast".into(),
        "-a".into(),
        "ADB_INPUT_B64".into(),
        "--es".into(),
        "msg".into(),
        encoded,
    ]
}

/// Escapes ASCII text for `input text`, which runs through the device shell.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '(' | ')' | '<' | '>' | '|' | ';' | '&' | '*' | '\\' | '~' | '"' | '\'' | '$' | '`'
            | '!' | '?' | '#' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

async fn current_ime(adb: &Adb) -> DroidClawResult<String> {
    let out = adb
        .shell(&["settings", "get", "secure", "default_input_method"])
        .await?;
    Ok(out.trim().to_string())
}

async fn set_ime(adb: &Adb, ime: &str) -> DroidClawResult<()> {
    let out = adb.shell(&["ime", "set", ime]).await?;
    if out.contains("Unknown input method") {
        return Err(DroidClawError::Device(format!("input method not installed: {ime}")));
    }
    Ok(())
}

/// Replace the focused field's content with `text`, restoring the user's
/// keyboard afterwards.
pub async fn type_text(adb: &Adb, text: &str) -> DroidClawResult<()> {
    let original = current_ime(adb).await.unwrap_or_default();
    let switched = !original.contains(ADB_KEYBOARD_IME);

    if switched {
        if let Err(e) = set_ime(adb, ADB_KEYBOARD_IME).await {
            if needs_ime(text) {
                return Err(DroidClawError::Executor(format!(
                    "ADB Keyboard unavailable and text is not plain ASCII: {e}"
                )));
            }
            tracing::warn!(error = %e, "ADB Keyboard unavailable; falling back to `input text`");
            adb.shell(&["input", "text", escape_input_text(text).as_str()]).await?;
            return Ok(());
        }
    }

    let result = async {
        adb.shell(&clear_args()).await?;
        adb.shell(&broadcast_args(text)).await?;
        Ok::<(), DroidClawError>(())
    }
    .await;

    if switched && !original.is_empty() {
        if let Err(e) = set_ime(adb, &original).await {
            tracing::warn!(error = %e, ime = %original, "failed to restore input method");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_ascii_and_control_chars_need_the_ime() {
        assert!(needs_ime("你好"));
        assert!(needs_ime("café"));
        assert!(needs_ime("line\nbreak"));
        assert!(!needs_ime("hello world 42"));
    }

    #[test]
    fn broadcast_carries_base64_payload() {
        let args = broadcast_args("你好");
        assert_eq!(args[3], "ADB_INPUT_B64");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(args.last().unwrap())
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "你好");
    }

    #[test]
    fn escapes_shell_specials_for_input_text() {
        assert_eq!(escape_input_text("a b"), "a%sb");
        assert_eq!(escape_input_text("it's $5 (ok)"), "it\\'s%s\\$5%s\\(ok\\)");
    }
}
