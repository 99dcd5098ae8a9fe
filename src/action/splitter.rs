//! Separates a raw model completion into its reasoning and its action directive.
//!
//! Marker order matters: directive text can also appear inside the model's
//! prose, so a finish call is looked for before a do call, and both before the
//! legacy `<think>`/`<answer>` tag form.

use crate::action::types::SplitResponse;

pub const FINISH_MARKER: &str = "finish(message=";
pub const DO_MARKER: &str = "do(action=";
const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const ANSWER_OPEN: &str = "<answer>";
const ANSWER_CLOSE: &str = "</answer>";

/// Split `content` into `{reasoning, action}`. Never fails; when no marker is
/// present the whole trimmed input becomes the directive.
pub fn split_response(content: &str) -> SplitResponse {
    if let Some(split) = split_at_marker(content, FINISH_MARKER) {
        return split;
    }
    if let Some(split) = split_at_marker(content, DO_MARKER) {
        return split;
    }
    if let Some(idx) = content.find(ANSWER_OPEN) {
        return split_answer_tags(content, idx);
    }
    SplitResponse {
        reasoning: String::new(),
        action: content.trim().to_string(),
    }
}

fn split_at_marker(content: &str, marker: &str) -> Option<SplitResponse> {
    let idx = content.find(marker)?;
    let (before, after) = content.split_at(idx);
    let action = after.trim();
    let action = action.strip_suffix(ANSWER_CLOSE).unwrap_or(action);
    Some(SplitResponse {
        reasoning: strip_tags(before),
        action: action.trim().to_string(),
    })
}

fn split_answer_tags(content: &str, answer_idx: usize) -> SplitResponse {
    let before = &content[..answer_idx];
    let reasoning = match between(content, THINK_OPEN, THINK_CLOSE) {
        Some(inner) => inner.trim().to_string(),
        None => strip_tags(before),
    };

    let body = &content[answer_idx + ANSWER_OPEN.len()..];
    let action = match body.find(ANSWER_CLOSE) {
        Some(end) => &body[..end],
        None => body,
    };

    SplitResponse {
        reasoning,
        action: action.trim().to_string(),
    }
}

fn between<'a>(content: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = content.find(open)? + open.len();
    let rest = &content[start..];
    let end = rest.find(close).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn strip_tags(s: &str) -> String {
    [THINK_OPEN, THINK_CLOSE, ANSWER_OPEN, ANSWER_CLOSE]
        .iter()
        .fold(s.to_string(), |acc, tag| acc.replace(tag, ""))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_do_call() {
        let out = split_response("The search box is at the top.\ndo(action=\"Tap\", element=[500,80])");
        assert_eq!(out.reasoning, "The search box is at the top.");
        assert_eq!(out.action, "do(action=\"Tap\", element=[500,80])");
    }

    #[test]
    fn finish_marker_wins_over_do_marker() {
        let content = "I already ran do(action=\"Back\") earlier. finish(message=\"done\")";
        let out = split_response(content);
        assert_eq!(out.action, "finish(message=\"done\")");
        assert_eq!(out.reasoning, "I already ran do(action=\"Back\") earlier.");
    }

    #[test]
    fn finish_marker_split_even_when_it_comes_after_do_text() {
        let content = "finish(message=\"ok\") then do(action=\"Home\")";
        let out = split_response(content);
        assert_eq!(out.reasoning, "");
        assert!(out.action.starts_with("finish(message="));
    }

    #[test]
    fn legacy_answer_tags() {
        let content = "<think>Open the app drawer first</think>\n<answer>do(action=\"Home\")</answer>";
        // do(action= marker wins before tags are consulted
        let out = split_response(content);
        assert_eq!(out.reasoning, "Open the app drawer first");
        assert_eq!(out.action, "do(action=\"Home\")");

        let tagged = "<think>nothing to do</think><answer>noop</answer>";
        let out = split_response(tagged);
        assert_eq!(out.reasoning, "nothing to do");
        assert_eq!(out.action, "noop");
    }

    #[test]
    fn answer_tag_without_closing_tag_reads_to_end() {
        let out = split_response("thinking here <answer> wait please ");
        assert_eq!(out.reasoning, "thinking here");
        assert_eq!(out.action, "wait please");
    }

    #[test]
    fn fallback_uses_whole_trimmed_input() {
        let out = split_response("  I am not sure what to do  \n");
        assert_eq!(out.reasoning, "");
        assert_eq!(out.action, "I am not sure what to do");
    }
}
