use crate::errors::{DroidClawError, DroidClawResult};
use crate::llm::types::{StreamChunk, StreamChunkKind};

/// Parses a raw SSE line (OpenAI-compatible format) into a StreamChunk.
/// Returns None if the line is a keep-alive or non-data line.
pub fn parse_sse_line(line: &str) -> DroidClawResult<Option<StreamChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let data = if let Some(d) = line.strip_prefix("data:") {
        d.trim()
    } else {
        return Ok(None);
    };

    if data == "[DONE]" {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| DroidClawError::SseParsing(e.to_string()))?;

    if let Some(err) = json.get("error") {
        return Err(DroidClawError::ModelResponse(err.to_string()));
    }

    if let Some(first) = json["choices"].as_array().and_then(|c| c.first()) {
        let delta = &first["delta"];

        // Reasoning content (some servers expose it separately)
        if let Some(reasoning) = delta["reasoning_content"].as_str() {
            if !reasoning.is_empty() {
                return Ok(Some(StreamChunk {
                    kind: StreamChunkKind::Reasoning,
                    content: reasoning.to_string(),
                }));
            }
        }

        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty() {
                return Ok(Some(StreamChunk {
                    kind: StreamChunkKind::Content,
                    content: content.to_string(),
                }));
            }
        }

        // Finish reason signals done
        if first["finish_reason"].as_str().is_some() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Done,
                content: String::new(),
            }));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_comments_and_blank_lines() {
        assert!(parse_sse_line("").unwrap().is_none());
        assert!(parse_sse_line(": keep-alive").unwrap().is_none());
        assert!(parse_sse_line("event: ping").unwrap().is_none());
    }

    #[test]
    fn done_marker() {
        let chunk = parse_sse_line("data: [DONE]").unwrap().unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Done);
    }

    #[test]
    fn content_and_reasoning_deltas() {
        let chunk = parse_sse_line(r#"data: {"choices":[{"delta":{"content":"do(action="}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Content);
        assert_eq!(chunk.content, "do(action=");

        let chunk = parse_sse_line(
            r#"data: {"choices":[{"delta":{"reasoning_content":"look at the top bar"}}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Reasoning);
    }

    #[test]
    fn finish_reason_without_content_is_done() {
        let chunk = parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Done);
    }

    #[test]
    fn malformed_json_and_error_payloads() {
        assert!(matches!(
            parse_sse_line("data: {not json").unwrap_err(),
            DroidClawError::SseParsing(_)
        ));
        assert!(matches!(
            parse_sse_line(r#"data: {"error":{"message":"overloaded"}}"#).unwrap_err(),
            DroidClawError::ModelResponse(_)
        ));
    }
}
