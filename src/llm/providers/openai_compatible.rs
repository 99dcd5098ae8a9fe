use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;

use crate::config::ModelConfig;
use crate::errors::{DroidClawError, DroidClawResult};
use crate::llm::provider::ModelClient;
use crate::llm::sse_parser;
use crate::llm::types::{ChatMessage, StreamChunkKind};

pub struct OpenAiCompatibleClient {
    id: String,
    config: ModelConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(id: impl Into<String>, config: ModelConfig) -> DroidClawResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = config.resolved_api_key();
        Ok(Self {
            id: id.into(),
            config,
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        completions_url(&self.config.base_url)
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": self.config.stream,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "frequency_penalty": self.config.frequency_penalty,
            "max_tokens": self.config.max_tokens,
        })
    }
}

/// `<base>/chat/completions`, unless the base already names the endpoint.
pub fn completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

/// Maps a non-success HTTP status to the matching error kind.
pub fn status_error(status: StatusCode, body: &str) -> DroidClawError {
    let detail = format!("{status}: {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DroidClawError::ModelAuth(detail),
        StatusCode::TOO_MANY_REQUESTS => DroidClawError::ModelRateLimited(detail),
        _ => DroidClawError::ModelResponse(detail),
    }
}

/// Replace base64 image payloads so request bodies can be logged.
pub fn sanitize_for_log(body: &serde_json::Value) -> serde_json::Value {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            // content can be string or array of parts; we only touch the array case.
            if let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) {
                for part in parts {
                    if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                        if let Some(url) = part.get_mut("image_url").and_then(|i| i.get_mut("url")) {
                            *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                        }
                    }
                }
            }
        }
    }
    log_body
}

/// Folds a separately-streamed reasoning channel into `<think>` tags so the
/// response splitter sees one completion.
pub fn assemble_completion(reasoning: &str, content: &str) -> String {
    if reasoning.trim().is_empty() || content.contains("<think>") {
        content.to_string()
    } else {
        format!("<think>{}</think>{}", reasoning.trim(), content)
    }
}

fn transport_error(e: reqwest::Error) -> DroidClawError {
    DroidClawError::ModelTransport(e.to_string())
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.id
    }

    async fn send(&self, messages: &[ChatMessage]) -> DroidClawResult<String> {
        let body = self.request_body(messages);

        tracing::debug!(
            provider = %self.id,
            model = %self.config.model,
            stream = self.config.stream,
            messages = messages.len(),
            "sending model request"
        );
        tracing::trace!(
            body = %serde_json::to_string(&sanitize_for_log(&body)).unwrap_or_default(),
            "request body (sanitized, base64 omitted)"
        );

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &err_body));
        }

        let completion = if self.config.stream {
            self.handle_stream(response).await?
        } else {
            self.handle_json(response).await?
        };

        tracing::info!(
            provider = %self.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            content_len = completion.len(),
            "model response received"
        );
        Ok(completion)
    }
}

impl OpenAiCompatibleClient {
    /// Accumulates an SSE stream into the full completion text.
    async fn handle_stream(&self, response: reqwest::Response) -> DroidClawResult<String> {
        let mut byte_stream = response.bytes_stream();
        let mut line_buf: Vec<u8> = Vec::new();
        let mut content = String::new();
        let mut reasoning = String::new();
        let mut first_token: Option<Duration> = None;
        let started = Instant::now();

        'stream: while let Some(result) = byte_stream.next().await {
            let bytes = result.map_err(transport_error)?;
            for &b in bytes.iter() {
                if b != b'\n' {
                    line_buf.push(b);
                    continue;
                }
                let line = String::from_utf8_lossy(&line_buf).trim().to_string();
                line_buf.clear();
                if line.is_empty() {
                    continue;
                }

                match sse_parser::parse_sse_line(&line) {
                    Ok(Some(chunk)) => match chunk.kind {
                        StreamChunkKind::Reasoning => reasoning.push_str(&chunk.content),
                        StreamChunkKind::Content => {
                            if first_token.is_none() {
                                first_token = Some(started.elapsed());
                            }
                            content.push_str(&chunk.content);
                        }
                        StreamChunkKind::Done => break 'stream,
                    },
                    Ok(None) => {}
                    Err(e @ DroidClawError::ModelResponse(_)) => return Err(e),
                    Err(e) => tracing::debug!("SSE parse skipped: {e}"),
                }
            }
        }

        tracing::debug!(
            first_token_ms = first_token.map(|d| d.as_millis() as u64),
            content_len = content.len(),
            reasoning_len = reasoning.len(),
            "model stream complete"
        );

        Ok(assemble_completion(&reasoning, &content))
    }

    /// Handle a non-streaming JSON response.
    async fn handle_json(&self, response: reqwest::Response) -> DroidClawResult<String> {
        let json: serde_json::Value = response.json().await.map_err(transport_error)?;
        let message = &json["choices"][0]["message"];
        let Some(content) = message["content"].as_str() else {
            return Err(DroidClawError::ModelResponse(format!(
                "response has no choices[0].message.content: {json}"
            )));
        };
        let reasoning = message["reasoning_content"].as_str().unwrap_or("");
        Ok(assemble_completion(reasoning, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the base URL.
    async fn serve_once(status_line: &'static str, content_type: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // drain the whole request so closing the socket doesn't reset it
            let mut request = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/v1")
    }

    fn client(base_url: String, stream: bool) -> OpenAiCompatibleClient {
        let config = ModelConfig {
            base_url,
            stream,
            api_key: Some("test-key".into()),
            timeout_secs: 5,
            ..ModelConfig::default()
        };
        OpenAiCompatibleClient::new("test", config).unwrap()
    }

    #[test]
    fn endpoint_construction() {
        assert_eq!(completions_url("http://h:8000/v1"), "http://h:8000/v1/chat/completions");
        assert_eq!(completions_url("http://h:8000/v1/"), "http://h:8000/v1/chat/completions");
        assert_eq!(
            completions_url("https://api.x.com/v4/chat/completions"),
            "https://api.x.com/v4/chat/completions"
        );
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(status_error(StatusCode::UNAUTHORIZED, ""), DroidClawError::ModelAuth(_)));
        assert!(matches!(status_error(StatusCode::FORBIDDEN, ""), DroidClawError::ModelAuth(_)));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            DroidClawError::ModelRateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            DroidClawError::ModelResponse(_)
        ));
    }

    #[test]
    fn sanitize_replaces_only_image_urls() {
        let msgs = vec![
            ChatMessage::system("rules"),
            ChatMessage::user_with_image("screen", "data:image/png;base64,AAAA"),
        ];
        let body = serde_json::json!({ "messages": msgs });
        let clean = sanitize_for_log(&body);
        assert_eq!(clean["messages"][0]["content"], "rules");
        assert_eq!(clean["messages"][1]["content"][0]["image_url"]["url"], "<omitted_base64_image>");
        assert_eq!(clean["messages"][1]["content"][1]["text"], "screen");
        // original untouched
        assert_eq!(body["messages"][1]["content"][0]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn reasoning_channel_is_folded_into_think_tags() {
        assert_eq!(assemble_completion("", "do(action=\"Back\")"), "do(action=\"Back\")");
        assert_eq!(
            assemble_completion("go back", "do(action=\"Back\")"),
            "<think>go back</think>do(action=\"Back\")"
        );
        assert_eq!(
            assemble_completion("dup", "<think>x</think><answer>y</answer>"),
            "<think>x</think><answer>y</answer>"
        );
    }

    #[tokio::test]
    async fn json_completion() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Tap it. do(action=\"Tap\", element=[1,2])"}}]
        })
        .to_string();
        let base = serve_once("200 OK", "application/json", body).await;
        let text = client(base, false).send(&[ChatMessage::system("s")]).await.unwrap();
        assert_eq!(text, "Tap it. do(action=\"Tap\", element=[1,2])");
    }

    #[tokio::test]
    async fn streamed_completion() {
        let body = [
            r#"data: {"choices":[{"delta":{"content":"Going home. "}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"do(action=\"Home\")"}}]}"#,
            "data: [DONE]",
            "",
        ]
        .join("\n\n");
        let base = serve_once("200 OK", "text/event-stream", body).await;
        let text = client(base, true).send(&[ChatMessage::system("s")]).await.unwrap();
        assert_eq!(text, "Going home. do(action=\"Home\")");
    }

    #[tokio::test]
    async fn unauthorized_is_an_auth_error() {
        let base = serve_once("401 Unauthorized", "application/json", "{\"error\":\"bad key\"}".into()).await;
        let err = client(base, false).send(&[ChatMessage::system("s")]).await.unwrap_err();
        assert!(matches!(err, DroidClawError::ModelAuth(_)));
        assert!(err.is_model_error());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = client(format!("http://{addr}/v1"), false)
            .send(&[ChatMessage::system("s")])
            .await
            .unwrap_err();
        assert!(matches!(err, DroidClawError::ModelTransport(_)));
    }
}
