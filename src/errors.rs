use thiserror::Error;

#[derive(Debug, Error)]
pub enum DroidClawError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model transport error: {0}")]
    ModelTransport(String),

    #[error("Model authentication failed: {0}")]
    ModelAuth(String),

    #[error("Model rate limited: {0}")]
    ModelRateLimited(String),

    #[error("Model response error: {0}")]
    ModelResponse(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Task cancelled")]
    Cancelled,
}

impl DroidClawError {
    /// True for failures of the model call itself (transport, auth, quota, bad payload).
    pub fn is_model_error(&self) -> bool {
        matches!(
            self,
            Self::ModelTransport(_)
                | Self::ModelAuth(_)
                | Self::ModelRateLimited(_)
                | Self::ModelResponse(_)
                | Self::SseParsing(_)
                | Self::Http(_)
        )
    }
}

impl serde::Serialize for DroidClawError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type DroidClawResult<T> = Result<T, DroidClawError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_are_classified() {
        assert!(DroidClawError::ModelAuth("401".into()).is_model_error());
        assert!(DroidClawError::ModelRateLimited("429".into()).is_model_error());
        assert!(!DroidClawError::Device("offline".into()).is_model_error());
        assert!(!DroidClawError::Cancelled.is_model_error());
    }

    #[test]
    fn serializes_as_display_string() {
        let json = serde_json::to_string(&DroidClawError::Config("missing".into())).unwrap();
        assert_eq!(json, "\"Configuration error: missing\"");
    }
}
