use serde::{Deserialize, Serialize};

/// Resolution used when no real frame is available.
pub const PLACEHOLDER_WIDTH: u32 = 1080;
pub const PLACEHOLDER_HEIGHT: u32 = 2400;

/// One captured device frame, PNG-encoded as base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    pub base64_png: String,
    pub width: u32,
    pub height: u32,
    /// The device refused the capture (secure window, e.g. a payment screen).
    #[serde(default)]
    pub is_sensitive: bool,
    /// Frame is the black stand-in rather than a real capture.
    #[serde(default)]
    pub is_placeholder: bool,
}

impl Screenshot {
    /// `data:` URL accepted in OpenAI-style `image_url` content parts.
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.base64_png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix() {
        let shot = Screenshot {
            base64_png: "AAAA".into(),
            width: 1,
            height: 1,
            is_sensitive: false,
            is_placeholder: false,
        };
        assert_eq!(shot.data_url(), "data:image/png;base64,AAAA");
    }
}
