use harvest_core::BrowserConfig;
use serde_json::{Map, Value};

/// Fixed desktop identity presented on every request of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub accept_language: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Identity {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
            viewport_width: config.window_width,
            viewport_height: config.window_height,
        }
    }

    /// Extra HTTP headers for the next navigation.
    pub fn request_headers(&self, referer: Option<&str>) -> Value {
        let mut headers = Map::new();
        headers.insert(
            "Accept-Language".to_string(),
            Value::String(self.accept_language.clone()),
        );
        if let Some(referer) = referer.filter(|r| !r.is_empty()) {
            headers.insert("Referer".to_string(), Value::String(referer.to_string()));
        }
        Value::Object(headers)
    }
}
