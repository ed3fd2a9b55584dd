//! Wire types for the OpenAI-style chat completion API.
//!
//! Only the fields the gateway reads are modelled on the response side;
//! the full body is kept as raw JSON alongside.

use serde::{Deserialize, Serialize};

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// "system" or "user".
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// A chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,

    /// e.g. `{"type": "json_object"}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,

    /// Caller-supplied extra top-level fields. Merged last by
    /// [`ChatRequest::to_body`], so they replace standard fields.
    #[serde(skip)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatRequest {
    /// The JSON object sent on the wire.
    pub fn to_body(&self) -> serde_json::Result<serde_json::Value> {
        let mut body = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            other => return Ok(other),
        };
        body.extend(self.extra.clone());
        Ok(serde_json::Value::Object(body))
    }
}

/// The subset of a chat completion response the gateway reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ChatResponse {
    /// Content of the first choice, if it is non-blank.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(extra: serde_json::Map<String, serde_json::Value>) -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![ChatMessage::system("json only"), ChatMessage::user("hi")],
            temperature: 0.7,
            max_tokens: 4096,
            response_format: None,
            extra,
        }
    }

    #[test]
    fn body_merges_extra_fields() {
        let mut extra = serde_json::Map::new();
        extra.insert("seed".into(), serde_json::json!(42));
        let json = request(extra).to_body().unwrap();
        assert_eq!(json["seed"], 42);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("response_format").is_none());
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn extra_fields_replace_standard_ones() {
        let mut extra = serde_json::Map::new();
        extra.insert("temperature".into(), serde_json::json!(0.0));
        extra.insert("model".into(), serde_json::json!("gpt-4o"));
        let body = request(extra).to_body().unwrap();
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 4096);

        let text = serde_json::to_string(&body).unwrap();
        assert_eq!(text.matches("\"temperature\"").count(), 1);
    }

    #[test]
    fn response_first_content() {
        let resp: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"ok\":true}"}}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        }))
        .unwrap();
        assert_eq!(resp.first_content(), Some("{\"ok\":true}"));
        assert_eq!(resp.usage.unwrap().total_tokens, Some(8));
    }

    #[test]
    fn response_blank_or_missing_content() {
        let resp: ChatResponse =
            serde_json::from_value(serde_json::json!({"choices": [{"message": {"content": "  "}}]}))
                .unwrap();
        assert_eq!(resp.first_content(), None);

        let resp: ChatResponse =
            serde_json::from_value(serde_json::json!({"choices": [{"message": {"content": null}}]}))
                .unwrap();
        assert_eq!(resp.first_content(), None);

        let resp: ChatResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(resp.first_content(), None);
    }
}
