//! API request and response types.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user message. Required, may be empty (an empty message gets an
    /// empty answer).
    pub message: String,

    /// Optional model override (uses the configured default if not specified).
    /// An explicit `null` is rejected.
    #[serde(
        default,
        deserialize_with = "present_model",
        skip_serializing_if = "Option::is_none"
    )]
    pub model: Option<String>,
}

/// Only runs when the field is present, so `null` fails as a non-string.
fn present_model<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Some)
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether agent runs are cached
    pub cache_enabled: bool,

    /// Agent loop iteration cap
    pub max_iterations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_is_optional() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(req.model, None);
        let req: ChatRequest =
            serde_json::from_str(r#"{"message": "hi", "model": "gpt-4o"}"#).unwrap();
        assert_eq!(req.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn message_is_required() {
        assert!(serde_json::from_str::<ChatRequest>(r#"{"model": "gpt-4o"}"#).is_err());
    }

    #[test]
    fn null_model_is_rejected() {
        assert!(
            serde_json::from_str::<ChatRequest>(r#"{"message": "hi", "model": null}"#).is_err()
        );
    }

    #[test]
    fn omitted_model_is_not_serialized() {
        let req = ChatRequest {
            message: "hi".into(),
            model: None,
        };
        assert_eq!(serde_json::to_string(&req).unwrap(), r#"{"message":"hi"}"#);
    }

    #[test]
    fn message_must_be_a_string() {
        assert!(serde_json::from_str::<ChatRequest>(r#"{"message": 42}"#).is_err());
    }
}
