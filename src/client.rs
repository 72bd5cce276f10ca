//! Client for a running search agent server.

use std::time::Duration;

use thiserror::Error;

use crate::api::types::ChatRequest;

/// Default endpoint of a locally running server.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8889/chat";

/// Agent runs can take many search round trips.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Sends messages to `POST /chat`.
pub struct AgentClient {
    http: reqwest::Client,
    server_url: String,
}

impl AgentClient {
    pub fn new(server_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            server_url: server_url.into(),
        })
    }

    /// Ask the agent. `model = None` lets the server pick its default.
    pub async fn ask(&self, message: &str, model: Option<&str>) -> Result<String, ClientError> {
        let request = ChatRequest {
            message: message.to_string(),
            model: model.map(str::to_string),
        };

        let response = self.http.post(&self.server_url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<String>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn decodes_json_string_answer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .match_body(mockito::Matcher::Json(json!({
                "message": "line one\nline \"two\"",
                "model": "gpt-4-turbo-preview"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#""Paris\nis the capital""#)
            .create_async()
            .await;

        let client = AgentClient::new(format!("{}/chat", server.url())).unwrap();
        let answer = client
            .ask("line one\nline \"two\"", Some("gpt-4-turbo-preview"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(answer, "Paris\nis the capital");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let client = AgentClient::new(format!("{}/chat", server.url())).unwrap();
        let err = client.ask("hi", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 500, .. }));
    }
}
