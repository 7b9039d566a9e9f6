use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::brief::PartialBrief;
use crate::error::{ClientError, GENERIC_FAILURE_MESSAGE};
use crate::models::{CatalogResponse, ErrorBody, PipelineOutput};

/// Talks to a running `pulse-server`
pub struct PulseClient {
    client: Client,
    base_url: String,
}

impl PulseClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        // Long enough for a full sweep plus composition on the server side
        let client = Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn generate(&self, brief: &PartialBrief) -> Result<PipelineOutput, ClientError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(brief)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        Self::read(response).await
    }

    pub async fn catalog(&self) -> Result<CatalogResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/catalog", self.base_url))
            .send()
            .await
            .map_err(ClientError::Transport)?;

        Self::read(response).await
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.text().await.map_err(ClientError::Transport)?;

        if !status.is_success() {
            return Err(rejection(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// The server's own message when it sent one, otherwise the generic failure text
fn rejection(status: u16, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());

    ClientError::Rejected { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TRANSPORT_FAILURE_MESSAGE;

    #[test]
    fn test_rejection_uses_server_message() {
        let body = serde_json::json!({
            "error": "Agent failed to generate outputs. Please refine the brief and retry."
        })
        .to_string();
        let err = rejection(500, &body);
        assert!(matches!(err, ClientError::Rejected { status: 500, .. }));
        assert_eq!(err.to_string(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_rejection_without_json_body() {
        let err = rejection(502, "<html>Bad Gateway</html>");
        assert_eq!(err.to_string(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = PulseClient::new("http://127.0.0.1:3000/").unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:3000");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_failure() {
        // Reserve a free port, then release it so nothing is listening there
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = PulseClient::new(format!("http://127.0.0.1:{}", port)).unwrap();
        let err = client.generate(&PartialBrief::topic("ai")).await.unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.to_string(), TRANSPORT_FAILURE_MESSAGE);
    }
}
