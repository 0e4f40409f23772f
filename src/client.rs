use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

/// Body returned by `POST /ask`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

/// Why an exchange failed. Only used for logging; the conversation shows
/// the same fallback message for all of them.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(StatusCode),
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Something that can answer a question about the indexed documents.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn ask(&self, question: &str) -> Result<AskResponse, AskError>;

    /// Where questions are sent, for display
    fn endpoint(&self) -> &str;
}

#[derive(Clone)]
pub struct AskClient {
    client: Client,
    endpoint: String,
}

impl AskClient {
    pub fn new(server_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: format!("{}/ask", server_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl AnswerService for AskClient {
    async fn ask(&self, question: &str) -> Result<AskResponse, AskError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&AskRequest { question })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AskError::Status(response.status()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| AskError::Decode(e.to_string()))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
