use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:7158/query";
pub const DEFAULT_TOP_K: u32 = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shown in place of an answer when the service cannot be reached.
pub const APOLOGY: &str =
    "I apologize, but I'm having trouble generating a response right now. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant did not answer in time")]
    Timeout,
    #[error("assistant responded with status {0}")]
    Status(u16),
    #[error("assistant request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("assistant sent an unreadable answer: {0}")]
    Decode(#[source] reqwest::Error),
}

impl AssistantError {
    fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AssistantError::Timeout
        } else {
            AssistantError::Transport(e)
        }
    }

    fn from_body(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AssistantError::Timeout
        } else {
            AssistantError::Decode(e)
        }
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    top_k: u32,
}

#[derive(Deserialize)]
struct QueryResponse {
    ai_response: String,
}

/// Client for the external question-answering service.
#[derive(Debug, Clone)]
pub struct AssistantClient {
    client: reqwest::Client,
    endpoint: String,
    top_k: u32,
}

impl AssistantClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AssistantError::Transport)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            top_k: DEFAULT_TOP_K,
        })
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn ask(&self, question: &str) -> Result<String, AssistantError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&QueryRequest {
                query: question,
                top_k: self.top_k,
            })
            .send()
            .await
            .map_err(AssistantError::from_send)?;
        if !resp.status().is_success() {
            return Err(AssistantError::Status(resp.status().as_u16()));
        }
        let body: QueryResponse = resp.json().await.map_err(AssistantError::from_body)?;
        Ok(body.ai_response)
    }

    /// Like [`ask`](Self::ask), but any failure is logged and replaced by [`APOLOGY`].
    pub async fn answer_or_apology(&self, question: &str) -> String {
        match self.ask(question).await {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("Error fetching AI response: {e}");
                APOLOGY.to_string()
            }
        }
    }
}
