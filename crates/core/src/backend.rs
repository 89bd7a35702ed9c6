//! Backend Chat Contract
//!
//! The request/response boundary with the text-generation backend: a
//! `BackendClient` trait with an HTTP implementation, plus the discriminated
//! reply model the response router classifies. Unrecognized or malformed
//! replies collapse into the `Unknown` case rather than failing the turn.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Summary metadata a diagram reply may carry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct DiagramSummary {
    pub title: Option<String>,
    #[serde(default)]
    pub nodes: Option<u32>,
    #[serde(default)]
    pub edges: Option<u32>,
}

/// A diagram-type backend reply.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct DiagramReply {
    #[serde(default, rename = "directImage")]
    pub direct_image: bool,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub download: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub summary: Option<DiagramSummary>,
}

impl DiagramReply {
    /// Resolves the image URL for display.
    ///
    /// A direct-image reply carries the URL itself; otherwise the `download`
    /// reference wins over `url`, and relative references are resolved
    /// against the backend base address.
    pub fn resolve_image_url(&self, base_url: &str) -> Option<String> {
        if self.direct_image {
            return self.image_url.clone();
        }
        let reference = self.download.as_deref().or(self.url.as_deref())?;
        if reference.starts_with("http") {
            Some(reference.to_string())
        } else {
            Some(format!("{}{}", base_url.trim_end_matches('/'), reference))
        }
    }
}

/// A classified backend reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Text { answer: Option<String> },
    Diagram(DiagramReply),
    Unknown,
}

impl ChatReply {
    /// Classifies a raw backend reply by its `type` discriminator.
    ///
    /// Anything that is not a well-formed `text` or `diagram` reply is
    /// `Unknown`; classification itself never fails.
    pub fn classify(value: &serde_json::Value) -> Self {
        match value.get("type").and_then(|t| t.as_str()) {
            Some("text") => ChatReply::Text {
                answer: value
                    .get("answer")
                    .and_then(|a| a.as_str())
                    .map(str::to_string),
            },
            Some("diagram") => match serde_json::from_value(value.clone()) {
                Ok(diagram) => ChatReply::Diagram(diagram),
                Err(error) => {
                    debug!(%error, "Malformed diagram reply.");
                    ChatReply::Unknown
                }
            },
            _ => ChatReply::Unknown,
        }
    }
}

/// A client for the backend chat service.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Sends the fully composed prompt and returns the raw reply body.
    ///
    /// A non-2xx response or transport failure is a hard error; callers
    /// recover by speaking the fixed apology.
    async fn chat(&self, prompt: &str) -> Result<serde_json::Value>;

    /// The base address relative diagram references resolve against.
    fn base_url(&self) -> &str;
}

/// `BackendClient` over plain HTTP.
pub struct HttpBackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn chat(&self, prompt: &str) -> Result<serde_json::Value> {
        let endpoint = format!("{}/chat", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .with_context(|| format!("chat request to {endpoint} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat request failed: {status}. Details: {body}"));
        }

        response
            .json()
            .await
            .context("chat response was not valid JSON")
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
