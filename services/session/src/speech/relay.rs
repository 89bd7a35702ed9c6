//! Realtime Relay Credential
//!
//! Fetches the short-lived token that authorizes media-channel negotiation
//! with the relay service. The provider's token endpoint answers a GET
//! carrying the subscription key with the relay URLs and a username/password
//! pair.

use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

/// The header carrying the subscription key to the token endpoint.
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// A short-lived credential for relay negotiation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RelayCredential {
    #[serde(rename = "Urls")]
    pub urls: Vec<String>,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
}

impl RelayCredential {
    /// The primary relay URL.
    pub fn primary_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}

/// Client for the provider's relay token endpoint.
pub struct RelayTokenClient {
    client: reqwest::Client,
    token_url: String,
    api_key: String,
}

impl RelayTokenClient {
    pub fn new(token_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: token_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Builds the client for the configured token endpoint.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.relay_token_url.clone(), config.speech_api_key.clone())
    }

    /// Fetches a fresh relay credential.
    pub async fn fetch(&self) -> Result<RelayCredential> {
        let response = self
            .client
            .get(&self.token_url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .send()
            .await
            .context("relay token request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("relay token request failed with status {status}"));
        }

        response
            .json()
            .await
            .context("relay token response was not valid JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_deserializes_provider_wire_names() {
        let json = r#"{
            "Urls": ["turn:relay.example.com:3478", "turn:relay2.example.com:3478"],
            "Username": "user-1",
            "Password": "secret"
        }"#;

        let credential: RelayCredential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.urls.len(), 2);
        assert_eq!(
            credential.primary_url(),
            Some("turn:relay.example.com:3478")
        );
        assert_eq!(credential.username, "user-1");
        assert_eq!(credential.password, "secret");
    }

    #[test]
    fn test_credential_without_urls() {
        let json = r#"{"Urls": [], "Username": "u", "Password": "p"}"#;
        let credential: RelayCredential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.primary_url(), None);
    }

    #[test]
    fn test_client_from_config() {
        let config = Config {
            speech_region: "westeurope".to_string(),
            speech_api_key: "key".to_string(),
            relay_token_url: "https://relay.test/token".to_string(),
            tts_voice: "v".to_string(),
            stt_locales: vec!["en-US".to_string()],
            continuous_conversation: true,
            avatar_character: "lisa".to_string(),
            avatar_style: "casual-sitting".to_string(),
            backend_base_url: "http://127.0.0.1:8000".to_string(),
            log_level: tracing::Level::INFO,
        };
        let client = RelayTokenClient::from_config(&config);
        assert_eq!(client.token_url, "https://relay.test/token");
        assert_eq!(client.api_key, "key");
    }
}
