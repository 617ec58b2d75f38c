//! HTTP oracle backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{require_object, Oracle, OracleError};

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    seed: u64,
    temperature: f64,
}

/// POSTs `{model, prompt, seed, temperature}` to a fixed endpoint.
///
/// The response body must be a JSON object, or a JSON string containing one.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpOracle {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Replace the client with one that enforces a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, OracleError> {
        self.http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn generate(
        &self,
        prompt: &str,
        seed: u64,
        temperature: f64,
    ) -> Result<Value, OracleError> {
        let body = GenerateBody {
            model: &self.model,
            prompt,
            seed,
            temperature,
        };

        let mut builder = self.http_client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        debug!(endpoint = %self.endpoint, seed, "oracle responded");
        require_object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_serializes_call_contract() {
        let body = GenerateBody {
            model: "gpt-4o-mini",
            prompt: "p",
            seed: 3,
            temperature: 0.5,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "model": "gpt-4o-mini", "prompt": "p", "seed": 3, "temperature": 0.5 })
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        // Port 9 on loopback is the discard service; nothing listens there in CI.
        let oracle = HttpOracle::new("http://127.0.0.1:9/generate", "m")
            .with_timeout(Duration::from_secs(2))
            .unwrap();
        let err = oracle.generate("p", 1, 0.1).await.unwrap_err();
        assert!(matches!(err, OracleError::Transport(_)));
    }
}
