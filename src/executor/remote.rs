//! The `remote.network` executor.
//!
//! The target is an HTTP(S) URL. The input is POSTed as a JSON body and the
//! JSON response body is the raw output. One attempt is made per job, bounded
//! by the client timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::Executor;
use crate::error::{FunctionError, Result};

/// Executes functions hosted behind an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct RemoteNetworkExecutor {
    client: reqwest::Client,
}

impl RemoteNetworkExecutor {
    /// Creates an executor whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FunctionError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Creates an executor over a caller-configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_url(target: &str) -> Result<Url> {
    let url = Url::parse(target).map_err(|e| FunctionError::load(target, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FunctionError::load(
            target,
            format!("unsupported URL scheme {other}"),
        )),
    }
}

#[async_trait]
impl Executor for RemoteNetworkExecutor {
    async fn execute(&self, target: &str, input: &Value) -> Result<Value> {
        let url = parse_url(target)?;
        tracing::debug!(url = %url, "calling remote function");

        let response = self
            .client
            .post(url)
            .json(input)
            .send()
            .await
            .map_err(|e| FunctionError::execution(format!("request to {target} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FunctionError::execution(format!(
                "remote function {target} returned {status}: {body}"
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            FunctionError::execution(format!("invalid JSON response from {target}: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation() {
        assert!(parse_url("https://example.com/fn").is_ok());
        assert!(matches!(
            parse_url("not a url").unwrap_err(),
            FunctionError::Load { .. }
        ));
        assert!(parse_url("ftp://example.com/fn").is_err());
    }

    #[tokio::test]
    async fn invalid_target_fails_before_any_request() {
        let executor = RemoteNetworkExecutor::new(Duration::from_secs(1)).unwrap();
        let err = executor
            .execute("mailto:someone@example.com", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, FunctionError::Load { .. }));
    }
}
