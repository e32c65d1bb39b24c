//! JSON-over-HTTP with retry for the provider clients.
//!
//! - HTTP 429 and 5xx → retry with exponential backoff
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use serde_json::Value;

pub(crate) fn client(timeout_secs: u64) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| format!("failed to build HTTP client: {}", e))
}

/// POST `body` to `url` and return the parsed JSON response.
///
/// `service` names the remote in error messages ("OpenAI", "Ollama", ...).
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
    max_retries: u32,
    service: &str,
) -> Result<Value, String> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(service, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| format!("{} returned invalid JSON: {}", service, e));
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = format!("{} API error {}: {}", service, status, body_text);
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(service, status = status.as_u16(), "transient provider error");
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(format!("{} connection error ({}): {}", service, url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| format!("{} request failed after retries", service)))
}

/// Environment variable holding a provider secret.
pub(crate) fn api_key(var: &str) -> Result<String, String> {
    std::env::var(var).map_err(|_| format!("{} environment variable not set", var))
}

/// Azure OpenAI deployment URL for `operation` (`embeddings`, `chat/completions`).
pub(crate) fn azure_url(endpoint: &str, deployment: &str, operation: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/{}?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        operation,
        api_version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azure_url() {
        assert_eq!(
            azure_url("https://x.openai.azure.com/", "emb", "embeddings", "2024-10-21"),
            "https://x.openai.azure.com/openai/deployments/emb/embeddings?api-version=2024-10-21"
        );
    }

    #[tokio::test]
    async fn test_connection_error_is_reported() {
        let client = client(1).unwrap();
        let err = post_json(
            &client,
            "http://127.0.0.1:9/unreachable",
            &[],
            &serde_json::json!({}),
            0,
            "Test",
        )
        .await
        .unwrap_err();
        assert!(err.contains("Test connection error"));
    }
}
