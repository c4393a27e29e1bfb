//! Embeddings API client.
//!
//! Posts batches of chunk texts to the configured embedding deployment and
//! returns one fixed-dimension vector per input, in input order.
//!
//! # Retry strategy
//!
//! Transient failures are retried with bounded exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

use crate::config::EmbeddingSettings;

/// Client for a single embeddings deployment.
pub struct EmbeddingClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl EmbeddingClient {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            settings.endpoint, settings.deployment, settings.api_version
        );

        Ok(EmbeddingClient {
            http,
            url,
            api_key: settings.api_key.clone(),
            max_retries: settings.max_retries,
        })
    }

    /// Embed a batch of texts, returning vectors in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "input": texts });
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&self.url)
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embedding_response(&json);
                    }

                    // Rate limited or server error — retry.
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!(
                            "embeddings API error {}: {}",
                            status,
                            body_text.chars().take(500).collect::<String>()
                        ));
                        continue;
                    }

                    // Client error (not 429) — don't retry.
                    let body_text = response.text().await.unwrap_or_default();
                    bail!(
                        "embeddings API error {}: {}",
                        status,
                        body_text.chars().take(500).collect::<String>()
                    );
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("embedding failed after retries")))
    }
}

/// Parse the embeddings response JSON, ordering vectors by their `index`
/// field so output position matches input position.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("invalid embeddings response: missing data array"))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("invalid embeddings response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);

        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_response_in_index_order() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [3.0, 4.0] },
                { "index": 0, "embedding": [1.0, 2.0] },
            ]
        });
        let vecs = parse_embedding_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn missing_data_is_an_error() {
        let err = parse_embedding_response(&serde_json::json!({})).unwrap_err();
        assert!(err.to_string().contains("missing data"));
    }

    #[test]
    fn missing_embedding_field_is_an_error() {
        let json = serde_json::json!({ "data": [ { "index": 0 } ] });
        assert!(parse_embedding_response(&json).is_err());
    }
}
