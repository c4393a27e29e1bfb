//! Search-index client.
//!
//! Talks to the managed search service over REST: probes for a working API
//! version, provisions the index (idempotent PUT of the full definition),
//! and upserts chunk records in batches.
//!
//! Index schema, vector-search parameters, and semantic configuration are a
//! one-time provisioning concern; per-run logic only uploads records.

use anyhow::{anyhow, bail, Result};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SearchSettings;
use crate::models::IndexDocument;

/// API versions to probe, newest first. Overridden by `SEARCH_API_VERSION`.
const DEFAULT_API_VERSIONS: &[&str] = &[
    "2024-10-01-Preview",
    "2024-05-01-Preview",
    "2023-11-01",
    "2023-11-01-Preview",
];

/// Records per upload request.
const UPLOAD_BATCH_SIZE: usize = 32;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client bound to one index on one search service.
pub struct SearchClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    index: String,
    api_version: String,
    dimensions: usize,
}

impl SearchClient {
    /// Build a client, resolving the API version (explicit override or
    /// service probe).
    pub async fn connect(settings: &SearchSettings) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let api_version = match settings.api_version {
            Some(ref v) => {
                info!(version = %v, "using configured search API version");
                v.clone()
            }
            None => resolve_api_version(&http, &settings.endpoint, &settings.api_key).await?,
        };

        Ok(SearchClient {
            http,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            index: settings.index.clone(),
            api_version,
            dimensions: settings.dimensions,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Create or update the index. Safe to repeat.
    pub async fn ensure_index(&self) -> Result<()> {
        let url = format!(
            "{}/indexes('{}')?api-version={}",
            self.endpoint, self.index, self.api_version
        );
        let definition = index_definition(&self.index, self.dimensions);

        let resp = self
            .http
            .put(&url)
            .header("api-key", &self.api_key)
            .json(&definition)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "index create/update failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        info!(index = %self.index, "index created or updated");
        Ok(())
    }

    /// Upsert records in batches. Each record replaces any previous record
    /// with the same id, so re-runs and interrupted runs converge.
    pub async fn upload(&self, docs: &[IndexDocument]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/indexes('{}')/docs/index?api-version={}",
            self.endpoint, self.index, self.api_version
        );

        for (batch_no, batch) in docs.chunks(UPLOAD_BATCH_SIZE).enumerate() {
            let actions: Vec<serde_json::Value> = batch
                .iter()
                .map(|doc| {
                    let mut value = serde_json::to_value(doc).expect("record serializes");
                    value
                        .as_object_mut()
                        .expect("record is a JSON object")
                        .insert(
                            "@search.action".to_string(),
                            serde_json::Value::String("upload".to_string()),
                        );
                    value
                })
                .collect();

            let payload = serde_json::json!({ "value": actions });

            let resp = self
                .http
                .post(&url)
                .header("api-key", &self.api_key)
                .json(&payload)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!(
                    "document upload failed (HTTP {}): {}",
                    status,
                    body.chars().take(500).collect::<String>()
                );
            }

            debug!(
                batch = batch_no + 1,
                records = batch.len(),
                "uploaded batch"
            );
        }

        Ok(())
    }
}

/// Pick a working API version by probing the service.
///
/// 401/403 are hard failures (retrying other versions cannot fix
/// credentials); other non-200s move on to the next candidate.
async fn resolve_api_version(
    http: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
) -> Result<String> {
    for version in DEFAULT_API_VERSIONS {
        let url = format!("{}/indexes?api-version={}", endpoint, version);
        let resp = match http.get(&url).header("api-key", api_key).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(version, error = %e, "API version probe failed");
                continue;
            }
        };

        match resp.status().as_u16() {
            200 => {
                info!(version, "detected supported search API version");
                return Ok(version.to_string());
            }
            401 => bail!("unauthorized: check SEARCH_API_KEY"),
            403 => bail!("forbidden: the search key may lack permissions"),
            status => {
                debug!(version, status, "API version not accepted");
            }
        }
    }

    Err(anyhow!(
        "no supported search API version found; set SEARCH_API_VERSION explicitly \
         or verify the service endpoint (tried: {})",
        DEFAULT_API_VERSIONS.join(", ")
    ))
}

/// Full index definition: string key, filterable ids, searchable content,
/// a vector field with an HNSW profile, and a semantic configuration that
/// prioritizes the content field.
fn index_definition(name: &str, dimensions: usize) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "fields": [
            { "name": "id", "type": "Edm.String", "key": true, "filterable": false, "searchable": false },
            { "name": "document_id", "type": "Edm.String", "filterable": true, "searchable": false },
            { "name": "chunk_id", "type": "Edm.String", "filterable": true, "searchable": false },
            { "name": "content", "type": "Edm.String", "searchable": true, "analyzer": "en.microsoft" },
            {
                "name": "embedding",
                "type": "Collection(Edm.Single)",
                "searchable": true,
                "dimensions": dimensions,
                "vectorSearchProfile": "vector-profile"
            },
            { "name": "source", "type": "Edm.String", "filterable": true, "searchable": false }
        ],
        "vectorSearch": {
            "algorithms": [
                {
                    "name": "hnsw-algorithm",
                    "kind": "hnsw",
                    "hnswParameters": { "m": 4, "efConstruction": 400, "efSearch": 500, "metric": "cosine" }
                }
            ],
            "profiles": [
                { "name": "vector-profile", "algorithm": "hnsw-algorithm" }
            ]
        },
        "semantic": {
            "configurations": [
                {
                    "name": "semantic-config",
                    "prioritizedFields": {
                        "prioritizedContentFields": [ { "fieldName": "content" } ]
                    }
                }
            ]
        }
    })
}
