//! Blob storage connector.
//!
//! Lists and downloads objects from a storage container using the blob REST
//! API with SharedKey authentication. Implements marker-based pagination for
//! large containers and supports custom endpoints for local emulators.
//!
//! Uses only pure-Rust dependencies (`hmac`, `sha2`, `base64`) for request
//! signing — no C library dependencies, so it builds in any environment.
//!
//! # Configuration
//!
//! Credentials come from the storage connection string:
//!
//! ```text
//! DefaultEndpointsProtocol=https;AccountName=acme;AccountKey=<base64>;EndpointSuffix=core.windows.net
//! ```
//!
//! An explicit `BlobEndpoint=` entry takes precedence over the derived
//! `https://<account>.blob.<suffix>` host (useful for emulators).
//!
//! # Authentication
//!
//! Every request carries an `Authorization: SharedKey <account>:<signature>`
//! header, where the signature is the base64 HMAC-SHA256 of a canonicalized
//! string-to-sign computed from the verb, the `x-ms-*` headers, and the
//! resource path plus sorted query parameters. The HMAC key is the
//! base64-decoded account key.

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::BlobSettings;
use crate::models::BlobItem;

type HmacSha256 = Hmac<Sha256>;

/// Storage service version pinned for all requests.
const STORAGE_API_VERSION: &str = "2021-08-06";

/// Parsed storage-account credentials and endpoint.
#[derive(Debug, Clone)]
pub struct StorageAccount {
    /// Account name, used in the canonicalized resource.
    pub name: String,
    /// Decoded account key (HMAC secret).
    key: Vec<u8>,
    /// Blob endpoint without trailing slash.
    pub endpoint: String,
}

impl StorageAccount {
    /// Parse a `key=value;key=value` storage connection string.
    ///
    /// # Errors
    ///
    /// Fails when `AccountName` or `AccountKey` is missing, or when the key
    /// is not valid base64.
    pub fn from_connection_string(conn: &str) -> Result<Self> {
        let mut name = None;
        let mut key = None;
        let mut endpoint = None;
        let mut suffix = "core.windows.net".to_string();

        for part in conn.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (k, v) = part
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed connection string entry: '{part}'"))?;
            match k {
                "AccountName" => name = Some(v.to_string()),
                "AccountKey" => key = Some(v.to_string()),
                "BlobEndpoint" => endpoint = Some(v.trim_end_matches('/').to_string()),
                "EndpointSuffix" => suffix = v.to_string(),
                _ => {}
            }
        }

        let name = name.context("connection string is missing AccountName")?;
        let raw_key = key.context("connection string is missing AccountKey")?;
        let key = BASE64
            .decode(raw_key.as_bytes())
            .context("AccountKey is not valid base64")?;
        let endpoint =
            endpoint.unwrap_or_else(|| format!("https://{}.blob.{}", name, suffix));

        Ok(StorageAccount {
            name,
            key,
            endpoint,
        })
    }
}

/// A blob container reachable over REST.
pub struct BlobStore {
    http: reqwest::Client,
    account: StorageAccount,
    container: String,
}

impl BlobStore {
    /// Build a store from settings, parsing the connection string.
    pub fn from_settings(settings: &BlobSettings) -> Result<Self> {
        let account = StorageAccount::from_connection_string(&settings.connection_string)?;
        Ok(BlobStore {
            http: reqwest::Client::new(),
            account,
            container: settings.container.clone(),
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// List every blob in the container, following pagination markers.
    pub async fn list(&self) -> Result<Vec<BlobItem>> {
        let mut items = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut query = vec![
                ("comp".to_string(), "list".to_string()),
                ("restype".to_string(), "container".to_string()),
            ];
            if let Some(ref m) = marker {
                query.push(("marker".to_string(), m.clone()));
            }

            let resp = self
                .signed_get(&self.container, &query)
                .await
                .with_context(|| {
                    format!("failed to list blobs in container '{}'", self.container)
                })?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!(
                    "ListBlobs failed (HTTP {}): {}",
                    status,
                    body.chars().take(500).collect::<String>()
                );
            }

            let xml = resp.text().await?;
            let (batch, next_marker) = parse_list_blobs_response(&xml);
            items.extend(batch);

            match next_marker {
                Some(m) if !m.is_empty() => marker = Some(m),
                _ => break,
            }
        }

        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    /// Download a single blob's raw bytes.
    pub async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let path = format!("{}/{}", self.container, name);
        let resp = self
            .signed_get(&path, &[])
            .await
            .with_context(|| format!("failed to get blob '{}'", name))?;

        if !resp.status().is_success() {
            bail!("GetBlob failed (HTTP {}) for blob '{}'", resp.status(), name);
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Issue a SharedKey-signed GET for `<endpoint>/<path>?<query>`.
    async fn signed_get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<reqwest::Response> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let ms_headers = vec![
            ("x-ms-date".to_string(), date.clone()),
            ("x-ms-version".to_string(), STORAGE_API_VERSION.to_string()),
        ];

        let authorization = shared_key_authorization(&self.account, "GET", path, query, &ms_headers);

        let encoded_path: String = path
            .split('/')
            .map(uri_encode)
            .collect::<Vec<_>>()
            .join("/");
        let url = format!("{}/{}", self.account.endpoint, encoded_path);

        let resp = self
            .http
            .get(&url)
            .query(query)
            .header("Authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", STORAGE_API_VERSION)
            .send()
            .await?;

        Ok(resp)
    }
}

// ============ SharedKey signing ============

/// Compute the `Authorization: SharedKey` header value for a request.
///
/// The string-to-sign is the verb, the eleven standard headers (all empty
/// for our GETs — the date travels in `x-ms-date`), the canonicalized
/// `x-ms-*` headers, and the canonicalized resource.
fn shared_key_authorization(
    account: &StorageAccount,
    verb: &str,
    path: &str,
    query: &[(String, String)],
    ms_headers: &[(String, String)],
) -> String {
    let mut headers: Vec<(String, String)> = ms_headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_resource = canonicalized_resource(&account.name, path, query);

    let string_to_sign = format!(
        "{}\n\n\n\n\n\n\n\n\n\n\n\n{}{}",
        verb, canonical_headers, canonical_resource
    );

    let mut mac =
        HmacSha256::new_from_slice(&account.key).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    format!("SharedKey {}:{}", account.name, signature)
}

/// `/<account>/<path>` plus each query parameter as `\nname:value`, with
/// names lowercased and parameters sorted lexicographically.
fn canonicalized_resource(account: &str, path: &str, query: &[(String, String)]) -> String {
    let mut out = format!("/{}/{}", account, path);
    let mut params: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0));
    for (k, v) in params {
        out.push('\n');
        out.push_str(&k);
        out.push(':');
        out.push_str(&v);
    }
    out
}

/// URI-encode a path segment per RFC 3986 (unreserved characters pass
/// through).
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

// ============ XML parsing (minimal, no extra deps) ============

/// Parse a ListBlobs XML response into [`BlobItem`]s plus the next
/// pagination marker, if any.
fn parse_list_blobs_response(xml: &str) -> (Vec<BlobItem>, Option<String>) {
    let mut items = Vec::new();
    let next_marker = extract_xml_value(xml, "NextMarker");

    let mut remaining = xml;
    while let Some(start) = remaining.find("<Blob>") {
        let block_start = start + "<Blob>".len();
        let Some(end) = remaining[block_start..].find("</Blob>") else {
            break;
        };
        let block = &remaining[block_start..block_start + end];
        remaining = &remaining[block_start + end + "</Blob>".len()..];

        let name = extract_xml_value(block, "Name").unwrap_or_default();
        if name.is_empty() {
            continue;
        }

        let last_modified = extract_xml_value(block, "Last-Modified")
            .and_then(|s| chrono::DateTime::parse_from_rfc2822(&s).ok())
            .map(|dt| dt.timestamp())
            .unwrap_or(0);

        let etag = extract_xml_value(block, "Etag").unwrap_or_default();

        let size = extract_xml_value(block, "Content-Length")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);

        items.push(BlobItem {
            name,
            last_modified,
            etag,
            size,
        });
    }

    (items, next_marker)
}

/// Extract the text content of a simple, non-nested XML tag.
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)?;
    let value_start = start + open.len();
    let end = xml[value_start..].find(&close)?;
    Some(xml[value_start..value_start + end].to_string())
}
