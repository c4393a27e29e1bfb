//! End-to-end ingestion tests against mocked blob, embeddings, and search
//! endpoints.
//!
//! Asserts: PDF filtering, per-document failure isolation, dimension
//! validation before upload, upsert payload shape, and dry-run behavior.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use blobdex::chunk::ChunkParams;
use blobdex::config::{BlobSettings, EmbeddingSettings, IngestSettings, SearchSettings};
use blobdex::ingest::run_ingest;

/// Minimal valid PDF containing a single line of text. Builds the body
/// first, then an xref table with correct byte offsets so the extractor can
/// parse it.
fn minimal_pdf_with_text(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!("4 0 obj << /Length {} >> stream\n{}endstream endobj\n", stream.len(), stream)
            .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Container listing with one good PDF, one broken PDF, and one non-PDF.
const LISTING_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ContainerName="docs">
  <Blobs>
    <Blob>
      <Name>report.pdf</Name>
      <Properties>
        <Last-Modified>Tue, 04 Oct 2022 10:00:00 GMT</Last-Modified>
        <Etag>0x1</Etag>
        <Content-Length>1000</Content-Length>
      </Properties>
    </Blob>
    <Blob>
      <Name>broken.pdf</Name>
      <Properties>
        <Content-Length>9</Content-Length>
      </Properties>
    </Blob>
    <Blob>
      <Name>empty.pdf</Name>
      <Properties>
        <Content-Length>400</Content-Length>
      </Properties>
    </Blob>
    <Blob>
      <Name>notes.txt</Name>
      <Properties>
        <Content-Length>12</Content-Length>
      </Properties>
    </Blob>
  </Blobs>
  <NextMarker />
</EnumerationResults>"#;

/// Responds to an embeddings request with one vector per input text.
struct EchoEmbeddings {
    dim: usize,
}

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let n = body["input"].as_array().map(|a| a.len()).unwrap_or(0);
        let data: Vec<serde_json::Value> = (0..n)
            .map(|i| {
                serde_json::json!({
                    "index": i,
                    "embedding": vec![0.25f32; self.dim],
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data }))
    }
}

fn test_settings(server: &MockServer, dimensions: usize) -> IngestSettings {
    // "test-account-key" in base64; the mock server never verifies the
    // signature, but signing still has to succeed on our side.
    let key = "dGVzdC1hY2NvdW50LWtleQ==";
    IngestSettings {
        blob: BlobSettings {
            connection_string: format!(
                "DefaultEndpointsProtocol=http;AccountName=testacct;AccountKey={};BlobEndpoint={}/testacct",
                key,
                server.uri()
            ),
            container: "docs".to_string(),
        },
        embedding: EmbeddingSettings {
            endpoint: server.uri(),
            api_key: "embed-key".to_string(),
            deployment: "embedder".to_string(),
            api_version: "2024-02-15-preview".to_string(),
            batch_size: 2,
            max_retries: 0,
            timeout_secs: 10,
        },
        search: SearchSettings {
            endpoint: server.uri(),
            api_key: "search-key".to_string(),
            index: "legal-docs".to_string(),
            api_version: Some("2023-11-01".to_string()),
            dimensions,
        },
        chunking: ChunkParams::new(20, 5).unwrap(),
    }
}

async fn mount_blob_mocks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/testacct/docs"))
        .and(query_param("comp", "list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_XML))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/testacct/docs/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(minimal_pdf_with_text("the quick brown fox jumps over the lazy dog")),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/testacct/docs/broken.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a pdf".to_vec()))
        .mount(server)
        .await;

    // Parses fine but extracts no text at all.
    Mock::given(method("GET"))
        .and(path("/testacct/docs/empty.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(minimal_pdf_with_text("")))
        .mount(server)
        .await;
}

async fn mount_search_mocks(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(path("/indexes('legal-docs')"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/indexes('legal-docs')/docs/index"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": [] })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn ingests_pdfs_and_isolates_failures() {
    let server = MockServer::start().await;
    mount_blob_mocks(&server).await;
    mount_search_mocks(&server).await;

    Mock::given(method("POST"))
        .and(path("/openai/deployments/embedder/embeddings"))
        .respond_with(EchoEmbeddings { dim: 8 })
        .mount(&server)
        .await;

    let settings = test_settings(&server, 8);
    let summary = run_ingest(&settings, false, None).await.unwrap();

    assert_eq!(summary.listed, 4);
    assert_eq!(summary.matched, 3); // notes.txt filtered out
    assert_eq!(summary.documents_indexed, 1);
    assert_eq!(summary.documents_failed, 1); // broken.pdf
    assert_eq!(summary.documents_skipped, 1); // empty.pdf
    assert!(summary.chunks_embedded >= 2, "short text, small windows");
    assert_eq!(summary.records_uploaded, summary.chunks_embedded);

    // Inspect the upsert payload.
    let requests = server.received_requests().await.unwrap();
    let upload = requests
        .iter()
        .find(|r| r.url.path() == "/indexes('legal-docs')/docs/index")
        .expect("an upload request was made");
    let body: serde_json::Value = serde_json::from_slice(&upload.body).unwrap();
    let records = body["value"].as_array().unwrap();
    assert_eq!(records.len() as u64, summary.records_uploaded);

    let first = &records[0];
    assert_eq!(first["@search.action"], "upload");
    assert_eq!(first["id"], "report-0");
    assert_eq!(first["document_id"], "report");
    assert_eq!(first["chunk_id"], "0");
    assert_eq!(first["source"], "report.pdf");
    assert_eq!(first["embedding"].as_array().unwrap().len(), 8);

    // Records arrive in document order.
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record["id"], format!("report-{}", i));
    }
}

#[tokio::test]
async fn dimension_mismatch_aborts_document_before_upload() {
    let server = MockServer::start().await;
    mount_blob_mocks(&server).await;

    Mock::given(method("PUT"))
        .and(path("/indexes('legal-docs')"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // No upload may ever happen.
    Mock::given(method("POST"))
        .and(path("/indexes('legal-docs')/docs/index"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // Service returns 8-dimensional vectors, but 16 are expected.
    Mock::given(method("POST"))
        .and(path("/openai/deployments/embedder/embeddings"))
        .respond_with(EchoEmbeddings { dim: 8 })
        .mount(&server)
        .await;

    let settings = test_settings(&server, 16);
    let summary = run_ingest(&settings, false, None).await.unwrap();

    assert_eq!(summary.documents_indexed, 0);
    assert_eq!(summary.documents_failed, 2); // report.pdf (dims) + broken.pdf
    assert_eq!(summary.documents_skipped, 1); // empty.pdf never reaches embedding
    assert_eq!(summary.records_uploaded, 0);
}

#[tokio::test]
async fn dry_run_lists_without_downloading() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/testacct/docs"))
        .and(query_param("comp", "list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_XML))
        .mount(&server)
        .await;

    // Any other request would 404 and fail the run.
    let settings = test_settings(&server, 8);
    let summary = run_ingest(&settings, true, None).await.unwrap();

    assert_eq!(summary.listed, 4);
    assert_eq!(summary.matched, 3);
    assert_eq!(summary.documents_indexed, 0);
    assert_eq!(summary.records_uploaded, 0);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() == "/testacct/docs"));
}

#[tokio::test]
async fn limit_caps_processed_documents() {
    let server = MockServer::start().await;
    mount_blob_mocks(&server).await;
    mount_search_mocks(&server).await;

    Mock::given(method("POST"))
        .and(path("/openai/deployments/embedder/embeddings"))
        .respond_with(EchoEmbeddings { dim: 8 })
        .mount(&server)
        .await;

    let settings = test_settings(&server, 8);
    // Listing is sorted, so the limit keeps broken.pdf only.
    let summary = run_ingest(&settings, false, Some(1)).await.unwrap();

    assert_eq!(summary.matched, 1);
    assert_eq!(summary.documents_failed, 1);
    assert_eq!(summary.documents_indexed, 0);
}
