//! Elasticsearch write path
//!
//! A thin HTTP client for the three operations the sync needs: checking and
//! creating the index, and bulk-upserting documents by id. Per-document bulk
//! failures are logged and never fail the batch; transport failures
//! propagate to the caller.

mod schema;

pub use schema::INDEX_SCHEMA;

use crate::config::ElasticsearchConfig;
use crate::error::{Error, Result};
use crate::models::FilmDocument;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
struct BulkResponse {
    errors: bool,
    items: Vec<BulkItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct BulkItem {
    index: BulkItemStatus,
}

#[derive(Debug, Clone, Deserialize)]
struct BulkItemStatus {
    #[serde(rename = "_id")]
    id: Option<String>,
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct CountResponse {
    count: u64,
}

/// Elasticsearch client bound to one index
pub struct ElasticClient {
    client: Client,
    base_url: Url,
    index: String,
}

impl ElasticClient {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            index: config.index.clone(),
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid Elasticsearch URL: {}", e)))
    }

    /// Whether the target index exists.
    pub async fn index_exists(&self) -> Result<bool> {
        let url = self.endpoint(&self.index)?;
        let response = self.client.head(url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Error::Index(format!(
                "Unexpected status {} checking index '{}'",
                status, self.index
            ))),
        }
    }

    /// Create the index from the embedded settings and mappings.
    pub async fn create_index(&self) -> Result<()> {
        info!("Creating index '{}'", self.index);

        let url = self.endpoint(&self.index)?;
        let body: serde_json::Value = serde_json::from_str(INDEX_SCHEMA)?;
        let response = self.client.put(url).json(&body).send().await?;

        if let Err(e) = response.error_for_status_ref() {
            return Err(Error::Index(format!(
                "Creating index '{}' failed: {}",
                self.index, e
            )));
        }

        Ok(())
    }

    /// Number of documents currently in the index.
    pub async fn document_count(&self) -> Result<u64> {
        let url = self.endpoint(&format!("{}/_count", self.index))?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        let parsed: CountResponse = response.json().await?;
        Ok(parsed.count)
    }

    /// Upsert a batch of documents by id via the bulk API.
    ///
    /// Returns the number of documents the index rejected. Rejections are
    /// logged individually and do not fail the batch.
    pub async fn bulk_upsert(&self, documents: &[FilmDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let mut body = String::new();
        for doc in documents {
            let action = json!({"index": {"_index": self.index, "_id": doc.id}});
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&serde_json::to_string(doc)?);
            body.push('\n');
        }

        debug!("Bulk upserting {} document(s) to '{}'", documents.len(), self.index);

        let url = self.endpoint("_bulk")?;
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: BulkResponse = response.json().await?;
        if !parsed.errors {
            return Ok(0);
        }

        let mut failed = 0;
        for item in &parsed.items {
            if let Some(err) = &item.index.error {
                failed += 1;
                error!(
                    "Indexing document {} failed with status {}: {}",
                    item.index.id.as_deref().unwrap_or("<unknown>"),
                    item.index.status,
                    err
                );
            }
        }

        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PersonRef;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: &str) -> ElasticsearchConfig {
        ElasticsearchConfig {
            url: url.to_string(),
            index: "movies".to_string(),
            timeout_secs: 5,
        }
    }

    fn sample_doc(n: u128, title: &str) -> FilmDocument {
        FilmDocument {
            id: Uuid::from_u128(n),
            title: title.to_string(),
            description: Some("about a film".to_string()),
            rating: Some(8.1),
            genre: vec!["Drama".to_string()],
            actors: vec![PersonRef {
                id: Uuid::from_u128(100),
                name: "Ann".to_string(),
            }],
            writers: vec![],
            actors_names: vec!["Ann".to_string()],
            writers_names: vec![],
            director: vec![],
        }
    }

    #[tokio::test]
    async fn test_index_exists_and_missing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/movies"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let client = ElasticClient::new(&test_config(&server.uri())).unwrap();
        assert!(client.index_exists().await.unwrap());

        Mock::given(method("HEAD"))
            .and(path("/movies"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        assert!(!client.index_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_index_puts_schema() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/movies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElasticClient::new(&test_config(&server.uri())).unwrap();
        client.create_index().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("mappings").is_some());
    }

    #[tokio::test]
    async fn test_bulk_upsert_builds_ndjson_pairs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": false,
                "items": [
                    {"index": {"_id": "a", "status": 200}},
                    {"index": {"_id": "b", "status": 201}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElasticClient::new(&test_config(&server.uri())).unwrap();
        let docs = vec![sample_doc(1, "First"), sample_doc(2, "Second")];
        let failed = client.bulk_upsert(&docs).await.unwrap();
        assert_eq!(failed, 0);

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);

        let action: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_index"], "movies");
        assert_eq!(action["index"]["_id"], docs[0].id.to_string());

        let doc: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(doc["title"], "First");
        assert_eq!(doc["actors"][0]["name"], "Ann");
    }

    #[tokio::test]
    async fn test_bulk_upsert_reports_item_errors_without_failing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": true,
                "items": [
                    {"index": {"_id": "a", "status": 200}},
                    {"index": {"_id": "b", "status": 400, "error": {
                        "type": "mapper_parsing_exception",
                        "reason": "failed to parse field"
                    }}}
                ]
            })))
            .mount(&server)
            .await;

        let client = ElasticClient::new(&test_config(&server.uri())).unwrap();
        let docs = vec![sample_doc(1, "First"), sample_doc(2, "Second")];
        let failed = client.bulk_upsert(&docs).await.unwrap();
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn test_bulk_upsert_empty_batch_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ElasticClient::new(&test_config(&server.uri())).unwrap();
        assert_eq!(client.bulk_upsert(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_document_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies/_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 1234})))
            .mount(&server)
            .await;

        let client = ElasticClient::new(&test_config(&server.uri())).unwrap();
        assert_eq!(client.document_count().await.unwrap(), 1234);
    }
}
