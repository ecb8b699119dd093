use crate::error::StoreError;
use crate::verdict::{Diagnosis, Verdict};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

pub const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

/// One classification outcome. Immutable once created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: String,
    pub result: Diagnosis,
    pub suggestion: String,
    pub created_at: String,
}

impl PredictionRecord {
    /// Assigns a fresh id and the current UTC time.
    pub fn new(verdict: Verdict) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            result: verdict.result,
            suggestion: verdict.suggestion.to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Document store for prediction records, upsert by id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put(&self, collection: &str, record: &PredictionRecord) -> Result<(), StoreError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}

// --- sled ---

pub struct SledRecordStore {
    db: sled::Db,
}

impl SledRecordStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    pub fn get(&self, collection: &str, id: &str) -> Result<Option<PredictionRecord>, StoreError> {
        let tree = self.db.open_tree(collection)?;
        match tree.get(id.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self.db.open_tree(collection)?.len())
    }
}

#[async_trait]
impl RecordStore for SledRecordStore {
    async fn put(&self, collection: &str, record: &PredictionRecord) -> Result<(), StoreError> {
        let db = self.db.clone();
        let collection = collection.to_string();
        let key = record.id.clone();
        let value = serde_json::to_vec(record)?;

        // open_tree and insert both block on disk I/O
        let tree = tokio::task::spawn_blocking(move || -> Result<sled::Tree, StoreError> {
            let tree = db.open_tree(collection)?;
            tree.insert(key.as_bytes(), value)?;
            Ok(tree)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;
        tree.flush_async().await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

// --- Firestore (REST) ---

pub struct FirestoreRecordStore {
    client: reqwest::Client,
    endpoint: String,
    project: String,
    token: Option<String>,
}

impl FirestoreRecordStore {
    pub fn new(project: String, endpoint: Option<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint
                .unwrap_or_else(|| FIRESTORE_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            project,
            token,
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}/{}",
            self.endpoint, self.project, collection, id
        )
    }
}

/// Firestore's typed-value encoding of a record.
fn firestore_document(record: &PredictionRecord) -> serde_json::Value {
    json!({
        "fields": {
            "id": { "stringValue": record.id },
            "result": { "stringValue": record.result.as_str() },
            "suggestion": { "stringValue": record.suggestion },
            "createdAt": { "stringValue": record.created_at },
        }
    })
}

#[async_trait]
impl RecordStore for FirestoreRecordStore {
    async fn put(&self, collection: &str, record: &PredictionRecord) -> Result<(), StoreError> {
        let mut request = self
            .client
            .patch(self.document_url(collection, &record.id))
            .json(&firestore_document(record));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "firestore"
    }
}

// --- In memory ---

#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<DashMap<(String, String), PredictionRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<PredictionRecord> {
        self.records
            .get(&(collection.to_string(), id.to_string()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, collection: &str, record: &PredictionRecord) -> Result<(), StoreError> {
        self.records
            .insert((collection.to_string(), record.id.clone()), record.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeBackend;
    use axum::http::{Method, StatusCode};
    use chrono::DateTime;

    fn sample() -> PredictionRecord {
        PredictionRecord::new(Verdict::from_score(0.9, 0.5))
    }

    #[test]
    fn test_new_record() {
        let record = sample();
        assert!(uuid::Uuid::parse_str(&record.id).is_ok());
        assert_eq!(record.result, Diagnosis::Cancer);
        assert_eq!(record.suggestion, crate::verdict::CANCER_SUGGESTION);
        assert!(record.created_at.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&record.created_at).is_ok());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = sample();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], record.id);
        assert_eq!(value["result"], "Cancer");
        assert_eq!(value["createdAt"], record.created_at);
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn test_firestore_document_shape() {
        let record = PredictionRecord::new(Verdict::from_score(0.1, 0.5));
        let doc = firestore_document(&record);
        assert_eq!(doc["fields"]["result"]["stringValue"], "Non-cancer");
        assert_eq!(doc["fields"]["createdAt"]["stringValue"], record.created_at);
    }

    #[test]
    fn test_firestore_document_url() {
        let store = FirestoreRecordStore::new("demo".into(), None, None);
        assert_eq!(
            store.document_url("predictions", "abc"),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents/predictions/abc"
        );
    }

    #[tokio::test]
    async fn test_sled_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledRecordStore::open(dir.path().join("db")).unwrap();
        let record = sample();

        store.put("predictions", &record).await.unwrap();
        assert_eq!(store.get("predictions", &record.id).unwrap(), Some(record.clone()));
        assert_eq!(store.get("other", &record.id).unwrap(), None);

        // upsert by id
        store.put("predictions", &record).await.unwrap();
        assert_eq!(store.count("predictions").unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sled_store_creates_collections_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SledRecordStore::open(dir.path().join("db")).unwrap());

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let record = sample();
                let collection = format!("scans-{}", i % 4);
                store.put(&collection, &record).await.unwrap();
                (collection, record)
            }));
        }

        for task in tasks {
            let (collection, record) = task.await.unwrap();
            assert_eq!(store.get(&collection, &record.id).unwrap(), Some(record));
        }
        for i in 0..4 {
            assert_eq!(store.count(&format!("scans-{i}")).unwrap(), 2);
        }
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryRecordStore::new();
        let record = sample();
        store.put("predictions", &record).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("predictions", &record.id), Some(record));
    }

    #[tokio::test]
    async fn test_firestore_put_patches_document() {
        let server = FakeBackend::start(StatusCode::OK, "{}").await;
        let store = FirestoreRecordStore::new(
            "demo".into(),
            Some(server.base_url.clone()),
            Some("ya29.token".into()),
        );
        let record = sample();

        store.put("predictions", &record).await.unwrap();

        let request = server.only_request();
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(
            request.path,
            format!("/v1/projects/demo/databases/(default)/documents/predictions/{}", record.id)
        );
        assert_eq!(request.header("authorization"), Some("Bearer ya29.token"));
        let sent: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(sent, firestore_document(&record));
    }

    #[tokio::test]
    async fn test_firestore_error_status_is_rejected_with_body() {
        let server = FakeBackend::start(StatusCode::INTERNAL_SERVER_ERROR, "backend down").await;
        let store = FirestoreRecordStore::new("demo".into(), Some(server.base_url.clone()), None);

        match store.put("predictions", &sample()).await {
            Err(StoreError::Rejected { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "backend down");
            }
            other => panic!("Expected Rejected, got {other:?}"),
        }
        assert_eq!(server.only_request().header("authorization"), None);
    }
}
