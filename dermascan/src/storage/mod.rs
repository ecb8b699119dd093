//! Persistence for uploaded artifacts and prediction records.
//!
//! Both sides sit behind a trait so the request pipeline does not care
//! whether it talks to Google Cloud, the local disk, or memory.

pub mod blob;
pub mod record;

pub use blob::{blob_key, BlobStore, FsBlobStore, GcsBlobStore, MemoryBlobStore};
pub use record::{
    FirestoreRecordStore, MemoryRecordStore, PredictionRecord, RecordStore, SledRecordStore,
};

use crate::config::{BlobBackend, RecordBackend};
use crate::error::StoreError;
use std::sync::Arc;

/// Reads a bearer token once. Nothing refreshes it afterwards.
fn token_from_env(var: Option<&String>) -> Option<String> {
    let var = var?;
    match std::env::var(var) {
        Ok(token) if !token.is_empty() => {
            tracing::warn!(
                %var,
                "access token read once at start-up and never refreshed; short-lived tokens (about 1h for GCP) need a restart"
            );
            Some(token)
        }
        _ => {
            tracing::warn!(%var, "access token variable unset, sending unauthenticated requests");
            None
        }
    }
}

pub async fn open_blob_store(backend: &BlobBackend) -> Result<Arc<dyn BlobStore>, StoreError> {
    let store: Arc<dyn BlobStore> = match backend {
        BlobBackend::Local { root } => Arc::new(FsBlobStore::open(root.clone()).await?),
        BlobBackend::Gcs {
            bucket,
            endpoint,
            token_env,
        } => Arc::new(GcsBlobStore::new(
            bucket.clone(),
            endpoint.clone(),
            token_from_env(token_env.as_ref()),
        )),
        BlobBackend::Memory => Arc::new(MemoryBlobStore::new()),
    };
    tracing::info!(backend = store.backend_name(), "blob store ready");
    Ok(store)
}

pub async fn open_record_store(
    backend: &RecordBackend,
) -> Result<Arc<dyn RecordStore>, StoreError> {
    let store: Arc<dyn RecordStore> = match backend {
        RecordBackend::Sled { path, .. } => {
            let path = path.clone();
            let store = tokio::task::spawn_blocking(move || SledRecordStore::open(path))
                .await
                .map_err(|e| StoreError::Task(e.to_string()))??;
            Arc::new(store)
        }
        RecordBackend::Firestore {
            project,
            endpoint,
            token_env,
            ..
        } => Arc::new(FirestoreRecordStore::new(
            project.clone(),
            endpoint.clone(),
            token_from_env(token_env.as_ref()),
        )),
        RecordBackend::Memory { .. } => Arc::new(MemoryRecordStore::new()),
    };
    tracing::info!(
        backend = store.backend_name(),
        collection = backend.collection(),
        "record store ready"
    );
    Ok(store)
}
