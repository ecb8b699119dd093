use crate::error::LoadError;
use crate::model::classifier::OnnxClassifier;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::time::Duration;

/// Upper bound on a downloaded model artifact.
pub const MAX_MODEL_BYTES: u64 = 256 * 1024 * 1024;

// Initialize the global environment for ORT (only needed once)
pub fn init_ort() -> Result<(), LoadError> {
    ort::init().with_name("dermascan").commit()?;
    Ok(())
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Loads the classifier from `source`, which is either an `http(s)://` URL
/// or a local `.onnx` path.
pub async fn load_model(source: &str, intra_threads: usize) -> Result<OnnxClassifier, LoadError> {
    let session = if is_remote(source) {
        let bytes = fetch_model_bytes(source).await?;
        tokio::task::spawn_blocking(move || session_from_memory(&bytes, intra_threads))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))??
    } else {
        let path = source.to_string();
        tokio::task::spawn_blocking(move || session_from_file(path, intra_threads))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))??
    };

    let input_name = session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .ok_or(LoadError::NoInputs)?;

    for (i, input) in session.inputs.iter().enumerate() {
        tracing::info!(index = i, name = %input.name, kind = ?input.input_type, "model input");
    }

    Ok(OnnxClassifier::new(session, input_name))
}

/// Downloads a model artifact into memory, refusing anything larger than
/// [`MAX_MODEL_BYTES`].
pub async fn fetch_model_bytes(url: &str) -> Result<Vec<u8>, LoadError> {
    fetch_limited(url, MAX_MODEL_BYTES).await
}

async fn fetch_limited(url: &str, limit: u64) -> Result<Vec<u8>, LoadError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?;

    tracing::info!(%url, "downloading model");
    let mut response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(LoadError::FetchStatus(response.status().as_u16()));
    }

    // Declared length is checked up front; the running total covers chunked responses.
    let declared = response.content_length();
    if declared.is_some_and(|len| len > limit) {
        return Err(LoadError::TooLarge { limit });
    }

    let mut bytes = Vec::with_capacity(declared.unwrap_or(0) as usize);
    while let Some(chunk) = response.chunk().await? {
        if (bytes.len() + chunk.len()) as u64 > limit {
            return Err(LoadError::TooLarge { limit });
        }
        bytes.extend_from_slice(&chunk);
    }

    tracing::info!(size = bytes.len(), "model downloaded");
    Ok(bytes)
}

fn session_from_memory(bytes: &[u8], intra_threads: usize) -> Result<Session, LoadError> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_memory(bytes)?;
    Ok(session)
}

/// Creates an inference session from an ONNX file on disk.
pub fn session_from_file(
    model_path: impl AsRef<Path>,
    intra_threads: usize,
) -> Result<Session, LoadError> {
    let path = model_path.as_ref();
    if !path.exists() {
        return Err(LoadError::ModelNotFound(path.display().to_string()));
    }

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(path)?;

    tracing::info!(path = %path.display(), "loaded model");
    Ok(session)
}
