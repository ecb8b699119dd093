use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1_000_000;
pub const DEFAULT_THRESHOLD: f32 = 0.5;
pub const DEFAULT_COLLECTION: &str = "predictions";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub upload: UploadConfig,
    pub verdict: VerdictConfig,
    pub storage: StorageConfig,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Where the classifier comes from. `source` is either an `http(s)://` URL
/// or a path on the local filesystem.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ModelConfig {
    pub source: String,
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            source: "models/skin-cancer.onnx".to_string(),
            intra_threads: 4,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct VerdictConfig {
    pub threshold: f32,
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub blob: BlobBackend,
    pub records: RecordBackend,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BlobBackend {
    Local {
        root: PathBuf,
    },
    Gcs {
        bucket: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        /// Name of the environment variable holding a bearer token. The token
        /// is read once at start-up and never refreshed; OAuth access tokens
        /// from `gcloud auth print-access-token` expire after about an hour,
        /// so long-running deployments need a restart to pick up a new one.
        token_env: Option<String>,
    },
    Memory,
}

impl Default for BlobBackend {
    fn default() -> Self {
        BlobBackend::Local {
            root: PathBuf::from("uploads"),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum RecordBackend {
    Sled {
        path: PathBuf,
        #[serde(default = "default_collection")]
        collection: String,
    },
    Firestore {
        project: String,
        #[serde(default = "default_collection")]
        collection: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        /// Bearer token variable, read once at start-up. See [`BlobBackend::Gcs`].
        token_env: Option<String>,
    },
    Memory {
        #[serde(default = "default_collection")]
        collection: String,
    },
}

impl RecordBackend {
    pub fn collection(&self) -> &str {
        match self {
            RecordBackend::Sled { collection, .. }
            | RecordBackend::Firestore { collection, .. }
            | RecordBackend::Memory { collection } => collection,
        }
    }
}

impl Default for RecordBackend {
    fn default() -> Self {
        RecordBackend::Sled {
            path: PathBuf::from("data/predictions.sled"),
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl AppConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the YAML file at `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "config file not found, using defaults");
                let config = AppConfig::default();
                config.validate()?;
                Ok(config)
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.verdict.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "verdict.threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.upload.max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "upload.max_bytes must be greater than zero".to_string(),
            ));
        }
        if self.model.source.trim().is_empty() {
            return Err(ConfigError::Invalid("model.source is empty".to_string()));
        }
        if self.storage.records.collection().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.records.collection is empty".to_string(),
            ));
        }
        Ok(())
    }
}
