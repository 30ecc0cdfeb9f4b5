//! Worker class configuration store.
//!
//! Loading fails hard: a cycle that cannot see its worker classes has
//! nothing to reconcile and aborts (unlike every other failure in the
//! loop, which is isolated and aggregated).

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use stratus_capacity::WorkerClass;

/// Source of worker class configuration.
#[async_trait]
pub trait WorkerClassStore: Send + Sync {
    async fn load_worker_classes(&self) -> Result<Vec<WorkerClass>>;
}

/// Fixed in-memory classes, for tests and the dev harness.
#[derive(Debug, Clone, Default)]
pub struct StaticStore {
    classes: Vec<WorkerClass>,
}

impl StaticStore {
    pub fn new(classes: Vec<WorkerClass>) -> Self {
        Self { classes }
    }
}

#[async_trait]
impl WorkerClassStore for StaticStore {
    async fn load_worker_classes(&self) -> Result<Vec<WorkerClass>> {
        Ok(self.classes.clone())
    }
}

/// Worker classes loaded from a JSON file on every cycle, so edits are
/// picked up without a restart.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl WorkerClassStore for JsonFileStore {
    async fn load_worker_classes(&self) -> Result<Vec<WorkerClass>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading worker classes from {}", self.path.display()))?;
        let classes: Vec<WorkerClass> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing worker classes from {}", self.path.display()))?;
        Ok(classes)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_json_file_store_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "id": "builds",
                "min_capacity": 1,
                "max_capacity": 20,
                "scaling_ratio": 1.0,
                "capacity_per_instance": {{"m5.large": 4}}
            }}]"#
        )
        .unwrap();

        let store = JsonFileStore::new(file.path());
        let classes = store.load_worker_classes().await.unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].id.as_str(), "builds");
    }

    #[tokio::test]
    async fn test_json_file_store_missing_file_fails() {
        let store = JsonFileStore::new("/nonexistent/worker-classes.json");
        assert!(store.load_worker_classes().await.is_err());
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let store = JsonFileStore::new(file.path());
        assert!(store.load_worker_classes().await.is_err());
    }
}
