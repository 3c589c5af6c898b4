//! Persisted layer records
//!
//! Records live in `<layers>/<name>.toml`. The store keeps them in memory
//! and writes through on every change; an in-memory store never touches
//! the filesystem.

use super::{Environment, LayerTypes};
use crate::error::{AgentpackError, AgentpackResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What was recorded after a layer was successfully built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    #[serde(default)]
    pub types: LayerTypes,

    /// Hex sha256 of the canonical JSON metadata
    pub metadata_hash: String,

    #[serde(default)]
    pub metadata: serde_json::Value,

    #[serde(default, skip_serializing_if = "Environment::is_empty")]
    pub launch_env: Environment,
}

/// Layer records keyed by layer name
#[derive(Debug, Default)]
pub struct LayerStore {
    dir: Option<PathBuf>,
    records: BTreeMap<String, LayerRecord>,
}

impl LayerStore {
    /// A store with no backing directory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load every readable record from `dir`
    ///
    /// Files that are not layer records (SBOMs, the build BOM, records
    /// written by other buildpacks in another format) are skipped.
    pub async fn load(dir: &Path) -> AgentpackResult<Self> {
        let mut store = Self {
            dir: Some(dir.to_path_buf()),
            records: BTreeMap::new(),
        };

        if !dir.exists() {
            return Ok(store);
        }

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| AgentpackError::io(format!("reading {}", dir.display()), e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentpackError::io(format!("reading {}", dir.display()), e))?
        {
            let path = entry.path();
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".toml"))
            else {
                continue;
            };
            if name.contains('.') {
                continue;
            }

            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| AgentpackError::io(format!("reading {}", path.display()), e))?;
            match toml::from_str::<LayerRecord>(&content) {
                Ok(record) => {
                    store.records.insert(name.to_string(), record);
                }
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping layer record"),
            }
        }

        debug!(count = store.records.len(), "Loaded layer records");
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<&LayerRecord> {
        self.records.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record a layer, replacing any previous record
    pub async fn insert(&mut self, name: &str, record: LayerRecord) -> AgentpackResult<()> {
        if let Some(path) = self.record_path(name) {
            write_record(&path, &record).await?;
        }
        self.records.insert(name.to_string(), record);
        Ok(())
    }

    /// Forget a layer, deleting its persisted record
    pub async fn remove(&mut self, name: &str) -> AgentpackResult<Option<LayerRecord>> {
        if let Some(path) = self.record_path(name) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AgentpackError::io(format!("removing {}", path.display()), e))
                }
            }
        }
        Ok(self.records.remove(name))
    }

    /// Write every record to the backing directory
    pub async fn save(&self) -> AgentpackResult<()> {
        for name in self.records.keys() {
            if let (Some(path), Some(record)) = (self.record_path(name), self.records.get(name)) {
                write_record(&path, record).await?;
            }
        }
        Ok(())
    }

    fn record_path(&self, name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.toml", name)))
    }
}

async fn write_record(path: &Path, record: &LayerRecord) -> AgentpackResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AgentpackError::io(format!("creating {}", parent.display()), e))?;
    }
    let content = toml::to_string(record)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| AgentpackError::io(format!("writing {}", path.display()), e))
}
