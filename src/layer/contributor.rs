//! Memoized layer contribution
//!
//! The contribution body runs only when the sha256 of the layer metadata
//! differs from the recorded one. A record is written only after the body
//! succeeds, so a failed build is never mistaken for a valid layer.

use super::store::{LayerRecord, LayerStore};
use super::{Layer, LayerTypes};
use crate::error::{AgentpackError, AgentpackResult};
use crate::ui::Logger;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::Path;
use tracing::debug;

/// Contributes one named layer from its metadata
#[derive(Debug, Clone)]
pub struct LayerContributor {
    name: String,
    metadata: serde_json::Value,
    types: LayerTypes,
}

impl LayerContributor {
    pub fn new<M: Serialize>(
        name: impl Into<String>,
        metadata: &M,
        types: LayerTypes,
    ) -> AgentpackResult<Self> {
        Ok(Self {
            name: name.into(),
            metadata: serde_json::to_value(metadata)?,
            types,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex sha256 over the canonical JSON form of the metadata
    pub fn hash(&self) -> AgentpackResult<String> {
        let bytes = serde_json::to_vec(&self.metadata)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Return the recorded layer if its metadata is unchanged, otherwise
    /// rebuild it with `build`
    ///
    /// A rebuild starts from an empty directory. The returned layer's launch
    /// environment is written to `env.launch/` and recorded in `store`.
    pub async fn contribute<F, Fut>(
        &self,
        layers_dir: &Path,
        store: &mut LayerStore,
        logger: &Logger,
        build: F,
    ) -> AgentpackResult<Layer>
    where
        F: FnOnce(Layer) -> Fut,
        Fut: Future<Output = AgentpackResult<Layer>>,
    {
        let hash = self.hash()?;
        let mut layer = Layer::new(layers_dir, &self.name);
        layer.types = self.types;
        layer.metadata = self.metadata.clone();

        if let Some(record) = store.get(&self.name) {
            if record.metadata_hash == hash {
                logger.body(&format!("Reusing cached layer {}", layer.path.display()));
                layer.types = record.types;
                layer.launch_env = record.launch_env.clone();
                return Ok(layer);
            }
            debug!(
                layer = %self.name,
                recorded = %record.metadata_hash,
                requested = %hash,
                "Layer metadata changed"
            );
        }

        store.remove(&self.name).await?;
        reset_dir(&layer.path).await?;
        logger.body(&format!("Contributing to layer {}", layer.path.display()));

        let layer = build(layer).await?;
        layer.launch_env.write_to(&layer.env_launch_dir()).await?;

        store
            .insert(
                &self.name,
                LayerRecord {
                    types: layer.types,
                    metadata_hash: hash,
                    metadata: layer.metadata.clone(),
                    launch_env: layer.launch_env.clone(),
                },
            )
            .await?;

        Ok(layer)
    }
}

async fn reset_dir(path: &Path) -> AgentpackResult<()> {
    if path.exists() {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| AgentpackError::io(format!("removing {}", path.display()), e))?;
    }
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| AgentpackError::io(format!("creating {}", path.display()), e))
}
