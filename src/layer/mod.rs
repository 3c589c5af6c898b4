//! Contributed layers
//!
//! A layer is a named directory under the CNB layers root plus the record
//! that says how it was built. [`LayerContributor`] decides whether a layer
//! must be rebuilt by comparing a hash of its metadata with the record held
//! in the [`LayerStore`].

pub mod contributor;
pub mod environment;
pub mod store;
pub mod version;

pub use contributor::LayerContributor;
pub use environment::{EnvMutation, Environment, Operation};
pub use store::{LayerRecord, LayerStore};
pub use version::{version_directory, VERSION_PREFIX};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// When a layer is made available
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerTypes {
    #[serde(default)]
    pub build: bool,
    #[serde(default)]
    pub launch: bool,
    #[serde(default)]
    pub cache: bool,
}

impl LayerTypes {
    /// Needed at launch only
    pub const LAUNCH: Self = Self {
        build: false,
        launch: true,
        cache: false,
    };
}

/// A layer directory and everything recorded about it
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub path: PathBuf,
    pub types: LayerTypes,
    pub launch_env: Environment,
    pub metadata: serde_json::Value,
}

impl Layer {
    pub fn new(layers_dir: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: layers_dir.join(&name),
            name,
            types: LayerTypes::default(),
            launch_env: Environment::new(),
            metadata: serde_json::Value::Null,
        }
    }

    /// `env.launch/` directory inside the layer
    pub fn env_launch_dir(&self) -> PathBuf {
        self.path.join("env.launch")
    }

    /// Syft SBOM written next to the layer directory
    pub fn sbom_path(&self) -> PathBuf {
        self.path
            .with_file_name(format!("{}.sbom.syft.json", self.name))
    }
}
