//! Buildpack descriptor and configuration

pub mod resolver;
pub mod schema;

pub use resolver::{BuildEnvironment, ConfigurationResolver};
pub use schema::{BuildpackToml, ConfigurationEntry};

use crate::error::{AgentpackError, AgentpackResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Descriptor file name inside the buildpack directory
pub const DESCRIPTOR_FILE: &str = "buildpack.toml";

/// The buildpack this binary belongs to: its directory and parsed descriptor
#[derive(Debug, Clone)]
pub struct Buildpack {
    /// Buildpack root (holds `buildpack.toml`, `resources/`, `dependencies/`)
    pub path: PathBuf,

    /// Parsed descriptor
    pub info: BuildpackToml,
}

impl Buildpack {
    /// Load `buildpack.toml` from a buildpack directory
    ///
    /// A missing descriptor yields the defaults, so a bare binary still
    /// detects; building then fails at dependency resolution.
    pub async fn load(dir: &Path) -> AgentpackResult<Self> {
        let path = dir.join(DESCRIPTOR_FILE);
        if !path.exists() {
            debug!("No {} in {}, using defaults", DESCRIPTOR_FILE, dir.display());
            return Ok(Self {
                path: dir.to_path_buf(),
                info: BuildpackToml::default(),
            });
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| AgentpackError::io(format!("reading {}", path.display()), e))?;

        let info = toml::from_str(&content).map_err(|e| AgentpackError::ConfigInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            path: dir.to_path_buf(),
            info,
        })
    }

    /// Directory of bundled resources such as configuration templates
    pub fn resources_dir(&self) -> PathBuf {
        self.path.join("resources")
    }

    /// Directory of pre-downloaded dependencies, laid out by sha256
    pub fn dependencies_dir(&self) -> PathBuf {
        self.path.join("dependencies")
    }
}
