//! Build plan files exchanged with the lifecycle
//!
//! Detect writes a [`BuildPlan`] of alternatives; build reads back the
//! [`BuildpackPlan`] entries the lifecycle selected for this buildpack.

use crate::error::{AgentpackError, AgentpackResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provide {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Require {
    pub name: String,
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub metadata: toml::Table,
}

impl Require {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            metadata: toml::Table::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// One set of provides and requires
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanAlternative {
    #[serde(default)]
    pub provides: Vec<Provide>,
    #[serde(default)]
    pub requires: Vec<Require>,
}

impl PlanAlternative {
    /// Provide `name` and require it together with `requires`
    pub fn capability(name: &str, requires: impl IntoIterator<Item = Require>) -> Self {
        Self {
            provides: vec![Provide {
                name: name.to_string(),
            }],
            requires: std::iter::once(Require::new(name)).chain(requires).collect(),
        }
    }
}

/// Detect output: the first alternative at the top level, the rest under `or`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
    #[serde(default)]
    pub provides: Vec<Provide>,
    #[serde(default)]
    pub requires: Vec<Require>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<PlanAlternative>,
}

impl BuildPlan {
    pub fn from_alternatives(alternatives: Vec<PlanAlternative>) -> Self {
        let mut iter = alternatives.into_iter();
        let first = iter.next().unwrap_or_default();
        Self {
            provides: first.provides,
            requires: first.requires,
            or: iter.collect(),
        }
    }

    /// All alternatives, top level first
    pub fn alternatives(&self) -> Vec<PlanAlternative> {
        std::iter::once(PlanAlternative {
            provides: self.provides.clone(),
            requires: self.requires.clone(),
        })
        .chain(self.or.iter().cloned())
        .collect()
    }

    pub async fn write(&self, path: &Path) -> AgentpackResult<()> {
        let content = toml::to_string(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| AgentpackError::io(format!("writing {}", path.display()), e))
    }
}

/// An entry the lifecycle resolved for this buildpack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub name: String,
    #[serde(default)]
    pub metadata: toml::Table,
}

/// Build input: the entries selected from the detect plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildpackPlan {
    #[serde(default)]
    pub entries: Vec<PlanEntry>,
}

impl BuildpackPlan {
    /// Read a plan file; a missing file is an empty plan
    pub async fn load(path: &Path) -> AgentpackResult<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(AgentpackError::io(format!("reading {}", path.display()), e)),
        };
        toml::from_str(&content).map_err(|e| AgentpackError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Plan with metadata-free entries for `names`
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entries: names
                .into_iter()
                .map(|name| PlanEntry {
                    name: name.to_string(),
                    metadata: toml::Table::new(),
                })
                .collect(),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}
