//! buildpack.toml schema
//!
//! The descriptor ships next to the binary and declares the buildpack
//! identity, the stacks it supports, its user-facing configuration options
//! and the agent dependencies it may download.

use crate::dependency::Dependency;
use serde::{Deserialize, Serialize};

/// Root of `buildpack.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildpackToml {
    /// Buildpack API version
    pub api: String,

    /// Buildpack identity
    pub buildpack: BuildpackInfo,

    /// Supported stacks
    pub stacks: Vec<StackEntry>,

    /// Configuration options and dependencies
    pub metadata: BuildpackMetadata,
}

/// `[buildpack]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildpackInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub homepage: Option<String>,
}

impl Default for BuildpackInfo {
    fn default() -> Self {
        Self {
            id: "agentpack".to_string(),
            name: "APM Agent Buildpack".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            homepage: None,
        }
    }
}

/// `[[stacks]]` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackEntry {
    pub id: String,
}

/// `[metadata]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildpackMetadata {
    /// User-facing configuration options
    pub configurations: Vec<ConfigurationEntry>,

    /// Downloadable agent artifacts
    pub dependencies: Vec<Dependency>,
}

/// `[[metadata.configurations]]` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationEntry {
    /// Environment variable name
    pub name: String,

    /// Value used when the variable is not set
    pub default: Option<String>,

    /// Human-readable description
    pub description: String,

    /// Consulted at build time
    pub build: bool,

    /// Consulted at launch time
    pub launch: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"
api = "0.7"

[buildpack]
id = "agentpack"
name = "APM Agent Buildpack"
version = "1.0.0"

[[stacks]]
id = "*"

[[metadata.configurations]]
name = "BP_APPD_EXT_CONF_STRIP"
default = "0"
description = "Leading path components to strip from the external configuration archive"
build = true

[[metadata.dependencies]]
id = "agent-java"
name = "AppDynamics Java Agent"
version = "23.4.0"
uri = "https://example.com/agent.zip"
sha256 = "abc"
stacks = ["*"]
"#;

    #[test]
    fn descriptor_deserializes() {
        let toml: BuildpackToml = toml::from_str(DESCRIPTOR).unwrap();
        assert_eq!(toml.buildpack.id, "agentpack");
        assert_eq!(toml.stacks[0].id, "*");
        assert_eq!(toml.metadata.configurations.len(), 1);
        assert_eq!(
            toml.metadata.configurations[0].default.as_deref(),
            Some("0")
        );
        assert!(!toml.metadata.configurations[0].launch);
        assert_eq!(toml.metadata.dependencies[0].version, "23.4.0");
    }

    #[test]
    fn descriptor_deserializes_empty() {
        let toml: BuildpackToml = toml::from_str("").unwrap();
        assert!(toml.metadata.dependencies.is_empty());
        assert_eq!(toml.buildpack.id, "agentpack");
    }
}
