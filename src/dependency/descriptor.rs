//! Dependency descriptors
//!
//! A descriptor names one downloadable artifact by source URI and sha256.
//! Descriptors are produced once per build invocation and never mutated.

use serde::{Deserialize, Serialize};

/// License declared for a dependency
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct License {
    /// SPDX identifier or free-form license name
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Link to the license text
    #[serde(default)]
    pub uri: String,
}

/// Immutable description of a fetchable, checksummed artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// Stable identifier, e.g. `agent-java`
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Version string as published by the vendor
    #[serde(default)]
    pub version: String,

    /// Source location (`https://` or `file://`)
    pub uri: String,

    /// Hex-encoded sha256 of the artifact bytes
    pub sha256: String,

    /// Stacks this artifact applies to (`*` matches all)
    #[serde(default)]
    pub stacks: Vec<String>,

    /// CPE identifiers for the bill of materials
    #[serde(default)]
    pub cpes: Vec<String>,

    /// Package URL for the bill of materials
    #[serde(default)]
    pub purl: String,

    /// Declared licenses
    #[serde(default)]
    pub licenses: Vec<License>,
}

impl Dependency {
    /// Identity of a descriptor: two descriptors with the same id and
    /// checksum name the same artifact
    pub fn identity(&self) -> (&str, &str) {
        (&self.id, &self.sha256)
    }

    /// File name of the artifact, taken from the last URI path segment
    pub fn file_name(&self) -> &str {
        let path = self.uri.split(['?', '#']).next().unwrap_or_default();
        match path.rsplit('/').next() {
            Some(name) if !name.is_empty() && name != "." && name != ".." => name,
            _ => "artifact",
        }
    }

    /// Whether the artifact applies to the given stack
    pub fn supports_stack(&self, stack: &str) -> bool {
        self.stacks.is_empty() || self.stacks.iter().any(|s| s == "*" || s == stack)
    }

    /// Display form used in status output
    pub fn display_name(&self) -> String {
        let name = if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        };
        if self.version.is_empty() {
            name.clone()
        } else {
            format!("{} {}", name, self.version)
        }
    }
}
