//! Bill of materials
//!
//! Two outputs: a Syft JSON document per layer, written inside the memoized
//! layer body, and the build-level `bom.json` collecting every entry the
//! build reported.

use crate::dependency::Dependency;
use crate::error::{AgentpackError, AgentpackResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

const SYFT_SCHEMA_VERSION: &str = "1.1.0";
const SYFT_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/anchore/syft/main/schema/json/schema-1.1.0.json";

/// One contributed component, tagged with its owning layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomEntry {
    pub name: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub launch: bool,
    pub build: bool,
}

impl BomEntry {
    /// Entry for `dependency` contributed to `layer`
    pub fn new(dependency: &Dependency, layer: &str, launch: bool, build: bool) -> Self {
        let mut metadata = match serde_json::to_value(dependency) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        metadata.insert("layer".into(), serde_json::Value::String(layer.to_string()));

        Self {
            name: dependency.id.clone(),
            metadata,
            launch,
            build,
        }
    }

    /// Layer this entry was contributed to
    pub fn layer(&self) -> Option<&str> {
        self.metadata.get("layer").and_then(|v| v.as_str())
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata.get("version").and_then(|v| v.as_str())
    }
}

/// Entries collected over a whole build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillOfMaterials {
    entries: Vec<BomEntry>,
}

#[derive(Serialize)]
struct BomDocument<'a> {
    generated: DateTime<Utc>,
    entries: &'a [BomEntry],
}

impl BillOfMaterials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entries: impl IntoIterator<Item = BomEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[BomEntry] {
        &self.entries
    }

    /// Write the entries as JSON, stamped with the current time
    pub async fn write(&self, path: &Path) -> AgentpackResult<()> {
        let document = BomDocument {
            generated: Utc::now(),
            entries: &self.entries,
        };
        let content = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| AgentpackError::io(format!("writing {}", path.display()), e))?;
        debug!(path = %path.display(), count = self.entries.len(), "Wrote bill of materials");
        Ok(())
    }
}

/// Location of an artifact on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyftLocation {
    pub path: String,
}

/// A package entry in a Syft document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyftArtifact {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "foundBy")]
    pub found_by: String,
    pub locations: Vec<SyftLocation>,
    pub licenses: Vec<String>,
    pub language: String,
    pub cpes: Vec<String>,
    pub purl: String,
}

impl SyftArtifact {
    /// Artifact for `dependency`, located at `location`
    pub fn new(dependency: &Dependency, location: &Path) -> Self {
        let digest = Sha256::digest(
            format!(
                "{}:{}:{}",
                dependency.id, dependency.version, dependency.sha256
            )
            .as_bytes(),
        );
        let mut id = hex::encode(digest);
        id.truncate(16);

        Self {
            id,
            name: dependency.display_name(),
            version: dependency.version.clone(),
            kind: "UnknownPackage".into(),
            found_by: "agentpack".into(),
            locations: vec![SyftLocation {
                path: location.display().to_string(),
            }],
            licenses: dependency
                .licenses
                .iter()
                .map(|l| l.kind.clone())
                .filter(|k| !k.is_empty())
                .collect(),
            language: String::new(),
            cpes: dependency.cpes.clone(),
            purl: dependency.purl.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyftSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyftDescriptor {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyftSchema {
    pub version: String,
    pub url: String,
}

/// Syft JSON document describing one layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyftDocument {
    pub artifacts: Vec<SyftArtifact>,
    pub source: SyftSource,
    pub descriptor: SyftDescriptor,
    pub schema: SyftSchema,
}

impl SyftDocument {
    /// Document for the dependencies contributed to `layer_path`
    pub fn new<'a>(layer_path: &Path, dependencies: impl IntoIterator<Item = &'a Dependency>) -> Self {
        Self {
            artifacts: dependencies
                .into_iter()
                .map(|d| SyftArtifact::new(d, layer_path))
                .collect(),
            source: SyftSource {
                kind: "directory".into(),
                target: layer_path.display().to_string(),
            },
            descriptor: SyftDescriptor {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            schema: SyftSchema {
                version: SYFT_SCHEMA_VERSION.into(),
                url: SYFT_SCHEMA_URL.into(),
            },
        }
    }

    pub async fn write_to(&self, path: &Path) -> AgentpackResult<PathBuf> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| AgentpackError::io(format!("writing {}", path.display()), e))?;
        debug!(path = %path.display(), artifacts = self.artifacts.len(), "Wrote Syft SBOM");
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::License;
    use tempfile::TempDir;

    fn dependency() -> Dependency {
        Dependency {
            id: "agent-java".into(),
            name: "AppDynamics Java Agent".into(),
            version: "21.11.2".into(),
            uri: "https://example.com/agent.zip".into(),
            sha256: "ab".repeat(32),
            stacks: vec!["*".into()],
            cpes: vec!["cpe:2.3:a:appdynamics:java-agent:21.11.2:*:*:*:*:*:*:*".into()],
            purl: "pkg:generic/appdynamics-java-agent@21.11.2".into(),
            licenses: vec![License {
                kind: "Proprietary".into(),
                uri: String::new(),
            }],
        }
    }

    #[test]
    fn bom_entry_is_tagged_with_layer() {
        let entry = BomEntry::new(&dependency(), "agent-java", true, false);

        assert_eq!(entry.name, "agent-java");
        assert_eq!(entry.layer(), Some("agent-java"));
        assert_eq!(entry.version(), Some("21.11.2"));
        assert!(entry.launch);
        assert!(!entry.build);
    }

    #[test]
    fn syft_artifact_fields() {
        let artifact = SyftArtifact::new(&dependency(), Path::new("/layers/agent-java"));

        assert_eq!(artifact.id.len(), 16);
        assert_eq!(artifact.kind, "UnknownPackage");
        assert_eq!(artifact.licenses, vec!["Proprietary"]);
        assert_eq!(artifact.locations[0].path, "/layers/agent-java");
    }

    #[tokio::test]
    async fn writes_syft_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agent-java.sbom.syft.json");
        let dep = dependency();

        SyftDocument::new(&temp.path().join("agent-java"), [&dep])
            .write_to(&path)
            .await
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["artifacts"][0]["purl"], dep.purl);
        assert_eq!(json["artifacts"][0]["type"], "UnknownPackage");
        assert_eq!(json["source"]["type"], "directory");
    }

    #[tokio::test]
    async fn writes_build_bom() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bom.json");
        let mut bom = BillOfMaterials::new();
        bom.record([BomEntry::new(&dependency(), "agent-java", true, false)]);

        bom.write(&path).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json["generated"].is_string());
        assert_eq!(json["entries"][0]["metadata"]["layer"], "agent-java");
    }
}
