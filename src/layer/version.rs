//! Version directory lookup
//!
//! Agent archives unpack into `ver<version>/`. Later steps need that path
//! without knowing the version string.

use crate::error::{AgentpackError, AgentpackResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix shared by versioned directories in agent archives
pub const VERSION_PREFIX: &str = "ver";

/// Locate the single `ver<version>` directory directly under `root`
pub fn version_directory(root: &Path) -> AgentpackResult<PathBuf> {
    let entries = std::fs::read_dir(root)
        .map_err(|e| AgentpackError::io(format!("reading {}", root.display()), e))?;

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AgentpackError::io(format!("reading {}", root.display()), e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_version_name(name) {
            continue;
        }
        let is_dir = entry
            .file_type()
            .map_err(|e| AgentpackError::io(format!("inspecting {}", entry.path().display()), e))?
            .is_dir();
        if is_dir {
            matches.push(entry.path());
        }
    }
    matches.sort();

    match matches.len() {
        0 => Err(AgentpackError::VersionNotFound(root.to_path_buf())),
        1 => {
            let found = matches.remove(0);
            debug!(path = %found.display(), "Resolved version directory");
            Ok(found)
        }
        _ => Err(AgentpackError::AmbiguousVersion {
            root: root.to_path_buf(),
            candidates: matches
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn is_version_name(name: &str) -> bool {
    name.strip_prefix(VERSION_PREFIX)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}
