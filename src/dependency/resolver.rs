//! Dependency metadata resolution
//!
//! Picks the newest descriptor for an id that applies to the current stack
//! and satisfies a version constraint. Vendor versions often carry a fourth
//! build component (`23.4.0.34680`), which semver does not accept, so
//! versions are normalised before comparison.

use super::descriptor::Dependency;
use crate::error::{AgentpackError, AgentpackResult};
use semver::{Version, VersionReq};
use std::cmp::Ordering;
use tracing::debug;

/// Resolves dependency ids against the descriptors in `buildpack.toml`
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    dependencies: Vec<Dependency>,
    stack: Option<String>,
}

/// Sortable form of a vendor version string
#[derive(Debug, Clone, PartialEq, Eq)]
struct VersionKey {
    semver: Option<Version>,
    build: Vec<u64>,
    raw: String,
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.semver
            .cmp(&other.semver)
            .then_with(|| self.build.cmp(&other.build))
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl VersionKey {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim().trim_start_matches('v');
        let mut parts: Vec<u64> = Vec::new();
        let mut clean = true;
        for part in raw.split('.') {
            match part.parse::<u64>() {
                Ok(n) => parts.push(n),
                Err(_) => {
                    clean = false;
                    break;
                }
            }
        }

        let semver = if clean && !parts.is_empty() {
            parts.resize(parts.len().max(3), 0);
            Some(Version::new(parts[0], parts[1], parts[2]))
        } else {
            Version::parse(raw).ok()
        };
        let build = if clean && parts.len() > 3 {
            parts[3..].to_vec()
        } else {
            Vec::new()
        };

        Self {
            semver,
            build,
            raw: raw.to_string(),
        }
    }
}

impl DependencyResolver {
    /// Create a resolver over the declared dependencies for a stack
    ///
    /// With no stack id every descriptor is a candidate.
    pub fn new(dependencies: Vec<Dependency>, stack: Option<String>) -> Self {
        Self {
            dependencies,
            stack,
        }
    }

    /// Resolve the newest matching descriptor for `id`
    ///
    /// An empty constraint or `*` accepts any version.
    pub fn resolve(&self, id: &str, constraint: &str) -> AgentpackResult<Dependency> {
        let requirement = match constraint.trim() {
            "" | "*" => None,
            c => Some(VersionReq::parse(c).map_err(|e| {
                AgentpackError::Configuration(format!(
                    "invalid version constraint '{}' for {}: {}",
                    c, id, e
                ))
            })?),
        };

        let best = self
            .dependencies
            .iter()
            .filter(|d| d.id == id)
            .filter(|d| self.stack.as_deref().map_or(true, |s| d.supports_stack(s)))
            .map(|d| (VersionKey::parse(&d.version), d))
            .filter(|(key, _)| match (&requirement, &key.semver) {
                (None, _) => true,
                (Some(req), Some(version)) => req.matches(version),
                (Some(_), None) => false,
            })
            .max_by(|(a, _), (b, _)| a.cmp(b));

        match best {
            Some((_, dependency)) => {
                debug!(id, version = %dependency.version, "Resolved dependency");
                Ok(dependency.clone())
            }
            None => Err(AgentpackError::DependencyNotFound {
                id: id.to_string(),
                constraint: constraint.to_string(),
                stack: self.stack.clone().unwrap_or_else(|| "*".to_string()),
            }),
        }
    }
}
