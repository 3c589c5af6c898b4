//! Detection
//!
//! Passes when exactly one service binding of the monitoring type is
//! present. The plan offers one alternative per runtime; the lifecycle keeps
//! whichever the other buildpacks can satisfy.

use crate::agent::{java, nodejs, php};
use crate::config::BuildEnvironment;
use crate::error::{AgentpackError, AgentpackResult};
use crate::plan::{BuildPlan, PlanAlternative, Require};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Service binding type that enables the agents
pub const BINDING_TYPE: &str = "AppDynamics";

/// A service binding directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub path: PathBuf,
    pub kind: String,
}

/// Outcome of detection
#[derive(Debug, Clone, PartialEq)]
pub enum DetectResult {
    Pass(BuildPlan),
    Fail,
}

/// Bindings root: `$SERVICE_BINDING_ROOT`, else `<platform>/bindings`
pub fn bindings_root(env: &BuildEnvironment, platform_dir: &Path) -> PathBuf {
    match env.get("SERVICE_BINDING_ROOT") {
        Some(root) if !root.is_empty() => PathBuf::from(root),
        _ => platform_dir.join("bindings"),
    }
}

/// Read every binding under `root`; directories without a `type` file are skipped
pub fn read_bindings(root: &Path) -> AgentpackResult<Vec<Binding>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(root)
        .map_err(|e| AgentpackError::io(format!("reading {}", root.display()), e))?;

    let mut bindings = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AgentpackError::io(format!("reading {}", root.display()), e))?;
        let path = entry.path();
        let type_file = path.join("type");
        if !type_file.is_file() {
            continue;
        }
        let kind = std::fs::read_to_string(&type_file)
            .map_err(|e| AgentpackError::io(format!("reading {}", type_file.display()), e))?;
        bindings.push(Binding {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            kind: kind.trim().to_string(),
        });
    }
    bindings.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(bindings)
}

/// Detect against the bindings under `root`
pub fn detect(root: &Path) -> AgentpackResult<DetectResult> {
    let bindings = read_bindings(root)?;
    let matching: Vec<&Binding> = bindings
        .iter()
        .filter(|b| b.kind.eq_ignore_ascii_case(BINDING_TYPE))
        .collect();

    match matching.as_slice() {
        [] => {
            debug!(root = %root.display(), "No binding of type '{}' found", BINDING_TYPE);
            Ok(DetectResult::Fail)
        }
        [binding] => {
            debug!(binding = %binding.name, "Found binding");
            Ok(DetectResult::Pass(plan()))
        }
        many => Err(AgentpackError::Configuration(format!(
            "multiple bindings of type '{}' found: {}",
            BINDING_TYPE,
            many.iter()
                .map(|b| b.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// The plan offered on a pass
pub fn plan() -> BuildPlan {
    BuildPlan::from_alternatives(vec![
        PlanAlternative::capability(java::NAME, [Require::new("jvm-application")]),
        PlanAlternative::capability(
            nodejs::NAME,
            [
                Require::new("node").with_metadata("build", true),
                Require::new("node_modules"),
            ],
        ),
        PlanAlternative::capability(php::NAME, [Require::new("php")]),
    ])
}
