//! Error types for agentpack
//!
//! All modules use `AgentpackResult<T>` as their return type. Every variant is
//! fatal to the contribution in progress; nothing here is retried internally.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for agentpack operations
pub type AgentpackResult<T> = Result<T, AgentpackError>;

/// All errors that can occur while detecting or contributing an agent
#[derive(Error, Debug)]
pub enum AgentpackError {
    // Artifact acquisition
    #[error("unable to fetch {uri}: {reason}")]
    Fetch { uri: String, reason: String },

    #[error("checksum mismatch for {id}: expected sha256 {expected}, found {actual}")]
    Integrity {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("no dependency {id} matching '{constraint}' for stack {stack}")]
    DependencyNotFound {
        id: String,
        constraint: String,
        stack: String,
    },

    // Archive unpacking
    #[error("unable to extract {format} archive")]
    Extraction {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("archive entry {entry} resolves outside {target}")]
    PathTraversal { entry: PathBuf, target: PathBuf },

    // Version directory resolution
    #[error("expected a single version directory in {root}, found {candidates}")]
    AmbiguousVersion { root: PathBuf, candidates: String },

    #[error("no version directory found in {0}")]
    VersionNotFound(PathBuf),

    // Configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // Process errors
    #[error("{command} exited with code {code}")]
    Subprocess {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A failing pipeline step, wrapping the error that caused it
    #[error("{step}")]
    Step {
        step: String,
        #[source]
        source: Box<AgentpackError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentpackError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an extraction error around a decoder failure
    pub fn extraction(
        format: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Extraction {
            format,
            source: source.into(),
        }
    }

    /// Wrap this error with a description of the step that failed
    pub fn step(self, step: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping step descriptions
    pub fn root(&self) -> &AgentpackError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// Render the full causal chain, one cause per line
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut current: Option<&dyn std::error::Error> = std::error::Error::source(self);
        while let Some(cause) = current {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            current = cause.source();
        }
        out
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::Integrity { .. } => {
                Some("The artifact may be corrupt or the configured sha256 is wrong")
            }
            Self::Configuration(_) => Some("Check the BP_* options and build environment"),
            Self::VersionNotFound(_) | Self::AmbiguousVersion { .. } => {
                Some("The agent archive layout is not the expected ver<version>/ form")
            }
            _ => None,
        }
    }
}

/// Attach step descriptions to fallible results
pub trait StepExt<T> {
    /// Wrap the error, if any, with a fixed step description
    fn step(self, step: &str) -> AgentpackResult<T>;

    /// Wrap the error, if any, with a lazily built step description
    fn with_step<F: FnOnce() -> String>(self, f: F) -> AgentpackResult<T>;
}

impl<T> StepExt<T> for AgentpackResult<T> {
    fn step(self, step: &str) -> AgentpackResult<T> {
        self.map_err(|e| e.step(step))
    }

    fn with_step<F: FnOnce() -> String>(self, f: F) -> AgentpackResult<T> {
        self.map_err(|e| e.step(f()))
    }
}
