//! Build environment and configuration option resolution

use super::schema::ConfigurationEntry;
use std::collections::BTreeMap;
use tracing::debug;

/// Snapshot of the process environment taken once per invocation
///
/// Contributions read variables from here instead of `std::env`, so tests
/// can hand in exactly the environment they need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnvironment {
    vars: BTreeMap<String, String>,
}

impl BuildEnvironment {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build an environment from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Set a variable, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// The stack id reported by the platform, if any
    pub fn stack_id(&self) -> Option<&str> {
        self.get("CNB_STACK_ID")
    }
}

/// Resolves buildpack configuration options against the build environment
#[derive(Debug, Clone)]
pub struct ConfigurationResolver {
    configurations: Vec<ConfigurationEntry>,
    env: BuildEnvironment,
}

impl ConfigurationResolver {
    /// Create a resolver over declared options and an environment snapshot
    pub fn new(configurations: Vec<ConfigurationEntry>, env: BuildEnvironment) -> Self {
        let resolver = Self {
            configurations,
            env,
        };
        resolver.log_configuration();
        resolver
    }

    /// Value explicitly set in the environment, ignoring defaults
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.env.get(name)
    }

    /// Value set in the environment, else the declared default
    pub fn resolve(&self, name: &str) -> Option<String> {
        if let Some(value) = self.env.get(name) {
            return Some(value.to_string());
        }
        self.configurations
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.default.clone())
    }

    /// Declared options
    pub fn configurations(&self) -> &[ConfigurationEntry] {
        &self.configurations
    }

    fn log_configuration(&self) {
        for entry in self.configurations.iter().filter(|c| c.build) {
            let value = self.resolve(&entry.name).unwrap_or_default();
            let source = if self.env.get(&entry.name).is_some() {
                "environment"
            } else {
                "default"
            };
            debug!(
                name = %entry.name,
                value = %value,
                source,
                "{}",
                entry.description
            );
        }
    }
}
