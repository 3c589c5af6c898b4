//! Launch environment composition
//!
//! An [`Environment`] is an ordered list of mutations. Nothing here touches
//! the process environment; mutations are recorded with the layer and
//! materialised as `env.launch/` files for the launcher to apply.

use crate::error::{AgentpackError, AgentpackResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How a mutation combines with the existing value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Append,
    Prepend,
    Override,
    Default,
}

impl Operation {
    /// File suffix in the CNB env directory layout
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Prepend => "prepend",
            Self::Override => "override",
            Self::Default => "default",
        }
    }
}

/// A single change to one environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvMutation {
    pub name: String,
    pub operation: Operation,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

/// Ordered launch-time environment mutations for a layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    mutations: Vec<EnvMutation>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to `name`, joined by `delimiter` when both are non-empty
    pub fn append(
        &mut self,
        name: impl Into<String>,
        delimiter: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.push(name, Operation::Append, value, Some(delimiter.into()))
    }

    /// Prepend `value` to `name`, joined by `delimiter` when both are non-empty
    pub fn prepend(
        &mut self,
        name: impl Into<String>,
        delimiter: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.push(name, Operation::Prepend, value, Some(delimiter.into()))
    }

    /// Replace any existing value
    pub fn override_value(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(name, Operation::Override, value, None)
    }

    /// Set the value only when the variable is unset
    pub fn default_value(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(name, Operation::Default, value, None)
    }

    fn push(
        &mut self,
        name: impl Into<String>,
        operation: Operation,
        value: impl Into<String>,
        delimiter: Option<String>,
    ) -> &mut Self {
        self.mutations.push(EnvMutation {
            name: name.into(),
            operation,
            value: value.into(),
            delimiter,
        });
        self
    }

    /// Recorded mutations, in call order
    pub fn mutations(&self) -> &[EnvMutation] {
        &self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Compose the mutations, in order, over `current`
    pub fn apply(&self, current: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = current.clone();
        for mutation in &self.mutations {
            let existing = env.get(&mutation.name).filter(|v| !v.is_empty()).cloned();
            let delimiter = mutation.delimiter.as_deref().unwrap_or("");
            let value = match (mutation.operation, existing) {
                (Operation::Append, Some(existing)) => {
                    format!("{}{}{}", existing, delimiter, mutation.value)
                }
                (Operation::Prepend, Some(existing)) => {
                    format!("{}{}{}", mutation.value, delimiter, existing)
                }
                (Operation::Default, Some(existing)) => existing,
                _ => mutation.value.clone(),
            };
            env.insert(mutation.name.clone(), value);
        }
        env
    }

    /// Write the mutations as `NAME.<operation>` (and `NAME.delim`) files
    pub async fn write_to(&self, dir: &Path) -> AgentpackResult<()> {
        if self.mutations.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AgentpackError::io(format!("creating {}", dir.display()), e))?;

        for mutation in &self.mutations {
            let path = dir.join(format!("{}.{}", mutation.name, mutation.operation.suffix()));
            write(&path, &mutation.value).await?;

            if let Some(delimiter) = &mutation.delimiter {
                let path = dir.join(format!("{}.delim", mutation.name));
                write(&path, delimiter).await?;
            }
        }
        Ok(())
    }
}

async fn write(path: &Path, content: &str) -> AgentpackResult<()> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| AgentpackError::io(format!("writing {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn current(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn append_uses_delimiter() {
        let mut env = Environment::new();
        env.append("JAVA_TOOL_OPTIONS", " ", "-javaagent:/layers/agent-java/javaagent.jar");

        let applied = env.apply(&current(&[("JAVA_TOOL_OPTIONS", "-Xmx512m")]));
        assert_eq!(
            applied["JAVA_TOOL_OPTIONS"],
            "-Xmx512m -javaagent:/layers/agent-java/javaagent.jar"
        );

        let applied = env.apply(&BTreeMap::new());
        assert_eq!(
            applied["JAVA_TOOL_OPTIONS"],
            "-javaagent:/layers/agent-java/javaagent.jar"
        );
    }

    #[test]
    fn mutations_compose_in_order() {
        let mut env = Environment::new();
        env.prepend("NODE_PATH", ":", "/a")
            .prepend("NODE_PATH", ":", "/b")
            .append("NODE_PATH", ":", "/z");

        let applied = env.apply(&current(&[("NODE_PATH", "/base")]));
        assert_eq!(applied["NODE_PATH"], "/b:/a:/base:/z");
    }

    #[test]
    fn override_and_default() {
        let mut env = Environment::new();
        env.default_value("A", "fallback")
            .default_value("B", "fallback")
            .override_value("C", "forced");

        let applied = env.apply(&current(&[("A", "set"), ("C", "old")]));
        assert_eq!(applied["A"], "set");
        assert_eq!(applied["B"], "fallback");
        assert_eq!(applied["C"], "forced");
    }

    #[tokio::test]
    async fn writes_launch_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("env.launch");
        let mut env = Environment::new();
        env.prepend("PHP_INI_SCAN_DIR", ":", "/layers/agent-php/php.ini.d");

        env.write_to(&dir).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.join("PHP_INI_SCAN_DIR.prepend")).unwrap(),
            "/layers/agent-php/php.ini.d"
        );
        assert_eq!(
            std::fs::read_to_string(dir.join("PHP_INI_SCAN_DIR.delim")).unwrap(),
            ":"
        );
    }

    #[tokio::test]
    async fn empty_environment_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("env.launch");

        Environment::new().write_to(&dir).await.unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn serializes_in_order() {
        let mut env = Environment::new();
        env.append("X", " ", "1").override_value("Y", "2");

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json[0]["operation"], "append");
        assert_eq!(json[1]["name"], "Y");
        assert!(json[1].get("delimiter").is_none());
    }
}
