//! Subprocess execution
//!
//! Agents never spawn processes directly. They describe an [`Execution`]
//! and hand it to an [`Executor`], so tests can record invocations instead
//! of running them.

mod command;

pub use command::CommandExecutor;

use crate::error::{AgentpackError, AgentpackResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines kept in subprocess error messages.
const ERROR_TAIL_LINES: usize = 50;

/// A command to run, with its arguments, working directory and extra env
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub command: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl Execution {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Command line as shown in logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs executions to completion
///
/// Implementations block the caller until the process exits; there is no
/// timeout.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the execution, failing with a subprocess error on non-zero exit
    async fn execute(&self, execution: &Execution) -> AgentpackResult<()>;
}

/// Extract the useful tail of process output for error diagnostics.
pub(crate) fn error_output(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> AgentpackResult<Vec<String>> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AgentpackError::Internal("child stderr was not piped".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AgentpackError::Internal("child stdout was not piped".into()))?;

    let mut stderr_reader = BufReader::new(stderr).lines();
    let mut stdout_reader = BufReader::new(stdout).lines();

    let mut all_output = Vec::new();
    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = stderr_reader.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stderr_done = true,
                }
            }
            line = stdout_reader.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stdout_done = true,
                }
            }
        }
    }

    Ok(all_output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_output_keeps_tail() {
        let lines: Vec<String> = (0..80).map(|i| format!("line {}", i)).collect();
        let tail = error_output(&lines);
        assert_eq!(tail.lines().count(), ERROR_TAIL_LINES);
        assert!(tail.starts_with("line 30"));
        assert!(tail.ends_with("line 79"));
    }

    #[test]
    fn error_output_short() {
        let lines = vec!["one".to_string(), "two".to_string()];
        assert_eq!(error_output(&lines), "one\ntwo");
        assert_eq!(error_output(&[]), "");
    }

    #[test]
    fn execution_builder() {
        let execution = Execution::new("npm")
            .args(["install", "--no-save"])
            .arg("/cache/agent.tgz")
            .current_dir("/layers/agent-nodejs")
            .env("NPM_CONFIG_LOGLEVEL", "error");

        assert_eq!(execution.display(), "npm install --no-save /cache/agent.tgz");
        assert_eq!(execution.dir, Some(PathBuf::from("/layers/agent-nodejs")));
        assert_eq!(execution.env["NPM_CONFIG_LOGLEVEL"], "error");
    }
}
