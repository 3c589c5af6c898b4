//! Executor backed by real processes

use super::{error_output, stream_child_output, Execution, Executor};
use crate::error::{AgentpackError, AgentpackResult};
use crate::ui::Logger;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Spawns processes with tokio, forwarding each output line to the logger
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    logger: Logger,
}

impl CommandExecutor {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(&self, execution: &Execution) -> AgentpackResult<()> {
        let command_line = execution.display();
        debug!(command = %command_line, dir = ?execution.dir, "Executing");

        let mut cmd = Command::new(&execution.command);
        cmd.args(&execution.args)
            .envs(&execution.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &execution.dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| AgentpackError::command_failed(&command_line, e))?;

        let logger = self.logger.clone();
        let on_output = move |line: String| logger.detail(&line);
        let output = stream_child_output(&mut child, &on_output).await?;

        let status = child
            .wait()
            .await
            .map_err(|e| AgentpackError::command_failed(&command_line, e))?;

        if !status.success() {
            return Err(AgentpackError::Subprocess {
                command: command_line,
                code: status.code().unwrap_or(-1),
                output: error_output(&output),
            });
        }

        Ok(())
    }
}
