//! Node.js agent
//!
//! The agent package is unpacked, installed into the layer with npm, put on
//! `NODE_PATH`, and required from the application's entry file.

use super::patch::{entry_file, require_module};
use super::{expand, AgentContribution, ContributionContext};
use crate::archive::ArchiveFormat;
use crate::dependency::Dependency;
use crate::error::{AgentpackResult, StepExt};
use crate::exec::Execution;
use crate::layer::Layer;
use async_trait::async_trait;

/// Capability and layer name
pub const NAME: &str = "agent-nodejs";

/// Module the application must require
pub const AGENT_MODULE: &str = "appdynamics";

#[derive(Debug, Clone)]
pub struct NodeJsAgent {
    dependency: Dependency,
}

impl NodeJsAgent {
    pub fn new(dependency: Dependency) -> Self {
        Self { dependency }
    }
}

#[async_trait]
impl AgentContribution for NodeJsAgent {
    fn name(&self) -> &str {
        NAME
    }

    fn dependencies(&self) -> Vec<&Dependency> {
        vec![&self.dependency]
    }

    async fn extract(&self, layer: &mut Layer, ctx: &ContributionContext<'_>) -> AgentpackResult<()> {
        expand(ctx, &self.dependency, ArchiveFormat::TarGz, &layer.path, 0).await
    }

    async fn post_process(&self, layer: &mut Layer, ctx: &ContributionContext<'_>) -> AgentpackResult<()> {
        let artifact = ctx
            .cache
            .artifact_path(&self.dependency)
            .await
            .with_step(|| format!("unable to get dependency {}", self.dependency.id))?;

        let execution = Execution::new("npm")
            .args(["install", "--no-save"])
            .arg(artifact.display().to_string())
            .current_dir(&layer.path);
        ctx.logger.body(&format!("Running {}", execution.display()));
        ctx.executor
            .execute(&execution)
            .await
            .step("unable to run npm install")
    }

    fn environment(&self, layer: &mut Layer) {
        layer.launch_env.prepend(
            "NODE_PATH",
            ":",
            layer.path.join("node_modules").display().to_string(),
        );
    }

    async fn after_contribute(&self, _layer: &Layer, ctx: &ContributionContext<'_>) -> AgentpackResult<()> {
        let file = entry_file(ctx.app_dir).await?;
        if require_module(&file, AGENT_MODULE)
            .await
            .with_step(|| format!("unable to patch {}", file.display()))?
        {
            ctx.logger
                .body(&format!("Requiring '{}' in {}", AGENT_MODULE, file.display()));
        }
        Ok(())
    }
}
