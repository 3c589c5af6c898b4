//! PHP agent
//!
//! The agent ships its own `install.sh`, which writes an ini file into a
//! layer-local scan directory. Controller settings are passed as literal
//! `${VAR}` references and resolved by PHP at runtime.

use super::{create_dir, expand, AgentContribution, ContributionContext};
use crate::archive::ArchiveFormat;
use crate::dependency::Dependency;
use crate::error::{AgentpackError, AgentpackResult, StepExt};
use crate::exec::Execution;
use crate::layer::Layer;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Capability and layer name
pub const NAME: &str = "agent-php";

/// Build-time variable naming the PHP extension directory
pub const EXTENSION_DIR: &str = "PHP_EXTENSION_DIR";

const INI_DIR: &str = "php.ini.d";
const INI_FILE: &str = "appdynamics_agent.ini";
const SSL_SETTING: &str = "\nagent.controller.ssl.enabled = ${APPDYNAMICS_CONTROLLER_SSL_ENABLED}\n";

const INSTALLER_PLACEHOLDERS: [&str; 6] = [
    "--account-info=${APPDYNAMICS_AGENT_ACCOUNT_NAME}@${APPDYNAMICS_AGENT_ACCOUNT_ACCESS_KEY}",
    "${APPDYNAMICS_CONTROLLER_HOST_NAME}",
    "${APPDYNAMICS_CONTROLLER_PORT}",
    "${APPDYNAMICS_AGENT_APPLICATION_NAME}",
    "${APPDYNAMICS_AGENT_TIER_NAME}",
    "${APPDYNAMICS_AGENT_NODE_NAME}",
];

#[derive(Debug, Clone)]
pub struct PhpAgent {
    dependency: Dependency,
}

impl PhpAgent {
    pub fn new(dependency: Dependency) -> Self {
        Self { dependency }
    }

    fn ini_dir(layer: &Layer) -> PathBuf {
        layer.path.join(INI_DIR)
    }
}

#[async_trait]
impl AgentContribution for PhpAgent {
    fn name(&self) -> &str {
        NAME
    }

    fn dependencies(&self) -> Vec<&Dependency> {
        vec![&self.dependency]
    }

    async fn extract(&self, layer: &mut Layer, ctx: &ContributionContext<'_>) -> AgentpackResult<()> {
        expand(ctx, &self.dependency, ArchiveFormat::TarBz2, &layer.path, 1).await
    }

    async fn post_process(&self, layer: &mut Layer, ctx: &ContributionContext<'_>) -> AgentpackResult<()> {
        let ini_dir = Self::ini_dir(layer);
        create_dir(&ini_dir, 0o755).await?;

        let extension_dir = ctx.env.get(EXTENSION_DIR).ok_or_else(|| {
            AgentpackError::Configuration(format!("unable to find ${}", EXTENSION_DIR))
        })?;

        let execution = Execution::new(layer.path.join("install.sh").display().to_string())
            .arg("--ignore-permissions")
            .arg(format!("--php-extension-dir={}", extension_dir))
            .arg(format!("--php-ini-dir={}", ini_dir.display()))
            .args(INSTALLER_PLACEHOLDERS)
            .current_dir(&layer.path);
        ctx.logger.body("Running install.sh");
        ctx.executor
            .execute(&execution)
            .await
            .step("unable to run install.sh")?;

        // Appends on every run; the layer is only rebuilt when its metadata changes
        append(&ini_dir.join(INI_FILE), SSL_SETTING).await
    }

    fn environment(&self, layer: &mut Layer) {
        layer.launch_env.prepend(
            "PHP_INI_SCAN_DIR",
            ":",
            Self::ini_dir(layer).display().to_string(),
        );
    }
}

async fn append(path: &Path, text: &str) -> AgentpackResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| AgentpackError::io(format!("opening {}", path.display()), e))?;
    file.write_all(text.as_bytes())
        .await
        .map_err(|e| AgentpackError::io(format!("appending to {}", path.display()), e))?;
    file.flush()
        .await
        .map_err(|e| AgentpackError::io(format!("appending to {}", path.display()), e))
}
