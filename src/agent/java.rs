//! Java agent
//!
//! Zip archive unpacked into the layer root, with bundled configuration
//! templates copied into the versioned `conf/` tree and an optional
//! external configuration archive unpacked over it.

use super::{create_dir, expand, AgentContribution, ContributionContext};
use crate::archive::ArchiveFormat;
use crate::config::ConfigurationResolver;
use crate::dependency::Dependency;
use crate::error::{AgentpackError, AgentpackResult, StepExt};
use crate::layer::{version_directory, Layer};
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;

/// Capability and layer name
pub const NAME: &str = "agent-java";

pub const EXT_CONF_URI: &str = "BP_APPD_EXT_CONF_URI";
pub const EXT_CONF_VERSION: &str = "BP_APPD_EXT_CONF_VERSION";
pub const EXT_CONF_SHA256: &str = "BP_APPD_EXT_CONF_SHA256";
pub const EXT_CONF_STRIP: &str = "BP_APPD_EXT_CONF_STRIP";

const EXT_CONF_ID: &str = "appdynamics-external-configuration";
const EXT_CONF_NAME: &str = "AppDynamics External Configuration";

/// Templates copied from `resources/`, with their directory under `<version>/conf`
const TEMPLATES: [(&str, Option<&str>); 3] = [
    ("app-agent-config.xml", None),
    ("custom-activity-correlation.xml", None),
    ("log4j2.xml", Some("logging")),
];

#[derive(Debug, Clone)]
pub struct JavaAgent {
    agent: Dependency,
    external_configuration: Option<Dependency>,
    strip_components: usize,
}

impl JavaAgent {
    pub fn new(agent: Dependency) -> Self {
        Self {
            agent,
            external_configuration: None,
            strip_components: 0,
        }
    }

    /// Unpack `dependency` over the version directory, dropping
    /// `strip_components` leading path segments
    pub fn with_external_configuration(mut self, dependency: Dependency, strip_components: usize) -> Self {
        self.external_configuration = Some(dependency);
        self.strip_components = strip_components;
        self
    }

    /// Build the agent from its dependency and the `BP_APPD_EXT_CONF_*` options
    pub fn configure(
        agent: Dependency,
        config: &ConfigurationResolver,
        stack: Option<&str>,
    ) -> AgentpackResult<Self> {
        let java = Self::new(agent);
        let Some(uri) = config.lookup(EXT_CONF_URI) else {
            return Ok(java);
        };

        let strip = match config.resolve(EXT_CONF_STRIP) {
            Some(value) if !value.trim().is_empty() => value.trim().parse::<usize>().map_err(|e| {
                AgentpackError::Configuration(format!(
                    "unable to parse {}={} to integer: {}",
                    EXT_CONF_STRIP, value, e
                ))
            })?,
            _ => 0,
        };

        Ok(java.with_external_configuration(
            external_configuration(
                uri,
                &config.resolve(EXT_CONF_VERSION).unwrap_or_default(),
                &config.resolve(EXT_CONF_SHA256).unwrap_or_default(),
                stack,
            ),
            strip,
        ))
    }

    pub fn external_configuration(&self) -> Option<&Dependency> {
        self.external_configuration.as_ref()
    }

    async fn copy_templates(&self, ctx: &ContributionContext<'_>, conf: &Path) -> AgentpackResult<()> {
        let resources = ctx.buildpack.resources_dir();
        for (file, subdir) in TEMPLATES {
            let dir = match subdir {
                Some(subdir) => conf.join(subdir),
                None => conf.to_path_buf(),
            };
            create_dir(&dir, 0o755).await?;

            let source = resources.join(file);
            let dest = dir.join(file);
            ctx.logger
                .body(&format!("Copying {} to {}", file, dir.display()));
            tokio::fs::copy(&source, &dest).await.map_err(|e| {
                AgentpackError::io(
                    format!("copying {} to {}", source.display(), dest.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

/// Descriptor for a user-supplied external configuration archive
fn external_configuration(uri: &str, version: &str, sha256: &str, stack: Option<&str>) -> Dependency {
    Dependency {
        id: EXT_CONF_ID.to_string(),
        name: EXT_CONF_NAME.to_string(),
        version: version.to_string(),
        uri: uri.to_string(),
        sha256: sha256.to_string(),
        stacks: stack.map(|s| vec![s.to_string()]).unwrap_or_default(),
        cpes: vec![format!(
            "cpe:2.3:a:appdynamics:external-configuration:{}:*:*:*:*:*:*:*",
            version
        )],
        purl: format!("pkg:generic/{}@{}", EXT_CONF_ID, version),
        licenses: Vec::new(),
    }
}

#[async_trait]
impl AgentContribution for JavaAgent {
    fn name(&self) -> &str {
        NAME
    }

    fn dependencies(&self) -> Vec<&Dependency> {
        std::iter::once(&self.agent)
            .chain(self.external_configuration.as_ref())
            .collect()
    }

    fn metadata(&self) -> serde_json::Value {
        match &self.external_configuration {
            Some(_) => json!({
                "dependencies": self.dependencies(),
                "strip_components": self.strip_components,
            }),
            None => json!({ "dependencies": self.dependencies() }),
        }
    }

    async fn extract(&self, layer: &mut Layer, ctx: &ContributionContext<'_>) -> AgentpackResult<()> {
        expand(ctx, &self.agent, ArchiveFormat::Zip, &layer.path, 0).await
    }

    async fn post_process(&self, layer: &mut Layer, ctx: &ContributionContext<'_>) -> AgentpackResult<()> {
        let version = version_directory(&layer.path).step("unable to determine version directory")?;

        self.copy_templates(ctx, &version.join("conf")).await?;

        // The runtime user may differ from the build user but shares its group
        create_dir(&version.join("logs"), 0o775).await?;

        if let Some(dependency) = &self.external_configuration {
            ctx.logger.header(&dependency.display_name());
            expand(
                ctx,
                dependency,
                ArchiveFormat::TarGz,
                &version,
                self.strip_components,
            )
            .await
            .step("unable to contribute external configuration")?;
        }

        Ok(())
    }

    fn environment(&self, layer: &mut Layer) {
        layer.launch_env.append(
            "JAVA_TOOL_OPTIONS",
            " ",
            format!("-javaagent:{}", layer.path.join("javaagent.jar").display()),
        );
    }
}
