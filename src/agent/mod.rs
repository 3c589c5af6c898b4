//! Agent contributions
//!
//! Every agent runs the same pipeline inside the memoized layer body:
//! extract, post-process, compose the launch environment, write the layer
//! SBOM. [`AgentContribution::after_contribute`] runs afterwards on every
//! build, cached or not.

pub mod java;
pub mod nodejs;
pub mod patch;
pub mod php;

pub use java::JavaAgent;
pub use nodejs::NodeJsAgent;
pub use php::PhpAgent;

use crate::archive::ArchiveFormat;
use crate::config::{BuildEnvironment, Buildpack};
use crate::dependency::{Dependency, DependencyCache};
use crate::error::{AgentpackError, AgentpackResult, StepExt};
use crate::exec::Executor;
use crate::layer::{Layer, LayerContributor, LayerStore, LayerTypes};
use crate::sbom::{BomEntry, SyftDocument};
use crate::ui::Logger;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything a contribution may read or call out to
pub struct ContributionContext<'a> {
    /// CNB layers root
    pub layers_dir: &'a Path,
    /// Application source directory
    pub app_dir: &'a Path,
    pub buildpack: &'a Buildpack,
    pub cache: &'a DependencyCache,
    pub executor: &'a dyn Executor,
    pub env: &'a BuildEnvironment,
    pub logger: &'a Logger,
}

/// One runtime's agent, as a set of hooks over the shared pipeline
#[async_trait]
pub trait AgentContribution: Send + Sync {
    /// Layer name
    fn name(&self) -> &str;

    /// Contributed dependencies, primary first
    fn dependencies(&self) -> Vec<&Dependency>;

    fn layer_types(&self) -> LayerTypes {
        LayerTypes::LAUNCH
    }

    /// Value whose hash decides whether the layer is rebuilt
    fn metadata(&self) -> serde_json::Value {
        serde_json::json!({ "dependencies": self.dependencies() })
    }

    /// Unpack the primary artifact into the layer
    async fn extract(&self, layer: &mut Layer, ctx: &ContributionContext<'_>) -> AgentpackResult<()>;

    /// Runtime-specific steps after extraction
    async fn post_process(
        &self,
        _layer: &mut Layer,
        _ctx: &ContributionContext<'_>,
    ) -> AgentpackResult<()> {
        Ok(())
    }

    /// Record launch environment mutations
    fn environment(&self, layer: &mut Layer);

    /// Steps outside the layer that must run on every build
    async fn after_contribute(
        &self,
        _layer: &Layer,
        _ctx: &ContributionContext<'_>,
    ) -> AgentpackResult<()> {
        Ok(())
    }

    /// Bill of materials entries, one per dependency, in dependency order
    fn bom_entries(&self) -> Vec<BomEntry> {
        let types = self.layer_types();
        self.dependencies()
            .into_iter()
            .map(|d| BomEntry::new(d, self.name(), types.launch, types.build))
            .collect()
    }
}

/// Contribute an agent's layer, reusing it when its metadata is unchanged
pub async fn contribute(
    agent: &dyn AgentContribution,
    ctx: &ContributionContext<'_>,
    store: &mut LayerStore,
) -> AgentpackResult<Layer> {
    if let Some(primary) = agent.dependencies().first() {
        ctx.logger.header(&primary.display_name());
    }

    let contributor = LayerContributor::new(agent.name(), &agent.metadata(), agent.layer_types())?;
    let layer = contributor
        .contribute(ctx.layers_dir, store, ctx.logger, move |mut layer| async move {
            agent
                .extract(&mut layer, ctx)
                .await
                .step("unable to contribute agent")?;
            agent
                .post_process(&mut layer, ctx)
                .await
                .step("unable to configure agent")?;
            agent.environment(&mut layer);

            let sbom = SyftDocument::new(&layer.path, agent.dependencies());
            debug!(path = %layer.sbom_path().display(), "Writing layer SBOM");
            sbom.write_to(&layer.sbom_path())
                .await
                .step("unable to write SBOM")?;

            Ok(layer)
        })
        .await
        .with_step(|| format!("unable to contribute layer {}", agent.name()))?;

    agent
        .after_contribute(&layer, ctx)
        .await
        .with_step(|| format!("unable to finish layer {}", agent.name()))?;

    Ok(layer)
}

/// Fetch a verified artifact and unpack it into `target`
pub(crate) async fn expand(
    ctx: &ContributionContext<'_>,
    dependency: &Dependency,
    format: ArchiveFormat,
    target: &Path,
    strip_components: usize,
) -> AgentpackResult<()> {
    let artifact = ctx
        .cache
        .artifact(dependency)
        .await
        .with_step(|| format!("unable to get dependency {}", dependency.id))?;

    ctx.logger
        .body(&format!("Expanding to {}", target.display()));
    debug!(format = format.as_str(), strip_components, "Expanding {}", dependency.id);

    let target_dir: PathBuf = target.to_path_buf();
    tokio::task::spawn_blocking(move || format.extract(artifact, &target_dir, strip_components))
        .await
        .map_err(|e| AgentpackError::Internal(format!("extraction task failed: {}", e)))?
        .with_step(|| format!("unable to expand {}", dependency.display_name()))
}

/// Create a directory tree with the given mode
pub(crate) async fn create_dir(path: &Path, mode: u32) -> AgentpackResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| AgentpackError::io(format!("creating {}", path.display()), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| {
                AgentpackError::io(format!("setting permissions on {}", path.display()), e)
            })?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
