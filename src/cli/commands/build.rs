//! Build command - contribute agent layers

use crate::agent::ContributionContext;
use crate::build::Build;
use crate::cli::args::BuildArgs;
use crate::config::{BuildEnvironment, Buildpack};
use crate::dependency::DependencyCache;
use crate::error::AgentpackResult;
use crate::exec::CommandExecutor;
use crate::layer::LayerStore;
use crate::plan::BuildpackPlan;
use crate::ui::Logger;
use std::path::Path;
use tracing::debug;

/// Build-level bill of materials written into the layers directory
const BOM_FILE: &str = "bom.json";

/// Execute the build command
pub async fn execute(args: BuildArgs, buildpack_dir: &Path) -> AgentpackResult<()> {
    let logger = Logger::new();
    let buildpack = Buildpack::load(buildpack_dir).await?;
    let env = BuildEnvironment::from_process();
    let plan = BuildpackPlan::load(&args.plan).await?;
    debug!(entries = plan.entries.len(), platform = %args.platform.display(), "Loaded plan");

    let download_dir = args
        .download_dir
        .clone()
        .unwrap_or_else(DependencyCache::default_download_path);
    let mut cache = DependencyCache::new(download_dir, logger.clone());
    let bundled = buildpack.dependencies_dir();
    if bundled.is_dir() {
        cache = cache.with_cache_path(bundled);
    }
    let executor = CommandExecutor::new(logger.clone());

    let ctx = ContributionContext {
        layers_dir: &args.layers,
        app_dir: &args.app,
        buildpack: &buildpack,
        cache: &cache,
        executor: &executor,
        env: &env,
        logger: &logger,
    };

    let mut store = LayerStore::load(&args.layers).await?;
    let build = Build::plan(&plan, &ctx)?;
    let result = build.run(&ctx, &mut store).await?;

    result.bom.write(&args.layers.join(BOM_FILE)).await?;
    Ok(())
}
