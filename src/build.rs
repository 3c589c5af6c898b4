//! Build orchestration
//!
//! Selects an agent for each capability present in the buildpack plan,
//! resolves its dependency, and contributes the agents in a fixed order:
//! Java, Node.js, PHP.

use crate::agent::{contribute, java, nodejs, php, AgentContribution, ContributionContext};
use crate::agent::{JavaAgent, NodeJsAgent, PhpAgent};
use crate::config::ConfigurationResolver;
use crate::dependency::DependencyResolver;
use crate::error::{AgentpackResult, StepExt};
use crate::layer::{Layer, LayerStore};
use crate::plan::BuildpackPlan;
use crate::sbom::BillOfMaterials;
use tracing::info;

/// Contributed layers and the entries for the build BOM
#[derive(Debug, Default)]
pub struct BuildResult {
    pub layers: Vec<Layer>,
    pub bom: BillOfMaterials,
}

/// The agents selected for one build
pub struct Build {
    agents: Vec<Box<dyn AgentContribution>>,
}

impl Build {
    /// Select and configure agents for the capabilities in `plan`
    pub fn plan(plan: &BuildpackPlan, ctx: &ContributionContext<'_>) -> AgentpackResult<Self> {
        let buildpack = &ctx.buildpack.info;
        let stack = ctx.env.stack_id();
        let config =
            ConfigurationResolver::new(buildpack.metadata.configurations.clone(), ctx.env.clone());
        let resolver = DependencyResolver::new(
            buildpack.metadata.dependencies.clone(),
            stack.map(str::to_string),
        );

        let mut agents: Vec<Box<dyn AgentContribution>> = Vec::new();

        if plan.contains(java::NAME) {
            let dependency = resolver
                .resolve(java::NAME, "")
                .step("unable to find dependency")?;
            let agent = JavaAgent::configure(dependency, &config, stack)
                .step("unable to configure external configuration")?;
            agents.push(Box::new(agent));
        }

        if plan.contains(nodejs::NAME) {
            let dependency = resolver
                .resolve(nodejs::NAME, "")
                .step("unable to find dependency")?;
            agents.push(Box::new(NodeJsAgent::new(dependency)));
        }

        if plan.contains(php::NAME) {
            let dependency = resolver
                .resolve(php::NAME, "")
                .step("unable to find dependency")?;
            agents.push(Box::new(PhpAgent::new(dependency)));
        }

        Ok(Self { agents })
    }

    /// Names of the selected agents, in contribution order
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// Contribute every selected agent, one at a time
    pub async fn run(
        &self,
        ctx: &ContributionContext<'_>,
        store: &mut LayerStore,
    ) -> AgentpackResult<BuildResult> {
        let info = &ctx.buildpack.info.buildpack;
        ctx.logger
            .title(&info.name, &info.version, info.homepage.as_deref());

        let mut result = BuildResult::default();
        for agent in &self.agents {
            let layer = contribute(agent.as_ref(), ctx, store).await?;
            info!(layer = %layer.name, "Contributed layer");
            result.bom.record(agent.bom_entries());
            result.layers.push(layer);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentpackError;
    use crate::testing::{java_agent_archive, php_agent_archive, Harness};

    #[test]
    fn empty_plan_selects_nothing() {
        let harness = Harness::new();
        let build = Build::plan(&BuildpackPlan::default(), &harness.context()).unwrap();
        assert!(build.agent_names().is_empty());
    }

    #[test]
    fn missing_dependency_fails() {
        let harness = Harness::new();
        let plan = BuildpackPlan::from_names(["agent-php"]);

        let err = Build::plan(&plan, &harness.context()).err().unwrap();
        assert!(matches!(err.root(), AgentpackError::DependencyNotFound { .. }));
    }

    #[tokio::test]
    async fn contributes_planned_agents_in_order() {
        let harness = Harness::new().with_env(php::EXTENSION_DIR, "/php/ext");
        let java_dep = harness.seed(java::NAME, "java.zip", &java_agent_archive());
        let php_dep = harness.seed(php::NAME, "php.tar.bz2", &php_agent_archive());
        let harness = harness.with_dependency(php_dep).with_dependency(java_dep);
        let plan = BuildpackPlan::from_names(["agent-php", "agent-java"]);
        let mut store = LayerStore::in_memory();

        let build = Build::plan(&plan, &harness.context()).unwrap();
        assert_eq!(build.agent_names(), vec!["agent-java", "agent-php"]);

        let result = build.run(&harness.context(), &mut store).await.unwrap();

        assert_eq!(result.layers.len(), 2);
        let layers: Vec<_> = result
            .bom
            .entries()
            .iter()
            .map(|e| e.layer().unwrap_or_default().to_string())
            .collect();
        assert_eq!(layers, vec!["agent-java", "agent-php"]);
        assert!(result.bom.entries().iter().all(|e| e.launch && !e.build));
        assert_eq!(store.len(), 2);
    }
}
