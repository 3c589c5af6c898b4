//! Detect command - look for the monitoring binding

use crate::cli::args::DetectArgs;
use crate::config::BuildEnvironment;
use crate::detect::{bindings_root, detect, DetectResult, BINDING_TYPE};
use crate::error::AgentpackResult;
use crate::ui::Logger;

/// Execute the detect command, returning whether detection passed
pub async fn execute(args: DetectArgs) -> AgentpackResult<bool> {
    let env = BuildEnvironment::from_process();
    let root = bindings_root(&env, &args.platform);

    match detect(&root)? {
        DetectResult::Pass(plan) => {
            plan.write(&args.plan).await?;
            Ok(true)
        }
        DetectResult::Fail => {
            Logger::new().body(&format!(
                "SKIPPED: No binding of type '{}' found",
                BINDING_TYPE
            ));
            Ok(false)
        }
    }
}
