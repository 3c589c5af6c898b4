//! Agentpack - APM agent buildpack
//!
//! Detects a monitoring service binding and contributes a launch layer with
//! the vendor agent for Java, Node.js or PHP applications.

pub mod agent;
pub mod archive;
pub mod build;
pub mod cli;
pub mod config;
pub mod dependency;
pub mod detect;
pub mod error;
pub mod exec;
pub mod layer;
pub mod plan;
pub mod sbom;
pub mod ui;

// testing module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{AgentpackError, AgentpackResult};
