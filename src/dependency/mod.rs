//! Agent dependencies: descriptors, resolution, and the verified artifact cache

pub mod cache;
pub mod descriptor;
pub mod resolver;

pub use cache::DependencyCache;
pub use descriptor::{Dependency, License};
pub use resolver::DependencyResolver;
