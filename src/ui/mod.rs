//! Status output for buildpack runs
//!
//! Build output is a stream of human-readable status lines grouped as
//! title, header and body, the layout platform lifecycles already show for
//! other buildpacks. Colours are dropped automatically when stdout is not a
//! terminal.

mod context;
mod output;

pub use context::UiContext;
pub use output::Logger;
