//! Output functions for consistent buildpack formatting

use super::context::UiContext;
use console::style;

/// Status sink for a buildpack run
///
/// Cheap to clone; every contribution and the subprocess executor hold their
/// own copy. A silent logger swallows everything, which keeps test output
/// readable.
#[derive(Debug, Clone)]
pub struct Logger {
    ctx: UiContext,
    silent: bool,
}

impl Logger {
    /// Create a logger for the current terminal
    pub fn new() -> Self {
        Self {
            ctx: UiContext::detect(),
            silent: false,
        }
    }

    /// Create a logger that prints nothing
    pub fn silent() -> Self {
        Self {
            ctx: UiContext::non_interactive(),
            silent: true,
        }
    }

    /// Whether progress bars and other redrawing output may be used
    pub fn is_interactive(&self) -> bool {
        !self.silent && self.ctx.is_interactive()
    }

    /// Whether output is suppressed
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Buildpack banner, printed once per run
    pub fn title(&self, name: &str, version: &str, homepage: Option<&str>) {
        if self.silent {
            return;
        }
        println!();
        match homepage {
            Some(url) => println!(
                "{} {}",
                style(format!("{} {}", name, version)).bold(),
                style(url).dim()
            ),
            None => println!("{}", style(format!("{} {}", name, version)).bold()),
        }
    }

    /// Section header, one per layer or dependency
    pub fn header(&self, message: &str) {
        if self.silent {
            return;
        }
        println!("  {}", style(message).blue());
    }

    /// Step within a section
    pub fn body(&self, message: &str) {
        if self.silent {
            return;
        }
        for line in message.lines() {
            println!("    {}", line);
        }
    }

    /// Low-importance detail within a step
    pub fn detail(&self, message: &str) {
        if self.silent {
            return;
        }
        println!("      {}", style(message).dim());
    }

    /// Warning shown regardless of verbosity
    pub fn warn(&self, message: &str) {
        if self.silent {
            return;
        }
        println!("  {} {}", style("[WARN]").yellow(), message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
