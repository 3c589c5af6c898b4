//! Terminal detection for status output

use std::io::IsTerminal;

/// Variables exported by build platforms whose log capture cannot redraw lines
const PLATFORM_VARS: [&str; 4] = ["CI", "CNB_PLATFORM_API", "GITHUB_ACTIONS", "GITLAB_CI"];

/// Whether redrawing output such as progress bars may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Inspect stdout and the process environment
    pub fn detect() -> Self {
        Self::from_parts(std::io::stdout().is_terminal(), |name| {
            std::env::var_os(name).is_some()
        })
    }

    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    fn from_parts(terminal: bool, is_set: impl Fn(&str) -> bool) -> Self {
        Self {
            interactive: terminal && !PLATFORM_VARS.iter().any(|var| is_set(var)),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }
}
