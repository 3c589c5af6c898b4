//! Application entry file patching

use crate::error::{AgentpackError, AgentpackResult};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const PACKAGE_JSON: &str = "package.json";
const DEFAULT_MAIN: &str = "index.js";

#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(default)]
    main: Option<String>,
}

/// Entry file declared by the application's `package.json`
pub async fn entry_file(app_dir: &Path) -> AgentpackResult<PathBuf> {
    let path = app_dir.join(PACKAGE_JSON);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AgentpackError::Configuration(format!(
                "unable to find {} in {}",
                PACKAGE_JSON,
                app_dir.display()
            )))
        }
        Err(e) => return Err(AgentpackError::io(format!("reading {}", path.display()), e)),
    };

    let package: PackageJson = serde_json::from_str(&content)?;
    let main = package
        .main
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MAIN.to_string());

    let inside = Path::new(&main)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !inside {
        return Err(AgentpackError::Configuration(format!(
            "main entry {} in {} must be a path inside the application",
            main,
            path.display()
        )));
    }
    Ok(app_dir.join(main))
}

/// Prepend `require('<module>');` to `file` unless it already requires it
///
/// Returns whether the file was rewritten.
pub async fn require_module(file: &Path, module: &str) -> AgentpackResult<bool> {
    let content = tokio::fs::read(file)
        .await
        .map_err(|e| AgentpackError::io(format!("reading {}", file.display()), e))?;

    let needle = format!("require('{}')", module);
    if contains(&content, needle.as_bytes()) {
        debug!(file = %file.display(), "Entry file already requires {}", module);
        return Ok(false);
    }

    let mut patched = format!("require('{}');\n", module).into_bytes();
    patched.extend_from_slice(&content);
    tokio::fs::write(file, patched)
        .await
        .map_err(|e| AgentpackError::io(format!("writing {}", file.display()), e))?;
    Ok(true)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn prepends_require_once() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("main.js");
        std::fs::write(&file, "test").unwrap();

        assert!(require_module(&file, "agent").await.unwrap());
        let first = std::fs::read(&file).unwrap();
        assert_eq!(first, b"require('agent');\ntest");

        assert!(!require_module(&file, "agent").await.unwrap());
        assert_eq!(std::fs::read(&file).unwrap(), first);
    }

    #[tokio::test]
    async fn existing_require_anywhere_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("main.js");
        std::fs::write(&file, "test\nrequire('appdynamics')\ntest").unwrap();

        assert!(!require_module(&file, "appdynamics").await.unwrap());
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "test\nrequire('appdynamics')\ntest"
        );
    }

    #[tokio::test]
    async fn empty_file_gets_require() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("main.js");
        std::fs::write(&file, "").unwrap();

        require_module(&file, "appdynamics").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "require('appdynamics');\n"
        );
    }

    #[tokio::test]
    async fn entry_file_from_main() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), r#"{ "main": "main.js" }"#).unwrap();

        assert_eq!(entry_file(temp.path()).await.unwrap(), temp.path().join("main.js"));
    }

    #[tokio::test]
    async fn entry_file_defaults_to_index() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), r#"{ "name": "app" }"#).unwrap();

        assert_eq!(entry_file(temp.path()).await.unwrap(), temp.path().join("index.js"));
    }

    #[tokio::test]
    async fn entry_file_outside_app_is_rejected() {
        let temp = TempDir::new().unwrap();
        for main in ["/etc/profile", "../server.js", "lib/../../server.js"] {
            std::fs::write(
                temp.path().join("package.json"),
                serde_json::json!({ "main": main }).to_string(),
            )
            .unwrap();

            let err = entry_file(temp.path()).await.unwrap_err();
            assert!(matches!(err, AgentpackError::Configuration(_)), "{main}");
        }
    }

    #[tokio::test]
    async fn entry_file_keeps_relative_main() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), r#"{ "main": "./lib/server.js" }"#).unwrap();

        assert_eq!(
            entry_file(temp.path()).await.unwrap(),
            temp.path().join("./lib/server.js")
        );
    }

    #[tokio::test]
    async fn missing_package_json_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let err = entry_file(temp.path()).await.unwrap_err();
        assert!(matches!(err, AgentpackError::Configuration(_)));
    }
}
