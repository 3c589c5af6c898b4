//! Test support: archive fixtures, a recording executor and a harness that
//! wires a throwaway buildpack, layers root, application and cache together.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests.

use crate::agent::ContributionContext;
use crate::config::{BuildEnvironment, Buildpack, BuildpackToml, DESCRIPTOR_FILE};
use crate::dependency::{cache::sha256_bytes, Dependency, DependencyCache};
use crate::error::{AgentpackError, AgentpackResult};
use crate::exec::{Execution, Executor};
use crate::ui::Logger;
use async_trait::async_trait;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Route `tracing` output to the test writer when `RUST_LOG` is set
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Kind of archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink(String),
}

/// One entry of a generated archive
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub kind: EntryKind,
    pub data: Vec<u8>,
    pub mode: u32,
}

impl Entry {
    pub fn file(path: &str, data: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            kind: EntryKind::File,
            data: data.to_vec(),
            mode: 0o644,
        }
    }

    pub fn executable(path: &str, data: &[u8]) -> Self {
        Self {
            mode: 0o755,
            ..Self::file(path, data)
        }
    }

    pub fn dir(path: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: EntryKind::Dir,
            data: Vec::new(),
            mode: 0o755,
        }
    }

    pub fn symlink(path: &str, target: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: EntryKind::Symlink(target.to_string()),
            data: Vec::new(),
            mode: 0o777,
        }
    }
}

/// Uncompressed tar archive
///
/// Entry names are written verbatim, so fixtures may contain `..` or
/// absolute paths.
pub fn tar_bytes(entries: &[Entry]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let mut header = tar::Header::new_old();
        let name = entry.path.as_bytes();
        assert!(name.len() < 100, "fixture path too long: {}", entry.path);
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_mode(entry.mode);
        header.set_mtime(0);
        match &entry.kind {
            EntryKind::File => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(entry.data.len() as u64);
            }
            EntryKind::Dir => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
            }
            EntryKind::Symlink(target) => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_size(0);
                header
                    .set_link_name(target)
                    .expect("valid symlink target");
            }
        }
        header.set_cksum();
        builder
            .append(&header, entry.data.as_slice())
            .expect("append tar entry");
    }
    builder.into_inner().expect("finish tar")
}

/// gzip-compressed tar archive
pub fn tar_gz_bytes(entries: &[Entry]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(&tar_bytes(entries))
        .expect("gzip tar");
    encoder.finish().expect("finish gzip")
}

/// bzip2-compressed tar archive
pub fn tar_bz2_bytes(entries: &[Entry]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder
        .write_all(&tar_bytes(entries))
        .expect("bzip2 tar");
    encoder.finish().expect("finish bzip2")
}

/// Zip archive with Unix permissions recorded
pub fn zip_bytes(entries: &[Entry]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        let options =
            zip::write::SimpleFileOptions::default().unix_permissions(entry.mode);
        match &entry.kind {
            EntryKind::File => {
                writer
                    .start_file(entry.path.as_str(), options)
                    .expect("start zip entry");
                writer.write_all(&entry.data).expect("write zip entry");
            }
            EntryKind::Dir => {
                writer
                    .add_directory(entry.path.as_str(), options)
                    .expect("add zip directory");
            }
            EntryKind::Symlink(target) => {
                writer
                    .add_symlink(entry.path.as_str(), target.as_str(), options)
                    .expect("add zip symlink");
            }
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Java agent zip with a jar at the root and one version directory
pub fn java_agent_archive() -> Vec<u8> {
    zip_bytes(&[
        Entry::file("javaagent.jar", b"javaagent"),
        Entry::dir("ver21.11.2.33305/"),
        Entry::file("ver21.11.2.33305/javaagent.jar", b"javaagent"),
        Entry::dir("ver21.11.2.33305/conf/"),
        Entry::file("ver21.11.2.33305/conf/controller-info.xml", b"<controller-info/>"),
        Entry::dir("ver21.11.2.33305/lib/"),
        Entry::file("ver21.11.2.33305/lib/agent.jar", b"lib"),
    ])
}

/// External configuration overlay with one leading directory to strip
pub fn external_configuration_archive() -> Vec<u8> {
    tar_gz_bytes(&[
        Entry::dir("external/"),
        Entry::dir("external/conf/"),
        Entry::file("external/conf/external.properties", b"tier=orders\n"),
    ])
}

/// Node.js agent package as published to npm
pub fn nodejs_agent_archive() -> Vec<u8> {
    tar_gz_bytes(&[
        Entry::dir("package/"),
        Entry::file("package/package.json", br#"{ "name": "appdynamics" }"#),
        Entry::file("package/index.js", b"module.exports = {};\n"),
    ])
}

/// PHP agent tarball with its installer under one top-level directory
pub fn php_agent_archive() -> Vec<u8> {
    tar_bz2_bytes(&[
        Entry::dir("appdynamics-php-agent-linux_x64/"),
        Entry::executable("appdynamics-php-agent-linux_x64/install.sh", b"#!/bin/sh\nexit 0\n"),
        Entry::file("appdynamics-php-agent-linux_x64/agent.so", b"elf"),
    ])
}

/// Write `buildpack.toml` and the bundled configuration templates
pub fn write_buildpack(dir: &Path, dependencies: &[Dependency]) -> Buildpack {
    let mut info = BuildpackToml::default();
    info.api = "0.7".to_string();
    info.metadata.dependencies = dependencies.to_vec();

    std::fs::create_dir_all(dir.join("resources")).expect("create resources");
    std::fs::write(
        dir.join(DESCRIPTOR_FILE),
        toml::to_string(&info).expect("serialize buildpack.toml"),
    )
    .expect("write buildpack.toml");
    for template in [
        "app-agent-config.xml",
        "custom-activity-correlation.xml",
        "log4j2.xml",
    ] {
        std::fs::write(dir.join("resources").join(template), "<configuration/>\n")
            .expect("write template");
    }

    Buildpack {
        path: dir.to_path_buf(),
        info,
    }
}

/// Store `bytes` in a cache root as `<root>/<sha256>/<file_name>`
pub fn seed_cache(root: &Path, id: &str, file_name: &str, bytes: &[u8]) -> Dependency {
    let sha256 = sha256_bytes(bytes);
    let dir = root.join(&sha256);
    std::fs::create_dir_all(&dir).expect("create cache entry");
    std::fs::write(dir.join(file_name), bytes).expect("write cache entry");

    Dependency {
        id: id.to_string(),
        name: id.to_string(),
        version: "1.0.0".to_string(),
        uri: format!("https://localhost/{}", file_name),
        sha256,
        stacks: vec!["*".to_string()],
        ..Default::default()
    }
}

/// Executor that records executions instead of running them
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<Execution>>,
    exit_code: Option<i32>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record, then fail every execution with `code`
    pub fn failing(code: i32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exit_code: Some(code),
        }
    }

    pub fn calls(&self) -> Vec<Execution> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&self, execution: &Execution) -> AgentpackResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(execution.clone());
        match self.exit_code {
            Some(code) => Err(AgentpackError::Subprocess {
                command: execution.display(),
                code,
                output: String::new(),
            }),
            None => Ok(()),
        }
    }
}

/// A throwaway buildpack, layers root, application and cache
pub struct Harness {
    pub root: TempDir,
    pub layers_dir: PathBuf,
    pub app_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub buildpack: Buildpack,
    pub cache: DependencyCache,
    pub executor: RecordingExecutor,
    pub env: BuildEnvironment,
    pub logger: Logger,
}

impl Harness {
    pub fn new() -> Self {
        init_test_logging();

        let root = TempDir::new().expect("create temp dir");
        let layers_dir = root.path().join("layers");
        let app_dir = root.path().join("app");
        let cache_dir = root.path().join("cache");
        for dir in [&layers_dir, &app_dir, &cache_dir] {
            std::fs::create_dir_all(dir).expect("create harness dir");
        }

        let buildpack = write_buildpack(&root.path().join("buildpack"), &[]);
        let logger = Logger::silent();
        let cache = DependencyCache::new(root.path().join("downloads"), logger.clone())
            .with_cache_path(cache_dir.clone());

        Self {
            root,
            layers_dir,
            app_dir,
            cache_dir,
            buildpack,
            cache,
            executor: RecordingExecutor::new(),
            env: BuildEnvironment::default(),
            logger,
        }
    }

    /// Fail every subprocess with `code`
    pub fn failing_executor(mut self, code: i32) -> Self {
        self.executor = RecordingExecutor::failing(code);
        self
    }

    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env.set(name, value);
        self
    }

    /// Declare a dependency in the harness `buildpack.toml`
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.buildpack.info.metadata.dependencies.push(dependency);
        self
    }

    /// Put an artifact in the read-only cache and describe it
    pub fn seed(&self, id: &str, file_name: &str, bytes: &[u8]) -> Dependency {
        seed_cache(&self.cache_dir, id, file_name, bytes)
    }

    pub fn context(&self) -> ContributionContext<'_> {
        ContributionContext {
            layers_dir: &self.layers_dir,
            app_dir: &self.app_dir,
            buildpack: &self.buildpack,
            cache: &self.cache,
            executor: &self.executor,
            env: &self.env,
            logger: &self.logger,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
