//! Verified artifact cache
//!
//! Artifacts are addressed by sha256: `<root>/<sha256>/<file name>`. Two
//! roots are searched, a read-only cache shipped with the buildpack and a
//! writable download directory. Every artifact handed out has had its
//! checksum verified, whether it was found on disk or just downloaded.

use super::descriptor::Dependency;
use crate::error::{AgentpackError, AgentpackResult};
use crate::ui::Logger;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Checksum-addressed store of downloaded dependencies
#[derive(Debug)]
pub struct DependencyCache {
    /// Read-only, pre-populated cache (offline buildpacks)
    cache_path: Option<PathBuf>,

    /// Writable download location
    download_path: PathBuf,

    logger: Logger,

    /// Serializes lookups so concurrent requests for one descriptor download once
    lock: Mutex<()>,
}

impl DependencyCache {
    /// Create a cache that downloads into `download_path`
    pub fn new(download_path: PathBuf, logger: Logger) -> Self {
        Self {
            cache_path: None,
            download_path,
            logger,
            lock: Mutex::new(()),
        }
    }

    /// Also search a read-only, pre-populated cache before downloading
    pub fn with_cache_path(mut self, path: PathBuf) -> Self {
        self.cache_path = Some(path);
        self
    }

    /// Default download location (`~/.cache/agentpack/dependencies`)
    pub fn default_download_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("agentpack")
            .join("dependencies")
    }

    /// Open a verified artifact for reading
    pub async fn artifact(&self, dependency: &Dependency) -> AgentpackResult<File> {
        let path = self.artifact_path(dependency).await?;
        File::open(&path).map_err(|e| AgentpackError::io(format!("opening {}", path.display()), e))
    }

    /// Path of a verified artifact, downloading it on a miss
    pub async fn artifact_path(&self, dependency: &Dependency) -> AgentpackResult<PathBuf> {
        check_sha256(dependency)?;
        let _guard = self.lock.lock().await;

        let roots = self
            .cache_path
            .iter()
            .chain(std::iter::once(&self.download_path));
        for root in roots {
            let candidate = root.join(&dependency.sha256).join(dependency.file_name());
            if candidate.is_file() {
                verify(&candidate, dependency)?;
                debug!(path = %candidate.display(), "Found cached dependency");
                return Ok(candidate);
            }
        }

        let dir = self.download_path.join(&dependency.sha256);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AgentpackError::io(format!("creating {}", dir.display()), e))?;
        let dest = dir.join(dependency.file_name());

        self.logger
            .body(&format!("Downloading from {}", dependency.uri));
        let uri = dependency.uri.clone();
        let target = dest.clone();
        let interactive = self.logger.is_interactive();
        tokio::task::spawn_blocking(move || fetch(&uri, &target, interactive))
            .await
            .map_err(|e| AgentpackError::Internal(format!("download task failed: {}", e)))??;

        self.logger.body("Verifying checksum");
        if let Err(e) = verify(&dest, dependency) {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e);
        }

        self.write_sidecar(dependency).await?;
        Ok(dest)
    }

    /// Record the descriptor next to the artifact for later inspection
    async fn write_sidecar(&self, dependency: &Dependency) -> AgentpackResult<()> {
        let path = self
            .download_path
            .join(format!("{}.toml", dependency.sha256));
        let content = toml::to_string(dependency)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AgentpackError::io(format!("writing {}", path.display()), e))
    }
}

/// Copy or download `uri` to `dest` via a `.partial` file
fn fetch(uri: &str, dest: &Path, interactive: bool) -> AgentpackResult<()> {
    let partial = {
        let mut s = dest.as_os_str().to_owned();
        s.push(format!(".{}.partial", uuid::Uuid::new_v4()));
        PathBuf::from(s)
    };

    let result = match uri.strip_prefix("file://") {
        Some(source) => std::fs::copy(source, &partial)
            .map(|_| ())
            .map_err(|e| AgentpackError::Fetch {
                uri: uri.to_string(),
                reason: e.to_string(),
            }),
        None => download(uri, &partial, interactive),
    };

    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    std::fs::rename(&partial, dest)
        .map_err(|e| AgentpackError::io(format!("finalizing download {}", dest.display()), e))
}

fn download(uri: &str, partial: &Path, interactive: bool) -> AgentpackResult<()> {
    let fetch_error = |reason: String| AgentpackError::Fetch {
        uri: uri.to_string(),
        reason,
    };

    let response = ureq::get(uri)
        .call()
        .map_err(|e| fetch_error(e.to_string()))?;

    let total = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut file = File::create(partial)
        .map_err(|e| AgentpackError::io(format!("creating {}", partial.display()), e))?;
    let pb = make_progress_bar(interactive, total);

    let mut reader = response.into_body().into_reader();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| fetch_error(format!("download interrupted: {}", e)))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .map_err(|e| AgentpackError::io(format!("writing {}", partial.display()), e))?;
        pb.inc(n as u64);
    }
    pb.finish_and_clear();
    Ok(())
}

fn make_progress_bar(interactive: bool, total: Option<u64>) -> indicatif::ProgressBar {
    if !interactive {
        return indicatif::ProgressBar::hidden();
    }
    match total {
        Some(t) => {
            let pb = indicatif::ProgressBar::new(t);
            pb.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("    [{bar:40}] {bytes}/{total_bytes}")
                    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            pb
        }
        None => indicatif::ProgressBar::new_spinner(),
    }
}

/// The digest names cache directories, so it must be plain hex
fn check_sha256(dependency: &Dependency) -> AgentpackResult<()> {
    let sha256 = &dependency.sha256;
    if sha256.len() == 64 && sha256.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(AgentpackError::Configuration(format!(
            "sha256 of {} is not a 64 character hex digest: '{}'",
            dependency.id, sha256
        )))
    }
}

/// Fail with an integrity error unless the file hashes to the descriptor's sha256
fn verify(path: &Path, dependency: &Dependency) -> AgentpackResult<()> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(&dependency.sha256) {
        Ok(())
    } else {
        Err(AgentpackError::Integrity {
            id: dependency.id.clone(),
            expected: dependency.sha256.clone(),
            actual,
        })
    }
}

/// Hex sha256 of in-memory bytes
pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex sha256 of a file's contents
pub fn sha256_file(path: &Path) -> AgentpackResult<String> {
    let mut file =
        File::open(path).map_err(|e| AgentpackError::io(format!("opening {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| AgentpackError::io(format!("reading {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
