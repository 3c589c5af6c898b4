//! Archive extraction
//!
//! Unpacks zip, tar+gzip and tar+bzip2 archives into a target directory.
//! All three formats share one path policy:
//!
//! - the first `strip_components` segments of each entry path are dropped;
//!   an entry with no segments left is skipped, never an error
//! - absolute paths, and `..` segments that climb out of the target, fail
//!   with a path traversal error
//! - directories are created `0755`; file modes stored in the archive are
//!   kept on Unix
//!
//! Extraction reads the input once; there is no resumption after failure.

mod tarball;
mod zipfile;

pub use tarball::{extract_tar_bz2, extract_tar_gz};
pub use zipfile::extract_zip;

use crate::error::{AgentpackError, AgentpackResult};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarBz2,
}

impl ArchiveFormat {
    /// Short name used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar+gzip",
            Self::TarBz2 => "tar+bzip2",
        }
    }

    /// Extract `reader` into `target` in this format
    pub fn extract<R: Read>(
        &self,
        reader: R,
        target: &Path,
        strip_components: usize,
    ) -> AgentpackResult<()> {
        match self {
            Self::Zip => extract_zip(reader, target, strip_components),
            Self::TarGz => extract_tar_gz(reader, target, strip_components),
            Self::TarBz2 => extract_tar_bz2(reader, target, strip_components),
        }
    }
}

/// Map an archive entry path to its destination under `target`
///
/// Returns `None` when stripping leaves nothing of the path.
pub(crate) fn destination(
    target: &Path,
    entry: &Path,
    strip_components: usize,
) -> AgentpackResult<Option<PathBuf>> {
    let traversal = || AgentpackError::PathTraversal {
        entry: entry.to_path_buf(),
        target: target.to_path_buf(),
    };

    let mut segments = Vec::new();
    for component in entry.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return Err(traversal()),
            Component::CurDir => {}
            other => segments.push(other),
        }
    }

    let mut relative = PathBuf::new();
    let mut depth = 0usize;
    for component in segments.into_iter().skip(strip_components) {
        match component {
            Component::ParentDir => {
                if depth == 0 {
                    return Err(traversal());
                }
                relative.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                relative.push(part);
                depth += 1;
            }
            _ => {}
        }
    }

    if depth == 0 {
        return Ok(None);
    }
    Ok(Some(target.join(relative)))
}

/// Fail when any existing component of `dest` below `target` is a symlink
///
/// Writes through a symlink laid down by an earlier entry could land outside
/// `target` even though the entry path itself is clean.
pub(crate) fn reject_symlinked_path(target: &Path, dest: &Path) -> AgentpackResult<()> {
    let traversal = || AgentpackError::PathTraversal {
        entry: dest.to_path_buf(),
        target: target.to_path_buf(),
    };

    let relative = dest.strip_prefix(target).map_err(|_| traversal())?;
    let mut current = target.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Err(traversal()),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}

/// Create a directory tree with standard permissions
pub(crate) fn create_dir(path: &Path) -> AgentpackResult<()> {
    std::fs::create_dir_all(path)
        .map_err(|e| AgentpackError::io(format!("creating {}", path.display()), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| AgentpackError::io(format!("setting permissions on {}", path.display()), e))?;
    }

    Ok(())
}

/// Ensure the parent of an entry destination exists
pub(crate) fn create_parent(path: &Path) -> AgentpackResult<()> {
    match path.parent() {
        Some(parent) if !parent.exists() => create_dir(parent),
        _ => Ok(()),
    }
}
