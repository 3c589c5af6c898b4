//! Tar extraction behind gzip and bzip2 decoders

use super::{create_dir, create_parent, destination, reject_symlinked_path};
use crate::error::{AgentpackError, AgentpackResult};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use tar::{Archive, EntryType};
use tracing::trace;

/// Extract a gzip-compressed tar archive into `target`
pub fn extract_tar_gz<R: Read>(
    reader: R,
    target: &Path,
    strip_components: usize,
) -> AgentpackResult<()> {
    extract_tar(GzDecoder::new(reader), target, strip_components, "tar+gzip")
}

/// Extract a bzip2-compressed tar archive into `target`
pub fn extract_tar_bz2<R: Read>(
    reader: R,
    target: &Path,
    strip_components: usize,
) -> AgentpackResult<()> {
    extract_tar(BzDecoder::new(reader), target, strip_components, "tar+bzip2")
}

fn extract_tar<R: Read>(
    reader: R,
    target: &Path,
    strip_components: usize,
    format: &'static str,
) -> AgentpackResult<()> {
    create_dir(target)?;

    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| AgentpackError::extraction(format, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| AgentpackError::extraction(format, e))?;
        let path = entry
            .path()
            .map_err(|e| AgentpackError::extraction(format, e))?
            .into_owned();

        let Some(dest) = destination(target, &path, strip_components)? else {
            continue;
        };
        reject_symlinked_path(target, &dest)?;

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            create_dir(&dest)?;
            continue;
        }

        create_parent(&dest)?;

        if kind.is_symlink() || kind.is_hard_link() {
            let link = entry
                .link_name()
                .map_err(|e| AgentpackError::extraction(format, e))?
                .ok_or_else(|| AgentpackError::extraction(format, "link entry without a target"))?
                .into_owned();
            if kind.is_symlink() {
                symlink(target, &dest, &link)?;
            } else {
                let source = destination(target, &link, strip_components)?.ok_or_else(|| {
                    AgentpackError::PathTraversal {
                        entry: link.clone(),
                        target: target.to_path_buf(),
                    }
                })?;
                reject_symlinked_path(target, &source)?;
                std::fs::hard_link(&source, &dest).map_err(|e| {
                    AgentpackError::io(format!("linking {}", dest.display()), e)
                })?;
            }
            continue;
        }

        if !(kind.is_file() || kind == EntryType::Continuous) {
            trace!(path = %path.display(), "Skipping special tar entry");
            continue;
        }

        entry
            .unpack(&dest)
            .map_err(|e| AgentpackError::extraction(format, e))?;
    }

    Ok(())
}

/// Recreate a symlink, refusing targets that leave the extraction root
fn symlink(target: &Path, dest: &Path, link: &Path) -> AgentpackResult<()> {
    let parent = dest
        .parent()
        .and_then(|p| p.strip_prefix(target).ok())
        .unwrap_or_else(|| Path::new(""));
    if destination(target, &parent.join(link), 0).is_err() {
        return Err(AgentpackError::PathTraversal {
            entry: dest.to_path_buf(),
            target: target.to_path_buf(),
        });
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(link, dest)
        .map_err(|e| AgentpackError::io(format!("linking {}", dest.display()), e))?;

    #[cfg(not(unix))]
    trace!(path = %dest.display(), "Skipping symlink on this platform");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tar_bz2_bytes, tar_gz_bytes, Entry};
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Three leading segments above each file
    fn nested() -> Vec<Entry> {
        vec![
            Entry::dir("a/"),
            Entry::dir("a/b/"),
            Entry::dir("a/b/c/"),
            Entry::file("a/b/c/file.txt", b"content"),
        ]
    }

    #[test]
    fn strip_one_less_than_depth_keeps_last_directory() {
        let temp = TempDir::new().unwrap();
        extract_tar_gz(Cursor::new(tar_gz_bytes(&nested())), temp.path(), 2).unwrap();

        assert_eq!(
            std::fs::read(temp.path().join("c/file.txt")).unwrap(),
            b"content"
        );
        assert!(!temp.path().join("a").exists());
    }

    #[test]
    fn strip_equal_to_depth_flattens() {
        let temp = TempDir::new().unwrap();
        extract_tar_gz(Cursor::new(tar_gz_bytes(&nested())), temp.path(), 3).unwrap();

        assert!(temp.path().join("file.txt").is_file());
        assert!(!temp.path().join("c").exists());
    }

    #[test]
    fn strip_beyond_depth_extracts_nothing() {
        let temp = TempDir::new().unwrap();
        extract_tar_gz(Cursor::new(tar_gz_bytes(&nested())), temp.path(), 5).unwrap();

        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn strip_beyond_depth_is_deterministic() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let archive = tar_gz_bytes(&nested());

        extract_tar_gz(Cursor::new(archive.clone()), first.path(), 4).unwrap();
        extract_tar_gz(Cursor::new(archive), second.path(), 4).unwrap();

        assert_eq!(std::fs::read_dir(first.path()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(second.path()).unwrap().count(), 0);
    }

    #[test]
    fn extracts_bzip2_with_strip() {
        let temp = TempDir::new().unwrap();
        let archive = tar_bz2_bytes(&[
            Entry::dir("appdynamics-php-agent-linux_x64/"),
            Entry::executable("appdynamics-php-agent-linux_x64/install.sh", b"#!/bin/sh\n"),
        ]);

        extract_tar_bz2(Cursor::new(archive), temp.path(), 1).unwrap();

        assert!(temp.path().join("install.sh").is_file());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(temp.path().join("install.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn rejects_parent_traversal() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target");
        let archive = tar_gz_bytes(&[Entry::file("../escape.txt", b"x")]);

        let err = extract_tar_gz(Cursor::new(archive), &target, 0).unwrap_err();
        assert!(matches!(err, AgentpackError::PathTraversal { .. }));
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_escaping_symlink() {
        let temp = TempDir::new().unwrap();
        let archive = tar_gz_bytes(&[Entry::symlink("lib/evil", "../../outside")]);

        let err = extract_tar_gz(Cursor::new(archive), temp.path(), 0).unwrap_err();
        assert!(matches!(err, AgentpackError::PathTraversal { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_writes_through_chained_symlinks() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target");
        let archive = tar_gz_bytes(&[
            Entry::symlink("e", "."),
            Entry::symlink("e/e/w", "../outside"),
            Entry::file("w/evil", b"x"),
        ]);

        let err = extract_tar_gz(Cursor::new(archive), &target, 0).unwrap_err();
        assert!(matches!(err, AgentpackError::PathTraversal { .. }));
        assert!(!temp.path().join("outside").exists());
        assert!(!temp.path().join("outside/evil").exists());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_file_below_symlinked_directory() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target");
        let archive = tar_gz_bytes(&[
            Entry::dir("conf/"),
            Entry::symlink("current", "conf"),
            Entry::file("current/app.properties", b"x"),
        ]);

        let err = extract_tar_gz(Cursor::new(archive), &target, 0).unwrap_err();
        assert!(matches!(err, AgentpackError::PathTraversal { .. }));
        assert!(!target.join("conf/app.properties").exists());
    }

    #[cfg(unix)]
    #[test]
    fn keeps_internal_symlink() {
        let temp = TempDir::new().unwrap();
        let archive = tar_gz_bytes(&[
            Entry::file("lib/real.so", b"elf"),
            Entry::symlink("lib/current.so", "real.so"),
        ]);

        extract_tar_gz(Cursor::new(archive), temp.path(), 0).unwrap();

        assert_eq!(
            std::fs::read(temp.path().join("lib/current.so")).unwrap(),
            b"elf"
        );
    }

    #[test]
    fn corrupt_input_is_extraction_error() {
        let temp = TempDir::new().unwrap();
        let err =
            extract_tar_gz(Cursor::new(b"definitely not gzip".to_vec()), temp.path(), 0).unwrap_err();
        assert!(matches!(
            err,
            AgentpackError::Extraction {
                format: "tar+gzip",
                ..
            }
        ));
    }
}
