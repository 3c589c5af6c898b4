//! Zip extraction

use super::{create_dir, create_parent, destination, reject_symlinked_path};
use crate::error::{AgentpackError, AgentpackResult};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::trace;
use zip::ZipArchive;

const FORMAT: &str = "zip";

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Extract a zip archive into `target`
///
/// The central directory sits at the end of a zip file, so the whole input
/// is buffered before entries are read.
pub fn extract_zip<R: Read>(
    mut reader: R,
    target: &Path,
    strip_components: usize,
) -> AgentpackResult<()> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| AgentpackError::extraction(FORMAT, e))?;

    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| AgentpackError::extraction(FORMAT, e))?;

    create_dir(target)?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| AgentpackError::extraction(FORMAT, e))?;

        let name = PathBuf::from(file.name());
        let Some(dest) = destination(target, &name, strip_components)? else {
            continue;
        };
        reject_symlinked_path(target, &dest)?;

        if file.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            trace!(path = %name.display(), "Skipping zip symlink");
            continue;
        }

        if file.is_dir() {
            create_dir(&dest)?;
            continue;
        }

        create_parent(&dest)?;
        let mut out = File::create(&dest)
            .map_err(|e| AgentpackError::io(format!("creating {}", dest.display()), e))?;
        std::io::copy(&mut file, &mut out).map_err(|e| AgentpackError::extraction(FORMAT, e))?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode & 0o777))
                .map_err(|e| {
                    AgentpackError::io(format!("setting permissions on {}", dest.display()), e)
                })?;
        }
    }

    Ok(())
}
