//! Destination file naming and directory preparation for downloads.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use thiserror::Error;
use tilegrid_core::RegionCoordinate;

/// File name the basemap package is downloaded to.
pub(crate) const BASEMAP_FILENAME: &str = "basemap.tiles";

/// Errors raised while preparing a download destination.
#[derive(Debug, Error)]
pub enum DestinationError {
    /// The destination directory could not be created.
    #[error("failed to create download directory {path:?}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A stale partial file at the destination could not be deleted.
    #[error("failed to delete stale download at {path:?}")]
    RemoveStale {
        /// Path of the stale file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Destination file for a region's main tile package.
pub(crate) fn map_destination(directory: &Utf8Path, coordinate: RegionCoordinate) -> Utf8PathBuf {
    directory.join(format!("{coordinate}.tiles"))
}

/// Destination file for a region's hillshade package.
pub(crate) fn hillshade_destination(
    directory: &Utf8Path,
    coordinate: RegionCoordinate,
) -> Utf8PathBuf {
    directory.join(format!("{coordinate}.hillshade"))
}

/// Destination file for the basemap package.
pub(crate) fn basemap_destination(directory: &Utf8Path) -> Utf8PathBuf {
    directory.join(BASEMAP_FILENAME)
}

/// Make `path` ready to receive a fresh download: create its parent
/// directory when missing and delete any stale partial file left by an
/// earlier attempt, so the job manager neither appends to nor rejects on
/// leftovers.
pub(crate) fn prepare_destination(path: &Utf8Path) -> Result<(), DestinationError> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }
    match std::fs::remove_file(path.as_std_path()) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(DestinationError::RemoveStale {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Create `path` and its missing ancestors.
pub(crate) fn ensure_directory(path: &Utf8Path) -> Result<(), DestinationError> {
    if path.as_os_str().is_empty() || path == Utf8Path::new("/") {
        return Ok(());
    }

    let (base, relative) = if path.is_absolute() {
        ("/", path.strip_prefix("/").unwrap_or(path))
    } else {
        (".", path)
    };
    let dir = fs_utf8::Dir::open_ambient_dir(base, ambient_authority()).map_err(|source| {
        DestinationError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        }
    })?;
    dir.create_dir_all(relative)
        .map_err(|source| DestinationError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn coordinate(x: u8, y: u8) -> RegionCoordinate {
        RegionCoordinate::new(x, y).expect("test coordinate should be valid")
    }

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path")
    }

    #[rstest]
    fn destinations_encode_the_coordinate() {
        let directory = Utf8Path::new("/downloads");
        assert_eq!(
            map_destination(directory, coordinate(3, 5)),
            Utf8PathBuf::from("/downloads/3-5.tiles")
        );
        assert_eq!(
            hillshade_destination(directory, coordinate(3, 5)),
            Utf8PathBuf::from("/downloads/3-5.hillshade")
        );
        assert_eq!(
            basemap_destination(directory),
            Utf8PathBuf::from("/downloads/basemap.tiles")
        );
    }

    #[rstest]
    fn prepare_creates_missing_directories() {
        let temp = TempDir::new().expect("create temp dir");
        let destination = utf8(&temp).join("nested/deeper/3-5.tiles");

        prepare_destination(&destination).expect("prepare destination");

        assert!(destination.parent().expect("parent").exists());
        assert!(!destination.exists());
    }

    #[rstest]
    fn prepare_deletes_stale_partial_files() {
        let temp = TempDir::new().expect("create temp dir");
        let destination = utf8(&temp).join("3-5.tiles");
        std::fs::write(destination.as_std_path(), b"partial").expect("write stale file");

        prepare_destination(&destination).expect("prepare destination");

        assert!(!destination.exists());
    }
}
