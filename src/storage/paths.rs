use std::path::{Path, PathBuf};

/// Folder holding the record store snapshot.
#[inline]
pub fn records_dir(data_dir: &Path) -> PathBuf { data_dir.join("records") }

/// Folder holding uploaded objects.
#[inline]
pub fn objects_dir(data_dir: &Path) -> PathBuf { data_dir.join("objects") }

#[inline]
pub(crate) fn snapshot_path(records_dir: &Path) -> PathBuf { records_dir.join("snapshot.bin") }
