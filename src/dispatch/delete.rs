//! `delete` handler: mark installed packages for removal.
//!
//! The package manager removes every directory holding a [`DELETE_MARKER`]
//! file on its next pass; this module only drops the markers.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tracing::{error, info};

/// Marker file name created in each package directory.
pub const DELETE_MARKER: &str = "needDelete";

/// Create a [`DELETE_MARKER`] file in every directory below `root`.
///
/// `root` itself is not marked and symlinks are not followed. Returns the
/// number of directories marked.
///
/// # Errors
///
/// Returns the first I/O error hit while walking or creating markers.
pub fn mark_packages_for_deletion(root: &Path) -> io::Result<usize> {
    let mut marked = 0;
    mark_children(root, &mut marked)?;
    Ok(marked)
}

fn mark_children(dir: &Path, marked: &mut usize) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        File::create(path.join(DELETE_MARKER))?;
        *marked += 1;
        mark_children(&path, marked)?;
    }
    Ok(())
}

/// Run [`mark_packages_for_deletion`] on the blocking pool without waiting.
pub(crate) fn spawn_mark(root: PathBuf) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || match mark_packages_for_deletion(&root) {
        Ok(marked) => info!(root = %root.display(), marked, "packages marked for deletion"),
        Err(err) => error!(root = %root.display(), %err, "failed to mark packages for deletion"),
    })
}
