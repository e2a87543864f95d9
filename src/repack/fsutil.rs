//! Filesystem primitives for staging module trees.
//!
//! All operations are idempotent the way the pipeline needs them to be:
//! a missing source is not an error (an optional subtree that simply is not
//! there), and an existing destination is replaced rather than merged.

use std::io;
use std::path::Path;

use tokio::fs;

use super::error::{Error, ErrorExt, Result};

/// Makes a symbolic link to a directory.
#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a directory.
#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(unix)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(windows)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

/// Creates all of the directories of the specified path.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Removes a file or directory tree if it exists.
pub async fn remove_any(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::Fs {
            context: "inspecting path for removal",
            path: path.to_path_buf(),
            source: e,
        }),
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Fs {
            context: "removing path",
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Copies a file or directory tree, replacing any existing destination.
///
/// A missing source is a no-op: optional subtrees of the decoded package
/// contribute nothing when absent. Directory copies preserve symlinks.
pub async fn copy_any(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        log::debug!("skipping copy, source absent: {}", from.display());
        return Ok(());
    }
    remove_any(to).await?;
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating destination parent", parent)?;
    }
    if from.is_dir() {
        copy_dir(from, to).await
    } else {
        fs::copy(from, to)
            .await
            .fs_context("copying file", from)
            .map(|_| ())
    }
}

/// Moves a file or directory tree, replacing any existing destination.
///
/// Missing sources are a no-op, same as [`copy_any`].
pub async fn move_any(from: &Path, to: &Path) -> Result<()> {
    copy_any(from, to).await?;
    remove_any(from).await
}

/// Recursively copies a directory, preserving symlinks.
async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    let from = from.to_path_buf();
    let to = to.to_path_buf();

    // Blocking traversal is offloaded to the dedicated thread pool.
    tokio::task::spawn_blocking(move || {
        for entry in walkdir::WalkDir::new(&from) {
            let entry = entry
                .map_err(|e| Error::Generic(format!("walking {}: {e}", from.display())))?;
            let rel_path = entry
                .path()
                .strip_prefix(&from)
                .map_err(|e| Error::Generic(format!("stripping prefix: {e}")))?;
            let dest_path = to.join(rel_path);

            if entry.file_type().is_symlink() {
                let target = std::fs::read_link(entry.path())
                    .fs_context("reading symlink", entry.path())?;
                let linked = if entry.path().is_dir() {
                    symlink_dir(&target, &dest_path)
                } else {
                    symlink_file(&target, &dest_path)
                };
                linked.fs_context("recreating symlink", &dest_path)?;
            } else if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest_path)
                    .fs_context("creating directory", &dest_path)?;
            } else {
                std::fs::copy(entry.path(), &dest_path)
                    .fs_context("copying file", entry.path())?;
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::Generic(format!("directory copy task panicked: {e}")))?
}

/// Reads a UTF-8 text file.
pub async fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .fs_context("reading file", path)
}

/// Writes a UTF-8 text file, creating parent directories as needed.
pub async fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating parent directory", parent)?;
    }
    fs::write(path, text)
        .await
        .fs_context("writing file", path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copy_of_missing_source_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("dest");
        copy_any(&dir.path().join("nope"), &dest).await.unwrap();
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn copy_replaces_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        tokio::fs::create_dir_all(src.join("sub")).await.unwrap();
        tokio::fs::write(src.join("sub/a.txt"), b"new").await.unwrap();
        tokio::fs::create_dir_all(&dest).await.unwrap();
        tokio::fs::write(dest.join("stale.txt"), b"old").await.unwrap();

        copy_any(&src, &dest).await.unwrap();

        assert!(!dest.join("stale.txt").exists());
        assert_eq!(tokio::fs::read(dest.join("sub/a.txt")).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn move_removes_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.bin");
        let dest = dir.path().join("nested/b.bin");
        tokio::fs::write(&src, b"payload").await.unwrap();

        move_any(&src, &dest).await.unwrap();

        assert!(!src.exists());
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone");
        remove_any(&path).await.unwrap();
        tokio::fs::create_dir_all(&path).await.unwrap();
        remove_any(&path).await.unwrap();
        remove_any(&path).await.unwrap();
        assert!(!path.exists());
    }
}
