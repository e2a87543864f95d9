//! Zip archive creation and extraction for module staging trees.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::error::{Error, ErrorExt, Result};

/// Archives a directory into a zip file.
///
/// Entry names are the forward-slash relative paths under `src`. When
/// `prefix` is given every entry is nested under it, and when `dest` already
/// exists the entries are appended to the existing archive instead of
/// replacing it, which is how asset-pack modules are inserted into a bundle
/// the external bundler has already produced.
pub async fn zip_dir(src: &Path, dest: &Path, prefix: Option<&str>) -> Result<()> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();
    let prefix = prefix.map(str::to_owned);

    tokio::task::spawn_blocking(move || write_zip(&src, &dest, prefix.as_deref()))
        .await
        .map_err(|e| Error::Generic(format!("archive task panicked: {e}")))?
}

fn write_zip(src: &Path, dest: &Path, prefix: Option<&str>) -> Result<()> {
    let mut writer = if dest.exists() {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(dest)
            .fs_context("opening archive for append", dest)?;
        ZipWriter::new_append(file)?
    } else {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).fs_context("creating archive parent", parent)?;
        }
        ZipWriter::new(File::create(dest).fs_context("creating archive", dest)?)
    };

    let options = SimpleFileOptions::default();
    let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(src)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    entries.sort();

    for path in entries {
        let rel = path
            .strip_prefix(src)
            .map_err(|e| Error::Generic(format!("stripping archive prefix: {e}")))?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        let name = match prefix {
            Some(prefix) => format!("{prefix}/{rel}"),
            None => rel,
        };
        writer.start_file(name, options)?;
        let mut file = File::open(&path).fs_context("opening file for archiving", &path)?;
        io::copy(&mut file, &mut writer).fs_context("writing archive entry", &path)?;
    }

    writer.finish()?;
    Ok(())
}

/// Extracts a zip archive into a directory, creating it as needed.
pub async fn unzip(archive: &Path, dest: &Path) -> Result<()> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = File::open(&archive).fs_context("opening archive", &archive)?;
        let mut zip = ZipArchive::new(file)?;
        zip.extract(&dest)?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Generic(format!("extraction task panicked: {e}")))?
}

/// Lists the entry names of an archive, in archive order.
pub async fn entry_names(archive: &Path) -> Result<Vec<String>> {
    let archive = archive.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = File::open(&archive).fs_context("opening archive", &archive)?;
        let zip = ZipArchive::new(file)?;
        Ok(zip.file_names().map(str::to_owned).collect())
    })
    .await
    .map_err(|e| Error::Generic(format!("archive listing task panicked: {e}")))?
}
