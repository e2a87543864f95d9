//! Asset-pack descriptor synthesis.
//!
//! An asset-pack module carries a binary `assets.pb` document enumerating
//! its asset directories together with their targeting metadata. The
//! default path partitions nothing, so every directory gets empty
//! targeting. The message layout follows the bundle tooling's
//! `files.proto`.

use std::path::{Path, PathBuf};

use prost::Message;

use super::super::error::{Error, ErrorExt, Result};

/// Descriptor file name at the asset-pack module root.
pub const DESCRIPTOR_FILE: &str = "assets.pb";

/// Top-level assets descriptor.
#[derive(Clone, PartialEq, Message)]
pub struct Assets {
    /// One entry per asset directory that directly contains files.
    #[prost(message, repeated, tag = "1")]
    pub directory: Vec<TargetedAssetsDirectory>,
}

/// One asset directory and its targeting.
#[derive(Clone, PartialEq, Message)]
pub struct TargetedAssetsDirectory {
    /// Module-relative directory path, forward-slash separated.
    #[prost(string, tag = "1")]
    pub path: String,
    /// Device/country/language targeting; empty in the default path.
    #[prost(message, optional, tag = "2")]
    pub targeting: Option<AssetsDirectoryTargeting>,
}

/// Targeting dimensions of one asset directory.
#[derive(Clone, PartialEq, Message)]
pub struct AssetsDirectoryTargeting {}

/// Collects every directory under `assets/` that directly contains at
/// least one file, as sorted module-relative forward-slash paths.
fn collect_asset_directories(module_dir: &Path) -> Result<Vec<String>> {
    let mut dirs = Vec::new();
    for entry in walkdir::WalkDir::new(module_dir) {
        let entry =
            entry.map_err(|e| Error::Generic(format!("walking {}: {e}", module_dir.display())))?;
        if !entry.file_type().is_dir() || entry.path() == module_dir {
            continue;
        }
        let has_direct_file = std::fs::read_dir(entry.path())
            .fs_context("listing asset directory", entry.path())?
            .filter_map(|e| e.ok())
            .any(|e| e.path().is_file());
        if !has_direct_file {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(module_dir)
            .map_err(|e| Error::Generic(format!("stripping prefix: {e}")))?
            .to_string_lossy()
            .replace('\\', "/");
        if rel == "assets" || rel.starts_with("assets/") {
            dirs.push(rel);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Synthesizes the descriptor for a prepared asset-pack module and writes
/// it to the module root. Returns the descriptor path.
pub async fn write_descriptor(module_dir: &Path) -> Result<PathBuf> {
    let module_dir = module_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let directory = collect_asset_directories(&module_dir)?
            .into_iter()
            .map(|path| TargetedAssetsDirectory {
                path,
                targeting: Some(AssetsDirectoryTargeting {}),
            })
            .collect();
        let descriptor = Assets { directory };
        let out = module_dir.join(DESCRIPTOR_FILE);
        std::fs::write(&out, descriptor.encode_to_vec()).fs_context("writing descriptor", &out)?;
        Ok(out)
    })
    .await
    .map_err(|e| Error::Generic(format!("descriptor task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_matches_the_wire_format() {
        let descriptor = Assets {
            directory: vec![TargetedAssetsDirectory {
                path: "assets/x".to_string(),
                targeting: Some(AssetsDirectoryTargeting {}),
            }],
        };
        // field 1 (directory): nested message of a path string plus an
        // empty targeting message.
        let mut expected = vec![0x0a, 12, 0x0a, 8];
        expected.extend_from_slice(b"assets/x");
        expected.extend_from_slice(&[0x12, 0]);
        assert_eq!(descriptor.encode_to_vec(), expected);
    }

    #[tokio::test]
    async fn only_nonempty_asset_directories_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path();
        for sub in ["assets/video", "assets/empty", "manifest"] {
            tokio::fs::create_dir_all(module.join(sub)).await.unwrap();
        }
        tokio::fs::write(module.join("assets/video/intro.mp4"), b"v").await.unwrap();
        tokio::fs::write(module.join("assets/top.bin"), b"t").await.unwrap();
        tokio::fs::write(module.join("manifest/AndroidManifest.xml"), b"<m/>")
            .await
            .unwrap();

        let dirs = collect_asset_directories(module).unwrap();
        assert_eq!(dirs, vec!["assets".to_string(), "assets/video".to_string()]);
    }

    #[tokio::test]
    async fn descriptor_is_written_at_the_module_root() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("assets")).await.unwrap();
        tokio::fs::write(dir.path().join("assets/a.bin"), b"a").await.unwrap();

        let out = write_descriptor(dir.path()).await.unwrap();
        assert_eq!(out, dir.path().join(DESCRIPTOR_FILE));

        let bytes = tokio::fs::read(&out).await.unwrap();
        let decoded = Assets::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.directory.len(), 1);
        assert_eq!(decoded.directory[0].path, "assets");
    }
}
