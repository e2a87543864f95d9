//! Temporary workspace holding every intermediate artifact of one run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use super::error::Result;
use super::fsutil;

/// File name of the unsigned bundle inside the workspace.
const BUNDLE_FILE: &str = "bundle.aab";

/// Disambiguates workspaces created within the same timestamp tick.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Uniquely named scratch directory, exclusive to one run.
///
/// Created before the first pipeline step; removed (best effort) after the
/// last step or on early failure. Removal failure is logged, not escalated.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates a fresh workspace under `parent`.
    pub async fn create(parent: &Path) -> Result<Self> {
        let name = format!(
            "aab-repack_{}_{}_{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            std::process::id(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let root = parent.join(name);
        fsutil::remove_any(&root).await?;
        fsutil::create_dir_all(&root).await?;
        fsutil::create_dir_all(&root.join("modules")).await?;
        log::debug!("workspace created at {}", root.display());
        Ok(Self { root })
    }

    /// Workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the decoder unpacks the input package.
    pub fn decoded_dir(&self) -> PathBuf {
        self.root.join("decoded")
    }

    /// Output archive path for a named content module.
    pub fn module_archive(&self, name: &str) -> PathBuf {
        self.root.join("modules").join(format!("{name}.zip"))
    }

    /// Scratch directory for assembling a named module.
    pub fn module_staging(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}_temp"))
    }

    /// Directory of a variant module scaffold.
    pub fn variant_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Stable resource-id mapping file.
    pub fn stable_ids_file(&self) -> PathBuf {
        self.root.join("public.txt")
    }

    /// Bundler compression configuration document.
    pub fn bundle_config_file(&self) -> PathBuf {
        self.root.join("BundleConfig.pb.json")
    }

    /// The bundle produced by the bundler, before signing.
    pub fn bundle_file(&self) -> PathBuf {
        self.root.join(BUNDLE_FILE)
    }

    /// Removes the workspace. Best effort: failure is logged only.
    pub async fn cleanup(&self) {
        if let Err(e) = fsutil::remove_any(&self.root).await {
            log::warn!("failed to remove workspace {}: {e}", self.root.display());
        } else {
            log::debug!("workspace removed: {}", self.root.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn workspaces_are_unique_and_cleaned_up() {
        let parent = tempfile::tempdir().unwrap();
        let a = Workspace::create(parent.path()).await.unwrap();
        let b = Workspace::create(parent.path()).await.unwrap();
        assert_ne!(a.root(), b.root());
        assert!(a.root().is_dir());

        a.cleanup().await;
        b.cleanup().await;
        assert!(!a.root().exists());
        assert!(!b.root().exists());
    }

    #[tokio::test]
    async fn cleanup_of_missing_workspace_does_not_panic() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::create(parent.path()).await.unwrap();
        tokio::fs::remove_dir_all(ws.root()).await.unwrap();
        ws.cleanup().await;
    }
}
