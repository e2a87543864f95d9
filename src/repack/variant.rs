//! Variant module preparation.
//!
//! A device-class variant is an asset-only module populated by relocating
//! regex-selected assets out of the primary module's tree. The scaffold is
//! a single manifest rendered from an embedded template; the selector is an
//! anchored prefix match against each asset's relative path.

use std::path::Path;

use regex::Regex;

use super::analyzer::MANIFEST_FILE;
use super::error::Result;
use super::fsutil;

/// Manifest template for an install-time asset-pack module.
const MODULE_MANIFEST_TEMPLATE: &str = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:dist="http://schemas.android.com/apk/distribution"
    package="$applicationId"
    split="$moduleName">
    <dist:module dist:type="asset-pack">
        <dist:fusing dist:include="true" />
        <dist:delivery>
            <dist:install-time />
        </dist:delivery>
    </dist:module>
</manifest>
"#;

/// Creates the variant module scaffold: a directory holding a manifest with
/// the module name and application id substituted in.
pub async fn create_scaffold(module_dir: &Path, module_name: &str, package: &str) -> Result<()> {
    let manifest = MODULE_MANIFEST_TEMPLATE
        .replace("$moduleName", module_name)
        .replace("$applicationId", package);
    fsutil::write_text(&module_dir.join(MANIFEST_FILE), &manifest).await
}

/// Relocates every asset whose relative path matches the selector from the
/// primary tree into the variant module, preserving the relative layout.
///
/// The match is anchored at the start of the relative path (leading
/// separator stripped), not a filename-only match. Returns the number of
/// relocated files; a selector matching nothing relocates nothing.
pub async fn relocate_assets(
    primary_dir: &Path,
    variant_dir: &Path,
    selector: &Regex,
) -> Result<usize> {
    let source_assets = primary_dir.join("assets");
    let target_assets = variant_dir.join("assets");
    if !source_assets.is_dir() {
        return Ok(0);
    }

    let mut selected = Vec::new();
    for entry in walkdir::WalkDir::new(&source_assets) {
        let entry = entry.map_err(|e| {
            super::error::Error::Generic(format!("walking {}: {e}", source_assets.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&source_assets)
            .map_err(|e| super::error::Error::Generic(format!("stripping prefix: {e}")))?
            .to_string_lossy()
            .replace('\\', "/");
        let rel = rel.trim_start_matches('/').to_string();
        if matches_prefix(selector, &rel) {
            selected.push(rel);
        }
    }

    for rel in &selected {
        fsutil::move_any(&source_assets.join(rel), &target_assets.join(rel)).await?;
    }
    log::info!(
        "relocated {} asset(s) into variant module {}",
        selected.len(),
        variant_dir.display()
    );
    Ok(selected.len())
}

/// Anchored prefix match: the pattern must match starting at offset zero.
fn matches_prefix(selector: &Regex, path: &str) -> bool {
    selector.find(path).is_some_and(|m| m.start() == 0)
}
