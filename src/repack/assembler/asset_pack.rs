//! Asset-pack module assembly.
//!
//! An asset-pack module is prepared in place: its template manifest is
//! linked into a proto-format manifest, relocated under `manifest/`, and a
//! binary assets descriptor is synthesized at the module root. No code,
//! libraries, or dex units are included. The prepared directory is later
//! appended into the bundle by the orchestrator.

use std::path::Path;

use super::super::analyzer::MANIFEST_FILE;
use super::super::archive;
use super::super::context::BuildEnv;
use super::super::error::Result;
use super::super::fsutil;
use super::super::task::run_task;
use super::super::tools;
use super::descriptor;

/// One asset-pack build order.
#[derive(Debug)]
pub struct AssetPackJob<'a> {
    /// Module name.
    pub name: &'a str,
    /// Module directory holding the template manifest and relocated assets.
    pub module_dir: &'a Path,
    /// Scratch directory for this module's intermediates.
    pub staging_dir: &'a Path,
}

/// Prepares one asset-pack module in place.
pub async fn build(env: BuildEnv<'_>, job: AssetPackJob<'_>) -> Result<()> {
    let name = job.name;
    fsutil::create_dir_all(job.staging_dir).await?;

    let linked = job.staging_dir.join(format!("{name}.apk"));
    let unpacked = job.staging_dir.join(name);
    let template_manifest = job.module_dir.join(MANIFEST_FILE);

    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] link manifest"),
        tools::link_manifest(
            &env.tools.aapt2,
            &linked,
            &template_manifest,
            &env.tools.android_jar,
        ),
    )
    .await?;

    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] unpack linked package"),
        archive::unzip(&linked, &unpacked),
    )
    .await?;

    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] relocate manifest"),
        fsutil::move_any(
            &unpacked.join(MANIFEST_FILE),
            &job.module_dir.join("manifest").join(MANIFEST_FILE),
        ),
    )
    .await?;

    // The template served only as linker input.
    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] remove template manifest"),
        fsutil::remove_any(&template_manifest),
    )
    .await?;

    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] write assets descriptor"),
        async {
            descriptor::write_descriptor(job.module_dir).await.map(|_| ())
        },
    )
    .await
}
