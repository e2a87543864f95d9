//! Content-module assembly.
//!
//! Transforms one decoded resource tree into a module archive laid out the
//! way the bundler expects: linked proto resources at the root, the
//! manifest under `manifest/`, assets/libs alongside, loose files under
//! `root/`, and code units under `dex/`. Resource compilation is the one
//! documented best-effort step: some legacy trees contain file names the
//! compiler rejects without affecting runtime correctness.

use std::path::Path;

use super::super::analyzer::{MANIFEST_FILE, PackageInfo};
use super::super::archive;
use super::super::context::BuildEnv;
use super::super::error::{ErrorExt, Result};
use super::super::fsutil;
use super::super::task::{FailurePolicy, run_task, run_task_with};
use super::super::tools;

/// Suffixes of signature files a module must never carry.
const SIGNATURE_SUFFIXES: &[&str] = &[".RSA", ".DSA", ".EC", ".SF", ".MF"];

/// One content-module build order.
#[derive(Debug)]
pub struct ContentModuleJob<'a> {
    /// Module name; becomes the archive stem and staging directory name.
    pub name: &'a str,
    /// Decoded resource tree the module is assembled from.
    pub source: &'a Path,
    /// Scratch directory for this module's intermediates.
    pub staging_dir: &'a Path,
    /// Output archive path.
    pub out_archive: &'a Path,
    /// Stable resource-id mapping handed to the linker, when present.
    pub stable_ids: Option<&'a Path>,
}

/// Builds one content module into its archive.
pub async fn build(
    env: BuildEnv<'_>,
    package: &PackageInfo,
    job: ContentModuleJob<'_>,
) -> Result<()> {
    let name = job.name;
    fsutil::create_dir_all(job.staging_dir).await?;

    let staging = job.staging_dir.join(name);
    let linked = job.staging_dir.join(format!("{name}.apk"));
    let compiled = job.staging_dir.join("compiled_resources.zip");

    // 1. Compile resources, best effort.
    let res_dir = job.source.join("res");
    let mut compiled_res = None;
    if res_dir.is_dir() {
        let outcome = run_task_with(
            env.reporter,
            env.cancel,
            &format!("[{name}] compile resources"),
            FailurePolicy::Continue,
            tools::compile_resources(&env.tools.aapt2, &res_dir, &compiled),
        )
        .await?;
        if outcome.is_some() && compiled.is_file() {
            compiled_res = Some(compiled.as_path());
        } else {
            log::warn!("[{name}] continuing without compiled resources");
        }
    }

    // 2. Link, fatal.
    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] link resources"),
        tools::link_resources(
            &env.tools.aapt2,
            tools::LinkRequest {
                out: &linked,
                manifest: &job.source.join(MANIFEST_FILE),
                android_jar: &env.tools.android_jar,
                package,
                compiled_res,
                stable_ids: job.stable_ids,
            },
        ),
    )
    .await?;

    // 3. The unarchived package is the canonical module layout root.
    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] unpack linked package"),
        archive::unzip(&linked, &staging),
    )
    .await?;

    // 4. Manifest moves under manifest/; the root stays for split config.
    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] relocate manifest"),
        fsutil::move_any(
            &staging.join(MANIFEST_FILE),
            &staging.join("manifest").join(MANIFEST_FILE),
        ),
    )
    .await?;

    // 5-8. Optional subtrees; absence contributes nothing.
    let copies: [(&str, &str, &str); 4] = [
        ("assets", "assets", "copy assets"),
        ("lib", "lib", "copy native libraries"),
        ("unknown", "root", "copy extra files"),
        ("kotlin", "root/kotlin", "copy kotlin runtime"),
    ];
    for (src_rel, dest_rel, label) in copies {
        let src = job.source.join(src_rel);
        if !src.exists() {
            log::debug!("[{name}] {src_rel} absent, skipping");
            continue;
        }
        run_task(
            env.reporter,
            env.cancel,
            &format!("[{name}] {label}"),
            fsutil::copy_any(&src, &staging.join(dest_rel)),
        )
        .await?;
    }

    // 9. Original signing metadata, minus any stale signature files.
    let meta_inf = job.source.join("original").join("META-INF");
    if meta_inf.exists() {
        run_task(
            env.reporter,
            env.cancel,
            &format!("[{name}] copy META-INF"),
            copy_meta_inf(&meta_inf, &staging.join("root").join("META-INF")),
        )
        .await?;
    }

    // 10. Top-level code units into the module-local dex directory.
    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] copy dex files"),
        copy_dex(job.source, &staging.join("dex")),
    )
    .await?;

    // 11. Archive the staging tree.
    run_task(
        env.reporter,
        env.cancel,
        &format!("[{name}] archive module"),
        archive::zip_dir(&staging, job.out_archive, None),
    )
    .await
}

/// True for files that belong to an archive signature.
fn is_signature_file(file_name: &str) -> bool {
    SIGNATURE_SUFFIXES
        .iter()
        .any(|suffix| file_name.to_ascii_uppercase().ends_with(suffix))
}

/// Copies the original `META-INF/` tree, skipping signature files.
async fn copy_meta_inf(src: &Path, dest: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(src)
        .await
        .fs_context("listing META-INF", src)?;
    while let Some(entry) = entries.next_entry().await.fs_context("listing META-INF", src)? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if is_signature_file(&file_name) {
            log::debug!("dropping stale signature file {file_name}");
            continue;
        }
        fsutil::copy_any(&entry.path(), &dest.join(&file_name)).await?;
    }
    Ok(())
}

/// Copies every top-level `*.dex` file into the module's dex directory.
async fn copy_dex(source: &Path, dex_dir: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(source)
        .await
        .fs_context("listing resource tree", source)?;
    while let Some(entry) = entries.next_entry().await.fs_context("listing resource tree", source)? {
        let path = entry.path();
        let is_dex = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dex"));
        if !is_dex {
            continue;
        }
        let file_name = entry.file_name();
        fsutil::copy_any(&path, &dex_dir.join(&file_name)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_suffixes_are_matched_case_insensitively() {
        assert!(is_signature_file("CERT.RSA"));
        assert!(is_signature_file("cert.rsa"));
        assert!(is_signature_file("CERT.SF"));
        assert!(is_signature_file("MANIFEST.MF"));
        assert!(!is_signature_file("services.txt"));
        assert!(!is_signature_file("kotlin_module.list"));
    }

    #[tokio::test]
    async fn meta_inf_copy_drops_signature_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("META-INF");
        tokio::fs::create_dir_all(src.join("services")).await.unwrap();
        for name in ["CERT.RSA", "CERT.SF", "MANIFEST.MF", "services.txt"] {
            tokio::fs::write(src.join(name), b"x").await.unwrap();
        }
        tokio::fs::write(src.join("services/provider"), b"p").await.unwrap();

        let dest = dir.path().join("root/META-INF");
        copy_meta_inf(&src, &dest).await.unwrap();

        assert!(dest.join("services.txt").is_file());
        assert!(dest.join("services/provider").is_file());
        assert!(!dest.join("CERT.RSA").exists());
        assert!(!dest.join("CERT.SF").exists());
        assert!(!dest.join("MANIFEST.MF").exists());
    }

    #[tokio::test]
    async fn dex_copy_takes_only_top_level_dex_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("decoded");
        tokio::fs::create_dir_all(src.join("unknown")).await.unwrap();
        tokio::fs::write(src.join("classes.dex"), b"d1").await.unwrap();
        tokio::fs::write(src.join("classes2.dex"), b"d2").await.unwrap();
        tokio::fs::write(src.join("apktool.yml"), b"meta").await.unwrap();
        tokio::fs::write(src.join("unknown/extra.dex"), b"nested").await.unwrap();

        let dex_dir = dir.path().join("dex");
        copy_dex(&src, &dex_dir).await.unwrap();

        assert!(dex_dir.join("classes.dex").is_file());
        assert!(dex_dir.join("classes2.dex").is_file());
        assert!(!dex_dir.join("extra.dex").exists());
        assert!(!dex_dir.join("apktool.yml").exists());
    }

    #[tokio::test]
    async fn no_dex_files_creates_no_dex_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("decoded");
        tokio::fs::create_dir_all(&src).await.unwrap();

        let dex_dir = dir.path().join("dex");
        copy_dex(&src, &dex_dir).await.unwrap();
        assert!(!dex_dir.exists());
    }
}
