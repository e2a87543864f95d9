//! External tool invocation.
//!
//! Every collaborator (decoder, resource compiler/linker, bundler, signer)
//! runs out of process through [`Tool::invoke`]: a structured argument
//! vector, a single blocking attempt, and a captured exit status. The
//! adapter never interprets a non-zero status; the typed wrappers below
//! map one to [`Error::Tool`] for their specific command.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use super::analyzer::PackageInfo;
use super::context::{SigningConfig, ToolPaths};
use super::error::{Context, Error, Result};

/// One invocable external executable.
///
/// A `.jar` path is launched through `java -jar`; anything else is launched
/// directly. An optional wall-clock limit applies to each invocation.
#[derive(Debug, Clone)]
pub struct Tool {
    name: &'static str,
    path: PathBuf,
    timeout: Option<Duration>,
}

/// Captured outcome of one tool invocation.
#[derive(Debug)]
pub struct ToolInvocation {
    /// Exit status; -1 when the process was killed by a signal.
    pub status: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl Tool {
    /// Creates a tool from its display name and executable path.
    pub fn new(name: &'static str, path: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            name,
            path: path.into(),
            timeout,
        }
    }

    /// Tool display name used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Configured executable path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the tool is a jar launched through `java -jar`.
    pub fn is_jar(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
    }

    fn command(&self) -> Command {
        if self.is_jar() {
            let mut cmd = Command::new("java");
            cmd.arg("-jar").arg(&self.path);
            cmd
        } else {
            Command::new(&self.path)
        }
    }

    /// Runs the tool once with the given arguments and captures the result.
    ///
    /// Launch failures and timeouts are errors; a non-zero exit status is
    /// data for the caller to interpret.
    pub async fn invoke<I, S>(&self, args: I) -> Result<ToolInvocation>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command();
        cmd.args(args).kill_on_drop(true);
        log::debug!("invoking {}: {cmd:?}", self.name);

        let output_fut = cmd.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output_fut)
                .await
                .map_err(|_| Error::Timeout {
                    tool: self.name.to_string(),
                    timeout: limit,
                })?,
            None => output_fut.await,
        }
        .map_err(|source| Error::Spawn {
            tool: self.name.to_string(),
            source,
        })?;

        let invocation = ToolInvocation {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        log::debug!("{} exited with status {}", self.name, invocation.status);
        Ok(invocation)
    }

    /// Runs the tool and logs its combined output, ignoring failures.
    ///
    /// Used for the diagnostic probes of the validation step, which must
    /// never abort the run.
    pub async fn probe<I, S>(&self, args: I) -> Option<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        match self.invoke(args).await {
            Ok(inv) => {
                let text = format!("{}{}", inv.stdout, inv.stderr);
                Some(text.trim().to_string())
            }
            Err(e) => {
                log::warn!("{} probe failed: {e}", self.name);
                None
            }
        }
    }
}

fn ensure_success(tool: &Tool, inv: &ToolInvocation) -> Result<()> {
    if inv.status == 0 {
        return Ok(());
    }
    if !inv.stderr.trim().is_empty() {
        log::error!("{} stderr: {}", tool.name(), inv.stderr.trim());
    }
    Err(Error::Tool {
        tool: tool.name().to_string(),
        status: inv.status,
    })
}

/// The resolved tools of one run.
#[derive(Debug, Clone)]
pub struct ToolSet {
    /// Package decoder (apktool-compatible jar).
    pub decoder: Tool,
    /// Resource compiler/linker (aapt2).
    pub aapt2: Tool,
    /// Platform API archive passed to the linker.
    pub android_jar: PathBuf,
    /// Bundle builder (bundletool-compatible jar).
    pub bundler: Tool,
    /// Bundle signer (jarsigner).
    pub signer: Tool,
    /// Keystore inspector (keytool), diagnostics only.
    pub keytool: Tool,
}

impl ToolSet {
    /// Builds the tool set from configured paths and an optional timeout.
    pub fn new(paths: &ToolPaths, timeout: Option<Duration>) -> Self {
        Self {
            decoder: Tool::new("apktool", &paths.apktool, timeout),
            aapt2: Tool::new("aapt2", &paths.aapt2, timeout),
            android_jar: paths.android_jar.clone(),
            bundler: Tool::new("bundletool", &paths.bundletool, timeout),
            signer: Tool::new("jarsigner", &paths.jarsigner, timeout),
            keytool: Tool::new("keytool", &paths.keytool, timeout),
        }
    }
}

/// Decodes an APK into a resource tree, skipping source decompilation.
pub async fn decode(decoder: &Tool, apk: &Path, out_dir: &Path) -> Result<()> {
    let args: Vec<OsString> = vec![
        "d".into(),
        apk.into(),
        "-s".into(),
        "-o".into(),
        out_dir.into(),
    ];
    let inv = decoder.invoke(args).await?;
    ensure_success(decoder, &inv)
}

/// Compiles a `res/` directory into an intermediate resources archive.
pub async fn compile_resources(aapt2: &Tool, res_dir: &Path, out_archive: &Path) -> Result<()> {
    let args: Vec<OsString> = vec![
        "compile".into(),
        "--legacy".into(),
        "--dir".into(),
        res_dir.into(),
        "-o".into(),
        out_archive.into(),
    ];
    let inv = aapt2.invoke(args).await?;
    ensure_success(aapt2, &inv)
}

/// Parameters for a full content-module link.
#[derive(Debug)]
pub struct LinkRequest<'a> {
    /// Output path of the linked proto-format package.
    pub out: &'a Path,
    /// Manifest to link against.
    pub manifest: &'a Path,
    /// Platform API archive.
    pub android_jar: &'a Path,
    /// Analyzed package metadata providing SDK and version parameters.
    pub package: &'a PackageInfo,
    /// Compiled resources archive, when compilation produced one.
    pub compiled_res: Option<&'a Path>,
    /// Stable resource-id mapping file, when one was generated.
    pub stable_ids: Option<&'a Path>,
}

/// Links a manifest and compiled resources into a proto-format package.
pub async fn link_resources(aapt2: &Tool, req: LinkRequest<'_>) -> Result<()> {
    let mut args: Vec<OsString> = vec![
        "link".into(),
        "--proto-format".into(),
        "-o".into(),
        req.out.into(),
        "-I".into(),
        req.android_jar.into(),
        "--min-sdk-version".into(),
        req.package.min_sdk_version.clone().into(),
        "--target-sdk-version".into(),
        req.package.target_sdk_version.clone().into(),
        "--version-code".into(),
        req.package.version_code.clone().into(),
        "--version-name".into(),
        req.package.version_name.clone().into(),
        "--manifest".into(),
        req.manifest.into(),
        "--auto-add-overlay".into(),
    ];
    if let Some(compiled) = req.compiled_res {
        args.push("-R".into());
        args.push(compiled.into());
    }
    if let Some(stable_ids) = req.stable_ids {
        args.push("--stable-ids".into());
        args.push(stable_ids.into());
    }
    let inv = aapt2.invoke(args).await?;
    ensure_success(aapt2, &inv)
}

/// Links a manifest-only proto-format package for an asset-pack module.
pub async fn link_manifest(
    aapt2: &Tool,
    out: &Path,
    manifest: &Path,
    android_jar: &Path,
) -> Result<()> {
    let args: Vec<OsString> = vec![
        "link".into(),
        "--proto-format".into(),
        "-o".into(),
        out.into(),
        "-I".into(),
        android_jar.into(),
        "--manifest".into(),
        manifest.into(),
        "--auto-add-overlay".into(),
    ];
    let inv = aapt2.invoke(args).await?;
    ensure_success(aapt2, &inv)
}

/// Builds the unsigned bundle from the content-module archives.
pub async fn build_bundle(
    bundler: &Tool,
    module_archives: &[PathBuf],
    out_bundle: &Path,
    config: Option<&Path>,
) -> Result<()> {
    let modules = module_archives
        .iter()
        .map(|p| p.to_str().context("module archive path is not valid UTF-8"))
        .collect::<Result<Vec<_>>>()?
        .join(",");
    let out = out_bundle
        .to_str()
        .context("bundle output path is not valid UTF-8")?;

    let mut args: Vec<OsString> = vec![
        "build-bundle".into(),
        format!("--modules={modules}").into(),
        format!("--output={out}").into(),
    ];
    if let Some(config) = config {
        let config = config.to_str().context("config path is not valid UTF-8")?;
        args.push(format!("--config={config}").into());
    }
    let inv = bundler.invoke(args).await?;
    ensure_success(bundler, &inv)
}

/// Signs the bundle in place with the configured keystore.
pub async fn sign(signer: &Tool, bundle: &Path, signing: &SigningConfig) -> Result<()> {
    let args: Vec<OsString> = vec![
        "-digestalg".into(),
        "SHA1".into(),
        "-sigalg".into(),
        "SHA1withRSA".into(),
        "-keystore".into(),
        signing.keystore.clone().into(),
        "-storepass".into(),
        signing.store_password.clone().into(),
        "-keypass".into(),
        signing.key_password.clone().into(),
        bundle.into(),
        signing.key_alias.clone().into(),
    ];
    let inv = signer.invoke(args).await?;
    ensure_success(signer, &inv)
}

/// Probes the keystore fingerprint for the validation diagnostics.
pub async fn keystore_fingerprint(keytool: &Tool, signing: &SigningConfig) -> Option<String> {
    let args: Vec<OsString> = vec![
        "-list".into(),
        "-v".into(),
        "-keystore".into(),
        signing.keystore.clone().into(),
        "-storepass".into(),
        signing.store_password.clone().into(),
        "-alias".into(),
        signing.key_alias.clone().into(),
    ];
    keytool.probe(args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jar_paths_launch_through_java() {
        let jar = Tool::new("apktool", "tools/apktool.jar", None);
        let native = Tool::new("aapt2", "/usr/bin/aapt2", None);
        assert!(jar.is_jar());
        assert!(!native.is_jar());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invoke_reports_exit_status_without_interpreting_it() {
        let sh = Tool::new("sh", "/bin/sh", None);
        let inv = sh.invoke(["-c", "echo out; echo err >&2; exit 7"]).await.unwrap();
        assert_eq!(inv.status, 7);
        assert_eq!(inv.stdout.trim(), "out");
        assert_eq!(inv.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_aborts_a_hung_tool() {
        let sh = Tool::new("sh", "/bin/sh", Some(Duration::from_millis(100)));
        let err = sh.invoke(["-c", "sleep 5"]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn launch_failure_is_a_spawn_error() {
        let missing = Tool::new("aapt2", "/nonexistent/aapt2", None);
        let err = missing.invoke(["version"]).await.unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
