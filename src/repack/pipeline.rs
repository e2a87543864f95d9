//! Pipeline orchestration.
//!
//! One linear state machine per run: validate, decode, analyze, optionally
//! prepare the variant module, build every module, bundle, sign, publish.
//! The first failing step aborts the remainder; the temporary workspace is
//! removed on every exit path, including cancellation.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::analyzer;
use super::archive;
use super::assembler::{self, AssetPackJob, ContentModuleJob};
use super::bundle_config;
use super::context::{BuildContext, BuildEnv};
use super::error::{Error, Result};
use super::fsutil;
use super::reporter::{LogReporter, TaskReporter};
use super::task::run_task;
use super::tools::{self, Tool, ToolSet};
use super::variant;
use super::workspace::Workspace;

/// Name of the primary content module.
const BASE_MODULE: &str = "base";

/// Drives one repackaging run end to end.
pub struct Repacker {
    ctx: BuildContext,
    reporter: Arc<dyn TaskReporter>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Repacker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repacker").field("ctx", &self.ctx).finish_non_exhaustive()
    }
}

impl Repacker {
    /// Creates a runner reporting through the `log` facade.
    pub fn new(ctx: BuildContext) -> Self {
        Self {
            ctx,
            reporter: Arc::new(LogReporter),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the step reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn TaskReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Token callers can use to cancel the run between steps.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the whole pipeline and returns the published bundle path.
    ///
    /// The temporary workspace is removed before this returns, whether the
    /// run succeeded, failed, or was cancelled.
    pub async fn run(mut self) -> Result<PathBuf> {
        let workspace = Workspace::create(&self.ctx.workspace_root).await?;
        let result = self.execute(&workspace).await;
        workspace.cleanup().await;
        match &result {
            Ok(path) => log::info!("bundle published to {}", path.display()),
            Err(e) => log::error!("repackaging aborted: {e}"),
        }
        result
    }

    async fn execute(&mut self, ws: &Workspace) -> Result<PathBuf> {
        let tools = ToolSet::new(&self.ctx.tools, self.ctx.tool_timeout);
        let reporter = Arc::clone(&self.reporter);
        let cancel = self.cancel.clone();

        run_task(
            &*reporter,
            &cancel,
            "validate environment",
            self.validate(&tools),
        )
        .await?;

        let decoded = ws.decoded_dir();
        run_task(
            &*reporter,
            &cancel,
            "decode input package",
            tools::decode(&tools.decoder, &self.ctx.input_apk, &decoded),
        )
        .await?;
        self.ctx.register_content_module(BASE_MODULE, &decoded);

        let info = run_task(
            &*reporter,
            &cancel,
            "analyze package metadata",
            analyzer::analyze(&decoded),
        )
        .await?;
        reporter.note(&format!(
            "package {} version {} ({}), sdk {}..{}",
            info.package_name,
            info.version_name,
            info.version_code,
            info.min_sdk_version,
            info.target_sdk_version
        ));
        let package_name = info.package_name.clone();
        self.ctx.package = Some(info);

        let stable_ids_path = ws.stable_ids_file();
        let wrote_stable_ids = run_task(
            &*reporter,
            &cancel,
            "write stable resource ids",
            analyzer::write_stable_ids(&decoded, &package_name, &stable_ids_path),
        )
        .await?;
        let stable_ids = wrote_stable_ids.then_some(stable_ids_path.as_path());

        if let Some(selector) = self.ctx.variant_selector.clone() {
            let module_name = self.ctx.variant_module.clone();
            let module_dir = ws.variant_dir(&module_name);
            run_task(
                &*reporter,
                &cancel,
                "prepare variant module",
                variant::create_scaffold(&module_dir, &module_name, &package_name),
            )
            .await?;
            run_task(
                &*reporter,
                &cancel,
                "relocate variant assets",
                variant::relocate_assets(&decoded, &module_dir, &selector),
            )
            .await?;
            self.ctx.register_asset_pack_module(module_name, module_dir);
        }

        let env = BuildEnv {
            tools: &tools,
            reporter: &*reporter,
            cancel: &cancel,
        };
        let package = self.ctx.package()?;

        let mut module_archives = Vec::new();
        for (name, source) in &self.ctx.content_modules {
            let out_archive = ws.module_archive(name);
            let staging_dir = ws.module_staging(name);
            run_task(
                &*reporter,
                &cancel,
                &format!("[{name}] build module"),
                assembler::content::build(
                    env,
                    package,
                    ContentModuleJob {
                        name,
                        source,
                        staging_dir: &staging_dir,
                        out_archive: &out_archive,
                        stable_ids,
                    },
                ),
            )
            .await?;
            module_archives.push(out_archive);
        }

        for (name, module_dir) in &self.ctx.asset_pack_modules {
            let staging_dir = ws.module_staging(name);
            run_task(
                &*reporter,
                &cancel,
                &format!("[{name}] build asset pack"),
                assembler::asset_pack::build(
                    env,
                    AssetPackJob {
                        name,
                        module_dir,
                        staging_dir: &staging_dir,
                    },
                ),
            )
            .await?;
        }

        let bundle = ws.bundle_file();
        let config = ws.bundle_config_file();
        run_task(
            &*reporter,
            &cancel,
            "write bundle config",
            bundle_config::write_bundle_config(&config, &package.do_not_compress),
        )
        .await?;
        run_task(
            &*reporter,
            &cancel,
            "build bundle",
            tools::build_bundle(&tools.bundler, &module_archives, &bundle, Some(config.as_path())),
        )
        .await?;

        // The bundler's module list does not accept asset-pack modules on
        // every tool version; prepared packs are appended into the produced
        // bundle directly.
        for (name, module_dir) in &self.ctx.asset_pack_modules {
            run_task(
                &*reporter,
                &cancel,
                &format!("[{name}] append asset pack"),
                archive::zip_dir(module_dir, &bundle, Some(name.as_str())),
            )
            .await?;
        }

        run_task(
            &*reporter,
            &cancel,
            "sign bundle",
            tools::sign(&tools.signer, &bundle, &self.ctx.signing),
        )
        .await?;

        let output = self.ctx.output_aab.clone();
        run_task(&*reporter, &cancel, "publish bundle", async {
            fsutil::copy_any(&bundle, &output).await?;
            if !output.is_file() {
                crate::bail!("signed bundle missing at {}", bundle.display());
            }
            Ok(())
        })
        .await?;

        Ok(output)
    }

    /// Pre-flight checks. Existence and resolution failures are fatal;
    /// version and fingerprint probes are diagnostics only.
    async fn validate(&self, tools: &ToolSet) -> Result<()> {
        let reporter = &*self.reporter;
        reporter.note(&format!("input package: {}", self.ctx.input_apk.display()));
        reporter.note(&format!("output bundle: {}", self.ctx.output_aab.display()));

        if !self.ctx.input_apk.is_file() {
            return Err(Error::Validation(format!(
                "input package does not exist: {}",
                self.ctx.input_apk.display()
            )));
        }
        if !self.ctx.signing.keystore.is_file() {
            return Err(Error::Validation(format!(
                "keystore does not exist: {}",
                self.ctx.signing.keystore.display()
            )));
        }
        if !tools.android_jar.is_file() {
            return Err(Error::Validation(format!(
                "platform API archive does not exist: {}",
                tools.android_jar.display()
            )));
        }
        for tool in [
            &tools.decoder,
            &tools.aapt2,
            &tools.bundler,
            &tools.signer,
            &tools.keytool,
        ] {
            resolve_tool(tool)?;
        }

        if let Some(version) = tools.decoder.probe(["--version"]).await {
            reporter.note(&format!("decoder version: {version}"));
        }
        if let Some(version) = tools.aapt2.probe(["version"]).await {
            reporter.note(&format!("aapt2 version: {version}"));
        }
        if let Some(version) = tools.bundler.probe(["version"]).await {
            reporter.note(&format!("bundler version: {version}"));
        }
        if let Some(fingerprint) =
            tools::keystore_fingerprint(&tools.keytool, &self.ctx.signing).await
        {
            reporter.note(&format!("keystore: {fingerprint}"));
        }
        Ok(())
    }
}

/// Checks that a tool path exists, or resolves a bare name on PATH.
fn resolve_tool(tool: &Tool) -> Result<()> {
    let path = tool.path();
    if path.exists() {
        return Ok(());
    }
    if path.components().count() > 1 {
        return Err(Error::Validation(format!(
            "{} not found at {}",
            tool.name(),
            path.display()
        )));
    }
    match which::which(path) {
        Ok(found) => {
            log::debug!("resolved {} to {}", tool.name(), found.display());
            Ok(())
        }
        Err(e) => Err(Error::Validation(format!(
            "{} not found on PATH: {e}",
            tool.name()
        ))),
    }
}
