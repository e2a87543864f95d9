//! Run configuration and state threaded through one repackaging run.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use super::analyzer::PackageInfo;
use super::error::{Error, Result};

/// Default decoder jar path.
pub const DEFAULT_APKTOOL: &str = "apktool.jar";
/// Default resource compiler/linker path.
pub const DEFAULT_AAPT2: &str = "aapt2";
/// Default platform API archive path.
pub const DEFAULT_ANDROID_JAR: &str = "android.jar";
/// Default bundler jar path.
pub const DEFAULT_BUNDLETOOL: &str = "bundletool.jar";
/// Default name of the variant asset-pack module.
pub const DEFAULT_VARIANT_MODULE: &str = "asset_pack";

/// Signing credentials for the final bundle.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Keystore file path.
    pub keystore: PathBuf,
    /// Keystore password.
    pub store_password: String,
    /// Key alias inside the keystore.
    pub key_alias: String,
    /// Key password.
    pub key_password: String,
}

/// Paths of the external tools the pipeline drives.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    /// Decoder jar (apktool-compatible).
    pub apktool: PathBuf,
    /// Resource compiler/linker binary (aapt2).
    pub aapt2: PathBuf,
    /// Platform API archive handed to the linker.
    pub android_jar: PathBuf,
    /// Bundler jar (bundletool-compatible).
    pub bundletool: PathBuf,
    /// Bundle signer, resolved on PATH by default.
    pub jarsigner: PathBuf,
    /// Keystore inspector, resolved on PATH by default.
    pub keytool: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            apktool: DEFAULT_APKTOOL.into(),
            aapt2: DEFAULT_AAPT2.into(),
            android_jar: DEFAULT_ANDROID_JAR.into(),
            bundletool: DEFAULT_BUNDLETOOL.into(),
            jarsigner: "jarsigner".into(),
            keytool: "keytool".into(),
        }
    }
}

/// Mutable configuration and state of one run.
///
/// Created by [`ContextBuilder`], populated by the analyzer, read by every
/// downstream step, and discarded when the run ends.
#[derive(Debug)]
pub struct BuildContext {
    /// Input APK path.
    pub input_apk: PathBuf,
    /// Output bundle path.
    pub output_aab: PathBuf,
    /// Signing credentials.
    pub signing: SigningConfig,
    /// External tool paths.
    pub tools: ToolPaths,
    /// Selector for assets relocated into the variant module.
    pub variant_selector: Option<Regex>,
    /// Name of the variant asset-pack module.
    pub variant_module: String,
    /// Optional wall-clock limit per external tool invocation.
    pub tool_timeout: Option<Duration>,
    /// Directory under which the temporary workspace is created.
    pub workspace_root: PathBuf,
    /// Analyzed package metadata, populated by the ANALYZED step.
    pub package: Option<PackageInfo>,
    /// Registered content modules, in build order.
    pub content_modules: Vec<(String, PathBuf)>,
    /// Registered asset-pack modules, in build order.
    pub asset_pack_modules: Vec<(String, PathBuf)>,
}

impl BuildContext {
    /// Starts building a context for the given input and output paths.
    pub fn builder(input_apk: impl Into<PathBuf>, output_aab: impl Into<PathBuf>) -> ContextBuilder {
        ContextBuilder::new(input_apk, output_aab)
    }

    /// Registers a content module rooted at a resource tree.
    pub fn register_content_module(&mut self, name: impl Into<String>, source: impl Into<PathBuf>) {
        self.content_modules.push((name.into(), source.into()));
    }

    /// Registers an asset-pack module rooted at a prepared module directory.
    pub fn register_asset_pack_module(
        &mut self,
        name: impl Into<String>,
        source: impl Into<PathBuf>,
    ) {
        self.asset_pack_modules.push((name.into(), source.into()));
    }

    /// Analyzed metadata; an internal error before the ANALYZED step ran.
    pub fn package(&self) -> Result<&PackageInfo> {
        self.package
            .as_ref()
            .ok_or_else(|| Error::Generic("package metadata has not been analyzed yet".into()))
    }

    /// True when a variant module is requested.
    pub fn has_variant(&self) -> bool {
        self.variant_selector.is_some()
    }
}

/// Builder for [`BuildContext`].
#[derive(Debug)]
pub struct ContextBuilder {
    input_apk: PathBuf,
    output_aab: PathBuf,
    signing: Option<SigningConfig>,
    tools: ToolPaths,
    variant_selector: Option<String>,
    variant_module: String,
    tool_timeout: Option<Duration>,
    workspace_root: Option<PathBuf>,
}

impl ContextBuilder {
    /// Creates a builder with the two required paths.
    pub fn new(input_apk: impl Into<PathBuf>, output_aab: impl Into<PathBuf>) -> Self {
        Self {
            input_apk: input_apk.into(),
            output_aab: output_aab.into(),
            signing: None,
            tools: ToolPaths::default(),
            variant_selector: None,
            variant_module: DEFAULT_VARIANT_MODULE.to_string(),
            tool_timeout: None,
            workspace_root: None,
        }
    }

    /// Sets the signing credentials. Required.
    pub fn signing(mut self, signing: SigningConfig) -> Self {
        self.signing = Some(signing);
        self
    }

    /// Overrides the external tool paths.
    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the variant asset selector; an empty pattern means no variant.
    pub fn variant_selector(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if !pattern.is_empty() {
            self.variant_selector = Some(pattern);
        }
        self
    }

    /// Overrides the variant module name.
    pub fn variant_module(mut self, name: impl Into<String>) -> Self {
        self.variant_module = name.into();
        self
    }

    /// Sets a wall-clock limit applied to each external tool invocation.
    pub fn tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Creates the temporary workspace under the given directory instead of
    /// the system temp directory.
    pub fn workspace_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(dir.into());
        self
    }

    /// Builds the context, validating required fields and the selector.
    pub fn build(self) -> Result<BuildContext> {
        let signing = self
            .signing
            .ok_or_else(|| Error::Validation("signing configuration is required".into()))?;

        let variant_selector = self
            .variant_selector
            .map(|pattern| {
                Regex::new(&pattern).map_err(|e| {
                    Error::Validation(format!("invalid variant selector '{pattern}': {e}"))
                })
            })
            .transpose()?;

        if self.variant_module.is_empty()
            || self.variant_module.contains('/')
            || self.variant_module.contains('\\')
        {
            return Err(Error::Validation(format!(
                "variant module name '{}' is not path-safe",
                self.variant_module
            )));
        }

        Ok(BuildContext {
            input_apk: self.input_apk,
            output_aab: self.output_aab,
            signing,
            tools: self.tools,
            variant_selector,
            variant_module: self.variant_module,
            tool_timeout: self.tool_timeout,
            workspace_root: self
                .workspace_root
                .unwrap_or_else(std::env::temp_dir),
            package: None,
            content_modules: Vec::new(),
            asset_pack_modules: Vec::new(),
        })
    }
}

/// Shared borrows every module-assembly step needs.
#[derive(Clone, Copy)]
pub struct BuildEnv<'a> {
    /// Resolved external tools.
    pub tools: &'a super::tools::ToolSet,
    /// Step lifecycle reporter.
    pub reporter: &'a dyn super::reporter::TaskReporter,
    /// Cancellation token checked between steps.
    pub cancel: &'a tokio_util::sync::CancellationToken,
}

impl std::fmt::Debug for BuildEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildEnv").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signing() -> SigningConfig {
        SigningConfig {
            keystore: "release.jks".into(),
            store_password: "secret".into(),
            key_alias: "release".into(),
            key_password: "secret".into(),
        }
    }

    #[test]
    fn missing_signing_fails_validation() {
        let err = BuildContext::builder("in.apk", "out.aab").build().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn empty_selector_means_no_variant() {
        let ctx = BuildContext::builder("in.apk", "out.aab")
            .signing(signing())
            .variant_selector("")
            .build()
            .unwrap();
        assert!(!ctx.has_variant());
    }

    #[test]
    fn invalid_selector_is_rejected() {
        let err = BuildContext::builder("in.apk", "out.aab")
            .signing(signing())
            .variant_selector("([unclosed")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn variant_module_name_must_be_path_safe() {
        let err = BuildContext::builder("in.apk", "out.aab")
            .signing(signing())
            .variant_module("a/b")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn modules_keep_registration_order() {
        let mut ctx = BuildContext::builder("in.apk", "out.aab")
            .signing(signing())
            .build()
            .unwrap();
        ctx.register_content_module("base", "/tmp/decoded");
        ctx.register_content_module("feature", "/tmp/feature");
        let names: Vec<_> = ctx.content_modules.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["base", "feature"]);
    }
}
