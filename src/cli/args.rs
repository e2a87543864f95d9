//! Command line argument parsing and validation.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::repack::context::{
    DEFAULT_AAPT2, DEFAULT_ANDROID_JAR, DEFAULT_APKTOOL, DEFAULT_BUNDLETOOL,
    DEFAULT_VARIANT_MODULE,
};
use crate::repack::{BuildContext, SigningConfig, ToolPaths};

/// Repackages a compiled APK into a signed Android App Bundle
#[derive(Parser, Debug)]
#[command(
    name = "aab-repack",
    version,
    about = "Repackages a compiled APK into a signed Android App Bundle",
    long_about = "Decodes an APK, reassembles it into bundle modules, builds an App Bundle \
and signs it.

Usage:
  aab-repack -i app.apk -o app.aab --keystore release.jks --key-alias release
  aab-repack -i app.apk -o app.aab --keystore release.jks --key-alias release \\
      --variant-filter 'video/'

Exit code 0 = signed bundle guaranteed to exist at the output path."
)]
pub struct Args {
    /// Input APK path
    #[arg(short = 'i', long, value_name = "APK")]
    pub input: PathBuf,

    /// Output bundle path
    #[arg(short = 'o', long, value_name = "AAB")]
    pub output: PathBuf,

    /// Keystore used to sign the bundle
    #[arg(long, value_name = "JKS")]
    pub keystore: PathBuf,

    /// Keystore password
    #[arg(long, value_name = "PASS", env = "REPACK_STORE_PASSWORD")]
    pub store_password: String,

    /// Key alias inside the keystore
    #[arg(long, value_name = "ALIAS")]
    pub key_alias: String,

    /// Key password; defaults to the keystore password
    #[arg(long, value_name = "PASS", env = "REPACK_KEY_PASSWORD")]
    pub key_password: Option<String>,

    /// Decoder jar path
    #[arg(long, value_name = "JAR", default_value = DEFAULT_APKTOOL)]
    pub apktool: PathBuf,

    /// Resource compiler/linker path
    #[arg(long, value_name = "BIN", default_value = DEFAULT_AAPT2)]
    pub aapt2: PathBuf,

    /// Platform API archive handed to the linker
    #[arg(long, value_name = "JAR", default_value = DEFAULT_ANDROID_JAR)]
    pub android_jar: PathBuf,

    /// Bundler jar path
    #[arg(long, value_name = "JAR", default_value = DEFAULT_BUNDLETOOL)]
    pub bundletool: PathBuf,

    /// Regex selecting assets split into a variant module (empty = none)
    #[arg(long, value_name = "REGEX", default_value = "")]
    pub variant_filter: String,

    /// Name of the variant module
    #[arg(long, value_name = "NAME", default_value = DEFAULT_VARIANT_MODULE)]
    pub variant_module: String,

    /// Wall-clock limit in seconds per external tool invocation (0 = none)
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    pub tool_timeout_secs: u64,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Builds the run context from the parsed arguments.
    pub fn into_context(self) -> crate::repack::Result<BuildContext> {
        let key_password = self
            .key_password
            .unwrap_or_else(|| self.store_password.clone());
        let timeout = (self.tool_timeout_secs > 0)
            .then(|| Duration::from_secs(self.tool_timeout_secs));

        BuildContext::builder(self.input, self.output)
            .signing(SigningConfig {
                keystore: self.keystore,
                store_password: self.store_password,
                key_alias: self.key_alias,
                key_password,
            })
            .tools(ToolPaths {
                apktool: self.apktool,
                aapt2: self.aapt2,
                android_jar: self.android_jar,
                bundletool: self.bundletool,
                ..ToolPaths::default()
            })
            .variant_selector(self.variant_filter)
            .variant_module(self.variant_module)
            .tool_timeout(timeout)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "aab-repack",
            "-i",
            "app.apk",
            "-o",
            "app.aab",
            "--keystore",
            "release.jks",
            "--store-password",
            "secret",
            "--key-alias",
            "release",
        ]
    }

    #[test]
    fn key_password_defaults_to_store_password() {
        let args = Args::parse_from(base_args());
        let ctx = args.into_context().unwrap();
        assert_eq!(ctx.signing.key_password, "secret");
        assert!(!ctx.has_variant());
        assert!(ctx.tool_timeout.is_none());
    }

    #[test]
    fn variant_filter_and_timeout_are_wired_through() {
        let mut argv = base_args();
        argv.extend(["--variant-filter", "video/", "--tool-timeout-secs", "30"]);
        let ctx = Args::parse_from(argv).into_context().unwrap();
        assert!(ctx.has_variant());
        assert_eq!(ctx.tool_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn bad_variant_filter_is_rejected() {
        let mut argv = base_args();
        argv.extend(["--variant-filter", "([unclosed"]);
        assert!(Args::parse_from(argv).into_context().is_err());
    }
}
