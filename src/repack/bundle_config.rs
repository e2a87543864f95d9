//! Bundler compression configuration.
//!
//! The bundler accepts a JSON document listing globs it must store
//! uncompressed. The document merges the decoded package's do-not-compress
//! list (minus anything under the signature-metadata directory, which never
//! survives repackaging) with a fixed set of media extensions that runtime
//! code expects to read without inflation.

use std::path::Path;

use serde::Serialize;

use super::error::Result;
use super::fsutil;

/// Version literal the bundler config declares.
const CONFIG_VERSION: &str = "1.2.3";

/// Case-insensitive globs for media extensions that must stay uncompressed.
const UNCOMPRESSED_MEDIA_GLOBS: &[&str] = &[
    "**.3[gG]2",
    "**.3[gG][pP]",
    "**.3[gG][pP][pP]",
    "**.3[gG][pP][pP]2",
    "**.[aA][aA][cC]",
    "**.[aA][mM][rR]",
    "**.[aA][wW][bB]",
    "**.[gG][iI][fF]",
    "**.[iI][mM][yY]",
    "**.[jJ][eE][tT]",
    "**.[jJ][pP][eE][gG]",
    "**.[jJ][pP][gG]",
    "**.[mM]4[aA]",
    "**.[mM]4[vV]",
    "**.[mM][iI][dD]",
    "**.[mM][iI][dD][iI]",
    "**.[mM][kK][vV]",
    "**.[mM][pP]2",
    "**.[mM][pP]3",
    "**.[mM][pP]4",
    "**.[mM][pP][eE][gG]",
    "**.[mM][pP][gG]",
    "**.[oO][gG][gG]",
    "**.[oO][pP][uU][sS]",
    "**.[pP][nN][gG]",
    "**.[rR][tT][tT][tT][lL]",
    "**.[sS][mM][fF]",
    "**.[tT][fF][lL][iI][tT][eE]",
    "**.[wW][aA][vV]",
    "**.[wW][eE][bB][mM]",
    "**.[wW][eE][bB][pP]",
    "**.[wW][mM][aA]",
    "**.[wW][mM][vV]",
    "**.[xX][mM][fF]",
];

/// Directory prefix of entries dropped from the do-not-compress list.
const SIGNATURE_METADATA_DIR: &str = "META-INF";

/// Serialized shape of the bundler configuration document.
#[derive(Debug, Serialize)]
pub struct BundleConfig {
    bundletool: BundletoolSection,
    compression: CompressionSection,
}

#[derive(Debug, Serialize)]
struct BundletoolSection {
    version: String,
}

#[derive(Debug, Serialize)]
struct CompressionSection {
    #[serde(rename = "uncompressedGlob")]
    uncompressed_glob: Vec<String>,
}

impl BundleConfig {
    /// Builds the config from the analyzed do-not-compress list.
    pub fn new(do_not_compress: &[String]) -> Self {
        let mut globs: Vec<String> = do_not_compress
            .iter()
            .filter(|entry| !entry.starts_with(SIGNATURE_METADATA_DIR))
            .cloned()
            .collect();
        globs.extend(UNCOMPRESSED_MEDIA_GLOBS.iter().map(|g| g.to_string()));
        Self {
            bundletool: BundletoolSection {
                version: CONFIG_VERSION.to_string(),
            },
            compression: CompressionSection {
                uncompressed_glob: globs,
            },
        }
    }

    /// Uncompressed globs, in document order.
    pub fn uncompressed_globs(&self) -> &[String] {
        &self.compression.uncompressed_glob
    }
}

/// Writes the configuration document for the bundler invocation.
pub async fn write_bundle_config(path: &Path, do_not_compress: &[String]) -> Result<()> {
    let config = BundleConfig::new(do_not_compress);
    let json = serde_json::to_string(&config)?;
    fsutil::write_text(path, &json).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_analyzed_entries_with_media_globs() {
        let config = BundleConfig::new(&["foo.bar".to_string()]);
        let globs = config.uncompressed_globs();
        assert!(globs.contains(&"foo.bar".to_string()));
        for media in UNCOMPRESSED_MEDIA_GLOBS {
            assert!(globs.contains(&media.to_string()), "missing {media}");
        }
        assert_eq!(globs.len(), 1 + UNCOMPRESSED_MEDIA_GLOBS.len());
    }

    #[test]
    fn signature_metadata_entries_are_excluded() {
        let config = BundleConfig::new(&[
            "foo.bar".to_string(),
            "META-INF/services/x".to_string(),
        ]);
        assert!(
            config
                .uncompressed_globs()
                .iter()
                .all(|g| !g.starts_with("META-INF"))
        );
        assert!(config.uncompressed_globs().contains(&"foo.bar".to_string()));
    }

    #[tokio::test]
    async fn written_document_has_the_expected_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BundleConfig.pb.json");
        write_bundle_config(&path, &["foo.bar".to_string()]).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["bundletool"]["version"], "1.2.3");
        let globs = value["compression"]["uncompressedGlob"].as_array().unwrap();
        assert_eq!(globs[0], "foo.bar");
    }
}
