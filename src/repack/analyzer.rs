//! Decoded-package analysis.
//!
//! Reads the decoder's metadata document and the decoded manifest into a
//! typed [`PackageInfo`]. Extraction fails fast: a missing field is a
//! metadata error at this step, never a default substituted downstream,
//! since the output bundle's compatibility metadata must mirror the input.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use super::error::{Error, Result};
use super::fsutil;

/// Metadata document produced by the decoder next to the resource tree.
pub const METADATA_FILE: &str = "apktool.yml";
/// Decoded manifest file name.
pub const MANIFEST_FILE: &str = "AndroidManifest.xml";
/// Custom type tag the decoder embeds at the top of the metadata document.
/// It must be stripped before generic YAML parsing.
const METADATA_TYPE_TAG: &str = "!!brut.androlib.meta.MetaInfo";

/// Authoritative parameters extracted from the decoded package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Minimum SDK version declared by the package.
    pub min_sdk_version: String,
    /// Target SDK version declared by the package.
    pub target_sdk_version: String,
    /// Version code of the package.
    pub version_code: String,
    /// Version name of the package.
    pub version_name: String,
    /// Application package identifier from the manifest root.
    pub package_name: String,
    /// File globs the original package stored uncompressed.
    pub do_not_compress: Vec<String>,
}

/// Scalar that the metadata document writes either quoted or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Float(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "sdkInfo")]
    sdk_info: SdkInfo,
    #[serde(rename = "versionInfo")]
    version_info: VersionInfo,
    #[serde(rename = "doNotCompress")]
    do_not_compress: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SdkInfo {
    #[serde(rename = "minSdkVersion")]
    min_sdk_version: Scalar,
    #[serde(rename = "targetSdkVersion")]
    target_sdk_version: Scalar,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "versionCode")]
    version_code: Scalar,
    #[serde(rename = "versionName")]
    version_name: Scalar,
}

/// Parses the decoded package's metadata and manifest.
pub async fn analyze(decoded_dir: &Path) -> Result<PackageInfo> {
    let metadata_path = decoded_dir.join(METADATA_FILE);
    let text = fsutil::read_text(&metadata_path).await?;
    let metadata = parse_metadata(&text)?;

    let manifest_path = decoded_dir.join(MANIFEST_FILE);
    let manifest = fsutil::read_text(&manifest_path).await?;
    let package_name = manifest_package(&manifest)?;

    Ok(PackageInfo {
        min_sdk_version: metadata.sdk_info.min_sdk_version.to_string(),
        target_sdk_version: metadata.sdk_info.target_sdk_version.to_string(),
        version_code: metadata.version_info.version_code.to_string(),
        version_name: metadata.version_info.version_name.to_string(),
        package_name,
        do_not_compress: metadata.do_not_compress,
    })
}

fn parse_metadata(text: &str) -> Result<Metadata> {
    let stripped = text.replace(METADATA_TYPE_TAG, "");
    serde_yaml::from_str(&stripped)
        .map_err(|e| Error::Metadata(format!("malformed {METADATA_FILE}: {e}")))
}

fn manifest_package(manifest: &str) -> Result<String> {
    let doc = roxmltree::Document::parse(manifest)?;
    doc.root_element()
        .attribute("package")
        .map(str::to_owned)
        .ok_or_else(|| {
            Error::Metadata(format!(
                "{MANIFEST_FILE} has no package attribute on its root element"
            ))
        })
}

/// Renders `res/values/public.xml` into a stable resource-id mapping file
/// for the linker, one `<pkg>:<type>/<name> = <id>` line per entry.
///
/// Returns `false` without writing when the decoded tree has no public
/// resource table.
pub async fn write_stable_ids(decoded_dir: &Path, package: &str, out: &Path) -> Result<bool> {
    let public_xml = decoded_dir.join("res/values/public.xml");
    if !public_xml.exists() {
        return Ok(false);
    }
    let text = fsutil::read_text(&public_xml).await?;
    let rendered = render_stable_ids(&text, package)?;
    fsutil::write_text(out, &rendered).await?;
    Ok(true)
}

fn render_stable_ids(public_xml: &str, package: &str) -> Result<String> {
    let doc = roxmltree::Document::parse(public_xml)?;
    let mut lines = String::new();
    for node in doc.root_element().children().filter(|n| n.is_element()) {
        let entry = |attr: &str| {
            node.attribute(attr).map(str::to_owned).ok_or_else(|| {
                Error::Metadata(format!(
                    "public resource entry is missing its '{attr}' attribute"
                ))
            })
        };
        let res_type = entry("type")?;
        let name = entry("name")?;
        let id = entry("id")?;
        lines.push_str(&format!("{package}:{res_type}/{name} = {id}\n"));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_METADATA: &str = "\
!!brut.androlib.meta.MetaInfo
version: 2.5.2
sdkInfo:
  minSdkVersion: '21'
  targetSdkVersion: 30
versionInfo:
  versionCode: 5
  versionName: 2.3.1
doNotCompress:
- resources.arsc
- assets/intro.mp4
";

    #[test]
    fn metadata_type_tag_is_stripped_before_parsing() {
        let metadata = parse_metadata(SAMPLE_METADATA).unwrap();
        assert_eq!(metadata.sdk_info.min_sdk_version.to_string(), "21");
        assert_eq!(metadata.sdk_info.target_sdk_version.to_string(), "30");
        assert_eq!(metadata.version_info.version_code.to_string(), "5");
        assert_eq!(metadata.version_info.version_name.to_string(), "2.3.1");
        assert_eq!(
            metadata.do_not_compress,
            vec!["resources.arsc".to_string(), "assets/intro.mp4".to_string()]
        );
    }

    #[test]
    fn missing_version_info_is_a_metadata_error() {
        let text = "\
sdkInfo:
  minSdkVersion: 21
  targetSdkVersion: 30
doNotCompress: []
";
        let err = parse_metadata(text).unwrap_err();
        assert!(matches!(err, Error::Metadata(_)));
    }

    #[test]
    fn manifest_package_attribute_is_required() {
        let ok = manifest_package(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example.app"/>"#,
        )
        .unwrap();
        assert_eq!(ok, "com.example.app");

        let err = manifest_package("<manifest/>").unwrap_err();
        assert!(matches!(err, Error::Metadata(_)));
    }

    #[test]
    fn stable_ids_render_one_line_per_public_entry() {
        let xml = r#"<resources>
            <public type="drawable" name="icon" id="0x7f020000"/>
            <public type="string" name="app_name" id="0x7f030000"/>
        </resources>"#;
        let rendered = render_stable_ids(xml, "com.example.app").unwrap();
        assert_eq!(
            rendered,
            "com.example.app:drawable/icon = 0x7f020000\n\
             com.example.app:string/app_name = 0x7f030000\n"
        );
    }

    #[test]
    fn stable_ids_missing_attribute_fails_fast() {
        let xml = r#"<resources><public type="drawable" id="0x7f020000"/></resources>"#;
        let err = render_stable_ids(xml, "com.example.app").unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[tokio::test]
    async fn analyze_reads_metadata_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(METADATA_FILE), SAMPLE_METADATA)
            .await
            .unwrap();
        tokio::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"<manifest package="com.example.app"/>"#,
        )
        .await
        .unwrap();

        let info = analyze(dir.path()).await.unwrap();
        assert_eq!(info.package_name, "com.example.app");
        assert_eq!(info.min_sdk_version, "21");
        assert_eq!(info.version_name, "2.3.1");
    }

    #[tokio::test]
    async fn stable_ids_are_skipped_without_public_table() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("public.txt");
        let written = write_stable_ids(dir.path(), "com.example.app", &out)
            .await
            .unwrap();
        assert!(!written);
        assert!(!out.exists());
    }
}
