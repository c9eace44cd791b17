use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::package::{Package, PackageFile};

/// Static or bearer credentials attached to a single request, resolved by the
/// CLI's `CredentialStore` collaborator before the call reaches this crate.
#[derive(Debug, Clone)]
pub enum Credentials {
    ApiKey(String),
    Bearer(String),
    None,
}

/// One entry in a pull response's `downloads` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResponse {
    pub package: PackageManifest,
    pub version: String,
    pub downloads: Vec<DownloadEntry>,
    pub size: u64,
}

/// The `GET .../pull` query parameters.
#[derive(Debug, Clone, Default)]
pub struct PullRequest {
    pub recursive: bool,
    pub include_manifest: bool,
    pub paths: Option<Vec<String>>,
}

/// HTTP transport is deliberately out of scope for this crate: this trait is
/// the seam a concrete `reqwest`-based client implements in `openpackage_cli`.
/// No default implementation lives here.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    async fn metadata(&self, name: &str, version: &str, creds: &Credentials) -> Result<PackageManifest>;

    async fn pull(&self, name: &str, version: &str, req: &PullRequest, creds: &Credentials) -> Result<PullResponse>;

    /// Downloads the raw (possibly compressed) bytes at a signed URL from a [`DownloadEntry`].
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Uploads a package, scoping handled by the caller. `partial` controls
    /// whether the uploaded manifest is stamped `partial: true`.
    async fn push(&self, tarball: &[u8], manifest_name: &str, partial: bool, creds: &Credentials) -> Result<()>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<(String, String)>;

    /// Lists every published version for `name`, used by the resolver's
    /// remote partition.
    async fn versions(&self, name: &str, creds: &Credentials) -> Result<Vec<String>>;
}

/// Tarball (de)compression is deliberately out of scope: the seam a
/// concrete `tar`+`flate2` implementation fills in `openpackage_cli`.
pub trait ArchiveCodec: Send + Sync {
    fn encode(&self, files: &[PackageFile]) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Vec<PackageFile>>;
}

/// Hashes and size-checks a downloaded payload: a full download must equal
/// `declared_size`, a partial download may be `<= declared_size`.
pub fn check_integrity(bytes: &[u8], declared_size: u64, partial: bool) -> Result<String> {
    let actual = bytes.len() as u64;
    let ok = if partial { actual <= declared_size } else { actual == declared_size };
    if !ok {
        return Err(Error::Integrity(format!(
            "expected {declared_size} bytes, got {actual}"
        )));
    }
    Ok(crate::fs_utils::content_hash(bytes))
}

/// Merges a partial pull response into existing local state.
///
/// `incoming` carries only the requested `paths` (plus the manifest);
/// `local` is the full existing payload, if any. The merged manifest is
/// marked `partial: true` when either side was already partial or the
/// requested `paths` remain a strict subset of the incoming manifest's
/// declared `include` expansion.
pub fn merge_partial_pull(
    local: Option<&Package>,
    incoming_manifest: PackageManifest,
    incoming_files: Vec<PackageFile>,
    requested_paths: &[String],
    local_was_partial: bool,
) -> Result<Package> {
    let mut merged_files: std::collections::BTreeMap<String, PackageFile> = std::collections::BTreeMap::new();
    if let Some(local) = local {
        for file in &local.files {
            merged_files.insert(file.path.clone(), file.clone());
        }
    }
    for file in incoming_files {
        merged_files.insert(file.path.clone(), file);
    }

    let still_partial = local_was_partial
        || incoming_manifest.is_partial()
        || is_strict_subset(requested_paths, &incoming_manifest);

    let mut manifest = incoming_manifest;
    manifest.partial = Some(still_partial);

    Package::new(manifest, merged_files.into_values().collect())
}

fn is_strict_subset(requested_paths: &[String], manifest: &PackageManifest) -> bool {
    match &manifest.include {
        Some(include) if !include.is_empty() => {
            let declared: std::collections::BTreeSet<&String> = include.iter().collect();
            let requested: std::collections::BTreeSet<&String> = requested_paths.iter().collect();
            requested.len() < declared.len() || !requested.is_superset(&declared)
        }
        _ => !requested_paths.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::MANIFEST_FILE_NAME;

    fn manifest() -> PackageManifest {
        PackageManifest { name: "tools".into(), version: Some("1.0.0".into()), ..Default::default() }
    }

    #[test]
    fn full_download_requires_exact_size_match() {
        assert!(check_integrity(b"hello", 5, false).is_ok());
        assert!(check_integrity(b"hello", 6, false).is_err());
    }

    #[test]
    fn partial_download_tolerates_smaller_size() {
        assert!(check_integrity(b"hello", 10, true).is_ok());
        assert!(check_integrity(b"hello", 2, true).is_err());
    }

    #[test]
    fn partial_pull_preserves_untouched_local_paths() {
        let local = Package::new(
            manifest(),
            vec![
                PackageFile::text("docs/keep.md", "keep"),
                PackageFile::text("docs/old.md", "old-local"),
            ],
        )
        .unwrap();
        let incoming_files = vec![
            PackageFile::text("docs/old.md", "old-remote"),
            PackageFile::text("docs/new.md", "new-remote"),
            PackageFile::text(MANIFEST_FILE_NAME, manifest().to_yaml().unwrap()),
        ];
        let requested = vec!["docs/old.md".to_string(), "docs/new.md".to_string()];
        let merged = merge_partial_pull(Some(&local), manifest(), incoming_files, &requested, true).unwrap();
        assert_eq!(merged.file("docs/keep.md").unwrap().content, "keep");
        assert_eq!(merged.file("docs/old.md").unwrap().content, "old-remote");
        assert_eq!(merged.file("docs/new.md").unwrap().content, "new-remote");
        assert!(merged.metadata.is_partial());
    }
}
