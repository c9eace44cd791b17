use std::path::{Path, PathBuf};

use semver::Version;

use crate::error::{Error, Result};
use crate::fs_utils;
use crate::name::{PackageName, MANIFEST_FILE_NAME};
use crate::manifest::PackageManifest;
use crate::package::{Package, PackageFile};

/// Whether a version is present locally, whether it's a partial payload,
/// and which registry paths it carries.
#[derive(Debug, Clone)]
pub struct VersionState {
    pub exists: bool,
    pub is_partial: bool,
    pub paths: Vec<String>,
}

/// On-disk package store keyed by `(name, version)`, rooted at `<user-data>/registry/`.
pub struct LocalRegistryStore {
    root: PathBuf,
}

impl LocalRegistryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn package_dir(&self, name: &PackageName) -> PathBuf {
        self.root.join(name.store_path())
    }

    fn version_dir(&self, name: &PackageName, version: &str) -> PathBuf {
        self.package_dir(name).join(version)
    }

    /// `list(name)`: directory enumeration, semver-sorted descending. Entries
    /// that aren't valid semver (but aren't `UNVERSIONED` either) are skipped
    /// defensively rather than failing the whole listing.
    pub fn list(&self, name: &PackageName) -> Result<Vec<String>> {
        let dir = self.package_dir(name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut unversioned = false;
        let mut versions: Vec<Version> = Vec::new();
        for entry in fs_err::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let raw = entry.file_name().to_string_lossy().to_string();
            if openpackage_version::is_unversioned(&raw) {
                unversioned = true;
            } else if let Ok(v) = Version::parse(&raw) {
                versions.push(v);
            }
        }
        versions.sort_unstable_by(|a, b| b.cmp(a));
        let mut out: Vec<String> = versions.into_iter().map(|v| v.to_string()).collect();
        if unversioned {
            out.push(openpackage_version::UNVERSIONED.to_string());
        }
        Ok(out)
    }

    /// Resolves `version` (exact string, range, or `None` for latest-wins) and
    /// loads the payload. Ranges are selected with `includePrerelease=true`
    /// and default latest-wins policy.
    pub fn load(&self, name: &PackageName, version: Option<&str>) -> Result<Package> {
        let resolved = match version {
            None => self.resolve_latest(name)?,
            Some(v) if openpackage_version::is_unversioned(v) => openpackage_version::UNVERSIONED.to_string(),
            Some(v) => match Version::parse(v) {
                Ok(parsed) => parsed.to_string(),
                Err(_) => self.resolve_range(name, v)?,
            },
        };
        self.load_exact(name, &resolved)
    }

    fn resolve_latest(&self, name: &PackageName) -> Result<String> {
        let available = self.list(name)?;
        let semver_only: Vec<Version> = available
            .iter()
            .filter(|v| !openpackage_version::is_unversioned(v))
            .filter_map(|v| Version::parse(v).ok())
            .collect();
        let selection = openpackage_version::select_version(
            &semver_only,
            &openpackage_version::VersionRange::Wildcard,
            openpackage_version::SelectOptions::default(),
        );
        selection
            .version
            .map(|v| v.to_string())
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }

    fn resolve_range(&self, name: &PackageName, range_str: &str) -> Result<String> {
        let range = openpackage_version::VersionRange::parse(range_str)
            .map_err(|_| Error::InvalidRange(range_str.to_string()))?;
        let available = self.list(name)?;
        let semver_only: Vec<Version> = available
            .iter()
            .filter(|v| !openpackage_version::is_unversioned(v))
            .filter_map(|v| Version::parse(v).ok())
            .collect();
        let selection = openpackage_version::select_version(
            &semver_only,
            &range,
            openpackage_version::SelectOptions::default(),
        );
        selection
            .version
            .map(|v| v.to_string())
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }

    fn load_exact(&self, name: &PackageName, version: &str) -> Result<Package> {
        let dir = self.version_dir(name, version);
        if !dir.is_dir() {
            return Err(Error::PackageNotFound(format!("{name}@{version}")));
        }
        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        let manifest_yaml = fs_err::read_to_string(&manifest_path)
            .map_err(|_| Error::InvalidPackage(name.to_string(), "missing manifest".into()))?;
        let metadata = PackageManifest::parse(&manifest_yaml)?;

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&dir).into_iter().filter_map(std::result::Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&dir)
                .expect("walkdir entries are under dir")
                .to_string_lossy()
                .replace('\\', "/");
            let bytes = fs_err::read(entry.path())?;
            match String::from_utf8(bytes) {
                Ok(text) => files.push(PackageFile::text(rel, text)),
                Err(e) => {
                    let encoded = base64_encode(e.as_bytes());
                    files.push(PackageFile::binary_base64(rel, encoded));
                }
            }
        }
        Package::new(metadata, files)
    }

    /// Writes every file under the version directory, clearing it first so a
    /// re-save is idempotent and never half-written.
    pub fn save(&self, package: &Package, partial: bool) -> Result<()> {
        if partial && !package.metadata.is_partial() {
            return Err(Error::ValidationError(
                "partial save requires manifest.partial = true".into(),
            ));
        }
        let name = PackageName::parse(&package.metadata.name)?;
        let version = package
            .metadata
            .version
            .clone()
            .unwrap_or_else(|| openpackage_version::UNVERSIONED.to_string());
        let dir = self.version_dir(&name, &version);
        fs_utils::remove_dir_if_exists(&dir)?;
        for file in &package.files {
            let path = dir.join(&file.path);
            fs_utils::write_atomic(&path, &file.bytes()?)?;
        }
        Ok(())
    }

    pub fn version_state(&self, name: &PackageName, version: &str) -> Result<VersionState> {
        let dir = self.version_dir(name, version);
        if !dir.is_dir() {
            return Ok(VersionState { exists: false, is_partial: false, paths: Vec::new() });
        }
        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        let is_partial = match fs_err::read_to_string(&manifest_path) {
            Ok(yaml) => PackageManifest::parse(&yaml).map(|m| m.is_partial()).unwrap_or(true),
            // A missing manifest is defensively treated as partial.
            Err(_) => true,
        };
        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(&dir).into_iter().filter_map(std::result::Result::ok) {
            if entry.file_type().is_file() {
                let rel = entry.path().strip_prefix(&dir).unwrap().to_string_lossy().replace('\\', "/");
                paths.push(rel);
            }
        }
        paths.sort();
        Ok(VersionState { exists: true, is_partial, paths })
    }

    pub fn delete_version(&self, name: &PackageName, version: &str) -> Result<()> {
        fs_utils::remove_dir_if_exists(&self.version_dir(name, version))
    }

    pub fn delete_package(&self, name: &PackageName) -> Result<()> {
        fs_utils::remove_dir_if_exists(&self.package_dir(name))
    }

    /// Renames a package's entire registry directory, rewriting every
    /// version's manifest `name` field.
    pub fn rename_package(&self, old: &PackageName, new: &PackageName) -> Result<()> {
        let old_dir = self.package_dir(old);
        if !old_dir.is_dir() {
            return Ok(());
        }
        for version in self.list(old)? {
            let mut package = self.load_exact(old, &version)?;
            package.metadata.name = new.to_string();
            for file in &mut package.files {
                if file.path == MANIFEST_FILE_NAME {
                    file.content = package.metadata.to_yaml()?;
                }
            }
            self.save(&package, package.metadata.is_partial())?;
        }
        self.delete_package(old)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn package(name: &str, version: &str) -> Package {
        let metadata = PackageManifest { name: name.into(), version: Some(version.into()), ..Default::default() };
        Package::new(metadata, vec![PackageFile::text("rules/x.md", "hi")]).unwrap()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = LocalRegistryStore::new(dir.path());
        let pkg = package("tools", "1.0.0");
        store.save(&pkg, false).unwrap();
        let loaded = store.load(&PackageName::parse("tools").unwrap(), Some("1.0.0")).unwrap();
        assert_eq!(loaded.metadata.version.as_deref(), Some("1.0.0"));
        assert_eq!(loaded.file("rules/x.md").unwrap().content, "hi");
    }

    #[test]
    fn list_is_sorted_descending_by_semver() {
        let dir = tempdir().unwrap();
        let store = LocalRegistryStore::new(dir.path());
        let name = PackageName::parse("tools").unwrap();
        for v in ["1.0.0", "2.0.0", "1.5.0"] {
            store.save(&package("tools", v), false).unwrap();
        }
        assert_eq!(store.list(&name).unwrap(), vec!["2.0.0", "1.5.0", "1.0.0"]);
    }

    #[test]
    fn load_without_version_resolves_latest_wins() {
        let dir = tempdir().unwrap();
        let store = LocalRegistryStore::new(dir.path());
        let name = PackageName::parse("tools").unwrap();
        store.save(&package("tools", "1.0.0"), false).unwrap();
        store.save(&package("tools", "2.0.0-alpha.1"), false).unwrap();
        let loaded = store.load(&name, None).unwrap();
        assert_eq!(loaded.metadata.version.as_deref(), Some("2.0.0-alpha.1"));
    }

    #[test]
    fn missing_package_is_not_found() {
        let dir = tempdir().unwrap();
        let store = LocalRegistryStore::new(dir.path());
        let name = PackageName::parse("missing").unwrap();
        assert!(matches!(store.load(&name, Some("1.0.0")), Err(Error::PackageNotFound(_))));
    }

    #[test]
    fn version_state_reports_partial_flag() {
        let dir = tempdir().unwrap();
        let store = LocalRegistryStore::new(dir.path());
        let mut metadata = PackageManifest { name: "tools".into(), version: Some("1.0.0".into()), ..Default::default() };
        metadata.partial = Some(true);
        let pkg = Package::new(metadata, vec![PackageFile::text("rules/x.md", "hi")]).unwrap();
        store.save(&pkg, true).unwrap();
        let name = PackageName::parse("tools").unwrap();
        let state = store.version_state(&name, "1.0.0").unwrap();
        assert!(state.exists);
        assert!(state.is_partial);
    }

    #[test]
    fn re_save_clears_stale_files_first() {
        let dir = tempdir().unwrap();
        let store = LocalRegistryStore::new(dir.path());
        let name = PackageName::parse("tools").unwrap();
        let metadata = PackageManifest { name: "tools".into(), version: Some("1.0.0".into()), ..Default::default() };
        let first = Package::new(metadata.clone(), vec![PackageFile::text("rules/old.md", "x")]).unwrap();
        store.save(&first, false).unwrap();
        let second = Package::new(metadata, vec![PackageFile::text("rules/new.md", "y")]).unwrap();
        store.save(&second, false).unwrap();
        let loaded = store.load(&name, Some("1.0.0")).unwrap();
        assert!(loaded.file("rules/old.md").is_none());
        assert!(loaded.file("rules/new.md").is_some());
    }
}
