use openpackage_core::{MANIFEST_FILE_NAME, Package, PackageFile, PackageManifest};
use tempfile::TempDir;

/// A minimal valid manifest, built fresh rather than hand-written per test.
pub fn fake_manifest(name: &str, version: &str) -> PackageManifest {
    PackageManifest { name: name.to_string(), version: Some(version.to_string()), ..Default::default() }
}

/// A canonical package with one text file per `(path, content)` pair.
pub fn fake_package(name: &str, version: &str, files: &[(&str, &str)]) -> Package {
    let metadata = fake_manifest(name, version);
    let files = files.iter().map(|(path, content)| PackageFile::text(*path, *content)).collect();
    Package::new(metadata, files).expect("fixture package is always valid")
}

/// A scratch directory with an initialised `package.yml`, standing in for a
/// workspace root without depending on `openpackage_cli`.
pub fn temp_workspace(name: &str) -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create temp workspace");
    let manifest = fake_manifest(name, openpackage_version::UNVERSIONED);
    let path = dir.path().join(MANIFEST_FILE_NAME);
    fs_err::write(&path, manifest.to_yaml().expect("fixture manifest is always serializable"))
        .expect("failed to write fixture package.yml");
    let root = dir.path().to_path_buf();
    (dir, root)
}

/// An empty scratch directory to back a [`openpackage_core::LocalRegistryStore`].
pub fn temp_registry() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create temp registry");
    let root = dir.path().join("registry");
    (dir, root)
}
