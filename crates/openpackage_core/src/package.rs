use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::name::MANIFEST_FILE_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Utf8,
    Base64,
}

/// One file inside a [`Package`] payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFile {
    pub path: String,
    pub content: String,
    pub encoding: Encoding,
}

impl PackageFile {
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self { path: into_canonical(path.into()), content: content.into(), encoding: Encoding::Utf8 }
    }

    pub fn binary_base64(path: impl Into<String>, base64_content: impl Into<String>) -> Self {
        Self { path: into_canonical(path.into()), content: base64_content.into(), encoding: Encoding::Base64 }
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        match self.encoding {
            Encoding::Utf8 => Ok(self.content.clone().into_bytes()),
            Encoding::Base64 => base64_decode(&self.content)
                .ok_or_else(|| Error::InvalidPackage(self.path.clone(), "invalid base64 content".into())),
        }
    }
}

fn into_canonical(path: String) -> String {
    path.replace('\\', "/")
}

/// A full registry payload: one manifest plus every file in the package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub metadata: PackageManifest,
    pub files: Vec<PackageFile>,
}

impl Package {
    pub fn new(metadata: PackageManifest, mut files: Vec<PackageFile>) -> Result<Self> {
        let manifest_yaml = metadata.to_yaml()?;
        if !files.iter().any(|f| f.path == MANIFEST_FILE_NAME) {
            files.push(PackageFile::text(MANIFEST_FILE_NAME, manifest_yaml));
        }
        let package = Self { metadata, files };
        package.validate()?;
        Ok(package)
    }

    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        let manifests: Vec<_> = self.files.iter().filter(|f| f.path == MANIFEST_FILE_NAME).collect();
        if manifests.len() != 1 {
            return Err(Error::InvalidPackage(
                self.metadata.name.clone(),
                format!("expected exactly one manifest file, found {}", manifests.len()),
            ));
        }
        for file in &self.files {
            validate_path(&file.path)
                .map_err(|msg| Error::InvalidPackage(self.metadata.name.clone(), msg))?;
        }
        Ok(())
    }

    pub fn file(&self, path: &str) -> Option<&PackageFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Files other than the manifest, the canonical "content" of the package.
    pub fn content_files(&self) -> impl Iterator<Item = &PackageFile> {
        self.files.iter().filter(|f| f.path != MANIFEST_FILE_NAME)
    }
}

fn validate_path(path: &str) -> std::result::Result<(), String> {
    if path.contains('\\') {
        return Err(format!("path `{path}` is not forward-slash normalised"));
    }
    if path.starts_with('/') {
        return Err(format!("path `{path}` must not be absolute"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("path `{path}` must not contain `..` segments"));
    }
    Ok(())
}

fn base64_decode(s: &str) -> Option<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(s.as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PackageManifest;

    fn manifest() -> PackageManifest {
        PackageManifest { name: "tools".into(), version: Some("1.0.0".into()), ..Default::default() }
    }

    #[test]
    fn new_package_auto_adds_manifest_file() {
        let package = Package::new(manifest(), vec![PackageFile::text("rules/x.md", "hi")]).unwrap();
        assert!(package.file(MANIFEST_FILE_NAME).is_some());
    }

    #[test]
    fn rejects_absolute_paths() {
        let err = Package::new(manifest(), vec![PackageFile::text("/etc/passwd", "x")]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_dotdot_segments() {
        let err = Package::new(manifest(), vec![PackageFile::text("rules/../x.md", "x")]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_duplicate_manifest_files() {
        let files = vec![
            PackageFile::text(MANIFEST_FILE_NAME, "name: tools\nversion: 1.0.0\n"),
            PackageFile::text(MANIFEST_FILE_NAME, "name: tools\nversion: 1.0.0\n"),
        ];
        let package = Package { metadata: manifest(), files };
        assert!(package.validate().is_err());
    }

    #[test]
    fn base64_round_trips() {
        let file = PackageFile::binary_base64("icon.png", "aGVsbG8=");
        assert_eq!(file.bytes().unwrap(), b"hello");
    }
}
