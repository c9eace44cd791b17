use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::name::PackageName;

/// A package dependency entry: `{ name, version?, files? }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self { name: name.into(), version, files: Vec::new() }
    }

    /// A dependency with an explicit but empty `files: []` still behaves as a
    /// full install.
    pub fn is_partial(&self) -> bool {
        !self.files.is_empty()
    }
}

/// The package payload manifest, `package.yml` at package-root.
///
/// Unknown top-level keys are preserved in `extra` and re-emitted on
/// `to_yaml` rather than rejected, so a manifest written by a newer
/// `openpackage` version round-trips cleanly through an older one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<Dependency>,
    #[serde(default, rename = "dev-packages", skip_serializing_if = "Vec::is_empty")]
    pub dev_packages: Vec<Dependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml_ng::Value>,
}

impl PackageManifest {
    pub fn parse(yaml: &str) -> Result<Self> {
        let manifest: Self = serde_yaml_ng::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        PackageName::parse(&self.name)?;
        if !self.is_unversioned() && self.version.is_none() {
            return Err(Error::ValidationError(format!(
                "package `{}` is missing a version",
                self.name
            )));
        }
        if let Some(version) = &self.version {
            if !openpackage_version::is_unversioned(version) {
                openpackage_version::parse_base_version(version)
                    .map_err(|_| Error::InvalidVersion(version.clone()))?;
            }
        }
        Ok(())
    }

    pub fn is_unversioned(&self) -> bool {
        self.version.as_deref().is_some_and(openpackage_version::is_unversioned)
    }

    pub fn is_partial(&self) -> bool {
        self.partial.unwrap_or(false)
    }
}

/// The workspace's own `package.yml`, at the workspace root. Structurally
/// identical to [`PackageManifest`] — a workspace is itself a (usually
/// unversioned) package whose `packages`/`dev-packages` list its installed
/// dependencies.
pub type WorkspaceManifest = PackageManifest;
