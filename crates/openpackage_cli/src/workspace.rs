use std::path::{Path, PathBuf};

use anyhow::Context;
use openpackage_core::{PackageManifest, MANIFEST_FILE_NAME};
use openpackage_platform::{Platform, PlatformRegistry};

/// The user's dotfile directory, `~/.openpackage/`.
pub fn data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine the home directory")?;
    Ok(home.join(".openpackage"))
}

pub fn registry_root() -> anyhow::Result<PathBuf> {
    Ok(data_dir()?.join("registry"))
}

pub fn config_dir() -> anyhow::Result<PathBuf> {
    data_dir()
}

/// A loaded workspace: its root directory and parsed `package.yml`.
pub struct Workspace {
    pub root: PathBuf,
    pub manifest: PackageManifest,
}

impl Workspace {
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE_NAME)
    }

    pub fn detected_platforms(&self) -> Vec<&'static Platform> {
        PlatformRegistry::detected(&self.root)
    }

    pub fn hash(&self) -> String {
        openpackage_core::workspace_hash(&self.root.to_string_lossy())
    }

    pub fn save_manifest(&self) -> anyhow::Result<()> {
        let yaml = self.manifest.to_yaml()?;
        openpackage_core::write_atomic_str(&self.manifest_path(), &yaml)?;
        Ok(())
    }
}

/// Walks up from `start` looking for `package.yml`, falling back to `start`
/// itself if none is found (the workspace is being created fresh by `init`).
fn find_root(start: &Path) -> PathBuf {
    let mut dir = start;
    loop {
        if dir.join(MANIFEST_FILE_NAME).is_file() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return start.to_path_buf(),
        }
    }
}

/// Loads the workspace rooted at `working_dir` (or the current directory),
/// requiring an existing `package.yml`.
pub fn load(working_dir: Option<&Path>) -> anyhow::Result<Workspace> {
    let start = match working_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("could not determine the current directory")?,
    };
    let root = find_root(&start);
    let manifest_path = root.join(MANIFEST_FILE_NAME);
    let yaml = fs_err::read_to_string(&manifest_path)
        .with_context(|| format!("no workspace found (missing {manifest_path:?}); run `openpackage init` first"))?;
    let manifest = PackageManifest::parse(&yaml).context("invalid workspace package.yml")?;
    Ok(Workspace { root, manifest })
}
