use openpackage_core::{PackageManifest, MANIFEST_FILE_NAME};

use crate::context::Context;

/// `openpackage init`: writes a minimal workspace `package.yml` in the
/// current directory, if one doesn't already exist.
pub fn init(ctx: &Context, name: Option<String>) -> anyhow::Result<()> {
    let working_dir = match &ctx.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let manifest_path = working_dir.join(MANIFEST_FILE_NAME);
    if manifest_path.is_file() {
        anyhow::bail!("{manifest_path:?} already exists");
    }

    let name = name.unwrap_or_else(|| {
        working_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "workspace".to_string())
    });

    let manifest = PackageManifest {
        name,
        version: Some(openpackage_version::UNVERSIONED.to_string()),
        ..Default::default()
    };
    let yaml = manifest.to_yaml()?;
    openpackage_core::write_atomic_str(&manifest_path, &yaml)?;

    fs_err::create_dir_all(crate::workspace::data_dir()?)?;
    fs_err::create_dir_all(crate::workspace::registry_root()?)?;

    println!("created {manifest_path:?}");
    Ok(())
}
