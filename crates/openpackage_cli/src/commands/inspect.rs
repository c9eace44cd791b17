use anyhow::Context as _;
use openpackage_core::{parse_install_spec, PackageIndex, PackageName};
use semver::Version;

use crate::context::Context;

/// `openpackage list`: every package (and every version of it) in the local registry.
pub fn list(ctx: &Context) -> anyhow::Result<()> {
    let root = ctx.store.root();
    if !root.is_dir() {
        println!("the local registry is empty");
        return Ok(());
    }
    let mut printed_any = false;
    for entry in walkdir::WalkDir::new(root).min_depth(1).max_depth(2) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let rel = entry.path().strip_prefix(root)?.to_string_lossy().replace('\\', "/");
        let Ok(name) = PackageName::parse(&rel) else { continue };
        let mut versions = ctx.store.list(&name)?;
        versions.sort();
        for version in versions {
            println!("{name}@{version}");
            printed_any = true;
        }
    }
    if !printed_any {
        println!("the local registry is empty");
    }
    Ok(())
}

/// `openpackage show <name>`: a package's manifest and the files it tracks.
pub fn show(ctx: &Context, spec: &str) -> anyhow::Result<()> {
    let parsed = parse_install_spec(spec).context("invalid package spec")?;
    let package = ctx.store.load(&parsed.name, parsed.version.as_deref())?;

    println!("name: {}", package.metadata.name);
    println!("version: {}", package.metadata.version.clone().unwrap_or_default());
    if package.metadata.is_partial() {
        println!("partial: true");
    }
    if let Some(description) = &package.metadata.description {
        println!("description: {description}");
    }
    println!("files:");
    for file in package.content_files() {
        println!("  {}", file.path);
    }
    Ok(())
}

/// `openpackage status`: every package installed in the current workspace,
/// and whether a newer local version is available.
pub async fn status(ctx: &Context) -> anyhow::Result<()> {
    let workspace = ctx.load_workspace()?;
    let index_path = workspace.root.join(openpackage_core::INDEX_FILE_NAME);
    let index = PackageIndex::load(&index_path)?;

    if index.packages.is_empty() {
        println!("no packages installed in this workspace");
        return Ok(());
    }

    for (name, record) in &index.packages {
        let installed = &record.workspace.version;
        let latest = latest_local_version(ctx, name)?;
        match latest {
            Some(latest) if installed.parse::<Version>().ok().as_ref() != Some(&latest) => {
                println!("{name}: {installed} (newer local version {latest} available)");
            }
            Some(_) => println!("{name}: {installed} (up to date)"),
            None => println!("{name}: {installed} (no longer in the local registry)"),
        }
    }
    Ok(())
}

fn latest_local_version(ctx: &Context, name: &str) -> anyhow::Result<Option<Version>> {
    let name = match PackageName::parse(name) {
        Ok(name) => name,
        Err(_) => return Ok(None),
    };
    let versions: Vec<Version> = ctx
        .store
        .list(&name)?
        .into_iter()
        .filter(|v| !openpackage_version::is_unversioned(v))
        .filter_map(|v| Version::parse(&v).ok())
        .collect();
    let opts = openpackage_version::SelectOptions { prefer_stable: true };
    let range = openpackage_version::VersionRange::parse("*").expect("`*` is always a valid range");
    Ok(openpackage_version::select_version(&versions, &range, opts).version)
}
