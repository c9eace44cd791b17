use anyhow::Context as _;
use openpackage_core::{
    install_package, merge_files_map, parse_install_spec, Dependency, InstallOptions, Package,
    PackageIndex, PackageName,
};
use semver::Version;

use crate::context::Context;
use crate::workspace::Workspace;

const BASE62_ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn base62_decode(s: &str) -> Option<u64> {
    let mut value: u64 = 0;
    for c in s.bytes() {
        let digit = BASE62_ALPHABET.iter().position(|&b| b == c)? as u64;
        value = value.checked_mul(62)?.checked_add(digit)?;
    }
    Some(value)
}

/// Finds this workspace's last recorded WIP version for `name`, if any, by
/// matching the workspace tag embedded in the prerelease identifier —
/// `prune_stale_wip_versions` guarantees at most one survives per workspace.
fn find_wip_state(
    store: &openpackage_core::LocalRegistryStore,
    name: &PackageName,
    workspace_path: &str,
) -> anyhow::Result<(Option<Version>, u64)> {
    let tag = openpackage_version::workspace_tag(workspace_path);
    for raw in store.list(name)? {
        let Ok(version) = Version::parse(&raw) else { continue };
        if openpackage_version::is_stable(&version) {
            continue;
        }
        let pre = version.pre.as_str();
        if let Some((found_tag, counter_str)) = pre.split_once('.') {
            if found_tag == tag {
                let counter = base62_decode(counter_str).unwrap_or(0);
                return Ok((Some(version), counter));
            }
        }
    }
    Ok((None, 0))
}

/// `openpackage add <path|pkg path>`: records a dependency in the workspace
/// manifest's `packages` list. The CLI doesn't distinguish a
/// filesystem path from a registry spec here — every dependency is named by
/// `name[@version][/path]`, matching the `Dependency` shape.
pub fn add(ctx: &Context, path_or_pkg: &str) -> anyhow::Result<()> {
    let spec = parse_install_spec(path_or_pkg).context("invalid dependency spec")?;
    let mut workspace = ctx.load_workspace()?;

    let dependency = Dependency {
        name: spec.name.to_string(),
        version: spec.version,
        files: spec.registry_path.map(|p| vec![p]).unwrap_or_default(),
    };

    workspace.manifest.packages.retain(|d| d.name != dependency.name);
    workspace.manifest.packages.push(dependency);
    workspace.manifest.packages.sort_by(|a, b| a.name.cmp(&b.name));
    workspace.save_manifest()?;

    println!("added {path_or_pkg} to {:?}", workspace.manifest_path());
    Ok(())
}

/// `openpackage save [name]`: work-in-progress save of the current workspace state.
pub fn save(ctx: &Context, name: Option<&str>) -> anyhow::Result<()> {
    let mut workspace = ctx.load_workspace()?;
    let package_name = name.unwrap_or(&workspace.manifest.name).to_string();
    let parsed_name = PackageName::parse(&package_name)?;

    let manifest_version = openpackage_version::parse_base_version(
        workspace.manifest.version.as_deref().unwrap_or("0.1.0"),
    )?;
    let mut manifest = workspace.manifest.clone();
    manifest.name = package_name.clone();
    manifest.version = Some(manifest_version.to_string());

    let workspace_path = workspace.root.to_string_lossy().to_string();
    let (last_version, last_counter) = find_wip_state(&ctx.store, &parsed_name, &workspace_path)?;
    let detected = workspace.detected_platforms();

    let saved = openpackage_core::save_wip(
        &ctx.store,
        &workspace.root,
        &workspace_path,
        &detected,
        manifest,
        last_version.as_ref(),
        last_counter,
    )?;

    println!("saved {}@{}", saved.metadata.name, saved.metadata.version.clone().unwrap_or_default());
    resync_workspace_and_track_self(&mut workspace, &saved)?;
    Ok(())
}

/// `openpackage pack [name] [--force]`: stable, immutable save.
pub fn pack(ctx: &Context, name: Option<&str>, force: bool) -> anyhow::Result<()> {
    let mut workspace = ctx.load_workspace()?;
    let package_name = name.unwrap_or(&workspace.manifest.name).to_string();

    let mut manifest = workspace.manifest.clone();
    manifest.name = package_name.clone();
    if manifest.version.is_none() || manifest.version.as_deref() == Some(openpackage_version::UNVERSIONED) {
        anyhow::bail!("`{package_name}` has no version set in its manifest; pack requires one");
    }

    let detected = workspace.detected_platforms();
    let saved = openpackage_core::save_pack(&ctx.store, &workspace.root, &detected, manifest, force)?;
    println!("packed {}@{}", saved.metadata.name, saved.metadata.version.clone().unwrap_or_default());
    resync_workspace_and_track_self(&mut workspace, &saved)?;
    Ok(())
}

/// After a save/pack, re-runs the install engine so the workspace's
/// materialised files stay in lockstep with the just-saved canonical
/// payload, then records (or bumps) a self-reference dependency entry in
/// the workspace manifest pointing at the version just saved.
fn resync_workspace_and_track_self(workspace: &mut Workspace, saved: &Package) -> anyhow::Result<()> {
    let detected = workspace.detected_platforms();
    let options = InstallOptions::default();
    let plan = install_package(saved, &workspace.root, &detected, workspace.hash(), &options)?;

    let index_path = workspace.root.join(openpackage_core::INDEX_FILE_NAME);
    let mut index = PackageIndex::load(&index_path)?;
    let mut record = plan.index_record.clone();
    if let Some(previous) = index.record(&saved.metadata.name) {
        record.files = merge_files_map(&previous.files, &plan.index_record.files, true);
    }
    index.set_record(saved.metadata.name.clone(), record);
    index.save(&index_path)?;

    let dependency = Dependency::new(saved.metadata.name.clone(), saved.metadata.version.clone());
    workspace.manifest.packages.retain(|d| d.name != dependency.name);
    workspace.manifest.packages.push(dependency);
    workspace.manifest.packages.sort_by(|a, b| a.name.cmp(&b.name));
    workspace.save_manifest()?;

    for change in &plan.changes {
        println!("{:?} {}", change.outcome, change.workspace_path);
    }
    Ok(())
}

/// `openpackage duplicate <src> <dst>`: renames every version of `src` to `dst`.
pub fn duplicate(ctx: &Context, src: &str, dst: &str) -> anyhow::Result<()> {
    let src_name = PackageName::parse(src)?;
    let dst_name = PackageName::parse(dst)?;
    openpackage_core::rename_package(&ctx.store, &src_name, &dst_name)?;
    println!("duplicated {src} to {dst}");
    Ok(())
}

/// `openpackage delete <name[@version]>`.
pub fn delete(ctx: &Context, spec: &str) -> anyhow::Result<()> {
    let (name, version) = match spec.split_once('@') {
        Some((n, v)) => (PackageName::parse(n)?, Some(v.to_string())),
        None => (PackageName::parse(spec)?, None),
    };
    match version {
        Some(version) => ctx.store.delete_version(&name, &version)?,
        None => ctx.store.delete_package(&name)?,
    }
    println!("deleted {spec}");
    Ok(())
}

/// `openpackage prune [name]`: deletes every stale WIP version.
pub fn prune(ctx: &Context, name: Option<&str>) -> anyhow::Result<()> {
    let names: Vec<PackageName> = match name {
        Some(n) => vec![PackageName::parse(n)?],
        None => list_all_package_names(ctx)?,
    };
    let mut pruned = 0usize;
    for name in names {
        for raw in ctx.store.list(&name)? {
            let Ok(version) = Version::parse(&raw) else { continue };
            if !openpackage_version::is_stable(&version) {
                ctx.store.delete_version(&name, &raw)?;
                pruned += 1;
            }
        }
    }
    println!("pruned {pruned} work-in-progress version(s)");
    Ok(())
}

/// `openpackage uninstall <name>`: removes the package's materialised files
/// from the current workspace and drops its index record.
pub fn uninstall(ctx: &Context, name: &str) -> anyhow::Result<()> {
    let workspace = ctx.load_workspace()?;
    let index_path = workspace.root.join(openpackage_core::INDEX_FILE_NAME);
    let mut index = openpackage_core::PackageIndex::load(&index_path)?;
    let Some(record) = index.record(name).cloned() else {
        anyhow::bail!("`{name}` is not installed in this workspace");
    };
    for paths in record.files.values() {
        for path in paths {
            if path.ends_with('/') {
                openpackage_core::remove_dir_if_exists(&workspace.root.join(path))?;
            } else {
                let _ = fs_err::remove_file(workspace.root.join(path));
            }
        }
    }
    index.remove_record(name);
    index.save(&index_path)?;
    println!("uninstalled {name}");
    Ok(())
}

fn list_all_package_names(ctx: &Context) -> anyhow::Result<Vec<PackageName>> {
    let mut names = Vec::new();
    if !ctx.store.root().is_dir() {
        return Ok(names);
    }
    for entry in walkdir::WalkDir::new(ctx.store.root()).min_depth(1).max_depth(2) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let rel = entry.path().strip_prefix(ctx.store.root())?.to_string_lossy().replace('\\', "/");
        if let Ok(name) = PackageName::parse(&rel) {
            names.push(name);
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}
