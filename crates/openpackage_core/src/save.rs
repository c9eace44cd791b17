use std::collections::BTreeMap;
use std::path::Path;

use openpackage_platform::Platform;
use semver::Version;

use crate::error::{Error, Result};
use crate::fs_utils;
use crate::manifest::PackageManifest;
use crate::name::{classify_registry_path, RegistryPathClass, MANIFEST_FILE_NAME};
use crate::package::{Package, PackageFile};
use crate::store::LocalRegistryStore;

/// The outcome of deciding the next WIP version's base and counter.
#[derive(Debug, Clone)]
pub struct WipCycleDecision {
    pub base: Version,
    pub counter: u64,
    /// True when the stream was reset because the manifest's target version
    /// changed underneath the last recorded workspace version.
    pub reset: bool,
}

/// Computes the base version and counter for the next WIP save.
pub fn compute_wip_cycle(
    manifest_version: &Version,
    last_workspace_version: Option<&Version>,
    last_counter: u64,
) -> WipCycleDecision {
    let Some(last) = last_workspace_version else {
        return WipCycleDecision { base: manifest_version.clone(), counter: 0, reset: true };
    };
    let last_base = openpackage_version::base_of(last);
    if last_base != *manifest_version {
        return WipCycleDecision { base: manifest_version.clone(), counter: 0, reset: true };
    }
    if openpackage_version::is_stable(last) {
        return WipCycleDecision { base: openpackage_version::patch(manifest_version), counter: 0, reset: false };
    }
    WipCycleDecision { base: last_base, counter: last_counter + 1, reset: false }
}

pub fn generate_wip_version(
    manifest_version: &Version,
    workspace_path: &str,
    last_workspace_version: Option<&Version>,
    last_counter: u64,
) -> (Version, WipCycleDecision) {
    let decision = compute_wip_cycle(manifest_version, last_workspace_version, last_counter);
    let version = openpackage_version::generate_wip(&decision.base, workspace_path, decision.counter);
    (version, decision)
}

/// One file gathered while harvesting a package back from its installed state.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub canonical_path: String,
    pub content: String,
    pub source: CandidateSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Workspace,
    Local,
}

/// Walks every detected platform's materialised files and maps each back to
/// its canonical path.
pub fn harvest_workspace_candidates(
    workspace_root: &Path,
    detected_platforms: &[&Platform],
) -> Result<Vec<Candidate>> {
    let mut out = Vec::new();
    for platform in detected_platforms {
        if platform.root_dir == "." {
            continue;
        }
        let root = workspace_root.join(platform.root_dir);
        if !root.is_dir() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&root).into_iter().filter_map(std::result::Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(workspace_root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            let Ok(Some(canonical)) = openpackage_platform::canonical_from_platform_path(&rel, platform) else {
                continue;
            };
            let content = fs_err::read_to_string(entry.path()).unwrap_or_default();
            let canonical_path = format!("{}/{}.{}", canonical.subdir, canonical.stem, canonical.ext);
            out.push(Candidate { canonical_path, content, source: CandidateSource::Workspace });
        }
    }
    Ok(out)
}

/// Reads the existing stored payload (the prior WIP or stable version, if
/// any) as the local-candidates sweep.
pub fn harvest_local_candidates(existing: Option<&Package>) -> Vec<Candidate> {
    let Some(existing) = existing else { return Vec::new() };
    existing
        .content_files()
        .filter(|f| matches!(classify_registry_path(&f.path), RegistryPathClass::Universal(_) | RegistryPathClass::Workspace))
        .map(|f| Candidate { canonical_path: f.path.clone(), content: f.content.clone(), source: CandidateSource::Local })
        .collect()
}

/// Resolves conflicts between workspace and local candidates for the same
/// canonical path: the workspace candidate wins when its content hash
/// differs from the local one.
pub fn resolve_candidates(workspace: Vec<Candidate>, local: Vec<Candidate>) -> Vec<PackageFile> {
    let mut by_path: BTreeMap<String, Candidate> = BTreeMap::new();
    for candidate in local {
        by_path.insert(candidate.canonical_path.clone(), candidate);
    }
    for candidate in workspace {
        match by_path.get(&candidate.canonical_path) {
            Some(existing) if fs_utils::content_hash(existing.content.as_bytes()) == fs_utils::content_hash(candidate.content.as_bytes()) => {}
            _ => {
                by_path.insert(candidate.canonical_path.clone(), candidate);
            }
        }
    }
    by_path
        .into_values()
        .map(|c| PackageFile::text(c.canonical_path, c.content))
        .collect()
}

/// Save (WIP): harvests, merges, writes the new WIP version, and deletes
/// older WIP versions belonging to the same workspace tag.
pub fn save_wip(
    store: &LocalRegistryStore,
    workspace_root: &Path,
    workspace_path: &str,
    detected_platforms: &[&Platform],
    mut manifest: PackageManifest,
    last_workspace_version: Option<&Version>,
    last_counter: u64,
) -> Result<Package> {
    let manifest_version = manifest
        .version
        .as_deref()
        .map(openpackage_version::parse_base_version)
        .transpose()
        .map_err(|_| Error::InvalidVersion(manifest.name.clone()))?
        .ok_or_else(|| Error::ValidationError("save requires a manifest version".into()))?;

    let (wip_version, _decision) =
        generate_wip_version(&manifest_version, workspace_path, last_workspace_version, last_counter);

    let name = crate::name::PackageName::parse(&manifest.name)?;
    let existing = store.load(&name, Some(&wip_version.to_string())).ok();

    let workspace_candidates = harvest_workspace_candidates(workspace_root, detected_platforms)?;
    let local_candidates = harvest_local_candidates(existing.as_ref());
    let files = resolve_candidates(workspace_candidates, local_candidates);

    manifest.version = Some(wip_version.to_string());
    let package = Package::new(manifest, files)?;
    store.save(&package, package.metadata.is_partial())?;

    prune_stale_wip_versions(store, &name, workspace_path, &wip_version)?;

    Ok(package)
}

/// Pack (stable): same pipeline, target version is `manifest.version`;
/// refuses on a pre-existing version unless `force`.
pub fn save_pack(
    store: &LocalRegistryStore,
    workspace_root: &Path,
    detected_platforms: &[&Platform],
    manifest: PackageManifest,
    force: bool,
) -> Result<Package> {
    let name = crate::name::PackageName::parse(&manifest.name)?;
    let version = manifest
        .version
        .clone()
        .ok_or_else(|| Error::ValidationError("pack requires a manifest version".into()))?;

    if !force {
        let state = store.version_state(&name, &version)?;
        if state.exists {
            return Err(Error::Conflict(format!("{name}@{version}")));
        }
    }

    let existing = store.load(&name, Some(&version)).ok();
    let workspace_candidates = harvest_workspace_candidates(workspace_root, detected_platforms)?;
    let local_candidates = harvest_local_candidates(existing.as_ref());
    let files = resolve_candidates(workspace_candidates, local_candidates);

    let package = Package::new(manifest, files)?;
    store.save(&package, package.metadata.is_partial())?;
    Ok(package)
}

/// Deletes WIP versions of `name` tagged for `workspace_path` other than `keep`.
fn prune_stale_wip_versions(
    store: &LocalRegistryStore,
    name: &crate::name::PackageName,
    workspace_path: &str,
    keep: &Version,
) -> Result<()> {
    let tag = openpackage_version::workspace_tag(workspace_path);
    for raw in store.list(name)? {
        if raw == keep.to_string() || openpackage_version::is_unversioned(&raw) {
            continue;
        }
        let Ok(version) = Version::parse(&raw) else { continue };
        if openpackage_version::is_stable(&version) {
            continue;
        }
        if version.pre.as_str().starts_with(&tag) {
            store.delete_version(name, &raw)?;
        }
    }
    Ok(())
}

/// Renames a package both in the local store and at the workspace manifest
/// level.
pub fn rename_package(
    store: &LocalRegistryStore,
    old: &crate::name::PackageName,
    new: &crate::name::PackageName,
) -> Result<()> {
    store.rename_package(old, new)
}

/// `f@UNVERSIONED` single-file helper: appends `path` to the helper
/// package's tracked file list (deduplicated, sorted) and re-emits the full
/// payload.
pub fn save_single_file(
    store: &LocalRegistryStore,
    helper_name: &str,
    mut tracked_paths: Vec<String>,
    new_path: &str,
    new_content: &str,
) -> Result<(Package, Vec<String>)> {
    if !tracked_paths.iter().any(|p| p == new_path) {
        tracked_paths.push(new_path.to_string());
    }
    tracked_paths.sort();
    tracked_paths.dedup();

    let manifest = PackageManifest {
        name: helper_name.to_string(),
        version: Some(openpackage_version::UNVERSIONED.to_string()),
        ..Default::default()
    };
    let mut files: Vec<PackageFile> = tracked_paths
        .iter()
        .map(|p| {
            let content = if p == new_path { new_content.to_string() } else { String::new() };
            PackageFile::text(p.clone(), content)
        })
        .collect();
    files.retain(|f| f.path != MANIFEST_FILE_NAME);
    let package = Package::new(manifest, files)?;
    store.save(&package, false)?;
    Ok((package, tracked_paths))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn wip_resets_when_manifest_base_changes() {
        let last = v("1.0.1-tag123.0");
        let decision = compute_wip_cycle(&v("1.1.0"), Some(&last), 0);
        assert!(decision.reset);
        assert_eq!(decision.base, v("1.1.0"));
        assert_eq!(decision.counter, 0);
    }

    #[test]
    fn wip_starts_from_patch_after_a_stable_pack() {
        let last = v("1.0.0");
        let decision = compute_wip_cycle(&v("1.0.0"), Some(&last), 0);
        assert!(!decision.reset);
        assert_eq!(decision.base, v("1.0.1"));
    }

    #[test]
    fn wip_continues_counter_within_same_stream() {
        let last = v("1.0.1-tag123.4");
        let decision = compute_wip_cycle(&v("1.0.1"), Some(&last), 4);
        assert_eq!(decision.counter, 5);
        assert_eq!(decision.base, v("1.0.1"));
    }

    #[test]
    fn resolve_candidates_prefers_workspace_on_content_mismatch() {
        let local = vec![Candidate { canonical_path: "rules/a.md".into(), content: "old".into(), source: CandidateSource::Local }];
        let workspace = vec![Candidate { canonical_path: "rules/a.md".into(), content: "new".into(), source: CandidateSource::Workspace }];
        let files = resolve_candidates(workspace, local);
        assert_eq!(files[0].content, "new");
    }

    #[test]
    fn single_file_save_appends_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalRegistryStore::new(dir.path());
        let (_pkg, tracked) = save_single_file(&store, "snippet", vec!["a.md".into()], "b.md", "hi").unwrap();
        assert_eq!(tracked, vec!["a.md".to_string(), "b.md".to_string()]);
        let (_pkg2, tracked2) = save_single_file(&store, "snippet", tracked, "a.md", "updated").unwrap();
        assert_eq!(tracked2, vec!["a.md".to_string(), "b.md".to_string()]);
    }
}
