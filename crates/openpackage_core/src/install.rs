use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use openpackage_platform::{CanonicalFile, Platform, PlatformId, UniversalSubdir};

use crate::error::Result;
use crate::fs_utils;
use crate::index::{Materialisation, PackageIndexRecord};
use crate::name::{classify_registry_path, RegistryPathClass};
use crate::package::Package;
use crate::rootfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    Ask,
    KeepBoth,
    Overwrite,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Created,
    Unchanged,
    Overwritten,
    Kept,
    Renamed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct FileChange {
    pub workspace_path: String,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone)]
pub struct RootFileUpdate {
    pub path: String,
    pub new_content: String,
}

#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub changes: Vec<FileChange>,
    pub index_record: PackageIndexRecord,
    pub root_file_updates: Vec<RootFileUpdate>,
}

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub conflict_strategy: ConflictStrategy,
    pub dry_run: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self { conflict_strategy: ConflictStrategy::Overwrite, dry_run: false }
    }
}

/// Materialises `package` into `workspace_root` across `detected_platforms`.
/// When `options.dry_run` is set, computes the full plan without writing
/// anything to disk.
pub fn install_package(
    package: &Package,
    workspace_root: &Path,
    detected_platforms: &[&Platform],
    workspace_hash: String,
    options: &InstallOptions,
) -> Result<InstallPlan> {
    let mut changes = Vec::new();
    let mut materialisations = Vec::new();
    let mut root_bodies: BTreeMap<String, String> = BTreeMap::new();

    let (overrides, bases, yaml_overlays) = partition_universal_files(package);

    // Base universal files: fan out to every detected platform that doesn't
    // have a platform-specific override for the same stem.
    for (key, rel, subdir, ext) in &bases {
        let overridden_platforms: BTreeSet<PlatformId> = overrides
            .iter()
            .filter(|(_, o_rel, o_subdir, _, _)| o_subdir == subdir && strip_suffix_stem(o_rel) == *rel)
            .map(|(_, _, _, platform, _)| *platform)
            .collect();

        let content = package.file(key).map(|f| f.content.clone()).unwrap_or_default();
        let mut targets = Vec::new();
        for platform in detected_platforms {
            if overridden_platforms.contains(&platform.id) {
                continue;
            }
            let file = CanonicalFile { subdir: *subdir, stem: rel.clone(), ext: ext.clone() };
            if let Some(target) = openpackage_platform::platform_target(&file, platform)
                .map_err(|e| crate::error::Error::ValidationError(e.to_string()))?
            {
                let overlay = yaml_overlays.get(&(*subdir, rel.clone(), platform.id));
                let rendered = match overlay {
                    Some(overlay_yaml) => apply_yaml_overlay(&content, overlay_yaml)?,
                    None => content.clone(),
                };
                targets.push((target, rendered));
            }
        }
        write_targets(workspace_root, &targets, options, &mut changes)?;
        materialisations.push(Materialisation {
            registry_path: key.clone(),
            workspace_paths: targets.into_iter().map(|(p, _)| p).collect(),
        });
    }

    // Platform-override universal files: target only their own platform.
    for (key, rel, subdir, platform, ext) in &overrides {
        let Some(def) = detected_platforms.iter().find(|p| p.id == *platform) else {
            continue;
        };
        let stem = strip_suffix_stem(rel);
        let file = CanonicalFile { subdir: *subdir, stem, ext: ext.clone() };
        let content = package.file(key).map(|f| f.content.clone()).unwrap_or_default();
        let mut targets = Vec::new();
        if let Some(target) = openpackage_platform::platform_target(&file, def)
            .map_err(|e| crate::error::Error::ValidationError(e.to_string()))?
        {
            targets.push((target, content));
        }
        write_targets(workspace_root, &targets, options, &mut changes)?;
        materialisations.push(Materialisation {
            registry_path: key.clone(),
            workspace_paths: targets.into_iter().map(|(p, _)| p).collect(),
        });
    }

    // Root files and plain workspace files.
    for file in package.content_files() {
        let class = classify_registry_path(&file.path);
        match class {
            RegistryPathClass::Root => {
                root_bodies.insert(file.path.clone(), file.content.clone());
            }
            RegistryPathClass::Workspace => {
                let target = file.path.clone();
                write_targets(workspace_root, &[(target.clone(), file.content.clone())], options, &mut changes)?;
                materialisations.push(Materialisation { registry_path: file.path.clone(), workspace_paths: vec![target] });
            }
            RegistryPathClass::Universal(_) | RegistryPathClass::Manifest => {}
        }
    }

    let root_file_updates = plan_root_file_updates(workspace_root, &package.metadata.name, &root_bodies, detected_platforms, options)?;

    let mut record = PackageIndexRecord::new(
        workspace_hash,
        package.metadata.version.clone().unwrap_or_else(|| openpackage_version::UNVERSIONED.to_string()),
    );
    let current_paths: BTreeSet<String> = materialisations
        .iter()
        .flat_map(|m| m.workspace_paths.iter().cloned())
        .collect();
    let mut files_map = crate::index::build_files_map(&materialisations, &BTreeSet::new());
    crate::index::prune_stale_keys(&mut files_map, &current_paths);
    collapse_universal_directories(&mut files_map);
    record.files = files_map;

    Ok(InstallPlan { changes, index_record: record, root_file_updates })
}

/// Collapses exact file keys that share a universal subdir's nested
/// directory (e.g. multiple files under `skills/my-skill/`) into a single
/// directory key, so a multi-file package component is tracked and pruned
/// as one unit rather than per file.
fn collapse_universal_directories(files: &mut BTreeMap<String, Vec<String>>) {
    let mut prefixes: BTreeSet<String> = BTreeSet::new();
    for key in files.keys() {
        if let RegistryPathClass::Universal(info) = classify_registry_path(key) {
            if let Some((first_segment, rest)) = info.rel.split_once('/') {
                if !rest.is_empty() {
                    prefixes.insert(format!("{}/{first_segment}/", info.subdir));
                }
            }
        }
    }
    for prefix in prefixes {
        let (dir_key, dir_values) = crate::index::collapse_into_directory_key(files, &prefix);
        files.retain(|k, _| !k.starts_with(prefix.as_str()));
        if !dir_values.is_empty() {
            files.insert(dir_key, dir_values);
        }
    }
}

type BaseEntry = (String, String, UniversalSubdir, String);
type OverrideEntry = (String, String, UniversalSubdir, PlatformId, String);

/// Splits a package's universal-subdir files into platform overrides and
/// base files, and collects sibling YAML overlay files keyed by `(subdir, stem, platform)`.
fn partition_universal_files(
    package: &Package,
) -> (Vec<OverrideEntry>, Vec<BaseEntry>, BTreeMap<(UniversalSubdir, String, PlatformId), String>) {
    let mut overrides = Vec::new();
    let mut bases = Vec::new();
    let mut overlays = BTreeMap::new();

    for file in package.content_files() {
        let RegistryPathClass::Universal(info) = classify_registry_path(&file.path) else { continue };
        if crate::name::is_yaml_override(&info.rel) {
            if let (Some(platform), Some((stem, _ext))) = (info.platform_suffix, strip_platform_and_ext(&info.rel)) {
                overlays.insert((info.subdir, stem, platform), file.content.clone());
            }
            continue;
        }
        let Some((stem, ext)) = info.rel.rsplit_once('.') else { continue };
        match info.platform_suffix {
            Some(platform) => {
                overrides.push((file.path.clone(), info.rel.clone(), info.subdir, platform, ext.to_string()));
            }
            None => {
                bases.push((file.path.clone(), stem.to_string(), info.subdir, ext.to_string()));
            }
        }
    }

    (overrides, bases, overlays)
}

fn strip_suffix_stem(rel: &str) -> String {
    // rel looks like "auth.cursor.md"; the base stem is "auth".
    let parts: Vec<&str> = rel.split('.').collect();
    if parts.len() >= 3 {
        parts[..parts.len() - 2].join(".")
    } else {
        rel.to_string()
    }
}

fn strip_platform_and_ext(rel: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = rel.split('.').collect();
    if parts.len() < 3 {
        return None;
    }
    let stem = parts[..parts.len() - 2].join(".");
    let ext = parts[parts.len() - 1].to_string();
    Some((stem, ext))
}

fn write_targets(
    workspace_root: &Path,
    targets: &[(String, String)],
    options: &InstallOptions,
    changes: &mut Vec<FileChange>,
) -> Result<()> {
    for (rel, content) in targets {
        let path = workspace_root.join(rel);
        let outcome = decide_outcome(&path, content, options.conflict_strategy)?;
        if !options.dry_run {
            match outcome {
                FileOutcome::Skipped | FileOutcome::Unchanged | FileOutcome::Kept => {}
                _ => fs_utils::write_atomic_str(&path, content)?,
            }
        }
        changes.push(FileChange { workspace_path: rel.clone(), outcome });
    }
    Ok(())
}

fn decide_outcome(path: &Path, content: &str, strategy: ConflictStrategy) -> Result<FileOutcome> {
    if !path.is_file() {
        return Ok(FileOutcome::Created);
    }
    let existing = fs_err::read_to_string(path).unwrap_or_default();
    if existing == content {
        return Ok(FileOutcome::Unchanged);
    }
    Ok(match strategy {
        ConflictStrategy::Overwrite => FileOutcome::Overwritten,
        ConflictStrategy::Skip => FileOutcome::Skipped,
        ConflictStrategy::KeepBoth => FileOutcome::Renamed,
        // `ask` without an attached interactive collaborator defaults to the
        // conservative choice; the CLI façade is expected to resolve `ask`
        // against `UserInteraction` before calling into this engine.
        ConflictStrategy::Ask => FileOutcome::Kept,
    })
}

fn plan_root_file_updates(
    workspace_root: &Path,
    package_name: &str,
    root_bodies: &BTreeMap<String, String>,
    detected_platforms: &[&Platform],
    options: &InstallOptions,
) -> Result<Vec<RootFileUpdate>> {
    let universal_body = root_bodies.get("AGENTS.md").cloned().unwrap_or_default();
    if universal_body.is_empty() && root_bodies.is_empty() {
        return Ok(Vec::new());
    }

    let mut targets: BTreeSet<String> = BTreeSet::new();
    targets.insert("AGENTS.md".to_string());
    for platform in detected_platforms {
        if let Some(root_file) = platform.root_file {
            targets.insert(root_file.to_string());
        }
    }

    let mut updates = Vec::new();
    for target in targets {
        let is_universal_root = target == "AGENTS.md";
        let platform_body = root_bodies.get(&target).map(String::as_str);
        let body = rootfile::section_body_for(is_universal_root, &universal_body, platform_body);
        let path = workspace_root.join(&target);
        let existing = fs_err::read_to_string(&path).unwrap_or_default();
        let merged = rootfile::merge_section(&existing, package_name, body);
        if merged != existing {
            if !options.dry_run {
                fs_utils::write_atomic_str(&path, &merged)?;
            }
            updates.push(RootFileUpdate { path: target, new_content: merged });
        }
    }
    Ok(updates)
}

/// Shallow-merges a sibling YAML override on top of a markdown file's
/// frontmatter block.
fn apply_yaml_overlay(content: &str, overlay_yaml: &str) -> Result<String> {
    let overlay: serde_yaml_ng::Value = serde_yaml_ng::from_str(overlay_yaml)?;
    let (mut frontmatter, body) = split_frontmatter(content);
    if let (serde_yaml_ng::Value::Mapping(base), serde_yaml_ng::Value::Mapping(over)) =
        (&mut frontmatter, &overlay)
    {
        for (k, v) in over {
            base.insert(k.clone(), v.clone());
        }
    } else if matches!(frontmatter, serde_yaml_ng::Value::Null) {
        frontmatter = overlay;
    }
    if matches!(frontmatter, serde_yaml_ng::Value::Null) {
        return Ok(body);
    }
    let rendered = serde_yaml_ng::to_string(&frontmatter)?;
    Ok(format!("---\n{rendered}---\n{body}"))
}

fn split_frontmatter(content: &str) -> (serde_yaml_ng::Value, String) {
    if let Some(rest) = content.strip_prefix("---\n") {
        if let Some(end) = rest.find("\n---\n") {
            let yaml = &rest[..end];
            let body = &rest[end + 5..];
            if let Ok(value) = serde_yaml_ng::from_str(yaml) {
                return (value, body.to_string());
            }
        }
    }
    (serde_yaml_ng::Value::Null, content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PackageManifest;
    use crate::package::PackageFile;
    use openpackage_platform::PlatformRegistry;
    use tempfile::tempdir;

    fn platforms(ids: &[PlatformId]) -> Vec<Platform> {
        ids.iter().map(|id| *PlatformRegistry::definition(*id).unwrap()).collect()
    }

    #[test]
    fn installs_base_rule_to_every_detected_platform() {
        let dir = tempdir().unwrap();
        let metadata = PackageManifest { name: "tools".into(), version: Some("1.0.0".into()), ..Default::default() };
        let package = crate::package::Package::new(metadata, vec![PackageFile::text("rules/review.md", "be nice")]).unwrap();
        let defs = platforms(&[PlatformId::Claude, PlatformId::Cursor]);
        let refs: Vec<&Platform> = defs.iter().collect();
        let plan = install_package(&package, dir.path(), &refs, "hash".into(), &InstallOptions::default()).unwrap();
        assert!(dir.path().join(".claude/rules/review.md").is_file());
        assert!(dir.path().join(".cursor/rules/review.mdc").is_file());
        assert_eq!(plan.index_record.files["rules/review.md"].len(), 2);
    }

    #[test]
    fn platform_override_excludes_base_target() {
        let dir = tempdir().unwrap();
        let metadata = PackageManifest { name: "tools".into(), version: Some("1.0.0".into()), ..Default::default() };
        let package = crate::package::Package::new(
            metadata,
            vec![
                PackageFile::text("rules/auth.md", "base body"),
                PackageFile::text("rules/auth.cursor.md", "cursor body"),
            ],
        )
        .unwrap();
        let defs = platforms(&[PlatformId::Claude, PlatformId::Cursor]);
        let refs: Vec<&Platform> = defs.iter().collect();
        let plan = install_package(&package, dir.path(), &refs, "hash".into(), &InstallOptions::default()).unwrap();

        assert_eq!(plan.index_record.files["rules/auth.md"], vec![".claude/rules/auth.md".to_string()]);
        assert_eq!(
            plan.index_record.files["rules/auth.cursor.md"],
            vec![".cursor/rules/auth.mdc".to_string()]
        );
        assert_eq!(
            fs_err::read_to_string(dir.path().join(".cursor/rules/auth.mdc")).unwrap(),
            "cursor body"
        );
    }

    #[test]
    fn dry_run_does_not_write_files() {
        let dir = tempdir().unwrap();
        let metadata = PackageManifest { name: "tools".into(), version: Some("1.0.0".into()), ..Default::default() };
        let package = crate::package::Package::new(metadata, vec![PackageFile::text("rules/review.md", "be nice")]).unwrap();
        let defs = platforms(&[PlatformId::Claude]);
        let refs: Vec<&Platform> = defs.iter().collect();
        let options = InstallOptions { dry_run: true, ..Default::default() };
        let plan = install_package(&package, dir.path(), &refs, "hash".into(), &options).unwrap();
        assert!(!dir.path().join(".claude/rules/review.md").is_file());
        assert_eq!(plan.changes[0].outcome, FileOutcome::Created);
    }

    #[test]
    fn multi_file_skill_collapses_into_a_directory_key() {
        let dir = tempdir().unwrap();
        let metadata = PackageManifest { name: "tools".into(), version: Some("1.0.0".into()), ..Default::default() };
        let package = crate::package::Package::new(
            metadata,
            vec![
                PackageFile::text("skills/my-skill/SKILL.md", "main"),
                PackageFile::text("skills/my-skill/helper.md", "helper"),
            ],
        )
        .unwrap();
        let defs = platforms(&[PlatformId::Claude]);
        let refs: Vec<&Platform> = defs.iter().collect();
        let plan = install_package(&package, dir.path(), &refs, "hash".into(), &InstallOptions::default()).unwrap();

        assert!(!plan.index_record.files.contains_key("skills/my-skill/SKILL.md"));
        assert!(!plan.index_record.files.contains_key("skills/my-skill/helper.md"));
        assert_eq!(
            plan.index_record.files["skills/my-skill/"],
            vec![".claude/skills/my-skill/".to_string()]
        );
    }

    #[test]
    fn root_files_from_two_installs_coexist() {
        let dir = tempdir().unwrap();
        let defs = platforms(&[PlatformId::Claude]);
        let refs: Vec<&Platform> = defs.iter().collect();

        let manifest_a = PackageManifest { name: "pkg-a".into(), version: Some("1.0.0".into()), ..Default::default() };
        let pkg_a = crate::package::Package::new(manifest_a, vec![PackageFile::text("AGENTS.md", "A")]).unwrap();
        install_package(&pkg_a, dir.path(), &refs, "hash".into(), &InstallOptions::default()).unwrap();

        let manifest_b = PackageManifest { name: "pkg-b".into(), version: Some("1.0.0".into()), ..Default::default() };
        let pkg_b = crate::package::Package::new(manifest_b, vec![PackageFile::text("AGENTS.md", "B")]).unwrap();
        install_package(&pkg_b, dir.path(), &refs, "hash".into(), &InstallOptions::default()).unwrap();

        let content = fs_err::read_to_string(dir.path().join("AGENTS.md")).unwrap();
        assert!(content.contains("pkg-a"));
        assert!(content.contains("pkg-b"));
    }
}
