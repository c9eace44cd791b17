use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fs_utils;

pub const INDEX_FILE_NAME: &str = ".openpackage/index.yml";
const INDEX_HEADER: &str = "# This file is managed by OpenPackage. Do not edit manually.\n";

/// `{ hash, version }` identifying the workspace a [`PackageIndexRecord`] belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub hash: String,
    pub version: String,
}

/// Per-package `files` map: canonical registry path (or directory key) to the
/// workspace paths it materialised to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageIndexRecord {
    pub workspace: WorkspaceRef,
    #[serde(default)]
    pub files: BTreeMap<String, Vec<String>>,
}

impl PackageIndexRecord {
    pub fn new(workspace_hash: String, workspace_version: String) -> Self {
        Self {
            workspace: WorkspaceRef { hash: workspace_hash, version: workspace_version },
            files: BTreeMap::new(),
        }
    }
}

/// The full per-workspace index file, one [`PackageIndexRecord`] per installed package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageIndex {
    #[serde(flatten)]
    pub packages: BTreeMap<String, PackageIndexRecord>,
}

impl PackageIndex {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs_err::read_to_string(path)?;
        Ok(serde_yaml_ng::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let body = serde_yaml_ng::to_string(&self.packages)?;
        fs_utils::write_atomic_str(path, &format!("{INDEX_HEADER}{body}"))
    }

    pub fn record(&self, package: &str) -> Option<&PackageIndexRecord> {
        self.packages.get(package)
    }

    pub fn set_record(&mut self, package: String, record: PackageIndexRecord) {
        self.packages.insert(package, record);
    }

    pub fn remove_record(&mut self, package: &str) {
        self.packages.remove(package);
    }
}

/// One installed registry path and the workspace files it produced, before
/// collapsing/pruning — the raw input to [`build_files_map`].
#[derive(Debug, Clone)]
pub struct Materialisation {
    pub registry_path: String,
    pub workspace_paths: Vec<String>,
}

/// Builds a pruned, collapsed `files` map from raw materialisations.
///
/// `excluded_targets` holds workspace paths that are already covered by a
/// platform-override key and must be removed from their base key's values.
pub fn build_files_map(
    materialisations: &[Materialisation],
    excluded_targets: &BTreeSet<String>,
) -> BTreeMap<String, Vec<String>> {
    let mut exact: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for m in materialisations {
        let values: Vec<String> = m
            .workspace_paths
            .iter()
            .filter(|p| !excluded_targets.contains(*p))
            .cloned()
            .collect();
        if !values.is_empty() {
            exact.insert(m.registry_path.clone(), sorted_unique(values));
        }
    }
    exact
}

/// Collapses a set of exact-path keys that share the same universal
/// subdir/section prefix into a single directory key. `prefix` is the
/// `<subdir>/<first-segment>/` string the caller has already determined
/// groups these keys.
pub fn collapse_into_directory_key(
    files: &BTreeMap<String, Vec<String>>,
    prefix: &str,
) -> (String, Vec<String>) {
    let mut dirs = BTreeSet::new();
    for (key, values) in files {
        if !key.starts_with(prefix) {
            continue;
        }
        for value in values {
            if let Some((dir, _)) = value.rsplit_once('/') {
                dirs.insert(format!("{dir}/"));
            } else {
                dirs.insert(String::new());
            }
        }
    }
    let pruned = prune_nested_directories(dirs);
    (prefix.to_string(), pruned)
}

/// Drops nested child directories when a parent directory is also present:
/// keep `skills/x/`, drop `skills/x/y/`.
fn prune_nested_directories(dirs: BTreeSet<String>) -> Vec<String> {
    let all: Vec<String> = dirs.into_iter().collect();
    all.iter()
        .filter(|candidate| {
            !all.iter().any(|other| other != *candidate && candidate.starts_with(other.as_str()))
        })
        .cloned()
        .collect()
}

/// Drops file keys whose registry path is no longer present in `current_paths`,
/// and directory keys with no current file under them.
pub fn prune_stale_keys(
    files: &mut BTreeMap<String, Vec<String>>,
    current_paths: &BTreeSet<String>,
) {
    files.retain(|key, _| {
        if let Some(prefix) = key.strip_suffix('/') {
            current_paths.iter().any(|p| p.starts_with(&format!("{prefix}/")) || p == prefix)
        } else {
            current_paths.contains(key)
        }
    });
}

/// Merges `previous` and `new_mapping` on an index rebuild.
/// `replace` reflects current state exactly for changed file keys; directory
/// keys always union, then re-prune nested children.
pub fn merge_files_map(
    previous: &BTreeMap<String, Vec<String>>,
    new_mapping: &BTreeMap<String, Vec<String>>,
    replace: bool,
) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    let all_keys: BTreeSet<&String> = previous.keys().chain(new_mapping.keys()).collect();
    for key in all_keys {
        let is_dir_key = key.ends_with('/');
        let prev_values = previous.get(key).cloned().unwrap_or_default();
        let new_values = new_mapping.get(key).cloned().unwrap_or_default();
        let merged = if is_dir_key || !replace {
            sorted_unique(prev_values.into_iter().chain(new_values).collect())
        } else {
            sorted_unique(new_values)
        };
        out.insert(key.clone(), merged);
    }
    let dir_keys: BTreeSet<String> = out.keys().filter(|k| k.ends_with('/')).cloned().collect();
    if !dir_keys.is_empty() {
        let pruned = prune_nested_directories(dir_keys.clone());
        let pruned_set: BTreeSet<String> = pruned.into_iter().collect();
        out.retain(|k, _| !k.ends_with('/') || pruned_set.contains(k));
    }
    out
}

fn sorted_unique(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn build_files_map_excludes_override_covered_targets() {
        let materialisations = vec![Materialisation {
            registry_path: "rules/auth.md".into(),
            workspace_paths: vec![".claude/rules/auth.md".into(), ".cursor/rules/auth.mdc".into()],
        }];
        let mut excluded = BTreeSet::new();
        excluded.insert(".cursor/rules/auth.mdc".to_string());
        let files = build_files_map(&materialisations, &excluded);
        assert_eq!(files["rules/auth.md"], vec![".claude/rules/auth.md"]);
    }

    #[test]
    fn prune_nested_directories_keeps_only_parent() {
        let mut dirs = BTreeSet::new();
        dirs.insert("skills/x/".to_string());
        dirs.insert("skills/x/y/".to_string());
        let pruned = prune_nested_directories(dirs);
        assert_eq!(pruned, vec!["skills/x/".to_string()]);
    }

    #[test]
    fn prune_stale_keys_drops_missing_file_keys() {
        let mut files = BTreeMap::new();
        files.insert("rules/a.md".to_string(), vec!["x".to_string()]);
        files.insert("rules/b.md".to_string(), vec!["y".to_string()]);
        let mut current = BTreeSet::new();
        current.insert("rules/a.md".to_string());
        prune_stale_keys(&mut files, &current);
        assert!(files.contains_key("rules/a.md"));
        assert!(!files.contains_key("rules/b.md"));
    }

    #[test]
    fn merge_replace_mode_reflects_new_state_for_file_keys() {
        let mut previous = BTreeMap::new();
        previous.insert("rules/a.md".to_string(), vec!["old".to_string()]);
        let mut new_mapping = BTreeMap::new();
        new_mapping.insert("rules/a.md".to_string(), vec!["new".to_string()]);
        let merged = merge_files_map(&previous, &new_mapping, true);
        assert_eq!(merged["rules/a.md"], vec!["new".to_string()]);
    }

    #[test]
    fn merge_union_mode_combines_values() {
        let mut previous = BTreeMap::new();
        previous.insert("rules/a.md".to_string(), vec!["old".to_string()]);
        let mut new_mapping = BTreeMap::new();
        new_mapping.insert("rules/a.md".to_string(), vec!["new".to_string()]);
        let merged = merge_files_map(&previous, &new_mapping, false);
        assert_eq!(merged["rules/a.md"], vec!["new".to_string(), "old".to_string()]);
    }

    #[test]
    fn merge_union_mode_preserves_untouched_keys_across_the_whole_map() {
        let mut previous = BTreeMap::new();
        previous.insert("rules/a.md".to_string(), vec!["old".to_string()]);
        previous.insert("rules/untouched.md".to_string(), vec!["same".to_string()]);
        let mut new_mapping = BTreeMap::new();
        new_mapping.insert("rules/a.md".to_string(), vec!["new".to_string()]);
        let merged = merge_files_map(&previous, &new_mapping, false);

        let mut expected = BTreeMap::new();
        expected.insert("rules/a.md".to_string(), vec!["new".to_string(), "old".to_string()]);
        expected.insert("rules/untouched.md".to_string(), vec!["same".to_string()]);
        assert_eq!(merged, expected);
    }

    #[test]
    fn index_round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.yml");
        let mut index = PackageIndex::default();
        let mut record = PackageIndexRecord::new("hash123".into(), "1.0.0".into());
        record.files.insert("rules/a.md".into(), vec![".claude/rules/a.md".into()]);
        index.set_record("tools".into(), record);
        index.save(&path).unwrap();
        let loaded = PackageIndex::load(&path).unwrap();
        assert_eq!(loaded.record("tools").unwrap().workspace.hash, "hash123");
    }
}
