use crate::error::MappingError;
use crate::registry::{Platform, PlatformRegistry};
use crate::subdir::UniversalSubdir;

/// A canonical payload file, split into the parts the mapping engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalFile {
    pub subdir: UniversalSubdir,
    /// Path relative to the subdir, without extension (e.g. `"auth/review"`).
    pub stem: String,
    /// Canonical extension, always `"md"` for content authored in this system
    /// but kept explicit since the index stores it per record.
    pub ext: String,
}

/// Splits `path` (relative to the package payload root) into subdir + stem + ext.
/// Returns `None` if `path` does not start with one of the four universal
/// subdirectory names.
pub fn parse_canonical_path(path: &str) -> Option<CanonicalFile> {
    let mut parts = path.splitn(2, '/');
    let head = parts.next()?;
    let rest = parts.next()?;
    let subdir = UniversalSubdir::from_str(head)?;
    let (stem, ext) = rest.rsplit_once('.')?;
    Some(CanonicalFile { subdir, stem: stem.to_string(), ext: ext.to_string() })
}

/// Maps one canonical file onto its materialised location for `platform`, per
/// the translation steps: look up the subdir spec, remap the extension, and
/// join onto the platform's root dir.
///
/// Returns `Ok(None)` when the platform simply does not carry this universal
/// subdir at all (e.g. Cursor has no `agents`/`skills` concept) — this is not
/// an error, it just means nothing is materialised there for that platform.
pub fn platform_target(
    file: &CanonicalFile,
    platform: &Platform,
) -> Result<Option<String>, MappingError> {
    let Some(spec) = platform.subdir(file.subdir) else {
        return Ok(None);
    };
    let workspace_ext = spec
        .ext_map
        .iter()
        .find(|(canon, _)| *canon == file.ext)
        .map(|(_, workspace)| *workspace)
        .ok_or_else(|| {
            MappingError::ExtensionNotMapped(file.ext.clone(), platform.id.to_string())
        })?;
    let root = if platform.root_dir == "." {
        String::new()
    } else {
        format!("{}/", platform.root_dir)
    };
    Ok(Some(format!("{root}{}/{}.{workspace_ext}", spec.path, file.stem)))
}

/// Computes every platform-materialised target for a canonical file, across
/// all detected platforms. Platforms that don't carry the file's subdir are
/// silently skipped (see [`platform_target`]).
pub fn platform_targets(
    file: &CanonicalFile,
    platforms: &[&Platform],
) -> Result<Vec<(crate::registry::PlatformId, String)>, MappingError> {
    let mut out = Vec::new();
    for platform in platforms {
        if let Some(target) = platform_target(file, platform)? {
            out.push((platform.id, target));
        }
    }
    Ok(out)
}

/// Recovers the canonical subdir + stem from a path materialised under one
/// platform's `root_dir`. This is a single-platform, syntactic inverse of
/// [`platform_target`]: it does not know about platform-override filenames
/// (`<stem>.<platform>.<ext>`) left behind by a prior save — that comparison
/// across platforms is the save engine's job, since it requires looking at
/// every platform's copy at once to decide which are "the same" content.
pub fn canonical_from_platform_path(
    path: &str,
    platform: &Platform,
) -> Result<Option<CanonicalFile>, MappingError> {
    let rest = if platform.root_dir == "." {
        path
    } else {
        match path.strip_prefix(&format!("{}/", platform.root_dir)) {
            Some(rest) => rest,
            None => return Ok(None),
        }
    };
    for (subdir, spec) in platform.subdirs {
        let Some(rest) = rest.strip_prefix(&format!("{}/", spec.path)) else {
            continue;
        };
        let Some((stem, workspace_ext)) = split_workspace_ext(rest, spec.exts) else {
            continue;
        };
        if let Some(allowed) = spec.exts {
            if !allowed.contains(&workspace_ext.as_str()) {
                return Err(MappingError::ExtensionNotAllowed(
                    workspace_ext,
                    platform.id.to_string(),
                ));
            }
        }
        let canonical_ext = spec
            .ext_map
            .iter()
            .find(|(_, workspace)| *workspace == workspace_ext)
            .map(|(canon, _)| canon.to_string())
            .unwrap_or(workspace_ext);
        return Ok(Some(CanonicalFile { subdir: *subdir, stem, ext: canonical_ext }));
    }
    Ok(None)
}

/// Splits a workspace-relative file name into `(stem, ext)`, preferring the
/// longest extension known to `allowed` (so `"foo.instructions.md"` splits as
/// `("foo", "instructions.md")` rather than `("foo.instructions", "md")`).
fn split_workspace_ext(rest: &str, allowed: Option<&'static [&'static str]>) -> Option<(String, String)> {
    if let Some(allowed) = allowed {
        let mut candidates: Vec<&str> = allowed.to_vec();
        candidates.sort_by_key(|e| std::cmp::Reverse(e.len()));
        for ext in candidates {
            if let Some(stem) = rest.strip_suffix(&format!(".{ext}")) {
                return Some((stem.to_string(), ext.to_string()));
            }
        }
    }
    let (stem, ext) = rest.rsplit_once('.')?;
    Some((stem.to_string(), ext.to_string()))
}

/// Finds every platform detected in a workspace and, for the given platform
/// id, returns its definition — convenience wrapper used by the install engine.
pub fn find_detected(
    platforms: &[&Platform],
    id: crate::registry::PlatformId,
) -> Option<Platform> {
    platforms.iter().find(|p| p.id == id).map(|p| **p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PlatformId, PLATFORMS};

    fn platform(id: PlatformId) -> &'static Platform {
        PlatformRegistry::definition(id).unwrap()
    }

    #[test]
    fn parses_canonical_subdir_stem_ext() {
        let file = parse_canonical_path("rules/auth/review.md").unwrap();
        assert_eq!(file.subdir, UniversalSubdir::Rules);
        assert_eq!(file.stem, "auth/review");
        assert_eq!(file.ext, "md");
    }

    #[test]
    fn non_universal_prefix_is_rejected() {
        assert!(parse_canonical_path("snippets/x.md").is_none());
    }

    #[test]
    fn claude_rules_map_with_extension_preserved() {
        let file = CanonicalFile { subdir: UniversalSubdir::Rules, stem: "review".into(), ext: "md".into() };
        let target = platform_target(&file, platform(PlatformId::Claude)).unwrap().unwrap();
        assert_eq!(target, ".claude/rules/review.md");
    }

    #[test]
    fn cursor_rules_remap_extension_to_mdc() {
        let file = CanonicalFile { subdir: UniversalSubdir::Rules, stem: "review".into(), ext: "md".into() };
        let target = platform_target(&file, platform(PlatformId::Cursor)).unwrap().unwrap();
        assert_eq!(target, ".cursor/rules/review.mdc");
    }

    #[test]
    fn unsupported_subdir_returns_none_not_error() {
        let file = CanonicalFile { subdir: UniversalSubdir::Skills, stem: "x".into(), ext: "md".into() };
        let target = platform_target(&file, platform(PlatformId::Cursor)).unwrap();
        assert_eq!(target, None);
    }

    #[test]
    fn copilot_rules_remap_to_instructions_md() {
        let file = CanonicalFile { subdir: UniversalSubdir::Rules, stem: "review".into(), ext: "md".into() };
        let target = platform_target(&file, platform(PlatformId::Copilot)).unwrap().unwrap();
        assert_eq!(target, ".github/instructions/review.instructions.md");
    }

    #[test]
    fn reverse_mapping_recovers_canonical_subdir_and_stem() {
        let recovered = canonical_from_platform_path(
            ".github/instructions/review.instructions.md",
            platform(PlatformId::Copilot),
        )
        .unwrap()
        .unwrap();
        assert_eq!(recovered.subdir, UniversalSubdir::Rules);
        assert_eq!(recovered.stem, "review");
        assert_eq!(recovered.ext, "md");
    }

    #[test]
    fn reverse_mapping_rejects_path_outside_root_dir() {
        let recovered = canonical_from_platform_path("docs/review.md", platform(PlatformId::Cursor)).unwrap();
        assert_eq!(recovered, None);
    }

    #[test]
    fn all_platform_targets_skip_platforms_missing_the_subdir() {
        use pretty_assertions::assert_eq;

        let file = CanonicalFile { subdir: UniversalSubdir::Skills, stem: "x".into(), ext: "md".into() };
        let all: Vec<&Platform> = PLATFORMS.iter().collect();
        let targets = platform_targets(&file, &all).unwrap();
        // Only Claude carries `skills`.
        let ids: Vec<PlatformId> = targets.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![PlatformId::Claude]);
    }
}
