use std::path::Path;

use crate::UniversalSubdir;

/// Closed vocabulary of platform identifiers. Adding a new consumer tool
/// means adding a variant here and a row in [`PLATFORMS`] — nothing else in
/// the mapping engine is specific to any one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlatformId {
    Claude,
    Cursor,
    Windsurf,
    Copilot,
    Zed,
}

impl PlatformId {
    pub const ALL: [Self; 5] = [
        Self::Claude,
        Self::Cursor,
        Self::Windsurf,
        Self::Copilot,
        Self::Zed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Cursor => "cursor",
            Self::Windsurf => "windsurf",
            Self::Copilot => "copilot",
            Self::Zed => "zed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension remapping and allow-list for one universal subdir on one platform.
#[derive(Debug, Clone, Copy)]
pub struct SubdirSpec {
    /// Directory holding this subdir's materialised files, relative to `root_dir`.
    pub path: &'static str,
    /// Workspace-side extensions this platform will load from `path`. `None`
    /// means no restriction beyond `ext_map`.
    pub exts: Option<&'static [&'static str]>,
    /// `(canonical_ext, workspace_ext)` pairs. Canonical payloads are always
    /// authored in `.md`; most platforms map `md -> md` but some (Cursor's
    /// `.mdc` rules, GitHub's `.instructions.md`/`.prompt.md`) remap it.
    pub ext_map: &'static [(&'static str, &'static str)],
}

#[derive(Debug, Clone, Copy)]
pub struct Platform {
    pub id: PlatformId,
    /// Directory the platform's own files live under, relative to the workspace root.
    pub root_dir: &'static str,
    /// Root aggregation file, if this platform has one (e.g. `CLAUDE.md`).
    pub root_file: Option<&'static str>,
    pub subdirs: &'static [(UniversalSubdir, SubdirSpec)],
}

impl Platform {
    pub fn subdir(&self, subdir: UniversalSubdir) -> Option<&SubdirSpec> {
        self.subdirs.iter().find(|(s, _)| *s == subdir).map(|(_, spec)| spec)
    }

    /// A platform is detected in a workspace if its `root_dir` exists there.
    /// `CLAUDE.md`/`AGENTS.md`-only platforms whose `root_dir` is `.` are
    /// detected via their root file instead, since `.` always exists.
    pub fn is_detected(&self, workspace_root: &Path) -> bool {
        if self.root_dir == "." {
            return self
                .root_file
                .is_some_and(|f| workspace_root.join(f).is_file());
        }
        workspace_root.join(self.root_dir).is_dir()
    }
}

pub static PLATFORMS: &[Platform] = &[
    Platform {
        id: PlatformId::Claude,
        root_dir: ".claude",
        root_file: Some("CLAUDE.md"),
        subdirs: &[
            (
                UniversalSubdir::Rules,
                SubdirSpec { path: "rules", exts: Some(&["md"]), ext_map: &[("md", "md")] },
            ),
            (
                UniversalSubdir::Commands,
                SubdirSpec { path: "commands", exts: Some(&["md"]), ext_map: &[("md", "md")] },
            ),
            (
                UniversalSubdir::Agents,
                SubdirSpec { path: "agents", exts: Some(&["md"]), ext_map: &[("md", "md")] },
            ),
            (
                UniversalSubdir::Skills,
                SubdirSpec { path: "skills", exts: Some(&["md"]), ext_map: &[("md", "md")] },
            ),
        ],
    },
    Platform {
        id: PlatformId::Cursor,
        root_dir: ".cursor",
        root_file: None,
        subdirs: &[
            (
                UniversalSubdir::Rules,
                SubdirSpec { path: "rules", exts: Some(&["mdc"]), ext_map: &[("md", "mdc")] },
            ),
            (
                UniversalSubdir::Commands,
                SubdirSpec { path: "commands", exts: Some(&["md"]), ext_map: &[("md", "md")] },
            ),
        ],
    },
    Platform {
        id: PlatformId::Windsurf,
        root_dir: ".windsurf",
        root_file: None,
        subdirs: &[
            (
                UniversalSubdir::Rules,
                SubdirSpec { path: "rules", exts: Some(&["md"]), ext_map: &[("md", "md")] },
            ),
            (
                UniversalSubdir::Commands,
                SubdirSpec { path: "workflows", exts: Some(&["md"]), ext_map: &[("md", "md")] },
            ),
        ],
    },
    Platform {
        id: PlatformId::Copilot,
        root_dir: ".github",
        root_file: Some(".github/copilot-instructions.md"),
        subdirs: &[
            (
                UniversalSubdir::Rules,
                SubdirSpec {
                    path: "instructions",
                    exts: Some(&["instructions.md"]),
                    ext_map: &[("md", "instructions.md")],
                },
            ),
            (
                UniversalSubdir::Commands,
                SubdirSpec {
                    path: "prompts",
                    exts: Some(&["prompt.md"]),
                    ext_map: &[("md", "prompt.md")],
                },
            ),
        ],
    },
    Platform {
        id: PlatformId::Zed,
        root_dir: ".",
        root_file: Some("AGENTS.md"),
        subdirs: &[],
    },
];

/// Pure data lookups over [`PLATFORMS`].
pub struct PlatformRegistry;

impl PlatformRegistry {
    pub fn all() -> &'static [Platform] {
        PLATFORMS
    }

    pub fn detected(workspace_root: &Path) -> Vec<&'static Platform> {
        PLATFORMS
            .iter()
            .filter(|p| p.is_detected(workspace_root))
            .collect()
    }

    pub fn definition(id: PlatformId) -> Option<&'static Platform> {
        PLATFORMS.iter().find(|p| p.id == id)
    }

    pub fn root_file_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = PLATFORMS.iter().filter_map(|p| p.root_file).collect();
        names.push("AGENTS.md");
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn is_universal_subdir(name: &str) -> Option<UniversalSubdir> {
        UniversalSubdir::from_str(name)
    }

    /// Infers a platform from a workspace-relative path by matching its
    /// leading `root_dir` component (e.g. `.cursor/rules/x.mdc` -> Cursor).
    pub fn infer_platform_from_path(path: &str) -> Option<PlatformId> {
        PLATFORMS
            .iter()
            .find(|p| p.root_dir != "." && path.starts_with(&format!("{}/", p.root_dir)))
            .map(|p| p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_platform_by_root_dir() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".cursor")).unwrap();
        let detected = PlatformRegistry::detected(dir.path());
        assert!(detected.iter().any(|p| p.id == PlatformId::Cursor));
        assert!(!detected.iter().any(|p| p.id == PlatformId::Claude));
    }

    #[test]
    fn root_only_platform_is_detected_via_its_root_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "").unwrap();
        let detected = PlatformRegistry::detected(dir.path());
        assert!(detected.iter().any(|p| p.id == PlatformId::Zed));
    }

    #[test]
    fn infers_platform_from_path_prefix() {
        assert_eq!(
            PlatformRegistry::infer_platform_from_path(".cursor/rules/auth.mdc"),
            Some(PlatformId::Cursor)
        );
        assert_eq!(PlatformRegistry::infer_platform_from_path("docs/readme.md"), None);
    }

    #[test]
    fn root_file_names_include_agents_md() {
        assert!(PlatformRegistry::root_file_names().contains(&"AGENTS.md"));
    }
}
