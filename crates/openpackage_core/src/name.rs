use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Canonical manifest file name, fixed at package-root. Manifest-dir and
/// package-root are treated as the same directory — the common case —
/// rather than modelling a separate nested-package reserved subdirectory.
pub const MANIFEST_FILE_NAME: &str = "package.yml";

/// Sentinel version string for single-file helper packages with no version lifecycle.
pub const UNVERSIONED: &str = "UNVERSIONED";

static NAME_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]{0,212}$").unwrap());

/// A validated, case-folded package name: either `name` or `@scope/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageName {
    scope: Option<String>,
    name: String,
}

impl PackageName {
    pub fn parse(raw: &str) -> Result<Self> {
        let lower = raw.to_lowercase();
        let (scope, name) = if let Some(rest) = lower.strip_prefix('@') {
            let mut parts = rest.splitn(2, '/');
            let scope = parts.next().filter(|s| !s.is_empty());
            let name = parts.next();
            match (scope, name) {
                (Some(scope), Some(name)) if !name.is_empty() => (Some(scope.to_string()), name.to_string()),
                _ => return Err(Error::InvalidName(raw.to_string())),
            }
        } else {
            (None, lower.clone())
        };

        if let Some(scope) = &scope {
            validate_part(scope, raw)?;
        }
        validate_part(&name, raw)?;

        let total_len = scope.as_ref().map_or(0, |s| s.len() + 2) + name.len();
        if total_len == 0 || total_len > 214 {
            return Err(Error::InvalidName(raw.to_string()));
        }

        Ok(Self { scope, name })
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registry directory segment this package's versions live under,
    /// e.g. `@acme/tools` -> `@acme/tools`, `tools` -> `tools`.
    pub fn store_path(&self) -> String {
        self.to_string()
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// Re-scopes an unscoped name under `scope`, returning a new `PackageName`.
    pub fn with_scope(&self, scope: &str) -> Result<Self> {
        PackageName::parse(&format!("@{scope}/{}", self.name))
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "@{scope}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

fn validate_part(part: &str, raw: &str) -> Result<()> {
    let is_separator = |c: char| matches!(c, '.' | '_' | '-');
    let has_consecutive_separators = part
        .chars()
        .zip(part.chars().skip(1))
        .any(|(a, b)| is_separator(a) && is_separator(b));
    if !NAME_PART_RE.is_match(part) || has_consecutive_separators {
        return Err(Error::InvalidName(raw.to_string()));
    }
    Ok(())
}

/// The parsed form of an `install` CLI argument: `name[@version][/path]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSpec {
    pub name: PackageName,
    pub version: Option<String>,
    pub registry_path: Option<String>,
}

/// Splits `raw` into name, optional version, and optional registry path. The
/// split for `/` happens *after* any scope prefix, so `@acme/tools@1.0.0/rules/x.md`
/// is `name=@acme/tools`, `version=1.0.0`, `registry_path=rules/x.md`.
pub fn parse_install_spec(raw: &str) -> Result<InstallSpec> {
    let (scope_prefix, rest) = if let Some(stripped) = raw.strip_prefix('@') {
        let (scope, after_scope) = stripped
            .split_once('/')
            .ok_or_else(|| Error::InvalidName(raw.to_string()))?;
        (format!("@{scope}/"), after_scope)
    } else {
        (String::new(), raw)
    };

    // First split `rest` on '@' for the version, then on '/' for the path,
    // since a version can never itself contain '/'.
    let (name_and_version, registry_path) = match rest.split_once('/') {
        Some((head, path)) => (head, Some(path)),
        None => (rest, None),
    };

    if let Some(path) = registry_path {
        if path.is_empty() {
            return Err(Error::InvalidName(raw.to_string()));
        }
    }

    let (name_part, version) = match name_and_version.split_once('@') {
        Some((n, v)) if !v.is_empty() => (n, Some(v.to_string())),
        Some((n, _)) => (n, None),
        None => (name_and_version, None),
    };

    let full_name = format!("{scope_prefix}{name_part}");
    let name = PackageName::parse(&full_name)?;

    Ok(InstallSpec {
        name,
        version,
        registry_path: registry_path.map(str::to_string),
    })
}

/// One of the four universal subdirectories plus the remainder of the path,
/// and an optional platform-override suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniversalPathInfo {
    pub subdir: openpackage_platform::UniversalSubdir,
    pub rel: String,
    pub platform_suffix: Option<openpackage_platform::PlatformId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryPathClass {
    Root,
    Manifest,
    Universal(UniversalPathInfo),
    Workspace,
}

/// Classifies a forward-slash canonical payload path.
pub fn classify_registry_path(path: &str) -> RegistryPathClass {
    if path == MANIFEST_FILE_NAME {
        return RegistryPathClass::Manifest;
    }
    if !path.contains('/') && openpackage_platform::PlatformRegistry::root_file_names().contains(&path) {
        return RegistryPathClass::Root;
    }
    let mut parts = path.splitn(2, '/');
    let head = parts.next().unwrap_or_default();
    if let Some(rest) = parts.next() {
        if let Some(subdir) = openpackage_platform::UniversalSubdir::from_str(head) {
            let platform_suffix = detect_platform_suffix(rest);
            return RegistryPathClass::Universal(UniversalPathInfo {
                subdir,
                rel: rest.to_string(),
                platform_suffix,
            });
        }
    }
    RegistryPathClass::Workspace
}

/// Detects a `<stem>.<platformId>.<ext>` suffix in a universal-subdir-relative path.
fn detect_platform_suffix(rel: &str) -> Option<openpackage_platform::PlatformId> {
    let (file_name, _dir) = match rel.rsplit_once('/') {
        Some((dir, name)) => (name, Some(dir)),
        None => (rel, None),
    };
    let components: Vec<&str> = file_name.split('.').collect();
    if components.len() < 3 {
        return None;
    }
    let candidate = components[components.len() - 2];
    openpackage_platform::PlatformId::from_str(candidate)
}

/// Returns the `<stem>.<ext>` with any platform-override suffix stripped,
/// e.g. `"auth.cursor.md"` -> `"auth.md"`.
pub fn strip_platform_suffix(rel: &str, platform: openpackage_platform::PlatformId) -> Option<String> {
    let suffix = format!(".{}.", platform.as_str());
    rel.find(&suffix).map(|idx| {
        let (before, after) = rel.split_at(idx);
        let ext = &after[suffix.len()..];
        format!("{before}.{ext}")
    })
}

/// A YAML override file is named `<stem>.<platformId>.yml` and sits beside a
/// universal markdown file; it is never itself materialised or indexed.
pub fn is_yaml_override(rel: &str) -> bool {
    let Some((_, ext)) = rel.rsplit_once('.') else { return false };
    if ext != "yml" && ext != "yaml" {
        return false;
    }
    detect_platform_suffix(rel).is_some()
}

/// Whether a classified payload path should be recorded in the package index.
pub fn is_allowed_for_index(path: &str, class: &RegistryPathClass) -> bool {
    match class {
        RegistryPathClass::Root | RegistryPathClass::Manifest => false,
        RegistryPathClass::Universal(info) => !is_yaml_override(&info.rel),
        RegistryPathClass::Workspace => path != crate::index::INDEX_FILE_NAME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn invalid_name_error_message_snapshot() {
        let err = PackageName::parse("foo--bar").unwrap_err();
        expect!["invalid package name `foo--bar`"].assert_eq(&err.to_string());
    }

    #[test]
    fn unscoped_name_normalises_to_lowercase() {
        let name = PackageName::parse("React-Rules").unwrap();
        assert_eq!(name.to_string(), "react-rules");
    }

    #[test]
    fn scoped_name_round_trips() {
        let name = PackageName::parse("@Acme/Tools").unwrap();
        assert_eq!(name.to_string(), "@acme/tools");
        assert_eq!(name.scope(), Some("acme"));
        assert_eq!(name.name(), "tools");
    }

    #[test]
    fn scoped_name_with_no_local_part_is_invalid() {
        assert!(PackageName::parse("@acme/").is_err());
        assert!(PackageName::parse("@acme").is_err());
    }

    #[test]
    fn consecutive_separators_are_rejected() {
        assert!(PackageName::parse("foo--bar").is_err());
        assert!(PackageName::parse("foo..bar").is_err());
        assert!(PackageName::parse("foo__bar").is_err());
        assert!(PackageName::parse("foo-.bar").is_err());
        assert!(PackageName::parse("foo._bar").is_err());
        assert!(PackageName::parse("foo_-bar").is_err());
    }

    #[test]
    fn normalise_is_idempotent() {
        let once = PackageName::parse("@Acme/Tools").unwrap().to_string();
        let twice = PackageName::parse(&once).unwrap().to_string();
        assert_eq!(once, twice);
    }

    #[test]
    fn parses_name_version_and_path() {
        let spec = parse_install_spec("@acme/tools@1.2.0/rules/x.md").unwrap();
        assert_eq!(spec.name.to_string(), "@acme/tools");
        assert_eq!(spec.version.as_deref(), Some("1.2.0"));
        assert_eq!(spec.registry_path.as_deref(), Some("rules/x.md"));
    }

    #[test]
    fn bare_name_has_no_version_or_path() {
        let spec = parse_install_spec("tools").unwrap();
        assert_eq!(spec.version, None);
        assert_eq!(spec.registry_path, None);
    }

    #[test]
    fn trailing_slash_with_empty_path_is_invalid() {
        assert!(parse_install_spec("tools/").is_err());
    }

    #[test]
    fn classifies_manifest_and_root_files() {
        assert_eq!(classify_registry_path("package.yml"), RegistryPathClass::Manifest);
        assert_eq!(classify_registry_path("AGENTS.md"), RegistryPathClass::Root);
    }

    #[test]
    fn classifies_universal_subdir_path() {
        let class = classify_registry_path("rules/auth/review.md");
        match class {
            RegistryPathClass::Universal(info) => {
                assert_eq!(info.subdir, openpackage_platform::UniversalSubdir::Rules);
                assert_eq!(info.rel, "auth/review.md");
                assert_eq!(info.platform_suffix, None);
            }
            other => panic!("expected Universal, got {other:?}"),
        }
    }

    #[test]
    fn detects_platform_override_suffix() {
        let class = classify_registry_path("rules/auth.cursor.md");
        match class {
            RegistryPathClass::Universal(info) => {
                assert_eq!(info.platform_suffix, Some(openpackage_platform::PlatformId::Cursor));
            }
            other => panic!("expected Universal, got {other:?}"),
        }
    }

    #[test]
    fn yaml_override_is_not_allowed_for_index() {
        let path = "rules/auth.cursor.yml";
        let class = classify_registry_path(path);
        assert!(!is_allowed_for_index(path, &class));
    }

    #[test]
    fn workspace_path_is_preserved_verbatim() {
        assert_eq!(classify_registry_path("scripts/run.sh"), RegistryPathClass::Workspace);
    }

    #[test]
    fn strip_platform_suffix_recovers_base_name() {
        assert_eq!(
            strip_platform_suffix("auth.cursor.md", openpackage_platform::PlatformId::Cursor).as_deref(),
            Some("auth.md")
        );
    }
}
