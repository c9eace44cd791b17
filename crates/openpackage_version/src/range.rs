use semver::{Version, VersionReq};

use crate::{ParseError, parse_base_version};

/// A parsed constraint expression, tagged by shape so the selection policy
/// can branch on it without re-parsing.
#[derive(Debug, Clone)]
pub enum VersionRange {
    Exact(Version),
    Caret(Version),
    Tilde(Version),
    Wildcard,
    Comparator(VersionReq),
}

impl VersionRange {
    /// Parses a constraint expression.
    ///
    /// `*` and `latest` are the wildcard literal. `=1.2.3` is exact. `^1.2.3`
    /// or a bare `1.2.3` is caret. `~1.2.3` is tilde. Anything else (spaces,
    /// commas, or leading comparator operators such as `>=`) is parsed as a
    /// comparator expression via [`semver::VersionReq`].
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ParseError::InvalidRange(raw.to_string()));
        }
        if raw == "*" || raw == "latest" {
            return Ok(Self::Wildcard);
        }
        if let Some(rest) = raw.strip_prefix('=') {
            return Ok(Self::Exact(parse_base_version(rest)?));
        }
        if let Some(rest) = raw.strip_prefix('^') {
            return Ok(Self::Caret(parse_base_version(rest)?));
        }
        if let Some(rest) = raw.strip_prefix('~') {
            return Ok(Self::Tilde(parse_base_version(rest)?));
        }
        let is_comparator_shaped = raw.contains(['>', '<', ',', ' ']) || raw.contains("||");
        if is_comparator_shaped {
            let req = VersionReq::parse(raw).map_err(|_| ParseError::InvalidRange(raw.to_string()))?;
            return Ok(Self::Comparator(req));
        }
        Ok(Self::Caret(parse_base_version(raw)?))
    }

    /// `baseVersion` per the data model invariant, for range types that carry one.
    pub fn base_version(&self) -> Option<&Version> {
        match self {
            Self::Exact(v) | Self::Caret(v) | Self::Tilde(v) => Some(v),
            Self::Wildcard | Self::Comparator(_) => None,
        }
    }

    /// True when the range itself carries prerelease intent: an explicit
    /// prerelease tag on its base version, or on any of its comparators.
    pub fn has_prerelease_intent(&self) -> bool {
        match self {
            Self::Exact(v) | Self::Caret(v) | Self::Tilde(v) => !v.pre.is_empty(),
            Self::Wildcard => false,
            Self::Comparator(req) => req.comparators.iter().any(|c| !c.pre.is_empty()),
        }
    }

    /// Whether `version` satisfies this range.
    ///
    /// `include_prerelease` relaxes the usual same-triple prerelease pinning:
    /// when set, a prerelease version is checked against the range's numeric
    /// bounds as if its prerelease tag weren't present, which is what lets
    /// the selection policy consider a prerelease for a range that doesn't
    /// explicitly reference one (see `openpackage_version::select_version`).
    pub fn satisfies(&self, version: &Version, include_prerelease: bool) -> bool {
        match self {
            Self::Exact(base) => version == base,
            Self::Wildcard => true,
            Self::Caret(base) => {
                let (min, max) = caret_bounds(base);
                Self::in_bounds(version, &min, &max, include_prerelease)
            }
            Self::Tilde(base) => {
                let (min, max) = tilde_bounds(base);
                Self::in_bounds(version, &min, &max, include_prerelease)
            }
            Self::Comparator(req) => {
                if version.pre.is_empty() {
                    req.matches(version)
                } else if include_prerelease {
                    let numeric = crate::base_of(version);
                    req.matches(&numeric)
                } else {
                    req.matches(version)
                }
            }
        }
    }

    fn in_bounds(version: &Version, min: &Version, max: &Version, include_prerelease: bool) -> bool {
        if version.pre.is_empty() {
            version >= min && version < max
        } else if include_prerelease {
            let numeric = crate::base_of(version);
            numeric >= *min && numeric < *max
        } else {
            // Without relaxation, a prerelease only satisfies if it's pinned
            // to the same major.minor.patch as the range's own base.
            crate::base_of(version) == crate::base_of(min) && version.pre >= min.pre
        }
    }
}

fn caret_bounds(base: &Version) -> (Version, Version) {
    let min = base.clone();
    let max = if base.major > 0 {
        Version::new(base.major + 1, 0, 0)
    } else if base.minor > 0 {
        Version::new(0, base.minor + 1, 0)
    } else {
        Version::new(0, 0, base.patch + 1)
    };
    (min, max)
}

fn tilde_bounds(base: &Version) -> (Version, Version) {
    let min = base.clone();
    let max = Version::new(base.major, base.minor + 1, 0);
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn wildcard_matches_anything() {
        let r = VersionRange::parse("*").unwrap();
        assert!(r.satisfies(&v("0.0.1"), false));
        assert!(r.satisfies(&v("9.9.9-alpha.1"), true));
    }

    #[test]
    fn exact_requires_equality() {
        let r = VersionRange::parse("=1.2.3").unwrap();
        assert!(r.satisfies(&v("1.2.3"), false));
        assert!(!r.satisfies(&v("1.2.4"), false));
    }

    #[test]
    fn bare_version_is_caret() {
        let r = VersionRange::parse("1.2.3").unwrap();
        assert!(matches!(r, VersionRange::Caret(_)));
        assert!(r.satisfies(&v("1.9.9"), false));
        assert!(!r.satisfies(&v("2.0.0"), false));
    }

    #[test]
    fn caret_on_zero_major_only_allows_minor_bumps() {
        let r = VersionRange::parse("^0.2.3").unwrap();
        assert!(r.satisfies(&v("0.2.9"), false));
        assert!(!r.satisfies(&v("0.3.0"), false));
    }

    #[test]
    fn tilde_only_allows_patch_bumps() {
        let r = VersionRange::parse("~1.2.3").unwrap();
        assert!(r.satisfies(&v("1.2.9"), false));
        assert!(!r.satisfies(&v("1.3.0"), false));
    }

    #[test]
    fn comparator_expression_parses_and_matches() {
        let r = VersionRange::parse(">=1.2.3, <2.0.0").unwrap();
        assert!(r.satisfies(&v("1.9.0"), false));
        assert!(!r.satisfies(&v("2.0.0"), false));
    }

    #[test]
    fn prerelease_outside_relaxation_needs_same_triple() {
        let r = VersionRange::parse("^1.2.3").unwrap();
        assert!(!r.satisfies(&v("1.2.4-rc.1"), false));
        assert!(r.satisfies(&v("1.2.4-rc.1"), true));
    }

    #[test]
    fn empty_range_is_rejected() {
        assert!(VersionRange::parse("").is_err());
    }
}
