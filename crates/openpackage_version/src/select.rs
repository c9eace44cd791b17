use semver::Version;

use crate::{VersionRange, is_stable};

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    /// When set, a satisfying stable version is always preferred over a
    /// satisfying prerelease, unless no stable exists at all or the range
    /// explicitly references prerelease intent.
    pub prefer_stable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectReason {
    Exact,
    Wildcard,
    Range,
    None,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub version: Option<Version>,
    pub is_prerelease: bool,
    pub satisfying_stable: Vec<Version>,
    pub satisfying_prerelease: Vec<Version>,
    pub reason: SelectReason,
}

impl Selection {
    fn none(satisfying_stable: Vec<Version>, satisfying_prerelease: Vec<Version>) -> Self {
        Self {
            version: None,
            is_prerelease: false,
            satisfying_stable,
            satisfying_prerelease,
            reason: SelectReason::None,
        }
    }

    fn found(version: Version, reason: SelectReason, stable: Vec<Version>, pre: Vec<Version>) -> Self {
        let is_prerelease = !is_stable(&version);
        Self {
            version: Some(version),
            is_prerelease,
            satisfying_stable: stable,
            satisfying_prerelease: pre,
            reason,
        }
    }
}

/// The resolution primitive: selects a version out of `available` for `range`
/// under the policy in `opts`. Deterministic for a given `(available, range,
/// opts)` triple — callers may sort `available` in any order.
pub fn select_version(available: &[Version], range: &VersionRange, opts: SelectOptions) -> Selection {
    if let VersionRange::Exact(base) = range {
        return match available.iter().find(|v| *v == base) {
            Some(v) => Selection::found(v.clone(), SelectReason::Exact, vec![], vec![]),
            None => Selection::none(vec![], vec![]),
        };
    }

    let (mut stable, mut prerelease): (Vec<Version>, Vec<Version>) =
        available.iter().cloned().partition(|v| is_stable(v));

    let mut satisfying_stable: Vec<Version> = stable
        .drain(..)
        .filter(|v| range.satisfies(v, false))
        .collect();
    let mut satisfying_prerelease: Vec<Version> = prerelease
        .drain(..)
        .filter(|v| range.satisfies(v, true))
        .collect();
    satisfying_stable.sort_by(|a, b| b.cmp(a));
    satisfying_prerelease.sort_by(|a, b| b.cmp(a));

    let reason = if matches!(range, VersionRange::Wildcard) {
        SelectReason::Wildcard
    } else {
        SelectReason::Range
    };

    if opts.prefer_stable {
        if matches!(range, VersionRange::Wildcard) {
            let chosen = satisfying_stable
                .first()
                .or(satisfying_prerelease.first())
                .cloned();
            return match chosen {
                Some(v) => Selection::found(v, reason, satisfying_stable, satisfying_prerelease),
                None => Selection::none(satisfying_stable, satisfying_prerelease),
            };
        }

        if let Some(v) = satisfying_stable.first().cloned() {
            return Selection::found(v, reason, satisfying_stable, satisfying_prerelease);
        }

        let no_stable_at_all = available.iter().all(|v| !is_stable(v));
        if range.has_prerelease_intent() || no_stable_at_all {
            return match satisfying_prerelease.first().cloned() {
                Some(v) => Selection::found(v, reason, satisfying_stable, satisfying_prerelease),
                None => Selection::none(satisfying_stable, satisfying_prerelease),
            };
        }

        return Selection::none(satisfying_stable, satisfying_prerelease);
    }

    // latest-wins: merge both satisfying sets, return the maximum.
    let mut merged: Vec<Version> = satisfying_stable
        .iter()
        .chain(satisfying_prerelease.iter())
        .cloned()
        .collect();
    merged.sort_by(|a, b| b.cmp(a));
    match merged.into_iter().next() {
        Some(v) => Selection::found(v, reason, satisfying_stable, satisfying_prerelease),
        None => Selection::none(satisfying_stable, satisfying_prerelease),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn latest_wins_default_picks_highest_including_prerelease() {
        let available = [v("1.0.0"), v("2.0.0-alpha.1")];
        let range = VersionRange::parse("*").unwrap();
        let sel = select_version(&available, &range, SelectOptions::default());
        assert_eq!(sel.version, Some(v("2.0.0-alpha.1")));
        assert!(sel.is_prerelease);
    }

    #[test]
    fn stable_preferred_picks_stable_over_prerelease() {
        let available = [v("1.0.0"), v("2.0.0-alpha.1")];
        let range = VersionRange::parse("*").unwrap();
        let sel = select_version(
            &available,
            &range,
            SelectOptions { prefer_stable: true },
        );
        assert_eq!(sel.version, Some(v("1.0.0")));
        assert!(!sel.is_prerelease);
    }

    #[test]
    fn empty_available_returns_none() {
        let range = VersionRange::parse("*").unwrap();
        let sel = select_version(&[], &range, SelectOptions::default());
        assert!(sel.version.is_none());
        assert_eq!(sel.reason, SelectReason::None);
    }

    #[test]
    fn wildcard_with_only_prerelease_returns_it() {
        let available = [v("2.0.0-alpha.1")];
        let range = VersionRange::parse("*").unwrap();
        let sel = select_version(&available, &range, SelectOptions::default());
        assert_eq!(sel.version, Some(v("2.0.0-alpha.1")));
        assert!(sel.is_prerelease);
    }

    #[test]
    fn stable_preferred_falls_back_to_prerelease_when_no_stable_exists_at_all() {
        let available = [v("1.0.0-rc.1"), v("1.0.0-rc.2")];
        let range = VersionRange::parse("^1.0.0").unwrap();
        let sel = select_version(
            &available,
            &range,
            SelectOptions { prefer_stable: true },
        );
        assert_eq!(sel.version, Some(v("1.0.0-rc.2")));
    }

    #[test]
    fn stable_preferred_returns_none_when_only_unrelated_prerelease_satisfies() {
        let available = [v("1.5.0"), v("2.0.0-beta.1")];
        let range = VersionRange::parse("^2.0.0").unwrap();
        let sel = select_version(
            &available,
            &range,
            SelectOptions { prefer_stable: true },
        );
        // `2.0.0-beta.1` only satisfies with include_prerelease relaxation, and
        // the range carries no explicit prerelease intent and a stable exists
        // elsewhere in `available`, so nothing is selected.
        assert!(sel.version.is_none());
    }

    #[test]
    fn deterministic_for_same_inputs() {
        use pretty_assertions::assert_eq;

        let available = [v("1.0.0"), v("1.1.0"), v("1.2.0-rc.1")];
        let range = VersionRange::parse("*").unwrap();
        let a = select_version(&available, &range, SelectOptions::default());
        let b = select_version(&available, &range, SelectOptions::default());
        assert_eq!((a.version, a.reason), (b.version, b.reason));
    }

    #[test]
    fn exact_range_ignores_prerelease_partitioning() {
        let available = [v("1.2.3"), v("1.2.4")];
        let range = VersionRange::parse("=1.2.3").unwrap();
        let sel = select_version(&available, &range, SelectOptions::default());
        assert_eq!(sel.version, Some(v("1.2.3")));
        assert_eq!(sel.reason, SelectReason::Exact);
    }
}
