//! Version range parsing, the stable/WIP selection policy, and deterministic
//! WIP version generation used by the OpenPackage resolver and local store.

mod error;
mod range;
mod select;
mod wip;

pub use error::ParseError;
pub use range::VersionRange;
pub use select::{SelectOptions, SelectReason, Selection, select_version};
pub use wip::{generate_wip, workspace_tag};

pub use semver::Version;

/// Sentinel version for single-file helper packages that have no version lifecycle.
pub const UNVERSIONED: &str = "UNVERSIONED";

/// Whether `raw` is the [`UNVERSIONED`] sentinel.
pub fn is_unversioned(raw: &str) -> bool {
    raw == UNVERSIONED
}

/// A version is stable iff it carries no prerelease tag.
pub fn is_stable(version: &Version) -> bool {
    version.pre.is_empty()
}

/// Parses a full or partial semver string (`1`, `1.2`, `1.2.3`, `1.2.3-rc.1`),
/// filling missing minor/patch components with zero.
pub fn parse_base_version(raw: &str) -> Result<Version, ParseError> {
    let raw = raw.trim();
    if let Ok(v) = Version::parse(raw) {
        return Ok(v);
    }
    let (core, rest) = match raw.split_once('-') {
        Some((core, pre)) => (core, Some(format!("-{pre}"))),
        None => match raw.split_once('+') {
            Some((core, build)) => (core, Some(format!("+{build}"))),
            None => (raw, None),
        },
    };
    let mut parts = core.split('.');
    let major = parts
        .next()
        .ok_or_else(|| ParseError::InvalidVersion(raw.to_string()))?;
    let minor = parts.next().unwrap_or("0");
    let patch = parts.next().unwrap_or("0");
    if parts.next().is_some() {
        return Err(ParseError::InvalidVersion(raw.to_string()));
    }
    let padded = format!("{major}.{minor}.{patch}{}", rest.unwrap_or_default());
    Version::parse(&padded).map_err(|_| ParseError::InvalidVersion(raw.to_string()))
}

/// Returns `version` with the patch component incremented and prerelease/build cleared.
pub fn patch(version: &Version) -> Version {
    Version {
        major: version.major,
        minor: version.minor,
        patch: version.patch + 1,
        pre: semver::Prerelease::EMPTY,
        build: semver::BuildMetadata::EMPTY,
    }
}

/// Returns `version` with prerelease/build metadata stripped, keeping major.minor.patch.
pub fn base_of(version: &Version) -> Version {
    Version {
        major: version.major,
        minor: version.minor,
        patch: version.patch,
        pre: semver::Prerelease::EMPTY,
        build: semver::BuildMetadata::EMPTY,
    }
}
