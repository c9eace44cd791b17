//! Platform registry and canonical-to-platform path mapping.
//!
//! This crate owns the data describing how each supported AI coding tool
//! lays out its on-disk configuration, and the pure translation logic that
//! turns a canonical package payload (`rules/`, `commands/`, `agents/`,
//! `skills/`) into the files a given platform actually reads.

mod error;
mod mapping;
mod registry;
mod subdir;

pub use error::MappingError;
pub use mapping::{
    canonical_from_platform_path, find_detected, parse_canonical_path, platform_target,
    platform_targets, CanonicalFile,
};
pub use registry::{Platform, PlatformId, PlatformRegistry, SubdirSpec, PLATFORMS};
pub use subdir::UniversalSubdir;
