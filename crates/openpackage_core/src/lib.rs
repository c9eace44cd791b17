//! Engines shared by every `openpackage_cli` command: the local registry
//! store, the platform install/sync pipeline, the pull/push protocol, the
//! version resolver, and the save/pack pipeline.

mod credentials;
mod error;
mod fs_utils;
mod index;
mod install;
mod interaction;
mod manifest;
mod name;
mod package;
mod protocol;
mod resolver;
mod rootfile;
mod save;
mod store;

pub use credentials::{CredentialStore, NoCredentials};
pub use error::{Error, Result};
pub use fs_utils::{content_hash, remove_dir_if_exists, workspace_hash, write_atomic, write_atomic_str};
pub use index::{
    build_files_map, collapse_into_directory_key, merge_files_map, prune_stale_keys, Materialisation,
    PackageIndex, PackageIndexRecord, WorkspaceRef, INDEX_FILE_NAME,
};
pub use install::{
    install_package, ConflictStrategy, FileChange, FileOutcome, InstallOptions, InstallPlan, RootFileUpdate,
};
pub use interaction::{NonInteractive, UserInteraction};
pub use manifest::{Dependency, PackageManifest, WorkspaceManifest};
pub use name::{
    classify_registry_path, is_allowed_for_index, is_yaml_override, parse_install_spec, strip_platform_suffix,
    InstallSpec, PackageName, RegistryPathClass, UniversalPathInfo, MANIFEST_FILE_NAME, UNVERSIONED,
};
pub use package::{Encoding, Package, PackageFile};
pub use protocol::{
    check_integrity, merge_partial_pull, ArchiveCodec, Credentials, DownloadEntry, PullRequest, PullResponse,
    RegistryTransport,
};
pub use resolver::{resolve, ResolutionSource, ResolveMode, Resolution};
pub use rootfile::{merge_section, section_body_for};
pub use save::{
    compute_wip_cycle, generate_wip_version, harvest_local_candidates, harvest_workspace_candidates,
    rename_package, resolve_candidates, save_pack, save_single_file, save_wip, Candidate, CandidateSource,
    WipCycleDecision,
};
pub use store::{LocalRegistryStore, VersionState};
