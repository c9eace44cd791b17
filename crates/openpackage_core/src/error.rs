use thiserror::Error;

/// The typed error surface raised by every engine in this crate.
/// `openpackage_cli` matches on this to decide retry/skip behaviour and to
/// render a user-facing message.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid package name `{0}`")]
    InvalidName(String),

    #[error("invalid version `{0}`")]
    InvalidVersion(String),

    #[error("invalid version range `{0}`")]
    InvalidRange(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("package `{0}` not found in the local registry")]
    PackageNotFound(String),

    #[error("package `{0}` is invalid: {1}")]
    InvalidPackage(String, String),

    #[error("package `{0}` not found on the remote registry")]
    RemoteNotFound(String),

    #[error("access denied for package `{0}`")]
    AccessDenied(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("integrity check failed for `{0}`")]
    Integrity(String),

    #[error("remote registry error: {0}")]
    RemoteUnknown(String),

    #[error("`{0}` already exists; use --force to overwrite")]
    Conflict(String),

    #[error("cancelled by user")]
    UserCancellation,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors that should abort only the affected package in a bulk
    /// operation rather than the whole run.
    pub fn is_per_package_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RemoteNotFound(_) | Self::AccessDenied(_) | Self::Integrity(_)
        )
    }
}
