use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("platform `{0}` does not support the `{1}` universal subdir")]
    SubdirNotSupported(String, &'static str),
    #[error("extension `{0}` is not mapped for platform `{1}`")]
    ExtensionNotMapped(String, String),
    #[error("extension `{0}` is not an allowed workspace extension for platform `{1}`")]
    ExtensionNotAllowed(String, String),
    #[error("unknown platform id `{0}`")]
    UnknownPlatform(String),
}
