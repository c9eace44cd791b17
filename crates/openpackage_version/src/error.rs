use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid version `{0}`")]
    InvalidVersion(String),
    #[error("invalid version range `{0}`")]
    InvalidRange(String),
}
