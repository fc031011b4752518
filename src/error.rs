use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid OSF project id: {0}")]
    InvalidProjectId(String),

    #[error("OSF request failed: {0}")]
    OsfHttp(String),

    #[error("OSF returned status {status}: {message}")]
    OsfStatus { status: u16, message: String },

    #[error("OSF project not found: {0}")]
    #[diagnostic(help("check the id in the project URL, e.g. https://osf.io/<id>/"))]
    ProjectNotFound(String),

    #[error("unexpected OSF response: {0}")]
    OsfResponse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to set up logging: {0}")]
    Logging(String),
}
