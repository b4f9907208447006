use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions detected before any job runs
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Conversion aborted by user")]
    Declined,
}

/// Check that the source video exists before anything else happens
pub fn ensure_input_exists(input: &std::path::Path) -> Result<(), PreflightError> {
    if input.is_file() {
        Ok(())
    } else {
        Err(PreflightError::InputNotFound(input.to_path_buf()))
    }
}
