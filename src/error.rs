//! Error types for provisioning operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum L2tpIpsecError {
    #[error("Invalid interface name {name:?}: {reason}")]
    InvalidInterfacePattern { name: String, reason: String },

    #[error("Command failed: {command} - {message}")]
    CommandFailed { command: String, message: String },

    #[error("Permission denied. Run with sudo.")]
    PermissionDenied,

    #[error("Failed to parse output: {0}")]
    ParseError(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, L2tpIpsecError>;
