//! Error kinds for discovery, configuration and execution

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the label tooling
#[derive(Debug, Error)]
pub enum LabelError {
    /// Service discovery failed (orchestrator unreachable, non-zero exit)
    #[error("service discovery failed: {0}")]
    Discovery(String),

    /// Inspecting a single service failed
    #[error("failed to inspect service '{service}': {reason}")]
    Inspection { service: String, reason: String },

    /// Configuration file exists but could not be read or parsed
    #[error("failed to load configuration from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    /// Configuration file could not be written
    #[error("failed to save configuration to {path}: {source}")]
    ConfigSave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed basic-auth entry or hashing failure
    #[error("invalid credential entry '{entry}': {reason}")]
    Credential { entry: String, reason: String },

    /// The execution session could not be started or driven
    #[error("execution on {target} failed: {reason}")]
    Execution { target: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LabelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LabelError::Discovery("exit status 1".to_string());
        assert_eq!(err.to_string(), "service discovery failed: exit status 1");

        let err = LabelError::Inspection {
            service: "abc123".to_string(),
            reason: "no such service".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to inspect service 'abc123': no such service"
        );

        let err = LabelError::Execution {
            target: "local".to_string(),
            reason: "spawn failed".to_string(),
        };
        assert!(err.to_string().contains("local"));
    }

    #[test]
    fn test_config_save_has_source() {
        use std::error::Error as _;

        let err = LabelError::ConfigSave {
            path: PathBuf::from("/nope/.traefikConfig"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/nope/.traefikConfig"));
    }
}
