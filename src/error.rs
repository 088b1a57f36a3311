//! Error types
//!
//! Only writes and lifecycle transitions surface errors to callers. Every
//! read path in the crate resolves failures to a default instead.

use thiserror::Error;

/// Failure reported by a host collaborator (device tree or parameter store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("node or key not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    /// Size probe result: the caller has to retry with at least `required` bytes.
    #[error("buffer too small, {required} bytes required")]
    BufferTooSmall { required: usize },

    #[error("host call failed with code {code:#x}")]
    Os { code: u32 },
}

impl HostError {
    /// Raw code for logging and failure reasons.
    pub fn code(&self) -> u32 {
        match self {
            HostError::Os { code } => *code,
            _ => 0,
        }
    }
}

/// Why persisting a direction flag failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagWriteError {
    #[error("insufficient privilege to write device parameters")]
    PermissionDenied,

    #[error("failed to write device parameters: {0}")]
    WriteFailed(HostError),
}

impl From<HostError> for FlagWriteError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::AccessDenied => FlagWriteError::PermissionDenied,
            other => FlagWriteError::WriteFailed(other),
        }
    }
}

/// Why a soft restart aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestartFailure {
    #[error("device node could not be located")]
    NotFound,

    #[error("disabling the device failed (code {code:#x})")]
    DisableFailed { code: u32 },

    #[error("enabling the device failed (code {code:#x})")]
    EnableFailed { code: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_maps_to_permission_denied() {
        let err: FlagWriteError = HostError::AccessDenied.into();
        assert_eq!(err, FlagWriteError::PermissionDenied);

        let err: FlagWriteError = HostError::Os { code: 5 }.into();
        assert_eq!(err, FlagWriteError::WriteFailed(HostError::Os { code: 5 }));
    }

    #[test]
    fn test_failure_messages() {
        let msg = RestartFailure::DisableFailed { code: 0x17 }.to_string();
        assert!(msg.contains("0x17"));
        assert_eq!(HostError::NotFound.code(), 0);
    }
}
