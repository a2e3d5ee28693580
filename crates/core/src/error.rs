//! Error taxonomy shared by every remote API family.
//!
//! Each variant names the operation (and, where it applies, the remote entity) it
//! was attempting, so scripts chaining several commands can tell which call failed.

/// Error returned by a typed call wrapper.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// No session is active; raised before any network call.
    #[error("{operation}: not connected, run connect first")]
    NotConnected { operation: String },

    /// The verification call made while connecting failed.
    #[error("Authentication against {target} failed: {message}")]
    Authentication { target: String, message: String },

    /// The remote API answered with an application-level error.
    #[error("{operation}: remote fault [{code}]: {message}")]
    RemoteFault {
        operation: String,
        code: i64,
        message: String,
    },

    /// The response did not have the shape the shaper expected.
    #[error("{operation}: unexpected response shape, expected {expected}, got {actual}")]
    ShapeMismatch {
        operation: String,
        expected: String,
        actual: String,
    },

    /// Network or protocol failure below the application level.
    #[error("{operation}: transport error: {message}")]
    Transport { operation: String, message: String },

    /// A parameter failed validation; raised before any network call.
    #[error("Invalid {parameter}: {message}")]
    Validation { parameter: String, message: String },
}

impl CallError {
    pub fn not_connected(operation: impl Into<String>) -> Self {
        CallError::NotConnected {
            operation: operation.into(),
        }
    }

    pub fn transport(operation: impl Into<String>, message: impl ToString) -> Self {
        CallError::Transport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn validation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        CallError::Validation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn shape(
        operation: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        CallError::ShapeMismatch {
            operation: operation.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Re-labels the operation of an error raised by a lower layer.
    ///
    /// Codecs know nothing about the call that produced their input, so the
    /// wrapper stamps its own operation name once the error crosses into it.
    pub fn in_operation(self, op: impl Into<String>) -> Self {
        let op = op.into();
        match self {
            CallError::NotConnected { .. } => CallError::NotConnected { operation: op },
            CallError::RemoteFault { code, message, .. } => CallError::RemoteFault {
                operation: op,
                code,
                message,
            },
            CallError::ShapeMismatch {
                expected, actual, ..
            } => CallError::ShapeMismatch {
                operation: op,
                expected,
                actual,
            },
            CallError::Transport { message, .. } => CallError::Transport {
                operation: op,
                message,
            },
            other => other,
        }
    }

    /// True for errors raised locally, before anything was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CallError::NotConnected { .. } | CallError::Validation { .. }
        )
    }
}

/// Rejects empty or whitespace-only values for required parameters.
pub fn require_non_empty(parameter: &str, value: &str) -> Result<(), CallError> {
    if value.trim().is_empty() {
        return Err(CallError::validation(parameter, "must not be empty"));
    }
    Ok(())
}
