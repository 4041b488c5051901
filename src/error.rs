//! Error types for Lockstep
//!
//! This module defines all error types used throughout the harness,
//! using `thiserror` for ergonomic error handling.
//!
//! Server-side invocation failures (`UnknownMethod`, `MissingArgument`,
//! `TypeMismatch`, `ExecutionFailure`) travel over the wire as structured
//! JSON-RPC error objects and are reconstructed on the caller side; they are
//! never allowed to crash the serving process. Orchestration-level failures
//! (`Timeout`, `Connection`) are produced by the test driver itself and
//! affect only the test case being evaluated.

use thiserror::Error;

/// Main error type for Lockstep operations
///
/// This enum encompasses all possible errors that can occur during
/// method registration, request dispatch, suite orchestration, and
/// configuration loading.
#[derive(Error, Debug)]
pub enum LockstepError {
    /// The invoked method name is not registered on the server
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// A declared parameter was absent from the argument mapping
    #[error("Missing argument '{parameter}' for method '{method}'")]
    MissingArgument {
        /// The method being invoked
        method: String,
        /// The declared parameter that was not supplied
        parameter: String,
    },

    /// A supplied argument cannot be coerced to the declared parameter type
    #[error("Type mismatch for argument '{parameter}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// The offending parameter name
        parameter: String,
        /// The declared type tag
        expected: String,
        /// A short description of the supplied value's type
        actual: String,
    },

    /// Registration-time error: a method name was registered twice
    #[error("Duplicate method registration: {0}")]
    DuplicateMethod(String),

    /// The underlying function body raised an error during execution
    #[error("Execution failure: {0}")]
    ExecutionFailure(String),

    /// A remote call did not complete within the configured bound
    #[error("Timeout after {elapsed_ms}ms waiting for '{server}'")]
    Timeout {
        /// Label of the server that failed to respond
        server: String,
        /// Milliseconds waited before giving up
        elapsed_ms: u64,
    },

    /// A server could not be reached or the transport failed mid-call
    #[error("Connection failure: {0}")]
    Connection(String),

    /// The remote peer returned a JSON-RPC error that does not map to a
    /// known invocation failure kind
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Numeric JSON-RPC error code
        code: i64,
        /// Human-readable error description
        message: String,
    },

    /// Test suite file errors (parse failures, referenced-method misses)
    #[error("Suite error: {0}")]
    Suite(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Lockstep operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_method_display() {
        let error = LockstepError::UnknownMethod("does_not_exist".to_string());
        assert_eq!(error.to_string(), "Unknown method: does_not_exist");
    }

    #[test]
    fn test_missing_argument_display() {
        let error = LockstepError::MissingArgument {
            method: "add".to_string(),
            parameter: "b".to_string(),
        };
        assert_eq!(error.to_string(), "Missing argument 'b' for method 'add'");
    }

    #[test]
    fn test_type_mismatch_display() {
        let error = LockstepError::TypeMismatch {
            parameter: "a".to_string(),
            expected: "int".to_string(),
            actual: "string".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Type mismatch for argument 'a': expected int, got string"
        );
    }

    #[test]
    fn test_duplicate_method_display() {
        let error = LockstepError::DuplicateMethod("add".to_string());
        assert_eq!(error.to_string(), "Duplicate method registration: add");
    }

    #[test]
    fn test_execution_failure_display() {
        let error = LockstepError::ExecutionFailure("division by zero".to_string());
        assert_eq!(error.to_string(), "Execution failure: division by zero");
    }

    #[test]
    fn test_timeout_display() {
        let error = LockstepError::Timeout {
            server: "python".to_string(),
            elapsed_ms: 5000,
        };
        assert!(error.to_string().contains("5000ms"));
        assert!(error.to_string().contains("python"));
    }

    #[test]
    fn test_connection_display() {
        let error = LockstepError::Connection("refused".to_string());
        assert_eq!(error.to_string(), "Connection failure: refused");
    }

    #[test]
    fn test_rpc_error_display() {
        let error = LockstepError::Rpc {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert_eq!(error.to_string(), "RPC error -32601: Method not found");
    }

    #[test]
    fn test_suite_error_display() {
        let error = LockstepError::Suite("missing servers".to_string());
        assert_eq!(error.to_string(), "Suite error: missing servers");
    }

    #[test]
    fn test_config_error_display() {
        let error = LockstepError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: LockstepError = io_error.into();
        assert!(matches!(error, LockstepError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_str = "{invalid json}";
        let json_error = serde_json::from_str::<serde_json::Value>(json_str).unwrap_err();
        let error: LockstepError = json_error.into();
        assert!(matches!(error, LockstepError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_str = "invalid: : yaml";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: LockstepError = yaml_error.into();
        assert!(matches!(error, LockstepError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LockstepError>();
    }
}
