//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and the mapping
//! of port errors to HTTP status codes.

use axum::http::StatusCode;

use crate::config::ConfigError;
use assurscan_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The uniform message returned whenever a contract does not exist or belongs
/// to another user. Identical in both cases so existence is not leaked.
pub const NOT_FOUND_OR_FORBIDDEN: &str = "Contract not found or access denied";

/// Maps a port error to the HTTP status its caller should surface.
///
/// Collaborator failures become 502 (the upstream status travels in the
/// message), missing credentials 500, malformed upstream payloads 502.
pub fn port_error_status(error: &PortError) -> StatusCode {
    match error {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::MissingConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PortError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        PortError::InvalidPayload(_) => StatusCode::BAD_GATEWAY,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_failures_map_to_bad_gateway() {
        let e = PortError::Upstream {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(port_error_status(&e), StatusCode::BAD_GATEWAY);
        assert!(e.to_string().contains("429"));
    }

    #[test]
    fn missing_config_is_internal() {
        let e = PortError::MissingConfig("OPENROUTER_API_KEY".to_string());
        assert_eq!(port_error_status(&e), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
