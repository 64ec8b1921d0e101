//! Layered error types for the ledger poller.
//!
//! - [`DomainError`] - config/rule validation, restore-file-missing: abort at startup.
//! - [`InfraError`] - transport, serialization, filesystem I/O.
//! - [`AppError`] - top-level error `main` maps to a process exit code.
//! - [`ApiError`] - HTTP-facing error, never leaks `InfraError` detail to a client.

use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Unrecoverable configuration/validation errors. These abort startup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// A tracking rule named a field outside `{from, to, value, deploy}`.
    #[error("unknown rule field: {0}")]
    UnknownField(String),

    /// A tracking rule used an operator its field doesn't accept (e.g.
    /// `from` with anything other than `=`, or `value` with no operator).
    #[error("invalid operator `{operator}` for field `{field}`")]
    InvalidOperator {
        /// The offending field.
        field: String,
        /// The offending operator.
        operator: String,
    },

    /// A rule string split into neither one nor three whitespace-separated
    /// tokens.
    #[error("malformed rule: `{0}`")]
    MalformedRule(String),

    /// `--restore` was requested but the backup file does not exist.
    #[error("restore requested but backup file is missing: {0}")]
    RestoreFileMissing(PathBuf),

    /// The tracking configuration YAML could not be parsed.
    #[error("invalid tracking config: {0}")]
    InvalidTrackingConfig(#[from] serde_yaml::Error),

    /// `--syncMode` was neither `normal` nor `fast`.
    #[error("invalid sync mode `{0}`, expected `normal` or `fast`")]
    InvalidSyncMode(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems. Transient variants are
/// retried by their caller; the rest are logged and the affected block/update
/// is skipped rather than aborting the process (see `SPEC_FULL.md` §7).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Chain RPC/WS transport error (Ethereum `alloy` or Fabric gateway).
    #[error("chain transport error: {0}")]
    Rpc(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON (de)serialization error, e.g. while reading/writing the backup file.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem I/O error (backup file, disk-usage probe).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Layered settings could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The requested chain height could not be fetched.
    #[error("block fetch failed at height {height}: {source}")]
    BlockFetch {
        /// The height that failed to fetch.
        height: String,
        /// Underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Top-level application error. `main` maps this to the documented exit codes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Domain logic / configuration error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error that escaped its usual log-and-continue handling.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// The subscription to new chain heads was permanently lost.
    #[error("subscription to new heads lost: {0}")]
    SubscriptionLost(String),

    /// Graceful shutdown was requested (Ctrl-C / SIGTERM).
    #[error("shutdown requested")]
    ShutdownRequested,
}

/// Type alias for application-level `Result`s.
pub type Result<T> = std::result::Result<T, AppError>;

// ═══════════════════════════════════════════════════════════════════════════════
// API ERRORS (HTTP-specific)
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors surfaced by the read-only HTTP API. These never occur in ordinary
/// operation (the API only ever reads in-memory state) but exist so request
/// handlers have a uniform `IntoResponse` error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Wrapped application error.
    #[error(transparent)]
    App(#[from] AppError),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (with source for logging, never shown to the caller).
    #[error("internal error")]
    Internal(#[source] eyre::Report),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::App(AppError::Domain(
                DomainError::UnknownField(_)
                | DomainError::InvalidOperator { .. }
                | DomainError::MalformedRule(_)
                | DomainError::InvalidSyncMode(_),
            ))
            | Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string()),

            Self::App(AppError::Domain(DomainError::RestoreFileMissing(_) | DomainError::InvalidTrackingConfig(_)))
            | Self::App(AppError::Infra(_))
            | Self::App(AppError::SubscriptionLost(_))
            | Self::App(AppError::ShutdownRequested)
            | Self::Internal(_) => {
                tracing::error!(error = ?self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message
                }
            })),
        )
            .into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_display() {
        let err = DomainError::UnknownField("weird".into());
        assert!(err.to_string().contains("weird"));
    }

    #[test]
    fn app_error_from_domain() {
        let domain = DomainError::MalformedRule("to >= 5 9".into());
        let app: AppError = domain.into();
        assert!(matches!(app, AppError::Domain(DomainError::MalformedRule(_))));
    }

    #[test]
    fn infra_errors_never_leak_into_api_response_body() {
        let infra = InfraError::Rpc("connection refused".into());
        let app: ApiError = AppError::from(infra).into();
        let resp = app.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
