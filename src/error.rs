//! Error types for the dependency graph core.
//!
//! Domain errors are typed so callers can tell a missing service apart from a
//! rejected record; the application layers wrap them in `anyhow`.

use crate::domain::telemetry::RecordKind;

/// Errors raised by graph store operations and queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    #[error("Self-loop rejected for service: {service}")]
    SelfLoop { service: String },
}

/// Errors raised at the Graph Builder boundary for malformed telemetry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("{kind:?} record has no service identifier")]
    MissingService { kind: RecordKind },

    #[error("Span record from '{service}' has no span id")]
    MissingSpanId { service: String },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
