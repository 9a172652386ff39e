//! Settlement Error Types
//!
//! One error type for every marketplace operation. Codes are stable strings
//! the web layer can show or match on.

use thiserror::Error;

/// Marketplace error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    // === Lookup Errors ===
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === Validation Errors ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("Invalid order status transition: {from} -> {to}")]
    InvalidStateTransition {
        from: &'static str,
        to: &'static str,
    },

    // === External Collaborators (never fatal to settlement) ===
    #[error("External service unavailable: {0}")]
    ExternalService(String),

    // === System Errors ===
    #[error("Database error: {0}")]
    Database(String),
}

impl MarketError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MarketError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            MarketError::NotFound { .. } => "NOT_FOUND",
            MarketError::Configuration(_) => "CONFIGURATION_ERROR",
            MarketError::Validation(_) => "VALIDATION_ERROR",
            MarketError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            MarketError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            MarketError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            MarketError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            MarketError::NotFound { .. } => 404,
            MarketError::Validation(_) | MarketError::InsufficientStock { .. } => 400,
            MarketError::InvalidStateTransition { .. } => 409,
            MarketError::Configuration(_) | MarketError::Database(_) => 500,
            MarketError::ExternalService(_) => 503,
        }
    }

    /// True for errors a caller may degrade around instead of aborting
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, MarketError::ExternalService(_))
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(e: sqlx::Error) -> Self {
        MarketError::Database(e.to_string())
    }
}

impl From<rust_decimal::Error> for MarketError {
    fn from(e: rust_decimal::Error) -> Self {
        MarketError::Validation(format!("arithmetic error: {}", e))
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
