//! Unified error hierarchy for AdaptRS
//!
//! Calculation modules degrade gracefully and do not appear here. Errors are
//! reserved for the recommendation state machine, storage adapters, and the
//! few parsers that take user input.

use thiserror::Error;

use crate::pmc::LoadError;
use crate::recommendation::RecommendationStatus;
use crate::tempo::TempoError;
use crate::training_plan::PlanError;

/// Top-level error type for all AdaptRS operations
#[derive(Debug, Error)]
pub enum AdaptRsError {
    /// Recommendation state machine errors
    #[error("Recommendation error: {0}")]
    Engine(#[from] EngineError),

    /// Storage adapter errors
    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),

    /// Plan construction errors
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Load aggregation errors
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Tempo descriptor errors
    #[error("Tempo error: {0}")]
    Tempo(#[from] TempoError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Recommendation engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Target entity missing, owned by another plan, or payload unusable
    #[error("Invalid reference: {reason}")]
    InvalidReference { reason: String },

    /// Responding to a recommendation that is no longer pending
    #[error("Recommendation {id} is {from} and cannot become {to}")]
    IllegalStateTransition {
        id: String,
        from: RecommendationStatus,
        to: RecommendationStatus,
    },

    /// A write failed while applying; all partial changes were rolled back
    #[error("Failed to apply recommendation {recommendation_id}: {source}")]
    ApplyFailure {
        recommendation_id: String,
        #[source]
        source: RepositoryError,
    },

    /// Storage failure outside of an apply
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        EngineError::InvalidReference {
            reason: reason.into(),
        }
    }
}

/// Storage adapter errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    /// Record not found
    #[error("Record not found: {entity}.{id}")]
    NotFound { entity: String, id: String },

    /// Write rejected because it conflicts with stored state
    #[error("Conflict on {entity}.{id}: {reason}")]
    Conflict {
        entity: String,
        id: String,
        reason: String,
    },

    /// Underlying store failed
    #[error("Storage failure: {reason}")]
    Storage { reason: String },

    /// Stored document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// Result type alias for AdaptRS operations
pub type Result<T> = std::result::Result<T, AdaptRsError>;

impl AdaptRsError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdaptRsError::Repository(RepositoryError::Storage { .. })
                | AdaptRsError::Engine(EngineError::ApplyFailure { .. })
                | AdaptRsError::Engine(EngineError::Repository(RepositoryError::Storage { .. }))
                | AdaptRsError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AdaptRsError::Engine(EngineError::InvalidReference { .. }) => ErrorSeverity::Warning,
            AdaptRsError::Engine(EngineError::IllegalStateTransition { .. }) => {
                ErrorSeverity::Warning
            }
            AdaptRsError::Repository(RepositoryError::NotFound { .. }) => ErrorSeverity::Warning,
            AdaptRsError::Plan(_) | AdaptRsError::Tempo(_) | AdaptRsError::Load(_) => {
                ErrorSeverity::Warning
            }
            AdaptRsError::Repository(RepositoryError::Serialization(_)) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AdaptRsError::Engine(EngineError::IllegalStateTransition { from, .. }) => {
                format!("This recommendation was already {} and can't be changed.", from)
            }
            AdaptRsError::Engine(EngineError::InvalidReference { reason }) => {
                format!("This recommendation no longer matches your plan: {}", reason)
            }
            AdaptRsError::Engine(EngineError::ApplyFailure { .. }) => {
                "Your plan could not be updated. Nothing was changed - please try again.".to_string()
            }
            AdaptRsError::Repository(RepositoryError::Storage { .. }) => {
                "Unable to reach the database. Please check your configuration.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
