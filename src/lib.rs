// Library interface for AdaptRS modules
// Integration tests and the CLI reach the engine through these exports

pub mod config;
pub mod database;
pub mod deload;
pub mod error;
pub mod logging;
pub mod models;
pub mod pmc;
pub mod progression;
pub mod readiness;
pub mod recommendation;
pub mod tempo;
pub mod training_plan;
pub mod tss;
pub mod zones;

// Re-export commonly used types for convenience
pub use config::EngineConfig;
pub use database::SqliteStore;
pub use deload::{DeloadEvaluation, DeloadEvaluator, DeloadInputs};
pub use error::{AdaptRsError, EngineError, RepositoryError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use pmc::{LoadAggregator, LoadMetrics, RiskAssessment, RiskLevel};
pub use progression::{ProgressionModel, ProgressionStrategy, ProgressionSuggestion};
pub use readiness::{ReadinessInput, ReadinessResult, ReadinessScorer, ReadinessService};
pub use recommendation::{
    EvaluationContext, InMemoryStore, ProposedChanges, Recommendation, RecommendationEngine,
    RecommendationPreview, RecommendationResponse, RecommendationStatus, RecommendationTarget,
};
pub use tempo::Tempo;
pub use training_plan::{PlanBuilder, PlanSkeleton};
pub use tss::TssCalculator;
pub use zones::ZoneCalculator;
