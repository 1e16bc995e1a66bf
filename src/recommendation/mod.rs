//! Plan-adjustment recommendations
//!
//! A recommendation proposes one structured change to a phase, week or
//! workout. It starts `pending` and moves exactly once to `accepted`,
//! `modified` or `dismissed`. Accepting or modifying applies the change to
//! the plan hierarchy and records one audit entry per touched entity.

pub mod apply;
pub mod engine;
pub mod preview;
pub mod repository;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::training_plan::{PhaseType, WeekType};

pub use engine::{EvaluationContext, RecommendationEngine, RecommendationResponse};
pub use preview::RecommendationPreview;
pub use repository::{InMemoryStore, PlanStore, RepositoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Accepted,
    Modified,
    Dismissed,
}

impl RecommendationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecommendationStatus::Pending)
    }

    /// Only pending → {accepted, modified, dismissed} is allowed
    pub fn can_transition_to(&self, next: RecommendationStatus) -> bool {
        *self == RecommendationStatus::Pending && next.is_terminal()
    }

    /// Statuses whose changes were written to the plan
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            RecommendationStatus::Accepted | RecommendationStatus::Modified
        )
    }
}

impl std::fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Accepted => "accepted",
            RecommendationStatus::Modified => "modified",
            RecommendationStatus::Dismissed => "dismissed",
        };
        write!(f, "{}", name)
    }
}

/// Which level of the plan hierarchy a change targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetLevel {
    Phase,
    Week,
    Workout,
}

impl std::fmt::Display for TargetLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetLevel::Phase => write!(f, "phase"),
            TargetLevel::Week => write!(f, "week"),
            TargetLevel::Workout => write!(f, "workout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum RecommendationTarget {
    Phase(String),
    Week(String),
    Workout(String),
}

impl RecommendationTarget {
    pub fn level(&self) -> TargetLevel {
        match self {
            RecommendationTarget::Phase(_) => TargetLevel::Phase,
            RecommendationTarget::Week(_) => TargetLevel::Week,
            RecommendationTarget::Workout(_) => TargetLevel::Workout,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RecommendationTarget::Phase(id)
            | RecommendationTarget::Week(id)
            | RecommendationTarget::Workout(id) => id,
        }
    }
}

/// Structured change payload, one variant per recommendation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedChanges {
    /// Push the phase end date out; later phases shift with it
    PhaseExtension { days: u32 },

    /// Pull the phase end date in; later phases shift with it
    PhaseShorten { days: u32 },

    /// Insert a new phase directly after the target phase
    PhaseInsert {
        phase_type: PhaseType,
        duration_days: u32,
        volume_modifier: Decimal,
        intensity_modifier: Decimal,
    },

    /// Scale the week's hours and TSS
    WeekVolumeAdjust { volume_multiplier: Decimal },

    WeekTypeChange { new_type: WeekType },

    /// Scale the workout's load and working weights
    WorkoutIntensityScale { factor: Decimal },

    WorkoutSubstitute {
        replace_exercise: String,
        with_exercise: String,
    },

    WorkoutSkip { reason: String },

    /// A type this version does not know; applying it changes nothing
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    PhaseExtension,
    PhaseShorten,
    PhaseInsert,
    WeekVolumeAdjust,
    WeekTypeChange,
    WorkoutIntensityScale,
    WorkoutSubstitute,
    WorkoutSkip,
    Unsupported,
}

impl std::fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecommendationType::PhaseExtension => "phase_extension",
            RecommendationType::PhaseShorten => "phase_shorten",
            RecommendationType::PhaseInsert => "phase_insert",
            RecommendationType::WeekVolumeAdjust => "week_volume_adjust",
            RecommendationType::WeekTypeChange => "week_type_change",
            RecommendationType::WorkoutIntensityScale => "workout_intensity_scale",
            RecommendationType::WorkoutSubstitute => "workout_substitute",
            RecommendationType::WorkoutSkip => "workout_skip",
            RecommendationType::Unsupported => "unsupported",
        };
        write!(f, "{}", name)
    }
}

impl ProposedChanges {
    pub fn recommendation_type(&self) -> RecommendationType {
        match self {
            ProposedChanges::PhaseExtension { .. } => RecommendationType::PhaseExtension,
            ProposedChanges::PhaseShorten { .. } => RecommendationType::PhaseShorten,
            ProposedChanges::PhaseInsert { .. } => RecommendationType::PhaseInsert,
            ProposedChanges::WeekVolumeAdjust { .. } => RecommendationType::WeekVolumeAdjust,
            ProposedChanges::WeekTypeChange { .. } => RecommendationType::WeekTypeChange,
            ProposedChanges::WorkoutIntensityScale { .. } => {
                RecommendationType::WorkoutIntensityScale
            }
            ProposedChanges::WorkoutSubstitute { .. } => RecommendationType::WorkoutSubstitute,
            ProposedChanges::WorkoutSkip { .. } => RecommendationType::WorkoutSkip,
            ProposedChanges::Unsupported => RecommendationType::Unsupported,
        }
    }

    /// Level the payload applies to; `None` for unsupported payloads
    pub fn level(&self) -> Option<TargetLevel> {
        match self {
            ProposedChanges::PhaseExtension { .. }
            | ProposedChanges::PhaseShorten { .. }
            | ProposedChanges::PhaseInsert { .. } => Some(TargetLevel::Phase),
            ProposedChanges::WeekVolumeAdjust { .. } | ProposedChanges::WeekTypeChange { .. } => {
                Some(TargetLevel::Week)
            }
            ProposedChanges::WorkoutIntensityScale { .. }
            | ProposedChanges::WorkoutSubstitute { .. }
            | ProposedChanges::WorkoutSkip { .. } => Some(TargetLevel::Workout),
            ProposedChanges::Unsupported => None,
        }
    }

    /// Reject payloads whose required fields are empty or out of range
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ProposedChanges::PhaseExtension { days } | ProposedChanges::PhaseShorten { days } => {
                if *days == 0 {
                    return Err("days must be greater than zero".to_string());
                }
            }
            ProposedChanges::PhaseInsert {
                duration_days,
                volume_modifier,
                intensity_modifier,
                ..
            } => {
                if *duration_days == 0 {
                    return Err("duration_days must be greater than zero".to_string());
                }
                if *volume_modifier <= Decimal::ZERO || *intensity_modifier <= Decimal::ZERO {
                    return Err("phase modifiers must be positive".to_string());
                }
            }
            ProposedChanges::WeekVolumeAdjust { volume_multiplier } => {
                if *volume_multiplier <= Decimal::ZERO {
                    return Err("volume_multiplier must be positive".to_string());
                }
            }
            ProposedChanges::WorkoutIntensityScale { factor } => {
                if *factor <= Decimal::ZERO {
                    return Err("factor must be positive".to_string());
                }
            }
            ProposedChanges::WorkoutSubstitute {
                replace_exercise,
                with_exercise,
            } => {
                if replace_exercise.trim().is_empty() || with_exercise.trim().is_empty() {
                    return Err("both exercises must be named".to_string());
                }
            }
            ProposedChanges::WeekTypeChange { .. }
            | ProposedChanges::WorkoutSkip { .. }
            | ProposedChanges::Unsupported => {}
        }
        Ok(())
    }
}

/// Which detector raised the recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Deload,
    LoadRisk,
    Readiness,
    Plateau,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub plan_id: String,
    pub target: RecommendationTarget,
    pub proposed_changes: ProposedChanges,
    pub source: RecommendationSource,
    pub rationale: String,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,

    /// Set exactly when the status is accepted or modified
    pub applied_at: Option<DateTime<Utc>>,

    pub user_notes: Option<String>,
    pub modified_changes: Option<ProposedChanges>,
}

impl Recommendation {
    pub fn recommendation_type(&self) -> RecommendationType {
        self.proposed_changes.recommendation_type()
    }

    /// Changes that were (or would be) applied: the override if modified
    pub fn effective_changes(&self) -> &ProposedChanges {
        self.modified_changes
            .as_ref()
            .unwrap_or(&self.proposed_changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_transitions() {
        use RecommendationStatus::*;

        for next in [Accepted, Modified, Dismissed] {
            assert!(Pending.can_transition_to(next));
        }
        assert!(!Pending.can_transition_to(Pending));

        for terminal in [Accepted, Modified, Dismissed] {
            for next in [Pending, Accepted, Modified, Dismissed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_payload_serialization_is_tagged() {
        let changes = ProposedChanges::WeekVolumeAdjust {
            volume_multiplier: dec!(0.7),
        };
        let json = serde_json::to_value(&changes).unwrap();
        assert_eq!(json["type"], "week_volume_adjust");

        let target = RecommendationTarget::Week("w1".to_string());
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["level"], "week");
        assert_eq!(json["id"], "w1");
    }

    #[test]
    fn test_unknown_payload_type_is_unsupported() {
        let changes: ProposedChanges =
            serde_json::from_str(r#"{"type": "phase_merge", "with": "p2"}"#).unwrap();
        assert_eq!(changes, ProposedChanges::Unsupported);
        assert_eq!(changes.level(), None);
        assert!(changes.validate().is_ok());
    }

    #[test]
    fn test_payload_validation() {
        assert!(ProposedChanges::PhaseExtension { days: 0 }.validate().is_err());
        assert!(ProposedChanges::WorkoutSubstitute {
            replace_exercise: "bench".to_string(),
            with_exercise: " ".to_string(),
        }
        .validate()
        .is_err());
        assert!(ProposedChanges::WorkoutIntensityScale { factor: dec!(0.8) }
            .validate()
            .is_ok());
    }
}
