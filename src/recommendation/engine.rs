//! Recommendation lifecycle: detection, creation, preview and response
//!
//! Responses are serialized per plan. Within one plan, the reload, status
//! check, apply and status write all happen under the same lock, so two
//! responses never interleave their read-modify-append of an audit log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::deload::{DeloadEvaluation, DeloadEvaluator, DeloadInputs, DeloadSeverity, PlateauedExercise};
use crate::error::{EngineError, RepositoryError};
use crate::models::WorkoutCategory;
use crate::pmc::{LoadAggregator, LoadMetrics, RiskLevel};
use crate::progression::{CorrectiveAction, ExerciseHistory, PlateauDiagnosis, ProgressionModel};
use crate::readiness::{ReadinessAssessment, ReadinessRecommendation};
use crate::recommendation::apply::{resolve_target, validate_changes, Applier, Journal};
use crate::recommendation::preview::{build_preview, RecommendationPreview};
use crate::recommendation::repository::EngineStore;
use crate::recommendation::{
    ProposedChanges, Recommendation, RecommendationSource, RecommendationStatus,
    RecommendationTarget,
};
use crate::training_plan::{new_id, Phase, PhaseType, PlannedWorkout, WeekType, WeeklyTarget};

/// Policy constants for applying and previewing recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Volume multiplier applied when a week becomes a recovery week
    pub recovery_week_volume: Decimal,

    /// Intensity scale factors below this also step the workout intensity down
    pub intensity_step_down_below: Decimal,

    /// Form gained over a week by removing that week's entire volume
    pub tsb_gain_per_volume_week: Decimal,

    /// Form gained the following week per point of workout TSS removed
    pub workout_tsb_factor: Decimal,

    /// Readiness below this skips a hard session instead of easing it
    pub skip_readiness_below: Decimal,

    /// Length of a recovery phase inserted after a risky loading phase
    pub recovery_phase_days: u32,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        RecommendationConfig {
            recovery_week_volume: dec!(0.55),
            intensity_step_down_below: dec!(0.9),
            tsb_gain_per_volume_week: dec!(40),
            workout_tsb_factor: dec!(0.2),
            skip_readiness_below: dec!(20),
            recovery_phase_days: 7,
        }
    }
}

/// A user's answer to a pending recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", content = "changes", rename_all = "snake_case")]
pub enum RecommendationResponse {
    Accept,
    /// Apply these changes instead of the proposed ones
    Modify(ProposedChanges),
    Dismiss,
}

impl RecommendationResponse {
    pub fn status(&self) -> RecommendationStatus {
        match self {
            RecommendationResponse::Accept => RecommendationStatus::Accepted,
            RecommendationResponse::Modify(_) => RecommendationStatus::Modified,
            RecommendationResponse::Dismiss => RecommendationStatus::Dismissed,
        }
    }
}

/// Strength-training context the store does not hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationContext {
    /// Muscle groups currently over their maximum recoverable volume
    pub muscles_over_mrv: Vec<String>,

    pub exercise_histories: Vec<ExerciseHistory>,

    pub days_since_last_deload: Option<u32>,

    /// Preferred replacement per exercise when a plateau calls for a swap
    pub substitutions: HashMap<String, String>,
}

/// One lock per plan, created on first use. The locks live in the engine,
/// so they only order responses that go through the same engine instance.
#[derive(Default)]
struct PlanLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PlanLocks {
    fn for_plan(&self, plan_id: &str) -> Result<Arc<Mutex<()>>, RepositoryError> {
        let mut locks = self.locks.lock().map_err(|_| lock_poisoned())?;
        Ok(locks
            .entry(plan_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }
}

fn lock_poisoned() -> RepositoryError {
    RepositoryError::Storage {
        reason: "plan lock poisoned".to_string(),
    }
}

/// A recommendation the detectors want to raise
struct Candidate {
    target: RecommendationTarget,
    changes: ProposedChanges,
    source: RecommendationSource,
    rationale: String,
}

/// Creates, previews and resolves recommendations against a plan store
///
/// Share one engine per store (it is `Sync` when the store is). Two engines
/// over the same store do not see each other's plan locks, so their
/// responses to the same plan can interleave.
pub struct RecommendationEngine<'a, S: ?Sized> {
    store: &'a S,
    aggregator: LoadAggregator,
    deload: DeloadEvaluator,
    progression: ProgressionModel,
    config: RecommendationConfig,
    locks: PlanLocks,
}

impl<'a, S: EngineStore + ?Sized> RecommendationEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_config(store, &EngineConfig::default())
    }

    pub fn with_config(store: &'a S, config: &EngineConfig) -> Self {
        RecommendationEngine {
            store,
            aggregator: LoadAggregator::with_config(config.load.clone(), config.risk.clone()),
            deload: DeloadEvaluator::with_config(config.deload.clone()),
            progression: ProgressionModel::with_config(config.progression.clone()),
            config: config.recommendation.clone(),
            locks: PlanLocks::default(),
        }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Record a pending recommendation after checking the payload and that
    /// the target belongs to the plan
    pub fn create_recommendation(
        &self,
        plan_id: &str,
        target: RecommendationTarget,
        changes: ProposedChanges,
        source: RecommendationSource,
        rationale: &str,
    ) -> Result<Recommendation, EngineError> {
        let lock = self.locks.for_plan(plan_id)?;
        let _guard = lock.lock().map_err(|_| lock_poisoned())?;

        self.insert_pending(
            plan_id,
            Candidate {
                target,
                changes,
                source,
                rationale: rationale.to_string(),
            },
        )
    }

    pub fn get_recommendation(&self, id: &str) -> Result<Recommendation, EngineError> {
        self.store
            .get_recommendation(id)?
            .ok_or_else(|| EngineError::invalid(format!("recommendation {} not found", id)))
    }

    pub fn pending_for_plan(&self, plan_id: &str) -> Result<Vec<Recommendation>, EngineError> {
        Ok(self
            .store
            .recommendations_for_plan(plan_id)?
            .into_iter()
            .filter(|r| r.status == RecommendationStatus::Pending)
            .collect())
    }

    /// What accepting the recommendation would do, without writing anything
    pub fn preview(&self, id: &str, as_of: NaiveDate) -> Result<RecommendationPreview, EngineError> {
        let recommendation = self.get_recommendation(id)?;
        let changes = recommendation.proposed_changes.clone();
        self.preview_changes(&recommendation, &changes, as_of)
    }

    /// Preview a modified payload for a pending recommendation
    pub fn preview_with(
        &self,
        id: &str,
        changes: &ProposedChanges,
        as_of: NaiveDate,
    ) -> Result<RecommendationPreview, EngineError> {
        let recommendation = self.get_recommendation(id)?;
        Self::check_same_type(&recommendation, changes)?;
        self.preview_changes(&recommendation, changes, as_of)
    }

    fn preview_changes(
        &self,
        recommendation: &Recommendation,
        changes: &ProposedChanges,
        as_of: NaiveDate,
    ) -> Result<RecommendationPreview, EngineError> {
        if recommendation.status.is_terminal() {
            return Err(EngineError::invalid(format!(
                "recommendation {} is already {}",
                recommendation.id, recommendation.status
            )));
        }

        let plan = self
            .store
            .get_plan(&recommendation.plan_id)?
            .ok_or_else(|| EngineError::invalid(format!("plan {} not found", recommendation.plan_id)))?;
        let metrics = self.current_load(&plan.athlete_id, as_of)?;

        build_preview(self.store, recommendation, changes, metrics.tsb, &self.config)
    }

    /// Accept, modify or dismiss a pending recommendation.
    ///
    /// Accepting or modifying applies the changes. On any failure every write
    /// is rolled back and the recommendation stays pending.
    pub fn respond(
        &self,
        id: &str,
        response: RecommendationResponse,
        notes: Option<String>,
        date: NaiveDate,
    ) -> Result<Recommendation, EngineError> {
        let plan_id = self.get_recommendation(id)?.plan_id;
        let lock = self.locks.for_plan(&plan_id)?;
        let _guard = lock.lock().map_err(|_| lock_poisoned())?;

        // Reload under the lock; a concurrent response may have won
        let mut recommendation = self.get_recommendation(id)?;
        let next = response.status();
        if !recommendation.status.can_transition_to(next) {
            return Err(EngineError::IllegalStateTransition {
                id: recommendation.id,
                from: recommendation.status,
                to: next,
            });
        }

        let now = Utc::now();
        let modified = match response {
            RecommendationResponse::Dismiss => {
                recommendation.status = next;
                recommendation.responded_at = Some(now);
                recommendation.user_notes = notes;
                self.store.save_recommendation(&recommendation)?;

                info!(recommendation_id = %recommendation.id, "Recommendation dismissed");
                return Ok(recommendation);
            }
            RecommendationResponse::Accept => None,
            RecommendationResponse::Modify(changes) => {
                Self::check_same_type(&recommendation, &changes)?;
                Some(changes)
            }
        };

        let changes = modified
            .clone()
            .unwrap_or_else(|| recommendation.proposed_changes.clone());
        let mut applier = Applier::new(self.store, &self.config, id, date);
        let outcome = applier.apply(&recommendation.plan_id, &recommendation.target, &changes);
        let journal = applier.into_journal();

        if let Err(err) = outcome {
            self.roll_back(journal, id);
            return Err(err);
        }

        recommendation.status = next;
        recommendation.responded_at = Some(now);
        recommendation.applied_at = Some(now);
        recommendation.user_notes = notes;
        recommendation.modified_changes = modified;

        if let Err(source) = self.store.save_recommendation(&recommendation) {
            self.roll_back(journal, id);
            return Err(EngineError::ApplyFailure {
                recommendation_id: id.to_string(),
                source,
            });
        }

        info!(
            recommendation_id = %recommendation.id,
            status = %recommendation.status,
            recommendation_type = %changes.recommendation_type(),
            "Recommendation applied"
        );
        Ok(recommendation)
    }

    /// Run every detector for the plan on `date` and record new pending
    /// recommendations. A pending recommendation of the same type for the same
    /// target is never duplicated.
    pub fn evaluate(
        &self,
        plan_id: &str,
        date: NaiveDate,
        context: &EvaluationContext,
    ) -> Result<Vec<Recommendation>, EngineError> {
        let plan = self
            .store
            .get_plan(plan_id)?
            .ok_or_else(|| EngineError::invalid(format!("plan {} not found", plan_id)))?;

        let phases = self.store.phases_for_plan(plan_id)?;
        let Some(phase) = phases.iter().find(|p| p.contains(date)) else {
            debug!(plan_id, %date, "Date falls outside the plan");
            return Ok(Vec::new());
        };
        let next_phase = phases.iter().find(|p| p.order_index == phase.order_index + 1);

        let week = self
            .store
            .weeks_for_phase(&phase.id)?
            .into_iter()
            .find(|w| w.contains(date));
        let upcoming: Vec<PlannedWorkout> = match &week {
            Some(week) => self
                .store
                .workouts_for_week(&week.id)?
                .into_iter()
                .filter(|w| w.date >= date && w.status.is_upcoming())
                .collect(),
            None => Vec::new(),
        };

        let metrics = self.current_load(&plan.athlete_id, date)?;
        let assessments = self.store.assessments_between(
            &plan.athlete_id,
            date - Duration::days(6),
            date,
        )?;
        let plateaus: Vec<(&str, PlateauDiagnosis)> = context
            .exercise_histories
            .iter()
            .filter_map(|h| {
                self.progression
                    .diagnose_plateau(&h.sessions)
                    .map(|d| (h.exercise.as_str(), d))
            })
            .collect();

        let deload = self.deload.evaluate(&DeloadInputs {
            tsb: metrics.tsb,
            muscles_over_mrv: context.muscles_over_mrv.clone(),
            plateaued_exercises: plateaus
                .iter()
                .map(|(exercise, d)| PlateauedExercise {
                    exercise: exercise.to_string(),
                    weeks_without_progress: d.sessions_without_progress,
                })
                .collect(),
            recent_recovery_scores: assessments.iter().map(|a| a.result.score).collect(),
            days_since_last_deload: context.days_since_last_deload,
        });

        let mut candidates = Vec::new();
        if let Some(week) = &week {
            self.deload_candidates(&deload, week, &upcoming, &mut candidates);
        }
        self.load_risk_candidates(&metrics, phase, next_phase, &mut candidates);
        if let Some(today) = assessments.iter().find(|a| a.date == date) {
            self.readiness_candidates(today, date, &upcoming, &mut candidates);
        }
        Self::plateau_candidates(&plateaus, context, &upcoming, &mut candidates);

        let lock = self.locks.for_plan(plan_id)?;
        let _guard = lock.lock().map_err(|_| lock_poisoned())?;

        let mut created = Vec::new();
        for candidate in candidates {
            let duplicate = self.pending_for_plan(plan_id)?.iter().any(|r| {
                r.target == candidate.target
                    && r.recommendation_type() == candidate.changes.recommendation_type()
            });
            if duplicate {
                debug!(
                    plan_id,
                    target = candidate.target.id(),
                    "Skipping duplicate pending recommendation"
                );
                continue;
            }
            created.push(self.insert_pending(plan_id, candidate)?);
        }

        info!(plan_id, %date, created = created.len(), "Evaluated plan");
        Ok(created)
    }

    fn deload_candidates(
        &self,
        deload: &DeloadEvaluation,
        week: &WeeklyTarget,
        upcoming: &[PlannedWorkout],
        out: &mut Vec<Candidate>,
    ) {
        if !deload.should_deload || week.week_type == WeekType::Recovery {
            return;
        }

        if deload.severity == Some(DeloadSeverity::Severe) {
            out.push(Candidate {
                target: RecommendationTarget::Week(week.id.clone()),
                changes: ProposedChanges::WeekTypeChange {
                    new_type: WeekType::Recovery,
                },
                source: RecommendationSource::Deload,
                rationale: deload.rationale.clone(),
            });
        } else if deload.volume_reduction > Decimal::ZERO {
            out.push(Candidate {
                target: RecommendationTarget::Week(week.id.clone()),
                changes: ProposedChanges::WeekVolumeAdjust {
                    volume_multiplier: Decimal::ONE - deload.volume_reduction,
                },
                source: RecommendationSource::Deload,
                rationale: deload.rationale.clone(),
            });
        } else if deload.intensity_reduction > Decimal::ZERO {
            for workout in upcoming
                .iter()
                .filter(|w| w.category == WorkoutCategory::Strength)
            {
                out.push(Candidate {
                    target: RecommendationTarget::Workout(workout.id.clone()),
                    changes: ProposedChanges::WorkoutIntensityScale {
                        factor: Decimal::ONE - deload.intensity_reduction,
                    },
                    source: RecommendationSource::Deload,
                    rationale: deload.rationale.clone(),
                });
            }
        }
    }

    fn load_risk_candidates(
        &self,
        metrics: &LoadMetrics,
        phase: &Phase,
        next_phase: Option<&Phase>,
        out: &mut Vec<Candidate>,
    ) {
        let risk = self.aggregator.assess_risk(metrics);
        if risk.level != RiskLevel::VeryHigh || !phase.phase_type.is_loading() {
            return;
        }
        if next_phase.is_some_and(|p| p.phase_type == PhaseType::Recovery) {
            return;
        }

        let (volume_modifier, intensity_modifier) = PhaseType::Recovery.default_modifiers();
        out.push(Candidate {
            target: RecommendationTarget::Phase(phase.id.clone()),
            changes: ProposedChanges::PhaseInsert {
                phase_type: PhaseType::Recovery,
                duration_days: self.config.recovery_phase_days,
                volume_modifier,
                intensity_modifier,
            },
            source: RecommendationSource::LoadRisk,
            rationale: format!(
                "Very high injury risk (ACWR {}, monotony {}, strain {}) during {} phase",
                metrics.acwr, metrics.monotony, metrics.strain, phase.phase_type
            ),
        });
    }

    fn readiness_candidates(
        &self,
        today: &ReadinessAssessment,
        date: NaiveDate,
        upcoming: &[PlannedWorkout],
        out: &mut Vec<Candidate>,
    ) {
        let result = &today.result;
        if result.recommendation != ReadinessRecommendation::Reduce {
            return;
        }

        for workout in upcoming
            .iter()
            .filter(|w| w.date == date && w.intensity.is_hard())
        {
            let (changes, rationale) = if result.score < self.config.skip_readiness_below {
                (
                    ProposedChanges::WorkoutSkip {
                        reason: format!("Readiness {} is too low for a hard session", result.score),
                    },
                    format!("Readiness {} today; rest instead of a hard {} session", result.score, workout.category),
                )
            } else {
                (
                    ProposedChanges::WorkoutIntensityScale {
                        factor: result.adjustment_factor,
                    },
                    format!(
                        "Readiness {} today; scale the hard {} session to {}",
                        result.score, workout.category, result.adjustment_factor
                    ),
                )
            };
            out.push(Candidate {
                target: RecommendationTarget::Workout(workout.id.clone()),
                changes,
                source: RecommendationSource::Readiness,
                rationale,
            });
        }
    }

    fn plateau_candidates(
        plateaus: &[(&str, PlateauDiagnosis)],
        context: &EvaluationContext,
        upcoming: &[PlannedWorkout],
        out: &mut Vec<Candidate>,
    ) {
        for (exercise, diagnosis) in plateaus {
            if diagnosis.action != CorrectiveAction::SwapExercise {
                continue;
            }
            let replacement = context
                .substitutions
                .get(*exercise)
                .cloned()
                .unwrap_or_else(|| format!("{} variation", exercise));

            for workout in upcoming {
                let Some(planned) = workout
                    .exercises
                    .iter()
                    .find(|e| e.name.eq_ignore_ascii_case(exercise))
                else {
                    continue;
                };
                out.push(Candidate {
                    target: RecommendationTarget::Workout(workout.id.clone()),
                    changes: ProposedChanges::WorkoutSubstitute {
                        replace_exercise: planned.name.clone(),
                        with_exercise: replacement.clone(),
                    },
                    source: RecommendationSource::Plateau,
                    rationale: format!(
                        "{} has not improved in {} sessions (best {})",
                        exercise, diagnosis.sessions_without_progress, diagnosis.best_weight
                    ),
                });
            }
        }
    }

    /// Caller holds the plan lock
    fn insert_pending(&self, plan_id: &str, candidate: Candidate) -> Result<Recommendation, EngineError> {
        validate_changes(&candidate.target, &candidate.changes)?;
        if let ProposedChanges::Unsupported = candidate.changes {
            return Err(EngineError::invalid(
                "cannot create a recommendation of an unsupported type",
            ));
        }
        if self.store.get_plan(plan_id)?.is_none() {
            return Err(EngineError::invalid(format!("plan {} not found", plan_id)));
        }
        resolve_target(self.store, plan_id, &candidate.target)?;

        let recommendation = Recommendation {
            id: new_id(),
            plan_id: plan_id.to_string(),
            target: candidate.target,
            proposed_changes: candidate.changes,
            source: candidate.source,
            rationale: candidate.rationale,
            status: RecommendationStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
            applied_at: None,
            user_notes: None,
            modified_changes: None,
        };
        self.store.save_recommendation(&recommendation)?;

        info!(
            recommendation_id = %recommendation.id,
            plan_id,
            recommendation_type = %recommendation.recommendation_type(),
            target = recommendation.target.id(),
            "Created recommendation"
        );
        Ok(recommendation)
    }

    fn check_same_type(recommendation: &Recommendation, changes: &ProposedChanges) -> Result<(), EngineError> {
        if changes.recommendation_type() != recommendation.recommendation_type() {
            return Err(EngineError::invalid(format!(
                "modified changes must stay {}, got {}",
                recommendation.recommendation_type(),
                changes.recommendation_type()
            )));
        }
        Ok(())
    }

    fn current_load(&self, athlete_id: &str, date: NaiveDate) -> Result<LoadMetrics, EngineError> {
        let config = self.aggregator.config();
        let lookback = i64::from(config.ctl_window_days) * i64::from(config.window_cap_multiplier.max(1));
        let samples = self
            .store
            .load_samples(athlete_id, date - Duration::days(lookback), date)?;
        Ok(self.aggregator.calculate_metrics(&samples, date))
    }

    fn roll_back(&self, journal: Journal, recommendation_id: &str) {
        let writes = journal.len();
        match journal.rollback(self.store) {
            Ok(()) => warn!(recommendation_id, writes, "Rolled back partial apply"),
            Err(e) => error!(recommendation_id, error = %e, "Rollback incomplete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyLoadSample;
    use crate::readiness::{ReadinessInput, ReadinessScorer, ReadinessService};
    use crate::recommendation::repository::{
        InMemoryStore, PhaseRepository, PlanStore, RecommendationRepository, WeekRepository, WorkoutRepository,
    };
    use crate::training_plan::{PlanBuilder, PlanSkeleton, WorkoutStatus};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn setup() -> (InMemoryStore, PlanSkeleton) {
        let store = InMemoryStore::new();
        let skeleton = PlanBuilder::rolling("athlete", start(), 8).build().unwrap();
        store.save_skeleton(&skeleton).unwrap();
        (store, skeleton)
    }

    fn create_extension(
        engine: &RecommendationEngine<'_, InMemoryStore>,
        skeleton: &PlanSkeleton,
        days: u32,
    ) -> Recommendation {
        engine
            .create_recommendation(
                &skeleton.plan.id,
                RecommendationTarget::Phase(skeleton.phases[0].id.clone()),
                ProposedChanges::PhaseExtension { days },
                RecommendationSource::Manual,
                "more base",
            )
            .unwrap()
    }

    #[test]
    fn test_create_rejects_foreign_target() {
        let (store, skeleton) = setup();
        let other = PlanBuilder::rolling("someone-else", start(), 8).build().unwrap();
        store.save_skeleton(&other).unwrap();
        let engine = RecommendationEngine::new(&store);

        let result = engine.create_recommendation(
            &skeleton.plan.id,
            RecommendationTarget::Phase(other.phases[0].id.clone()),
            ProposedChanges::PhaseExtension { days: 3 },
            RecommendationSource::Manual,
            "",
        );
        assert!(matches!(result, Err(EngineError::InvalidReference { .. })));
        assert!(engine.pending_for_plan(&skeleton.plan.id).unwrap().is_empty());
    }

    #[test]
    fn test_accept_applies_and_audits() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let rec = create_extension(&engine, &skeleton, 7);

        let accepted = engine
            .respond(&rec.id, RecommendationResponse::Accept, None, start())
            .unwrap();
        assert_eq!(accepted.status, RecommendationStatus::Accepted);
        assert!(accepted.applied_at.is_some());

        let phase = store.get_phase(&skeleton.phases[0].id).unwrap().unwrap();
        assert_eq!(phase.end_date, skeleton.phases[0].end_date + Duration::days(7));
        let entry = phase.adaptation_history.last().unwrap();
        assert_eq!(entry.recommendation_id, rec.id);
    }

    #[test]
    fn test_terminal_recommendations_reject_responses() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let rec = create_extension(&engine, &skeleton, 7);

        engine
            .respond(&rec.id, RecommendationResponse::Dismiss, Some("not now".to_string()), start())
            .unwrap();
        let phase = store.get_phase(&skeleton.phases[0].id).unwrap().unwrap();
        assert!(phase.adaptation_history.is_empty());

        for response in [
            RecommendationResponse::Accept,
            RecommendationResponse::Dismiss,
            RecommendationResponse::Modify(ProposedChanges::PhaseExtension { days: 2 }),
        ] {
            let result = engine.respond(&rec.id, response, None, start());
            assert!(matches!(
                result,
                Err(EngineError::IllegalStateTransition {
                    from: RecommendationStatus::Dismissed,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_modify_uses_override() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let rec = create_extension(&engine, &skeleton, 7);

        let modified = engine
            .respond(
                &rec.id,
                RecommendationResponse::Modify(ProposedChanges::PhaseExtension { days: 3 }),
                None,
                start(),
            )
            .unwrap();
        assert_eq!(modified.status, RecommendationStatus::Modified);
        assert_eq!(
            modified.effective_changes(),
            &ProposedChanges::PhaseExtension { days: 3 }
        );

        let phase = store.get_phase(&skeleton.phases[0].id).unwrap().unwrap();
        assert_eq!(phase.end_date, skeleton.phases[0].end_date + Duration::days(3));
    }

    #[test]
    fn test_modify_with_other_type_is_rejected() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let rec = create_extension(&engine, &skeleton, 7);

        let result = engine.respond(
            &rec.id,
            RecommendationResponse::Modify(ProposedChanges::PhaseShorten { days: 3 }),
            None,
            start(),
        );
        assert!(matches!(result, Err(EngineError::InvalidReference { .. })));
        assert_eq!(
            engine.get_recommendation(&rec.id).unwrap().status,
            RecommendationStatus::Pending
        );
    }

    #[test]
    fn test_failed_status_write_rolls_back_plan() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let rec = create_extension(&engine, &skeleton, 7);
        let before = store.phases_for_plan(&skeleton.plan.id).unwrap();
        let weeks_before = store.weeks_for_phase(&skeleton.phases[1].id).unwrap();

        // Count the plan writes on an identical copy of the plan
        let twin = InMemoryStore::new();
        twin.save_skeleton(&skeleton).unwrap();
        let mut applier = Applier::new(&twin, engine.config(), &rec.id, start());
        applier
            .apply(&skeleton.plan.id, &rec.target, &rec.proposed_changes)
            .unwrap();
        let plan_writes = applier.into_journal().len();

        // Every plan write succeeds, the status write fails
        store.fail_write_after(plan_writes);
        let result = engine.respond(&rec.id, RecommendationResponse::Accept, None, start());
        assert!(matches!(result, Err(EngineError::ApplyFailure { .. })));

        assert_eq!(store.phases_for_plan(&skeleton.plan.id).unwrap(), before);
        assert_eq!(store.weeks_for_phase(&skeleton.phases[1].id).unwrap(), weeks_before);
        assert_eq!(store.weeks_for_phase(&skeleton.phases[0].id).unwrap().len(), 3);
        assert_eq!(
            engine.get_recommendation(&rec.id).unwrap().status,
            RecommendationStatus::Pending
        );
    }

    #[test]
    fn test_unsupported_type_applies_as_no_op() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let mut rec = create_extension(&engine, &skeleton, 7);
        rec.proposed_changes = ProposedChanges::Unsupported;
        store.save_recommendation(&rec).unwrap();

        let accepted = engine
            .respond(&rec.id, RecommendationResponse::Accept, None, start())
            .unwrap();
        assert_eq!(accepted.status, RecommendationStatus::Accepted);
        assert_eq!(store.phases_for_plan(&skeleton.plan.id).unwrap(), skeleton.phases);
    }

    #[test]
    fn test_concurrent_responses_serialize_per_plan() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let extend = create_extension(&engine, &skeleton, 7);
        let shorten = engine
            .create_recommendation(
                &skeleton.plan.id,
                RecommendationTarget::Phase(skeleton.phases[0].id.clone()),
                ProposedChanges::PhaseShorten { days: 3 },
                RecommendationSource::Manual,
                "",
            )
            .unwrap();

        std::thread::scope(|scope| {
            for id in [&extend.id, &shorten.id, &extend.id] {
                let engine = &engine;
                scope.spawn(move || {
                    let _ = engine.respond(id, RecommendationResponse::Accept, None, start());
                });
            }
        });

        // Each recommendation applied exactly once
        let phase = store.get_phase(&skeleton.phases[0].id).unwrap().unwrap();
        assert_eq!(phase.adaptation_history.len(), 2);
        assert_eq!(phase.end_date, skeleton.phases[0].end_date + Duration::days(4));
    }

    #[test]
    fn test_preview_rejects_terminal_and_never_writes() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let rec = create_extension(&engine, &skeleton, 7);

        let preview = engine.preview(&rec.id, start()).unwrap();
        assert_eq!(preview.timeline_impact.days_shifted, 7);
        assert_eq!(store.phases_for_plan(&skeleton.plan.id).unwrap(), skeleton.phases);

        engine
            .respond(&rec.id, RecommendationResponse::Dismiss, None, start())
            .unwrap();
        assert!(engine.preview(&rec.id, start()).is_err());
    }

    #[test]
    fn test_evaluate_low_readiness_scales_todays_hard_session() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);

        // Day 1 of the plan is a hard cardio session
        let date = start() + Duration::days(1);
        let hard = skeleton
            .workouts
            .iter()
            .find(|w| w.date == date)
            .unwrap()
            .clone();
        assert!(hard.intensity.is_hard());

        let service = ReadinessService::new(ReadinessScorer::new(), &store);
        service
            .assess("athlete", date, ReadinessInput::subjective(3))
            .unwrap();

        let created = engine
            .evaluate(&skeleton.plan.id, date, &EvaluationContext::default())
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].target, RecommendationTarget::Workout(hard.id.clone()));
        assert_eq!(created[0].source, RecommendationSource::Readiness);
        assert!(matches!(
            created[0].proposed_changes,
            ProposedChanges::WorkoutIntensityScale { .. }
        ));

        // Second run does not duplicate the pending recommendation
        let again = engine
            .evaluate(&skeleton.plan.id, date, &EvaluationContext::default())
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_evaluate_very_low_readiness_skips_session() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let date = start() + Duration::days(1);

        let service = ReadinessService::new(ReadinessScorer::new(), &store);
        service
            .assess("athlete", date, ReadinessInput::subjective(1))
            .unwrap();

        let created = engine
            .evaluate(&skeleton.plan.id, date, &EvaluationContext::default())
            .unwrap();
        assert_eq!(created.len(), 1);
        assert!(matches!(
            created[0].proposed_changes,
            ProposedChanges::WorkoutSkip { .. }
        ));

        engine
            .respond(&created[0].id, RecommendationResponse::Accept, None, date)
            .unwrap();
        let workout = store
            .get_workout(created[0].target.id())
            .unwrap()
            .unwrap();
        assert_eq!(workout.status, WorkoutStatus::Skipped);
    }

    #[test]
    fn test_evaluate_deep_fatigue_proposes_recovery_week() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let date = start() + Duration::days(14);

        // Long easy base then a brutal fortnight drives form well below -25
        for day in 0..84 {
            let sample_date = date - Duration::days(84 - day);
            let stress = if day >= 70 { dec!(250) } else { dec!(40) };
            store
                .upsert_sample("athlete", DailyLoadSample::new(sample_date, stress))
                .unwrap();
        }

        let context = EvaluationContext {
            muscles_over_mrv: vec!["quads".to_string(), "glutes".to_string()],
            ..EvaluationContext::default()
        };
        let created = engine.evaluate(&skeleton.plan.id, date, &context).unwrap();

        let week = store
            .weeks_for_phase(&skeleton.phases[0].id)
            .unwrap()
            .into_iter()
            .find(|w| w.contains(date))
            .unwrap();
        assert!(created.iter().any(|r| {
            r.target == RecommendationTarget::Week(week.id.clone())
                && r.proposed_changes
                    == ProposedChanges::WeekTypeChange {
                        new_type: WeekType::Recovery,
                    }
        }));
    }

    #[test]
    fn test_evaluate_outside_plan_is_empty() {
        let (store, skeleton) = setup();
        let engine = RecommendationEngine::new(&store);
        let created = engine
            .evaluate(
                &skeleton.plan.id,
                start() - Duration::days(10),
                &EvaluationContext::default(),
            )
            .unwrap();
        assert!(created.is_empty());
    }
}
