//! Non-mutating previews of what a recommendation would do
//!
//! Load is projected with a simple linear model: removing a fraction `r` of a
//! week's volume improves form by about `r × tsb_gain_per_volume_week`
//! points. Phase-level changes keep paying off through the second week,
//! week-level changes stop after the week ends, and single-workout changes
//! fade by half in the second week.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, RepositoryError};
use crate::models::round_dp;
use crate::recommendation::apply::{
    check_shorten, convert_week_type, inserted_phase, resolve_target, scale_week, scale_workout,
    shifted_phases, substitute_exercise, validate_changes, ResolvedTarget,
};
use crate::recommendation::engine::RecommendationConfig;
use crate::recommendation::repository::PlanStore;
use crate::recommendation::{ProposedChanges, Recommendation, RecommendationType, TargetLevel};
use crate::training_plan::{Phase, WeekType, WorkoutStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedItem {
    pub level: TargetLevel,
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineImpact {
    /// Days every later phase moves by (negative = earlier)
    pub days_shifted: i64,
    pub phases_shifted: usize,
    pub projected_plan_end: Option<NaiveDate>,

    /// Event-date clashes the change would create
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadProjection {
    pub current_tsb: Decimal,
    pub tsb_in_7_days: Decimal,
    pub tsb_in_14_days: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPreview {
    pub recommendation_id: String,
    pub recommendation_type: RecommendationType,
    pub current_state: serde_json::Value,
    pub projected_state: serde_json::Value,
    pub affected_items: Vec<AffectedItem>,
    pub timeline_impact: TimelineImpact,
    pub training_load_projection: LoadProjection,
    pub risks: Vec<String>,
    pub benefits: Vec<String>,
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, EngineError> {
    serde_json::to_value(value).map_err(|e| EngineError::Repository(RepositoryError::from(e)))
}

/// Work out the effect of `changes` on a snapshot of the plan. Reads only.
pub fn build_preview<S: PlanStore + ?Sized>(
    store: &S,
    recommendation: &Recommendation,
    changes: &ProposedChanges,
    current_tsb: Decimal,
    config: &RecommendationConfig,
) -> Result<RecommendationPreview, EngineError> {
    validate_changes(&recommendation.target, changes)?;

    let mut preview = RecommendationPreview {
        recommendation_id: recommendation.id.clone(),
        recommendation_type: changes.recommendation_type(),
        current_state: serde_json::Value::Null,
        projected_state: serde_json::Value::Null,
        affected_items: Vec::new(),
        timeline_impact: TimelineImpact {
            days_shifted: 0,
            phases_shifted: 0,
            projected_plan_end: None,
            conflicts: Vec::new(),
        },
        training_load_projection: project(current_tsb, Decimal::ZERO, Decimal::ZERO),
        risks: Vec::new(),
        benefits: Vec::new(),
    };

    if let ProposedChanges::Unsupported = changes {
        preview
            .risks
            .push("This recommendation type is not supported and will not change the plan".to_string());
        return Ok(preview);
    }

    let resolved = resolve_target(store, &recommendation.plan_id, &recommendation.target)?;
    let gain_per_week = config.tsb_gain_per_volume_week;

    match (changes, resolved) {
        (ProposedChanges::PhaseExtension { days }, ResolvedTarget::Phase(phase))
        | (ProposedChanges::PhaseShorten { days }, ResolvedTarget::Phase(phase)) => {
            let delta = match changes {
                ProposedChanges::PhaseShorten { .. } => {
                    check_shorten(&phase, *days)?;
                    -i64::from(*days)
                }
                _ => i64::from(*days),
            };
            let mut projected = phase.clone();
            projected.end_date += chrono::Duration::days(delta);

            preview.current_state = to_json(&phase)?;
            preview.projected_state = to_json(&projected)?;
            preview.affected_items.push(AffectedItem {
                level: TargetLevel::Phase,
                id: phase.id.clone(),
                description: format!(
                    "{} phase ends {} instead of {}",
                    phase.phase_type, projected.end_date, phase.end_date
                ),
            });
            timeline(store, recommendation, &phase, delta, 0, &mut preview)?;

            if delta > 0 {
                preview
                    .benefits
                    .push(format!("{} more days to consolidate {} adaptations", days, phase.phase_type));
                if phase.phase_type.is_loading() {
                    preview
                        .risks
                        .push("Extending a loading phase prolongs fatigue accumulation".to_string());
                }
            } else {
                preview
                    .benefits
                    .push("Moves on to the next phase sooner".to_string());
                preview.risks.push(format!(
                    "{} fewer days of {} work",
                    days, phase.phase_type
                ));
            }
        }
        (
            ProposedChanges::PhaseInsert {
                phase_type,
                duration_days,
                volume_modifier,
                intensity_modifier,
            },
            ResolvedTarget::Phase(anchor),
        ) => {
            let inserted = inserted_phase(
                &anchor,
                *phase_type,
                *duration_days,
                *volume_modifier,
                *intensity_modifier,
            );
            preview.current_state = to_json(&anchor)?;
            preview.projected_state = to_json(&inserted)?;
            preview.affected_items.push(AffectedItem {
                level: TargetLevel::Phase,
                id: inserted.id.clone(),
                description: format!(
                    "New {} phase {} to {}",
                    phase_type, inserted.start_date, inserted.end_date
                ),
            });
            timeline(store, recommendation, &anchor, i64::from(*duration_days), 1, &mut preview)?;

            let reduction = if anchor.volume_modifier > Decimal::ZERO {
                Decimal::ONE - *volume_modifier / anchor.volume_modifier
            } else {
                Decimal::ZERO
            };
            let gain = reduction * gain_per_week;
            preview.training_load_projection = project(current_tsb, gain, gain * dec!(2));

            if reduction > Decimal::ZERO {
                preview.benefits.push(format!(
                    "About {}% less volume for {} days lets fatigue dissipate",
                    round_dp(reduction * dec!(100), 0),
                    duration_days
                ));
            }
            preview
                .risks
                .push(format!("Every later phase moves back {} days", duration_days));
        }
        (ProposedChanges::WeekVolumeAdjust { volume_multiplier }, ResolvedTarget::Week { week, .. }) => {
            let mut projected = week.clone();
            scale_week(&mut projected, *volume_multiplier);
            preview.current_state = to_json(&week)?;
            preview.projected_state = to_json(&projected)?;
            preview.affected_items.push(AffectedItem {
                level: TargetLevel::Week,
                id: week.id.clone(),
                description: format!(
                    "Week of {}: {} → {} TSS",
                    week.week_start_date, week.target_tss, projected.target_tss
                ),
            });

            let reduction = Decimal::ONE - *volume_multiplier;
            let gain = reduction * gain_per_week;
            preview.training_load_projection = project(current_tsb, gain, gain);
            if reduction > Decimal::ZERO {
                preview.benefits.push("Lower weekly load reduces accumulated fatigue".to_string());
                preview
                    .risks
                    .push("Slight fitness (CTL) dip from the reduced load".to_string());
            } else {
                preview
                    .benefits
                    .push("Higher weekly load drives further fitness gains".to_string());
                preview.risks.push("Fatigue will rise during this week".to_string());
            }
        }
        (ProposedChanges::WeekTypeChange { new_type }, ResolvedTarget::Week { week, .. }) => {
            let mut projected = week.clone();
            convert_week_type(&mut projected, *new_type, config);
            preview.current_state = to_json(&week)?;
            preview.projected_state = to_json(&projected)?;
            preview.affected_items.push(AffectedItem {
                level: TargetLevel::Week,
                id: week.id.clone(),
                description: format!("Week of {}: {} → {}", week.week_start_date, week.week_type, new_type),
            });

            if *new_type == WeekType::Recovery && week.week_type != WeekType::Recovery {
                let reduction = Decimal::ONE - config.recovery_week_volume;
                let gain = reduction * gain_per_week;
                preview.training_load_projection = project(current_tsb, gain, gain);
                preview.benefits.push(format!(
                    "About {}% less volume; form should improve by roughly {} points",
                    round_dp(reduction * dec!(100), 0),
                    round_dp(gain, 0)
                ));
                preview
                    .risks
                    .push("Hard sessions planned this week will be dropped or eased".to_string());
            }
        }
        (ProposedChanges::WorkoutIntensityScale { factor }, ResolvedTarget::Workout { workout, .. }) => {
            let mut projected = workout.clone();
            scale_workout(&mut projected, *factor, config);
            preview.current_state = to_json(&workout)?;
            preview.projected_state = to_json(&projected)?;
            preview.affected_items.push(AffectedItem {
                level: TargetLevel::Workout,
                id: workout.id.clone(),
                description: format!(
                    "{} {} on {}: {} → {} TSS",
                    workout.category, "session", workout.date, workout.planned_tss, projected.planned_tss
                ),
            });

            let removed = workout.planned_tss - projected.planned_tss;
            let gain = removed * config.workout_tsb_factor;
            preview.training_load_projection = project(current_tsb, gain, gain / dec!(2));
            preview
                .benefits
                .push("Keeps the session while matching today's readiness".to_string());
        }
        (
            ProposedChanges::WorkoutSubstitute {
                replace_exercise,
                with_exercise,
            },
            ResolvedTarget::Workout { workout, .. },
        ) => {
            let mut projected = workout.clone();
            substitute_exercise(&mut projected, replace_exercise, with_exercise)
                .map_err(EngineError::invalid)?;
            preview.current_state = to_json(&workout)?;
            preview.projected_state = to_json(&projected)?;
            preview.affected_items.push(AffectedItem {
                level: TargetLevel::Workout,
                id: workout.id.clone(),
                description: format!("{} → {} on {}", replace_exercise, with_exercise, workout.date),
            });
            preview
                .benefits
                .push("A new variation can break through a stalled lift".to_string());
            preview
                .risks
                .push("Expect lower loads for a few sessions while learning the variation".to_string());
        }
        (ProposedChanges::WorkoutSkip { .. }, ResolvedTarget::Workout { workout, .. }) => {
            let mut projected = workout.clone();
            projected.status = WorkoutStatus::Skipped;
            preview.current_state = to_json(&workout)?;
            preview.projected_state = to_json(&projected)?;
            preview.affected_items.push(AffectedItem {
                level: TargetLevel::Workout,
                id: workout.id.clone(),
                description: format!("Skip {} session on {}", workout.category, workout.date),
            });

            let gain = workout.planned_tss * config.workout_tsb_factor;
            preview.training_load_projection = project(current_tsb, gain, gain / dec!(2));
            preview.benefits.push("A full rest day supports recovery".to_string());
            preview
                .risks
                .push(format!("Misses {} TSS of planned training", workout.planned_tss));
        }
        (changes, _) => {
            return Err(EngineError::invalid(format!(
                "{} changes do not match target {}",
                changes.recommendation_type(),
                recommendation.target.id()
            )))
        }
    }

    Ok(preview)
}

fn project(current: Decimal, gain_7: Decimal, gain_14: Decimal) -> LoadProjection {
    LoadProjection {
        current_tsb: round_dp(current, 1),
        tsb_in_7_days: round_dp(current + gain_7, 1),
        tsb_in_14_days: round_dp(current + gain_14, 1),
    }
}

/// Fill in downstream shifts and event-date conflicts
fn timeline<S: PlanStore + ?Sized>(
    store: &S,
    recommendation: &Recommendation,
    anchor: &Phase,
    days: i64,
    reindex_by: u32,
    preview: &mut RecommendationPreview,
) -> Result<(), EngineError> {
    let phases = store.phases_for_plan(&recommendation.plan_id)?;
    let shifted = shifted_phases(&phases, anchor.order_index, days, reindex_by);

    for (before, after) in shifted.iter().rev() {
        preview.affected_items.push(AffectedItem {
            level: TargetLevel::Phase,
            id: before.id.clone(),
            description: format!(
                "{} phase moves from {} to {}",
                before.phase_type, before.start_date, after.start_date
            ),
        });
    }

    let current_end = phases.iter().map(|p| p.end_date).max();
    let projected_end = current_end.map(|end| end + chrono::Duration::days(days));

    let mut conflicts = Vec::new();
    if let (Some(plan), Some(end)) = (store.get_plan(&recommendation.plan_id)?, projected_end) {
        if let Some(goal) = plan.goal_date {
            if end > goal {
                conflicts.push(format!(
                    "Plan would end on {}, after the event on {}",
                    end, goal
                ));
            } else if end < goal && days < 0 {
                conflicts.push(format!(
                    "Plan would finish {} days before the event on {}",
                    (goal - end).num_days(),
                    goal
                ));
            }
        }
    }

    preview.timeline_impact = TimelineImpact {
        days_shifted: days,
        phases_shifted: shifted.len(),
        projected_plan_end: projected_end,
        conflicts,
    };
    Ok(())
}
