//! Applying recommendation payloads to the plan hierarchy
//!
//! Each write records the entity's pre-image in a [`Journal`] before it is
//! issued. If anything fails, the journal is replayed in reverse so the plan
//! ends up exactly as it was and no audit entry is left behind.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{EngineError, RepositoryError};
use crate::models::round_dp;
use crate::recommendation::engine::RecommendationConfig;
use crate::recommendation::repository::PlanStore;
use crate::recommendation::{ProposedChanges, RecommendationTarget};
use crate::training_plan::{
    new_id, AdaptationEntry, AdaptationHistory, ChangeType, Phase, PhaseType, PlannedWorkout,
    WeekType, WeeklyTarget, WorkoutStatus,
};

/// A recommendation target loaded together with its owning entities
#[derive(Debug, Clone)]
pub enum ResolvedTarget {
    Phase(Phase),
    Week {
        week: WeeklyTarget,
        phase: Phase,
    },
    Workout {
        workout: PlannedWorkout,
        week: WeeklyTarget,
        phase: Phase,
    },
}

impl ResolvedTarget {
    pub fn phase(&self) -> &Phase {
        match self {
            ResolvedTarget::Phase(phase)
            | ResolvedTarget::Week { phase, .. }
            | ResolvedTarget::Workout { phase, .. } => phase,
        }
    }
}

/// Load the target and check it belongs to `plan_id`
pub fn resolve_target<S: PlanStore + ?Sized>(
    store: &S,
    plan_id: &str,
    target: &RecommendationTarget,
) -> Result<ResolvedTarget, EngineError> {
    let owned_phase = |phase_id: &str| -> Result<Phase, EngineError> {
        let phase = store
            .get_phase(phase_id)?
            .ok_or_else(|| EngineError::invalid(format!("phase {} not found", phase_id)))?;
        if phase.plan_id != plan_id {
            return Err(EngineError::invalid(format!(
                "phase {} belongs to plan {}, not {}",
                phase.id, phase.plan_id, plan_id
            )));
        }
        Ok(phase)
    };

    let owned_week = |week_id: &str| -> Result<(WeeklyTarget, Phase), EngineError> {
        let week = store
            .get_week(week_id)?
            .ok_or_else(|| EngineError::invalid(format!("week {} not found", week_id)))?;
        let phase = owned_phase(&week.phase_id)?;
        Ok((week, phase))
    };

    match target {
        RecommendationTarget::Phase(id) => Ok(ResolvedTarget::Phase(owned_phase(id)?)),
        RecommendationTarget::Week(id) => {
            let (week, phase) = owned_week(id)?;
            Ok(ResolvedTarget::Week { week, phase })
        }
        RecommendationTarget::Workout(id) => {
            let workout = store
                .get_workout(id)?
                .ok_or_else(|| EngineError::invalid(format!("workout {} not found", id)))?;
            let (week, phase) = owned_week(&workout.week_id)?;
            Ok(ResolvedTarget::Workout {
                workout,
                week,
                phase,
            })
        }
    }
}

/// Check the payload fits the target before anything is written
pub fn validate_changes(
    target: &RecommendationTarget,
    changes: &ProposedChanges,
) -> Result<(), EngineError> {
    changes.validate().map_err(|reason| {
        EngineError::invalid(format!("{} payload: {}", changes.recommendation_type(), reason))
    })?;

    match changes.level() {
        Some(level) if level != target.level() => Err(EngineError::invalid(format!(
            "{} changes cannot target a {}",
            changes.recommendation_type(),
            target.level()
        ))),
        _ => Ok(()),
    }
}

/// Phases after `after_index`, moved by `days` and re-indexed by `reindex_by`.
/// Returned latest-first so re-indexing never collides with an unmoved phase.
pub(crate) fn shifted_phases(
    phases: &[Phase],
    after_index: u32,
    days: i64,
    reindex_by: u32,
) -> Vec<(Phase, Phase)> {
    let mut shifted: Vec<(Phase, Phase)> = phases
        .iter()
        .filter(|p| p.order_index > after_index)
        .map(|before| {
            let mut after = before.clone();
            after.start_date += Duration::days(days);
            after.end_date += Duration::days(days);
            after.order_index += reindex_by;
            (before.clone(), after)
        })
        .collect();
    shifted.sort_by(|a, b| b.0.order_index.cmp(&a.0.order_index));
    shifted
}

/// New phase placed directly after `anchor`
pub(crate) fn inserted_phase(
    anchor: &Phase,
    phase_type: PhaseType,
    duration_days: u32,
    volume_modifier: Decimal,
    intensity_modifier: Decimal,
) -> Phase {
    let start_date = anchor.end_date + Duration::days(1);
    Phase {
        id: new_id(),
        plan_id: anchor.plan_id.clone(),
        order_index: anchor.order_index + 1,
        phase_type,
        start_date,
        end_date: start_date + Duration::days(i64::from(duration_days) - 1),
        volume_modifier,
        intensity_modifier,
        adaptation_history: AdaptationHistory::new(),
    }
}

/// A shortened phase must keep at least one day
pub(crate) fn check_shorten(phase: &Phase, days: u32) -> Result<(), EngineError> {
    if i64::from(days) >= phase.duration_days() {
        return Err(EngineError::invalid(format!(
            "cannot shorten phase {} by {} days; it only has {}",
            phase.id,
            days,
            phase.duration_days()
        )));
    }
    Ok(())
}

/// Week type a fresh week of this phase starts with
pub(crate) fn phase_week_type(phase_type: PhaseType) -> WeekType {
    match phase_type {
        PhaseType::Recovery | PhaseType::Transition => WeekType::Recovery,
        PhaseType::Taper => WeekType::Taper,
        PhaseType::Peak => WeekType::Peak,
        PhaseType::Base | PhaseType::Build => WeekType::Build,
    }
}

/// A new week modelled on `template`, starting `week_start` in `phase_id`
pub(crate) fn continuation_week(
    template: &WeeklyTarget,
    phase_id: &str,
    week_start: NaiveDate,
    volume_ratio: Decimal,
    week_type: WeekType,
) -> WeeklyTarget {
    let mut week = WeeklyTarget {
        id: new_id(),
        phase_id: phase_id.to_string(),
        week_start_date: week_start,
        week_type,
        adaptation_adjustments: AdaptationHistory::new(),
        ..template.clone()
    };
    if volume_ratio != Decimal::ONE {
        scale_week(&mut week, volume_ratio);
    }
    week
}

/// Copies of `template_week`'s sessions on the same weekdays of `week`,
/// dropping any that would fall after `last_day`
pub(crate) fn continuation_workouts(
    template_week: &WeeklyTarget,
    template: &[PlannedWorkout],
    week: &WeeklyTarget,
    last_day: NaiveDate,
) -> Vec<PlannedWorkout> {
    template
        .iter()
        .filter_map(|workout| {
            let date = week.week_start_date
                + workout.date.signed_duration_since(template_week.week_start_date);
            (date <= last_day).then(|| PlannedWorkout {
                id: new_id(),
                week_id: week.id.clone(),
                date,
                status: WorkoutStatus::Suggested,
                adaptation_history: AdaptationHistory::new(),
                ..workout.clone()
            })
        })
        .collect()
}

pub(crate) fn scale_week(week: &mut WeeklyTarget, multiplier: Decimal) {
    week.target_hours = round_dp(week.target_hours * multiplier, 1);
    week.target_tss = round_dp(week.target_tss * multiplier, 0);
    for hours in week.per_activity_hours.values_mut() {
        *hours = round_dp(*hours * multiplier, 1);
    }
}

/// Change the week type; entering a recovery week also cuts its volume
pub(crate) fn convert_week_type(week: &mut WeeklyTarget, new_type: WeekType, config: &RecommendationConfig) {
    if new_type == WeekType::Recovery && week.week_type != WeekType::Recovery {
        scale_week(week, config.recovery_week_volume);
    }
    week.week_type = new_type;
}

pub(crate) fn scale_workout(workout: &mut PlannedWorkout, factor: Decimal, config: &RecommendationConfig) {
    workout.planned_tss = round_dp(workout.planned_tss * factor, 0);
    for exercise in &mut workout.exercises {
        exercise.weight = exercise.weight.map(|w| round_dp(w * factor, 1));
    }
    if factor < config.intensity_step_down_below {
        workout.intensity = workout.intensity.step_down();
    }
}

pub(crate) fn substitute_exercise(
    workout: &mut PlannedWorkout,
    replace: &str,
    with: &str,
) -> Result<(), String> {
    let exercise = workout
        .exercises
        .iter_mut()
        .find(|e| e.name.eq_ignore_ascii_case(replace))
        .ok_or_else(|| format!("workout {} has no exercise named {}", workout.id, replace))?;
    exercise.name = with.to_string();
    Ok(())
}

/// `before: None` marks an entity created by the apply; rollback deletes it
enum JournalEntry {
    Phase { id: String, before: Option<Phase> },
    Week { id: String, before: Option<WeeklyTarget> },
    Workout { id: String, before: Option<PlannedWorkout> },
}

/// Pre-images of every entity written during one apply
#[derive(Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restore every pre-image, latest write first. Keeps going past failures
    /// and reports the first one.
    pub fn rollback<S: PlanStore + ?Sized>(self, store: &S) -> Result<(), RepositoryError> {
        let mut first_error = None;

        for entry in self.entries.into_iter().rev() {
            let result = match &entry {
                JournalEntry::Phase { id, before: None } => store.delete_phase(id),
                JournalEntry::Phase {
                    before: Some(phase),
                    ..
                } => store.save_phase(phase),
                JournalEntry::Week { id, before: None } => store.delete_week(id),
                JournalEntry::Week {
                    before: Some(week),
                    ..
                } => store.save_week(week),
                JournalEntry::Workout { id, before: None } => store.delete_workout(id),
                JournalEntry::Workout {
                    before: Some(workout),
                    ..
                } => store.save_workout(workout),
            };

            if let Err(e) = result {
                warn!(error = %e, "Rollback write failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Applies one payload, journaling every write
pub struct Applier<'a, S: ?Sized> {
    store: &'a S,
    config: &'a RecommendationConfig,
    recommendation_id: &'a str,
    date: NaiveDate,
    journal: Journal,
}

impl<'a, S: PlanStore + ?Sized> Applier<'a, S> {
    pub fn new(
        store: &'a S,
        config: &'a RecommendationConfig,
        recommendation_id: &'a str,
        date: NaiveDate,
    ) -> Self {
        Applier {
            store,
            config,
            recommendation_id,
            date,
            journal: Journal::default(),
        }
    }

    pub fn into_journal(self) -> Journal {
        self.journal
    }

    /// Validate, transform and persist. Writes made before an error stay in
    /// the journal for the caller to roll back.
    pub fn apply(
        &mut self,
        plan_id: &str,
        target: &RecommendationTarget,
        changes: &ProposedChanges,
    ) -> Result<(), EngineError> {
        validate_changes(target, changes)?;

        if let ProposedChanges::Unsupported = changes {
            debug!(
                recommendation_id = self.recommendation_id,
                "Unsupported recommendation type applied as a no-op"
            );
            return Ok(());
        }

        let resolved = resolve_target(self.store, plan_id, target)?;

        match (changes, resolved) {
            (ProposedChanges::PhaseExtension { days }, ResolvedTarget::Phase(phase)) => {
                self.move_phase_end(phase, i64::from(*days), ChangeType::PhaseExtension)
            }
            (ProposedChanges::PhaseShorten { days }, ResolvedTarget::Phase(phase)) => {
                check_shorten(&phase, *days)?;
                self.move_phase_end(phase, -i64::from(*days), ChangeType::PhaseShorten)
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
                // Re-index and shift everything after the anchor before inserting
                self.shift_downstream(
                    &anchor.plan_id,
                    anchor.order_index,
                    i64::from(*duration_days),
                    1,
                )?;

                let mut phase = inserted_phase(
                    &anchor,
                    *phase_type,
                    *duration_days,
                    *volume_modifier,
                    *intensity_modifier,
                );
                let after = json!({
                    "phase_type": phase.phase_type,
                    "order_index": phase.order_index,
                    "start_date": phase.start_date,
                    "end_date": phase.end_date,
                });
                phase
                    .adaptation_history
                    .append(self.entry(ChangeType::PhaseInsert, serde_json::Value::Null, after));
                self.save_phase(&phase, None)?;
                self.fill_inserted_phase(&anchor, &phase)
            }
            (ProposedChanges::WeekVolumeAdjust { volume_multiplier }, ResolvedTarget::Week { week, .. }) => {
                let before = week.clone();
                let mut week = week;
                scale_week(&mut week, *volume_multiplier);
                let entry = self.entry(
                    ChangeType::WeekVolumeAdjust,
                    json!({"target_hours": before.target_hours, "target_tss": before.target_tss}),
                    json!({"target_hours": week.target_hours, "target_tss": week.target_tss}),
                );
                week.adaptation_adjustments.append(entry);
                self.save_week(&week, Some(before))
            }
            (ProposedChanges::WeekTypeChange { new_type }, ResolvedTarget::Week { week, .. }) => {
                let before = week.clone();
                let mut week = week;
                convert_week_type(&mut week, *new_type, self.config);
                let entry = self.entry(
                    ChangeType::WeekTypeChange,
                    json!({
                        "week_type": before.week_type,
                        "target_hours": before.target_hours,
                        "target_tss": before.target_tss,
                    }),
                    json!({
                        "week_type": week.week_type,
                        "target_hours": week.target_hours,
                        "target_tss": week.target_tss,
                    }),
                );
                week.adaptation_adjustments.append(entry);
                self.save_week(&week, Some(before))
            }
            (ProposedChanges::WorkoutIntensityScale { factor }, ResolvedTarget::Workout { workout, .. }) => {
                Self::require_upcoming(&workout)?;
                let before = workout.clone();
                let mut workout = workout;
                scale_workout(&mut workout, *factor, self.config);
                let entry = self.entry(
                    ChangeType::WorkoutIntensityScale,
                    json!({"planned_tss": before.planned_tss, "intensity": before.intensity}),
                    json!({
                        "planned_tss": workout.planned_tss,
                        "intensity": workout.intensity,
                        "factor": factor,
                    }),
                );
                workout.adaptation_history.append(entry);
                self.save_workout(&workout, Some(before))
            }
            (
                ProposedChanges::WorkoutSubstitute {
                    replace_exercise,
                    with_exercise,
                },
                ResolvedTarget::Workout { workout, .. },
            ) => {
                Self::require_upcoming(&workout)?;
                let before = workout.clone();
                let mut workout = workout;
                substitute_exercise(&mut workout, replace_exercise, with_exercise)
                    .map_err(EngineError::invalid)?;
                let entry = self.entry(
                    ChangeType::WorkoutSubstitute,
                    json!({"exercise": replace_exercise}),
                    json!({"exercise": with_exercise}),
                );
                workout.adaptation_history.append(entry);
                self.save_workout(&workout, Some(before))
            }
            (ProposedChanges::WorkoutSkip { reason }, ResolvedTarget::Workout { workout, .. }) => {
                Self::require_upcoming(&workout)?;
                let before = workout.clone();
                let mut workout = workout;
                workout.status = WorkoutStatus::Skipped;
                let entry = self.entry(
                    ChangeType::WorkoutSkip,
                    json!({"status": before.status}),
                    json!({"status": workout.status, "reason": reason}),
                );
                workout.adaptation_history.append(entry);
                self.save_workout(&workout, Some(before))
            }
            // validate_changes already matched payload level to target level
            (changes, _) => Err(EngineError::invalid(format!(
                "{} changes do not match target {}",
                changes.recommendation_type(),
                target.id()
            ))),
        }
    }

    fn require_upcoming(workout: &PlannedWorkout) -> Result<(), EngineError> {
        if workout.status.is_upcoming() {
            Ok(())
        } else {
            Err(EngineError::invalid(format!(
                "workout {} is already {:?}",
                workout.id, workout.status
            )))
        }
    }

    /// Move a phase's end, keep its weeks inside it and slide every later
    /// phase along
    fn move_phase_end(&mut self, phase: Phase, days: i64, change_type: ChangeType) -> Result<(), EngineError> {
        let before = phase.clone();
        let mut phase = phase;
        phase.end_date += Duration::days(days);

        let mut after = json!({"end_date": phase.end_date});
        if days < 0 {
            let (weeks, workouts) = self.trim_past_end(&phase)?;
            after["removed_weeks"] = json!(weeks);
            after["removed_workouts"] = json!(workouts);
        }
        let entry = self.entry(change_type, json!({"end_date": before.end_date}), after);
        phase.adaptation_history.append(entry);
        self.save_phase(&phase, Some(before))?;

        if days > 0 {
            self.fill_phase_end(&phase)?;
        }
        self.shift_downstream(&phase.plan_id, phase.order_index, days, 0)
    }

    /// Repeat the phase's last week until its weeks reach the phase end
    fn fill_phase_end(&mut self, phase: &Phase) -> Result<(), EngineError> {
        let weeks = self
            .store
            .weeks_for_phase(&phase.id)
            .map_err(|e| self.failure(e))?;
        let Some(template) = weeks.last() else {
            return Ok(());
        };
        let template_workouts = self
            .store
            .workouts_for_week(&template.id)
            .map_err(|e| self.failure(e))?;

        let mut week_start = template.week_start_date + Duration::weeks(1);
        while week_start <= phase.end_date {
            let week = continuation_week(template, &phase.id, week_start, Decimal::ONE, template.week_type);
            let workouts = continuation_workouts(template, &template_workouts, &week, phase.end_date);
            self.create_week(week, workouts, ChangeType::PhaseExtension)?;
            week_start += Duration::weeks(1);
        }
        Ok(())
    }

    /// Give a newly inserted phase weeks modelled on the anchor's last week,
    /// scaled to the new phase's volume
    fn fill_inserted_phase(&mut self, anchor: &Phase, phase: &Phase) -> Result<(), EngineError> {
        let weeks = self
            .store
            .weeks_for_phase(&anchor.id)
            .map_err(|e| self.failure(e))?;
        let Some(template) = weeks.last() else {
            return Ok(());
        };
        let template_workouts = self
            .store
            .workouts_for_week(&template.id)
            .map_err(|e| self.failure(e))?;

        let ratio = if anchor.volume_modifier > Decimal::ZERO {
            phase.volume_modifier / anchor.volume_modifier
        } else {
            Decimal::ONE
        };
        let week_type = phase_week_type(phase.phase_type);

        let mut week_start = phase.start_date;
        while week_start <= phase.end_date {
            let week = continuation_week(template, &phase.id, week_start, ratio, week_type);
            let mut workouts = continuation_workouts(template, &template_workouts, &week, phase.end_date);
            if ratio != Decimal::ONE {
                for workout in &mut workouts {
                    scale_workout(workout, ratio, self.config);
                }
            }
            self.create_week(week, workouts, ChangeType::PhaseInsert)?;
            week_start += Duration::weeks(1);
        }
        Ok(())
    }

    fn create_week(
        &mut self,
        mut week: WeeklyTarget,
        workouts: Vec<PlannedWorkout>,
        change_type: ChangeType,
    ) -> Result<(), EngineError> {
        let entry = self.entry(
            change_type,
            serde_json::Value::Null,
            json!({"week_start_date": week.week_start_date, "week_type": week.week_type}),
        );
        week.adaptation_adjustments.append(entry);
        self.save_week(&week, None)?;

        for mut workout in workouts {
            let entry = self.entry(
                change_type,
                serde_json::Value::Null,
                json!({"date": workout.date, "category": workout.category}),
            );
            workout.adaptation_history.append(entry);
            self.save_workout(&workout, None)?;
        }
        Ok(())
    }

    /// Delete the weeks and sessions a shortened phase no longer covers.
    /// Returns how many weeks and workouts went.
    fn trim_past_end(&mut self, phase: &Phase) -> Result<(usize, usize), EngineError> {
        let weeks = self
            .store
            .weeks_for_phase(&phase.id)
            .map_err(|e| self.failure(e))?;
        let mut removed = (0, 0);

        for week in weeks {
            let drop_week = week.week_start_date > phase.end_date;
            let workouts = self
                .store
                .workouts_for_week(&week.id)
                .map_err(|e| self.failure(e))?;

            for workout in workouts {
                if !drop_week && workout.date <= phase.end_date {
                    continue;
                }
                if !workout.status.is_upcoming() {
                    return Err(EngineError::invalid(format!(
                        "workout {} on {} is already {:?} and would fall outside phase {}",
                        workout.id, workout.date, workout.status, phase.id
                    )));
                }
                self.delete_workout(workout)?;
                removed.1 += 1;
            }

            if drop_week {
                self.delete_week(week)?;
                removed.0 += 1;
            }
        }
        Ok(removed)
    }

    /// Slide a moved phase's weeks and their sessions by `days`
    fn shift_children(&mut self, phase_id: &str, days: i64) -> Result<(), EngineError> {
        let weeks = self
            .store
            .weeks_for_phase(phase_id)
            .map_err(|e| self.failure(e))?;

        for week in weeks {
            let workouts = self
                .store
                .workouts_for_week(&week.id)
                .map_err(|e| self.failure(e))?;
            for before in workouts {
                let mut workout = before.clone();
                workout.date += Duration::days(days);
                let entry = self.entry(
                    ChangeType::PhaseShift,
                    json!({"date": before.date}),
                    json!({"date": workout.date}),
                );
                workout.adaptation_history.append(entry);
                self.save_workout(&workout, Some(before))?;
            }

            let before = week;
            let mut week = before.clone();
            week.week_start_date += Duration::days(days);
            let entry = self.entry(
                ChangeType::PhaseShift,
                json!({"week_start_date": before.week_start_date}),
                json!({"week_start_date": week.week_start_date}),
            );
            week.adaptation_adjustments.append(entry);
            self.save_week(&week, Some(before))?;
        }
        Ok(())
    }

    fn shift_downstream(
        &mut self,
        plan_id: &str,
        after_index: u32,
        days: i64,
        reindex_by: u32,
    ) -> Result<(), EngineError> {
        let phases = self
            .store
            .phases_for_plan(plan_id)
            .map_err(|e| self.failure(e))?;

        for (before, mut after) in shifted_phases(&phases, after_index, days, reindex_by) {
            let entry = self.entry(
                ChangeType::PhaseShift,
                json!({
                    "order_index": before.order_index,
                    "start_date": before.start_date,
                    "end_date": before.end_date,
                }),
                json!({
                    "order_index": after.order_index,
                    "start_date": after.start_date,
                    "end_date": after.end_date,
                }),
            );
            after.adaptation_history.append(entry);
            self.save_phase(&after, Some(before))?;
            if days != 0 {
                self.shift_children(&after.id, days)?;
            }
        }
        Ok(())
    }

    fn entry(
        &self,
        change_type: ChangeType,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> AdaptationEntry {
        AdaptationEntry {
            date: self.date,
            change_type,
            before,
            after,
            recommendation_id: self.recommendation_id.to_string(),
        }
    }

    fn failure(&self, source: RepositoryError) -> EngineError {
        EngineError::ApplyFailure {
            recommendation_id: self.recommendation_id.to_string(),
            source,
        }
    }

    fn save_phase(&mut self, phase: &Phase, before: Option<Phase>) -> Result<(), EngineError> {
        self.journal.entries.push(JournalEntry::Phase {
            id: phase.id.clone(),
            before,
        });
        self.store.save_phase(phase).map_err(|e| self.failure(e))
    }

    fn save_week(&mut self, week: &WeeklyTarget, before: Option<WeeklyTarget>) -> Result<(), EngineError> {
        self.journal.entries.push(JournalEntry::Week {
            id: week.id.clone(),
            before,
        });
        self.store.save_week(week).map_err(|e| self.failure(e))
    }

    fn delete_week(&mut self, week: WeeklyTarget) -> Result<(), EngineError> {
        let id = week.id.clone();
        self.journal.entries.push(JournalEntry::Week {
            id: id.clone(),
            before: Some(week),
        });
        self.store.delete_week(&id).map_err(|e| self.failure(e))
    }

    fn save_workout(
        &mut self,
        workout: &PlannedWorkout,
        before: Option<PlannedWorkout>,
    ) -> Result<(), EngineError> {
        self.journal.entries.push(JournalEntry::Workout {
            id: workout.id.clone(),
            before,
        });
        self.store.save_workout(workout).map_err(|e| self.failure(e))
    }

    fn delete_workout(&mut self, workout: PlannedWorkout) -> Result<(), EngineError> {
        let id = workout.id.clone();
        self.journal.entries.push(JournalEntry::Workout {
            id: id.clone(),
            before: Some(workout),
        });
        self.store.delete_workout(&id).map_err(|e| self.failure(e))
    }
}
