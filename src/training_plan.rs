//! Periodized plan hierarchy (plan → phases → weekly targets → workouts)
//! and the skeleton builder for rolling and goal-based plans.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{round_dp, WorkoutCategory};

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("Plan must span at least {min} weeks, got {weeks}")]
    TooShort { weeks: u32, min: u32 },

    #[error("Goal date {goal} is not after start date {start}")]
    GoalBeforeStart { start: NaiveDate, goal: NaiveDate },

    #[error("Unknown recovery pattern: {0}")]
    UnknownRecoveryPattern(String),

    #[error("Unknown plan mode: {0}")]
    UnknownMode(String),
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// How phases are laid out and regenerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Open-ended base/build/recovery blocks
    Rolling,
    /// Base → build → peak → taper ending on an event date
    GoalBased,
}

impl FromStr for PlanMode {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rolling" => Ok(Self::Rolling),
            "goal" | "goal-based" | "goal_based" => Ok(Self::GoalBased),
            _ => Err(PlanError::UnknownMode(s.to_string())),
        }
    }
}

/// Recovery pattern for training cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryPattern {
    TwoToOne,   // 2 build weeks, 1 recovery week
    ThreeToOne, // 3 build weeks, 1 recovery week
    FourToOne,  // 4 build weeks, 1 recovery week
}

impl FromStr for RecoveryPattern {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2:1" => Ok(Self::TwoToOne),
            "3:1" => Ok(Self::ThreeToOne),
            "4:1" => Ok(Self::FourToOne),
            _ => Err(PlanError::UnknownRecoveryPattern(s.to_string())),
        }
    }
}

impl RecoveryPattern {
    pub fn cycle_length(&self) -> u32 {
        self.build_weeks() + 1
    }

    pub fn build_weeks(&self) -> u32 {
        match self {
            Self::TwoToOne => 2,
            Self::ThreeToOne => 3,
            Self::FourToOne => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseType {
    Base,
    Build,
    Peak,
    Taper,
    Recovery,
    Transition,
}

impl PhaseType {
    /// Default (volume, intensity) modifiers for a fresh phase
    pub fn default_modifiers(&self) -> (Decimal, Decimal) {
        match self {
            PhaseType::Base => (dec!(1.0), dec!(0.9)),
            PhaseType::Build => (dec!(1.1), dec!(1.0)),
            PhaseType::Peak => (dec!(1.0), dec!(1.1)),
            PhaseType::Taper => (dec!(0.6), dec!(1.0)),
            PhaseType::Recovery => (dec!(0.5), dec!(0.7)),
            PhaseType::Transition => (dec!(0.4), dec!(0.6)),
        }
    }

    /// Phases where accumulated load is expected to be highest
    pub fn is_loading(&self) -> bool {
        matches!(self, PhaseType::Build | PhaseType::Peak)
    }
}

impl std::fmt::Display for PhaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PhaseType::Base => "base",
            PhaseType::Build => "build",
            PhaseType::Peak => "peak",
            PhaseType::Taper => "taper",
            PhaseType::Recovery => "recovery",
            PhaseType::Transition => "transition",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekType {
    Build,
    Recovery,
    Peak,
    Taper,
}

impl std::fmt::Display for WeekType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WeekType::Build => "build",
            WeekType::Recovery => "recovery",
            WeekType::Peak => "peak",
            WeekType::Taper => "taper",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutIntensity {
    Recovery,
    Easy,
    Moderate,
    Hard,
    Max,
}

impl WorkoutIntensity {
    pub fn is_hard(&self) -> bool {
        matches!(self, WorkoutIntensity::Hard | WorkoutIntensity::Max)
    }

    /// One level easier, saturating at recovery
    pub fn step_down(&self) -> Self {
        match self {
            WorkoutIntensity::Max => WorkoutIntensity::Hard,
            WorkoutIntensity::Hard => WorkoutIntensity::Moderate,
            WorkoutIntensity::Moderate => WorkoutIntensity::Easy,
            WorkoutIntensity::Easy | WorkoutIntensity::Recovery => WorkoutIntensity::Recovery,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutStatus {
    Suggested,
    Scheduled,
    Skipped,
    Completed,
}

impl WorkoutStatus {
    /// Still ahead of the athlete and open to adjustment
    pub fn is_upcoming(&self) -> bool {
        matches!(self, WorkoutStatus::Suggested | WorkoutStatus::Scheduled)
    }
}

/// Kind of structural change recorded in an adaptation history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    PhaseExtension,
    PhaseShorten,
    PhaseInsert,
    /// Downstream phase moved by another phase's change
    PhaseShift,
    WeekVolumeAdjust,
    WeekTypeChange,
    WorkoutIntensityScale,
    WorkoutSubstitute,
    WorkoutSkip,
}

/// One audit record; the before/after snapshots hold only the changed fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationEntry {
    pub date: NaiveDate,
    pub change_type: ChangeType,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
    pub recommendation_id: String,
}

/// Append-only audit trail. Entries can be added and read, never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdaptationHistory(Vec<AdaptationEntry>);

impl AdaptationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: AdaptationEntry) {
        self.0.push(entry);
    }

    pub fn entries(&self) -> &[AdaptationEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&AdaptationEntry> {
        self.0.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub athlete_id: String,
    pub name: String,
    pub mode: PlanMode,
    pub recovery_pattern: RecoveryPattern,
    pub start_date: NaiveDate,
    pub goal_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub plan_id: String,

    /// Position within the plan; strictly increasing with start date
    pub order_index: u32,

    pub phase_type: PhaseType,
    pub start_date: NaiveDate,

    /// Inclusive
    pub end_date: NaiveDate,

    pub volume_modifier: Decimal,
    pub intensity_modifier: Decimal,
    pub adaptation_history: AdaptationHistory,
}

impl Phase {
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTarget {
    pub id: String,
    pub phase_id: String,
    pub week_start_date: NaiveDate,
    pub target_hours: Decimal,
    pub target_tss: Decimal,
    pub per_activity_hours: BTreeMap<WorkoutCategory, Decimal>,
    pub week_type: WeekType,
    pub adaptation_adjustments: AdaptationHistory,
}

impl WeeklyTarget {
    pub fn week_end_date(&self) -> NaiveDate {
        self.week_start_date + Duration::days(6)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.week_start_date && date <= self.week_end_date()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedExercise {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    pub weight: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedWorkout {
    pub id: String,
    pub week_id: String,
    pub date: NaiveDate,
    pub category: WorkoutCategory,
    pub intensity: WorkoutIntensity,
    pub duration_minutes: u32,
    pub planned_tss: Decimal,

    /// Strength sessions
    pub exercises: Vec<PlannedExercise>,

    /// Free-form structure for cardio sessions, e.g. "5x4min @ Z4"
    pub structure: Option<String>,

    pub status: WorkoutStatus,
    pub adaptation_history: AdaptationHistory,
}

/// A freshly laid-out plan, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSkeleton {
    pub plan: Plan,
    pub phases: Vec<Phase>,
    pub weeks: Vec<WeeklyTarget>,
    pub workouts: Vec<PlannedWorkout>,
}

/// Day offset, category, intensity, share of the week's load
type TemplateSlot = (i64, WorkoutCategory, WorkoutIntensity, Decimal);

const WEEK_TEMPLATE: [TemplateSlot; 4] = [
    (0, WorkoutCategory::Strength, WorkoutIntensity::Moderate, dec!(0.2)),
    (1, WorkoutCategory::Cardio, WorkoutIntensity::Hard, dec!(0.3)),
    (3, WorkoutCategory::Strength, WorkoutIntensity::Hard, dec!(0.2)),
    (5, WorkoutCategory::Cardio, WorkoutIntensity::Easy, dec!(0.3)),
];

/// Lays out phases, weekly targets and a workout template for a new plan
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    athlete_id: String,
    name: String,
    mode: PlanMode,
    start_date: NaiveDate,
    goal_date: Option<NaiveDate>,
    total_weeks: u32,
    recovery_pattern: RecoveryPattern,
    weekly_tss: Decimal,
    weekly_hours: Decimal,
    recovery_week_factor: Decimal,
    weekly_progression: Decimal,
    activity_split: BTreeMap<WorkoutCategory, Decimal>,
    strength_exercises: Vec<PlannedExercise>,
}

impl PlanBuilder {
    pub const MIN_GOAL_WEEKS: u32 = 4;

    fn base(athlete_id: &str, mode: PlanMode, start_date: NaiveDate) -> Self {
        let activity_split = BTreeMap::from([
            (WorkoutCategory::Cardio, dec!(0.6)),
            (WorkoutCategory::Strength, dec!(0.3)),
            (WorkoutCategory::Flexibility, dec!(0.1)),
        ]);

        PlanBuilder {
            athlete_id: athlete_id.to_string(),
            name: String::new(),
            mode,
            start_date,
            goal_date: None,
            total_weeks: 0,
            recovery_pattern: RecoveryPattern::ThreeToOne,
            weekly_tss: dec!(300),
            weekly_hours: dec!(6),
            recovery_week_factor: dec!(0.55),
            weekly_progression: dec!(0.05),
            activity_split,
            strength_exercises: Vec::new(),
        }
    }

    /// Open-ended plan of repeating blocks, laid out `weeks` ahead
    pub fn rolling(athlete_id: &str, start_date: NaiveDate, weeks: u32) -> Self {
        let mut builder = Self::base(athlete_id, PlanMode::Rolling, start_date);
        builder.total_weeks = weeks;
        builder.name = "Rolling Plan".to_string();
        builder
    }

    /// Event-driven plan whose taper ends on `goal_date`
    pub fn goal_based(athlete_id: &str, start_date: NaiveDate, goal_date: NaiveDate) -> Self {
        let mut builder = Self::base(athlete_id, PlanMode::GoalBased, start_date);
        builder.goal_date = Some(goal_date);
        let days = (goal_date - start_date).num_days() + 1;
        builder.total_weeks = u32::try_from((days + 6) / 7).unwrap_or(0);
        builder.name = format!("Plan to {}", goal_date);
        builder
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn recovery_pattern(mut self, pattern: RecoveryPattern) -> Self {
        self.recovery_pattern = pattern;
        self
    }

    /// Starting weekly load, typically CTL × 7
    pub fn weekly_tss(mut self, tss: Decimal) -> Self {
        self.weekly_tss = tss;
        self
    }

    pub fn weekly_hours(mut self, hours: Decimal) -> Self {
        self.weekly_hours = hours;
        self
    }

    pub fn strength_exercises(mut self, exercises: Vec<PlannedExercise>) -> Self {
        self.strength_exercises = exercises;
        self
    }

    pub fn build(self) -> Result<PlanSkeleton, PlanError> {
        if let Some(goal) = self.goal_date {
            if goal <= self.start_date {
                return Err(PlanError::GoalBeforeStart {
                    start: self.start_date,
                    goal,
                });
            }
        }

        let min = match self.mode {
            PlanMode::Rolling => 1,
            PlanMode::GoalBased => Self::MIN_GOAL_WEEKS,
        };
        if self.total_weeks < min {
            return Err(PlanError::TooShort {
                weeks: self.total_weeks,
                min,
            });
        }

        let plan = Plan {
            id: new_id(),
            athlete_id: self.athlete_id.clone(),
            name: self.name.clone(),
            mode: self.mode,
            recovery_pattern: self.recovery_pattern,
            start_date: self.start_date,
            goal_date: self.goal_date,
            created_at: Utc::now(),
        };

        let layout = match self.mode {
            PlanMode::GoalBased => self.goal_layout(),
            PlanMode::Rolling => self.rolling_layout(),
        };

        let mut skeleton = PlanSkeleton {
            plan,
            phases: Vec::new(),
            weeks: Vec::new(),
            workouts: Vec::new(),
        };

        let mut week_start = self.start_date;
        let mut global_week = 0u32;
        for (order_index, (phase_type, weeks)) in layout.into_iter().enumerate() {
            let (volume_modifier, intensity_modifier) = phase_type.default_modifiers();
            let mut end_date = week_start + Duration::weeks(i64::from(weeks)) - Duration::days(1);
            if let Some(goal) = self.goal_date {
                end_date = end_date.min(goal);
            }

            let phase = Phase {
                id: new_id(),
                plan_id: skeleton.plan.id.clone(),
                order_index: u32::try_from(order_index).unwrap_or(u32::MAX),
                phase_type,
                start_date: week_start,
                end_date,
                volume_modifier,
                intensity_modifier,
                adaptation_history: AdaptationHistory::new(),
            };

            for week_in_phase in 0..weeks {
                global_week += 1;
                let week_type = self.week_type(phase_type, global_week);
                let week = self.weekly_target(&phase, week_start, week_in_phase, week_type);
                self.template_workouts(&week, end_date, &mut skeleton.workouts);
                skeleton.weeks.push(week);
                week_start += Duration::weeks(1);
            }

            skeleton.phases.push(phase);
        }

        info!(
            plan_id = %skeleton.plan.id,
            mode = ?self.mode,
            phases = skeleton.phases.len(),
            weeks = skeleton.weeks.len(),
            "Built plan skeleton"
        );

        Ok(skeleton)
    }

    /// Base 40%, build 30%, peak 20%, taper the remainder (at least one week)
    fn goal_layout(&self) -> Vec<(PhaseType, u32)> {
        let total = self.total_weeks;
        let base = total * 40 / 100;
        let build = total * 30 / 100;
        let peak = total * 20 / 100;
        let taper = total - base - build - peak;

        [
            (PhaseType::Base, base),
            (PhaseType::Build, build),
            (PhaseType::Peak, peak),
            (PhaseType::Taper, taper),
        ]
        .into_iter()
        .filter(|(_, weeks)| *weeks > 0)
        .collect()
    }

    /// Alternating base/build blocks, each followed by a recovery week
    fn rolling_layout(&self) -> Vec<(PhaseType, u32)> {
        let block = self.recovery_pattern.build_weeks();
        let mut layout = Vec::new();
        let mut remaining = self.total_weeks;
        let mut loading = PhaseType::Base;

        while remaining > 0 {
            let weeks = block.min(remaining);
            layout.push((loading, weeks));
            remaining -= weeks;

            if remaining > 0 {
                layout.push((PhaseType::Recovery, 1));
                remaining -= 1;
            }

            loading = match loading {
                PhaseType::Base => PhaseType::Build,
                _ => PhaseType::Base,
            };
        }

        layout
    }

    fn week_type(&self, phase_type: PhaseType, global_week: u32) -> WeekType {
        match phase_type {
            PhaseType::Recovery | PhaseType::Transition => WeekType::Recovery,
            PhaseType::Taper => WeekType::Taper,
            _ if self.mode == PlanMode::GoalBased
                && global_week % self.recovery_pattern.cycle_length() == 0 =>
            {
                WeekType::Recovery
            }
            PhaseType::Peak => WeekType::Peak,
            _ => WeekType::Build,
        }
    }

    fn weekly_target(
        &self,
        phase: &Phase,
        week_start: NaiveDate,
        week_in_phase: u32,
        week_type: WeekType,
    ) -> WeeklyTarget {
        let progression = match phase.phase_type {
            PhaseType::Base | PhaseType::Build => {
                Decimal::ONE + self.weekly_progression * Decimal::from(week_in_phase)
            }
            _ => Decimal::ONE,
        };
        let week_factor = match week_type {
            WeekType::Recovery if phase.phase_type != PhaseType::Recovery => {
                self.recovery_week_factor
            }
            _ => Decimal::ONE,
        };
        let multiplier = phase.volume_modifier * progression * week_factor;
        let target_hours = round_dp(self.weekly_hours * multiplier, 1);

        let per_activity_hours = self
            .activity_split
            .iter()
            .map(|(category, share)| (*category, round_dp(target_hours * share, 1)))
            .collect();

        WeeklyTarget {
            id: new_id(),
            phase_id: phase.id.clone(),
            week_start_date: week_start,
            target_hours,
            target_tss: round_dp(self.weekly_tss * multiplier, 0),
            per_activity_hours,
            week_type,
            adaptation_adjustments: AdaptationHistory::new(),
        }
    }

    fn template_workouts(&self, week: &WeeklyTarget, last_day: NaiveDate, out: &mut Vec<PlannedWorkout>) {
        let easy_week = matches!(week.week_type, WeekType::Recovery | WeekType::Taper);

        for (offset, category, intensity, share) in WEEK_TEMPLATE {
            let date = week.week_start_date + Duration::days(offset);
            if date > last_day {
                continue;
            }

            let intensity = if easy_week && intensity.is_hard() {
                intensity.step_down()
            } else {
                intensity
            };
            let minutes = round_dp(week.target_hours * share * dec!(60), 0);

            out.push(PlannedWorkout {
                id: new_id(),
                week_id: week.id.clone(),
                date,
                category,
                intensity,
                duration_minutes: minutes.to_u32().unwrap_or(0),
                planned_tss: round_dp(week.target_tss * share, 0),
                exercises: match category {
                    WorkoutCategory::Strength => self.strength_exercises.clone(),
                    _ => Vec::new(),
                },
                structure: None,
                status: WorkoutStatus::Suggested,
                adaptation_history: AdaptationHistory::new(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_recovery_pattern_parsing() {
        assert_eq!("3:1".parse::<RecoveryPattern>().unwrap(), RecoveryPattern::ThreeToOne);
        assert_eq!(RecoveryPattern::ThreeToOne.cycle_length(), 4);
        assert_eq!(RecoveryPattern::TwoToOne.build_weeks(), 2);
        assert!("5:2".parse::<RecoveryPattern>().is_err());
    }

    #[test]
    fn test_adaptation_history_append_only() {
        let mut history = AdaptationHistory::new();
        assert!(history.is_empty());
        history.append(AdaptationEntry {
            date: date(2024, 1, 1),
            change_type: ChangeType::PhaseExtension,
            before: serde_json::json!({"end_date": "2024-01-28"}),
            after: serde_json::json!({"end_date": "2024-02-04"}),
            recommendation_id: "rec-1".to_string(),
        });
        assert_eq!(history.len(), 1);
        assert_eq!(history.entries()[0].recommendation_id, "rec-1");

        let json = serde_json::to_string(&history).unwrap();
        assert!(json.starts_with('['));
    }

    #[test]
    fn test_goal_based_plan_ends_on_goal_date() {
        let start = date(2024, 1, 1);
        let goal = date(2024, 3, 24);
        let skeleton = PlanBuilder::goal_based("athlete", start, goal)
            .build()
            .unwrap();

        assert_eq!(skeleton.plan.mode, PlanMode::GoalBased);
        assert_eq!(skeleton.weeks.len(), 12);

        let types: Vec<_> = skeleton.phases.iter().map(|p| p.phase_type).collect();
        assert_eq!(
            types,
            vec![PhaseType::Base, PhaseType::Build, PhaseType::Peak, PhaseType::Taper]
        );

        let last = skeleton.phases.last().unwrap();
        assert_eq!(last.end_date, goal);

        // Contiguous, strictly ordered phases
        for pair in skeleton.phases.windows(2) {
            assert_eq!(pair[0].end_date + Duration::days(1), pair[1].start_date);
            assert!(pair[0].order_index < pair[1].order_index);
        }

        // Every fourth week is a recovery week under 3:1
        assert_eq!(skeleton.weeks[3].week_type, WeekType::Recovery);
        assert!(skeleton.weeks[3].target_tss < skeleton.weeks[2].target_tss);
    }

    #[test]
    fn test_rolling_plan_blocks() {
        let skeleton = PlanBuilder::rolling("athlete", date(2024, 1, 1), 8)
            .recovery_pattern(RecoveryPattern::ThreeToOne)
            .build()
            .unwrap();

        let layout: Vec<_> = skeleton
            .phases
            .iter()
            .map(|p| (p.phase_type, p.duration_days() / 7))
            .collect();
        assert_eq!(
            layout,
            vec![
                (PhaseType::Base, 3),
                (PhaseType::Recovery, 1),
                (PhaseType::Build, 3),
                (PhaseType::Recovery, 1),
            ]
        );
        assert_eq!(skeleton.weeks.len(), 8);
        assert_eq!(skeleton.workouts.len(), 8 * WEEK_TEMPLATE.len());
    }

    #[test]
    fn test_recovery_weeks_have_no_hard_workouts() {
        let skeleton = PlanBuilder::rolling("athlete", date(2024, 1, 1), 4)
            .build()
            .unwrap();
        let recovery_week = skeleton
            .weeks
            .iter()
            .find(|w| w.week_type == WeekType::Recovery)
            .unwrap();

        assert!(skeleton
            .workouts
            .iter()
            .filter(|w| w.week_id == recovery_week.id)
            .all(|w| !w.intensity.is_hard()));
    }

    #[test]
    fn test_invalid_plans() {
        let start = date(2024, 1, 1);
        assert!(matches!(
            PlanBuilder::goal_based("a", start, start).build(),
            Err(PlanError::GoalBeforeStart { .. })
        ));
        assert!(matches!(
            PlanBuilder::goal_based("a", start, date(2024, 1, 15)).build(),
            Err(PlanError::TooShort { .. })
        ));
        assert!(PlanBuilder::rolling("a", start, 0).build().is_err());
    }
}
