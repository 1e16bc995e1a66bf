//! Per-exercise progression suggestions and plateau diagnosis

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::round_dp;
use crate::tempo::reps_in_reserve;

/// Progression strategy chosen per athlete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionStrategy {
    /// Fixed weight increment every session
    Linear,
    /// Build reps through a band, then add weight and reset reps
    DoubleProgression,
    /// Adjust weight from last session's RPE/RIR
    RpeBased,
}

impl std::str::FromStr for ProgressionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "double" | "double-progression" | "double_progression" => Ok(Self::DoubleProgression),
            "rpe" | "rpe-based" | "rpe_based" => Ok(Self::RpeBased),
            _ => Err(format!("Unknown progression strategy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyRegion {
    Upper,
    Lower,
}

/// Per-model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Linear increment for upper-body lifts
    pub upper_body_increment: Decimal,

    /// Linear increment for lower-body lifts
    pub lower_body_increment: Decimal,

    /// Bottom of the double-progression rep band
    pub rep_range_min: u32,

    /// Top of the double-progression rep band
    pub rep_range_max: u32,

    /// Weight added once the top of the band is reached on every set
    pub double_progression_increment: Decimal,

    /// RPE below this means the load was too light
    pub rpe_target_low: Decimal,

    /// RPE above this means the load was too heavy
    pub rpe_target_high: Decimal,

    /// Fractional weight change applied by the RPE model
    pub rpe_weight_adjustment: Decimal,

    /// Smallest loadable weight step; suggestions are rounded to it
    pub weight_rounding: Decimal,

    /// Sessions without a new best weight before a plateau is flagged
    pub plateau_threshold: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        ProgressionConfig {
            upper_body_increment: dec!(5),
            lower_body_increment: dec!(10),
            rep_range_min: 8,
            rep_range_max: 12,
            double_progression_increment: dec!(5),
            rpe_target_low: dec!(7),
            rpe_target_high: dec!(9),
            rpe_weight_adjustment: dec!(0.05),
            weight_rounding: dec!(2.5),
            plateau_threshold: 2,
        }
    }
}

/// One logged working set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedSet {
    pub weight: Decimal,
    pub reps: u32,
    pub rpe: Option<Decimal>,
    pub rir: Option<u32>,
}

impl LoggedSet {
    pub fn new(weight: Decimal, reps: u32) -> Self {
        LoggedSet {
            weight,
            reps,
            rpe: None,
            rir: None,
        }
    }
}

/// All working sets of one exercise in one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSession {
    pub date: NaiveDate,
    pub sets: Vec<LoggedSet>,
}

impl ExerciseSession {
    /// Heaviest working weight in the session
    pub fn best_weight(&self) -> Option<Decimal> {
        self.sets.iter().map(|s| s.weight).max()
    }
}

/// Chronological session history for one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseHistory {
    pub exercise: String,
    pub body_region: BodyRegion,
    pub sessions: Vec<ExerciseSession>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectiveAction {
    ChangeRepRange,
    DeloadExercise,
    SwapExercise,
}

impl CorrectiveAction {
    pub fn description(&self) -> &'static str {
        match self {
            CorrectiveAction::ChangeRepRange => {
                "Change the rep range to give the lift a new stimulus"
            }
            CorrectiveAction::DeloadExercise => {
                "Drop the working weight ~10% for a week, then build back up"
            }
            CorrectiveAction::SwapExercise => "Swap to a close variation of this exercise",
        }
    }
}

/// Plateau flag surfaced alongside any strategy's suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateauDiagnosis {
    pub sessions_without_progress: u32,
    pub best_weight: Decimal,
    pub action: CorrectiveAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionSuggestion {
    pub exercise: String,
    pub strategy: ProgressionStrategy,

    /// False when the model lacks the data to suggest anything
    pub confident: bool,

    pub suggested_weight: Option<Decimal>,
    pub suggested_reps: Option<u32>,
    pub reasoning: String,
    pub plateau: Option<PlateauDiagnosis>,
}

/// Progression model
pub struct ProgressionModel {
    config: ProgressionConfig,
}

impl ProgressionModel {
    pub fn new() -> Self {
        Self::with_config(ProgressionConfig::default())
    }

    pub fn with_config(config: ProgressionConfig) -> Self {
        ProgressionModel { config }
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    /// Suggest the next session for an exercise from its most recent session
    pub fn suggest(
        &self,
        strategy: ProgressionStrategy,
        history: &ExerciseHistory,
    ) -> ProgressionSuggestion {
        let plateau = self.diagnose_plateau(&history.sessions);
        let last = history.sessions.last().filter(|s| !s.sets.is_empty());

        let mut suggestion = match last {
            None => ProgressionSuggestion {
                exercise: history.exercise.clone(),
                strategy,
                confident: false,
                suggested_weight: None,
                suggested_reps: None,
                reasoning: "No logged sets for this exercise yet".to_string(),
                plateau: None,
            },
            Some(session) => match strategy {
                ProgressionStrategy::Linear => self.linear(history, session),
                ProgressionStrategy::DoubleProgression => self.double_progression(history, session),
                ProgressionStrategy::RpeBased => self.rpe_based(history, session),
            },
        };

        suggestion.plateau = plateau;
        debug!(
            exercise = %suggestion.exercise,
            ?strategy,
            confident = suggestion.confident,
            "Computed progression suggestion"
        );
        suggestion
    }

    fn linear(&self, history: &ExerciseHistory, session: &ExerciseSession) -> ProgressionSuggestion {
        let top = top_set(session);
        let increment = match history.body_region {
            BodyRegion::Upper => self.config.upper_body_increment,
            BodyRegion::Lower => self.config.lower_body_increment,
        };
        let weight = self.round_weight(top.weight + increment);

        ProgressionSuggestion {
            exercise: history.exercise.clone(),
            strategy: ProgressionStrategy::Linear,
            confident: true,
            suggested_weight: Some(weight),
            suggested_reps: Some(top.reps),
            reasoning: format!("Add {} to last session's {}", increment, top.weight),
            plateau: None,
        }
    }

    fn double_progression(
        &self,
        history: &ExerciseHistory,
        session: &ExerciseSession,
    ) -> ProgressionSuggestion {
        let c = &self.config;
        let top = top_set(session);
        let working: Vec<&LoggedSet> = session.sets.iter().filter(|s| s.weight == top.weight).collect();
        let lowest_reps = working.iter().map(|s| s.reps).min().unwrap_or(top.reps);

        let (weight, reps, reasoning) = if lowest_reps >= c.rep_range_max {
            (
                self.round_weight(top.weight + c.double_progression_increment),
                c.rep_range_min,
                format!(
                    "Hit {} reps on every set - add {} and reset to {} reps",
                    c.rep_range_max, c.double_progression_increment, c.rep_range_min
                ),
            )
        } else {
            let target = (lowest_reps + 1).clamp(c.rep_range_min, c.rep_range_max);
            (
                top.weight,
                target,
                format!(
                    "Keep {} and work toward {} reps on every set",
                    top.weight, c.rep_range_max
                ),
            )
        };

        ProgressionSuggestion {
            exercise: history.exercise.clone(),
            strategy: ProgressionStrategy::DoubleProgression,
            confident: true,
            suggested_weight: Some(weight),
            suggested_reps: Some(reps),
            reasoning,
            plateau: None,
        }
    }

    fn rpe_based(&self, history: &ExerciseHistory, session: &ExerciseSession) -> ProgressionSuggestion {
        let c = &self.config;
        let top = top_set(session);

        let Some(rpe) = effective_rpe(top) else {
            return ProgressionSuggestion {
                exercise: history.exercise.clone(),
                strategy: ProgressionStrategy::RpeBased,
                confident: false,
                suggested_weight: None,
                suggested_reps: None,
                reasoning: "Cannot suggest a load without RPE or RIR on the last session - log how hard the top set felt".to_string(),
                plateau: None,
            };
        };

        let (weight, reasoning) = if rpe < c.rpe_target_low {
            (
                self.round_weight(top.weight * (Decimal::ONE + c.rpe_weight_adjustment)),
                format!("RPE {} was below target - increase the load", rpe),
            )
        } else if rpe > c.rpe_target_high {
            (
                self.round_weight(top.weight * (Decimal::ONE - c.rpe_weight_adjustment)),
                format!("RPE {} was above target - reduce the load", rpe),
            )
        } else {
            (top.weight, format!("RPE {} was on target - repeat the load", rpe))
        };

        ProgressionSuggestion {
            exercise: history.exercise.clone(),
            strategy: ProgressionStrategy::RpeBased,
            confident: true,
            suggested_weight: Some(weight),
            suggested_reps: Some(top.reps),
            reasoning,
            plateau: None,
        }
    }

    /// Flag a plateau when the best working weight hasn't improved for
    /// `plateau_threshold` sessions. The corrective action escalates with the stall.
    pub fn diagnose_plateau(&self, sessions: &[ExerciseSession]) -> Option<PlateauDiagnosis> {
        let stalled = self.sessions_without_progress(sessions)?;
        let threshold = self.config.plateau_threshold.max(1);
        if stalled.0 < threshold {
            return None;
        }

        let action = if stalled.0 < threshold * 2 {
            CorrectiveAction::ChangeRepRange
        } else if stalled.0 < threshold * 3 {
            CorrectiveAction::DeloadExercise
        } else {
            CorrectiveAction::SwapExercise
        };

        Some(PlateauDiagnosis {
            sessions_without_progress: stalled.0,
            best_weight: stalled.1,
            action,
        })
    }

    /// Sessions since the last new best weight, and that best weight
    fn sessions_without_progress(&self, sessions: &[ExerciseSession]) -> Option<(u32, Decimal)> {
        let mut best: Option<Decimal> = None;
        let mut stalled = 0u32;

        for weight in sessions.iter().filter_map(ExerciseSession::best_weight) {
            match best {
                Some(b) if weight <= b => stalled += 1,
                _ => {
                    best = Some(weight);
                    stalled = 0;
                }
            }
        }

        best.map(|b| (stalled, b))
    }

    fn round_weight(&self, weight: Decimal) -> Decimal {
        let step = self.config.weight_rounding;
        if step <= Decimal::ZERO {
            return round_dp(weight, 2);
        }
        round_dp(weight / step, 0) * step
    }
}

impl Default for ProgressionModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Heaviest set, latest one on ties
fn top_set(session: &ExerciseSession) -> &LoggedSet {
    let mut top = &session.sets[0];
    for set in &session.sets[1..] {
        if set.weight >= top.weight {
            top = set;
        }
    }
    top
}

/// RPE for a set, deriving it from RIR when only that was logged
pub fn effective_rpe(set: &LoggedSet) -> Option<Decimal> {
    set.rpe.or_else(|| set.rir.map(|rir| dec!(10) - Decimal::from(rir)))
}

/// Reps in reserve for a set, deriving it from RPE when only that was logged
pub fn set_reps_in_reserve(set: &LoggedSet) -> Option<Decimal> {
    reps_in_reserve(set.rpe, set.rir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn session(day: u32, weight: Decimal, reps: &[u32]) -> ExerciseSession {
        ExerciseSession {
            date: date(day),
            sets: reps.iter().map(|r| LoggedSet::new(weight, *r)).collect(),
        }
    }

    fn history(region: BodyRegion, sessions: Vec<ExerciseSession>) -> ExerciseHistory {
        ExerciseHistory {
            exercise: "bench_press".to_string(),
            body_region: region,
            sessions,
        }
    }

    #[test]
    fn test_double_progression_top_of_band() {
        let h = history(BodyRegion::Upper, vec![session(1, dec!(185), &[12, 12, 12])]);
        let s = ProgressionModel::new().suggest(ProgressionStrategy::DoubleProgression, &h);

        assert!(s.confident);
        assert_eq!(s.suggested_weight, Some(dec!(190)));
        assert_eq!(s.suggested_reps, Some(8));
    }

    #[test]
    fn test_double_progression_within_band() {
        let h = history(BodyRegion::Upper, vec![session(1, dec!(185), &[12, 11, 10])]);
        let s = ProgressionModel::new().suggest(ProgressionStrategy::DoubleProgression, &h);

        assert_eq!(s.suggested_weight, Some(dec!(185)));
        assert_eq!(s.suggested_reps, Some(11));
    }

    #[test]
    fn test_linear_uses_region_increment() {
        let model = ProgressionModel::new();

        let upper = history(BodyRegion::Upper, vec![session(1, dec!(100), &[5, 5, 5])]);
        let s = model.suggest(ProgressionStrategy::Linear, &upper);
        assert_eq!(s.suggested_weight, Some(dec!(105)));
        assert_eq!(s.suggested_reps, Some(5));

        let lower = history(BodyRegion::Lower, vec![session(1, dec!(200), &[5, 5, 5])]);
        let s = model.suggest(ProgressionStrategy::Linear, &lower);
        assert_eq!(s.suggested_weight, Some(dec!(210)));
    }

    #[test]
    fn test_rpe_based_requires_rpe_or_rir() {
        let h = history(BodyRegion::Upper, vec![session(1, dec!(100), &[8, 8])]);
        let s = ProgressionModel::new().suggest(ProgressionStrategy::RpeBased, &h);

        assert!(!s.confident);
        assert_eq!(s.suggested_weight, None);
        assert!(s.reasoning.contains("RPE"));
    }

    #[test]
    fn test_rpe_based_adjusts_load() {
        let model = ProgressionModel::new();
        let mut light = session(1, dec!(100), &[8]);
        light.sets[0].rpe = Some(dec!(6));
        let s = model.suggest(ProgressionStrategy::RpeBased, &history(BodyRegion::Upper, vec![light]));
        assert_eq!(s.suggested_weight, Some(dec!(105)));

        let mut heavy = session(1, dec!(100), &[8]);
        heavy.sets[0].rir = Some(0);
        let s = model.suggest(ProgressionStrategy::RpeBased, &history(BodyRegion::Upper, vec![heavy]));
        assert_eq!(s.suggested_weight, Some(dec!(95)));

        let mut on_target = session(1, dec!(100), &[8]);
        on_target.sets[0].rpe = Some(dec!(8));
        let s = model.suggest(ProgressionStrategy::RpeBased, &history(BodyRegion::Upper, vec![on_target]));
        assert_eq!(s.suggested_weight, Some(dec!(100)));
    }

    #[test]
    fn test_empty_history() {
        let s = ProgressionModel::new().suggest(ProgressionStrategy::Linear, &history(BodyRegion::Upper, vec![]));
        assert!(!s.confident);
        assert!(s.plateau.is_none());
    }

    #[test]
    fn test_plateau_detection_and_escalation() {
        let model = ProgressionModel::new();

        let progressing = vec![
            session(1, dec!(100), &[5]),
            session(8, dec!(105), &[5]),
            session(15, dec!(110), &[5]),
        ];
        assert!(model.diagnose_plateau(&progressing).is_none());

        let stalled = vec![
            session(1, dec!(100), &[5]),
            session(8, dec!(110), &[5]),
            session(15, dec!(110), &[5]),
            session(22, dec!(105), &[5]),
        ];
        let diagnosis = model.diagnose_plateau(&stalled).unwrap();
        assert_eq!(diagnosis.sessions_without_progress, 2);
        assert_eq!(diagnosis.best_weight, dec!(110));
        assert_eq!(diagnosis.action, CorrectiveAction::ChangeRepRange);

        let long_stall: Vec<_> = (0..7).map(|i| session(1 + i, dec!(110), &[5])).collect();
        let diagnosis = model.diagnose_plateau(&long_stall).unwrap();
        assert_eq!(diagnosis.sessions_without_progress, 6);
        assert_eq!(diagnosis.action, CorrectiveAction::SwapExercise);
    }

    #[test]
    fn test_plateau_surfaced_with_suggestion() {
        let h = history(
            BodyRegion::Upper,
            vec![
                session(1, dec!(100), &[8, 8]),
                session(8, dec!(100), &[9, 8]),
                session(15, dec!(100), &[9, 9]),
            ],
        );
        let s = ProgressionModel::new().suggest(ProgressionStrategy::DoubleProgression, &h);
        assert!(s.plateau.is_some());
        assert_eq!(s.suggested_reps, Some(10));
    }

    #[test]
    fn test_effective_rpe_from_rir() {
        let mut set = LoggedSet::new(dec!(100), 8);
        assert_eq!(effective_rpe(&set), None);
        set.rir = Some(2);
        assert_eq!(effective_rpe(&set), Some(dec!(8)));
        assert_eq!(set_reps_in_reserve(&set), Some(dec!(2)));
    }
}
