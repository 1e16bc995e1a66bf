//! Deload trigger evaluation
//!
//! Four independent triggers may fire at once: deep negative form,
//! too many muscle groups over their recoverable volume, widespread strength
//! plateaus, and a run of low-recovery days. The number and kind of triggers
//! decide severity and the shape of the deload.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Trigger thresholds and deload parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeloadConfig {
    /// Form (TSB) below this fires the fatigue trigger
    pub tsb_threshold: Decimal,

    /// Form below this forces a severe deload regardless of trigger count
    pub severe_tsb_threshold: Decimal,

    /// Muscle groups over MRV needed to fire the volume trigger
    pub mrv_muscle_threshold: usize,

    /// Weeks without progress before an exercise counts as plateaued
    pub plateau_weeks: u32,

    /// Plateaued exercises needed to fire the plateau trigger
    pub plateau_exercise_threshold: usize,

    /// Recovery scores below this count as a low-recovery day
    pub low_recovery_score: Decimal,

    /// Low-recovery days within the last week needed to fire the recovery trigger
    pub low_recovery_days: usize,

    /// Trigger count at which the deload becomes severe
    pub severe_trigger_count: usize,

    /// Days since the last deload after which a reminder is added
    pub deload_interval_days: u32,

    pub full: DeloadParameters,
    pub volume: DeloadParameters,
    pub intensity: DeloadParameters,
    pub default_volume: DeloadParameters,
}

impl Default for DeloadConfig {
    fn default() -> Self {
        DeloadConfig {
            tsb_threshold: dec!(-20),
            severe_tsb_threshold: dec!(-25),
            mrv_muscle_threshold: 2,
            plateau_weeks: 2,
            plateau_exercise_threshold: 3,
            low_recovery_score: dec!(40),
            low_recovery_days: 3,
            severe_trigger_count: 3,
            deload_interval_days: 42,
            full: DeloadParameters {
                volume_reduction: dec!(0.5),
                intensity_reduction: dec!(0.15),
                duration_days: 7,
            },
            volume: DeloadParameters {
                volume_reduction: dec!(0.4),
                intensity_reduction: Decimal::ZERO,
                duration_days: 5,
            },
            intensity: DeloadParameters {
                volume_reduction: Decimal::ZERO,
                intensity_reduction: dec!(0.10),
                duration_days: 5,
            },
            default_volume: DeloadParameters {
                volume_reduction: dec!(0.3),
                intensity_reduction: Decimal::ZERO,
                duration_days: 5,
            },
        }
    }
}

/// Reduction parameters for one deload type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeloadParameters {
    /// Fraction of volume removed (0.5 = half)
    pub volume_reduction: Decimal,

    /// Fraction of load/intensity removed
    pub intensity_reduction: Decimal,

    pub duration_days: u32,
}

/// An exercise whose best working weight has stalled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateauedExercise {
    pub exercise: String,
    pub weeks_without_progress: u32,
}

/// Everything the evaluator looks at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeloadInputs {
    /// Current form (TSB)
    pub tsb: Decimal,

    /// Muscle groups currently over their maximum recoverable volume
    pub muscles_over_mrv: Vec<String>,

    pub plateaued_exercises: Vec<PlateauedExercise>,

    /// Daily recovery/readiness scores, oldest first; only the last 7 are used
    pub recent_recovery_scores: Vec<Decimal>,

    pub days_since_last_deload: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeloadSeverity {
    Mild,
    Moderate,
    Severe,
}

impl std::fmt::Display for DeloadSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeloadSeverity::Mild => write!(f, "mild"),
            DeloadSeverity::Moderate => write!(f, "moderate"),
            DeloadSeverity::Severe => write!(f, "severe"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeloadType {
    /// Cut both volume and intensity
    Full,
    /// Cut sets, keep loads
    Volume,
    /// Keep sets, cut loads
    Intensity,
}

impl std::fmt::Display for DeloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeloadType::Full => write!(f, "full"),
            DeloadType::Volume => write!(f, "volume"),
            DeloadType::Intensity => write!(f, "intensity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeloadTrigger {
    NegativeForm,
    VolumeOverload,
    Plateau,
    LowRecovery,
}

/// Outcome of a deload evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeloadEvaluation {
    pub should_deload: bool,
    pub severity: Option<DeloadSeverity>,
    pub deload_type: Option<DeloadType>,
    pub triggers: Vec<DeloadTrigger>,
    pub volume_reduction: Decimal,
    pub intensity_reduction: Decimal,
    pub duration_days: u32,
    pub rationale: String,
    pub suggestions: Vec<String>,
}

/// Pure deload evaluator; identical inputs always give identical output
pub struct DeloadEvaluator {
    config: DeloadConfig,
}

impl DeloadEvaluator {
    pub fn new() -> Self {
        Self::with_config(DeloadConfig::default())
    }

    pub fn with_config(config: DeloadConfig) -> Self {
        DeloadEvaluator { config }
    }

    pub fn evaluate(&self, inputs: &DeloadInputs) -> DeloadEvaluation {
        let c = &self.config;
        let mut triggers = Vec::new();
        let mut reasons = Vec::new();

        if inputs.tsb < c.tsb_threshold {
            triggers.push(DeloadTrigger::NegativeForm);
            reasons.push(format!("form is deeply negative (TSB {})", inputs.tsb));
        }

        if inputs.muscles_over_mrv.len() >= c.mrv_muscle_threshold {
            triggers.push(DeloadTrigger::VolumeOverload);
            reasons.push(format!(
                "{} muscle groups are over their recoverable volume ({})",
                inputs.muscles_over_mrv.len(),
                inputs.muscles_over_mrv.join(", ")
            ));
        }

        let plateaued = inputs
            .plateaued_exercises
            .iter()
            .filter(|e| e.weeks_without_progress >= c.plateau_weeks)
            .count();
        if plateaued >= c.plateau_exercise_threshold {
            triggers.push(DeloadTrigger::Plateau);
            reasons.push(format!(
                "{} exercises have stalled for {}+ weeks",
                plateaued, c.plateau_weeks
            ));
        }

        let window_start = inputs.recent_recovery_scores.len().saturating_sub(7);
        let low_days = inputs.recent_recovery_scores[window_start..]
            .iter()
            .filter(|score| **score < c.low_recovery_score)
            .count();
        if low_days >= c.low_recovery_days {
            triggers.push(DeloadTrigger::LowRecovery);
            reasons.push(format!("recovery was low on {} of the last 7 days", low_days));
        }

        debug!(?triggers, tsb = %inputs.tsb, "Evaluated deload triggers");

        if triggers.is_empty() {
            return DeloadEvaluation {
                should_deload: false,
                severity: None,
                deload_type: None,
                triggers,
                volume_reduction: Decimal::ZERO,
                intensity_reduction: Decimal::ZERO,
                duration_days: 0,
                rationale: "No deload indicators - continue with the current plan".to_string(),
                suggestions: self.overdue_reminder(inputs).into_iter().collect(),
            };
        }

        let severity = if triggers.len() >= c.severe_trigger_count
            || inputs.tsb < c.severe_tsb_threshold
        {
            DeloadSeverity::Severe
        } else if triggers.len() == 2 {
            DeloadSeverity::Moderate
        } else {
            DeloadSeverity::Mild
        };

        let (deload_type, params) = if severity == DeloadSeverity::Severe {
            (DeloadType::Full, c.full)
        } else if triggers.contains(&DeloadTrigger::VolumeOverload) {
            (DeloadType::Volume, c.volume)
        } else if triggers.contains(&DeloadTrigger::Plateau) {
            (DeloadType::Intensity, c.intensity)
        } else {
            (DeloadType::Volume, c.default_volume)
        };

        let rationale = format!(
            "A {} {} deload is recommended: {}.",
            severity,
            deload_type,
            reasons.join("; ")
        );

        let mut suggestions = vec![format!(
            "Reduce training volume by {}%",
            percent(params.volume_reduction)
        )];
        if params.intensity_reduction > Decimal::ZERO {
            suggestions.push(format!(
                "Reduce working weights by {}%",
                percent(params.intensity_reduction)
            ));
        }
        suggestions.push(format!("Keep the deload to {} days", params.duration_days));
        suggestions.push(
            "Prioritise sleep, nutrition and light mobility work during the deload".to_string(),
        );
        if let Some(reminder) = self.overdue_reminder(inputs) {
            suggestions.push(reminder);
        }

        DeloadEvaluation {
            should_deload: true,
            severity: Some(severity),
            deload_type: Some(deload_type),
            triggers,
            volume_reduction: params.volume_reduction,
            intensity_reduction: params.intensity_reduction,
            duration_days: params.duration_days,
            rationale,
            suggestions,
        }
    }

    fn overdue_reminder(&self, inputs: &DeloadInputs) -> Option<String> {
        inputs
            .days_since_last_deload
            .filter(|days| *days >= self.config.deload_interval_days)
            .map(|days| {
                format!(
                    "It has been {} days since your last deload - plan one within the next few weeks",
                    days
                )
            })
    }
}

impl Default for DeloadEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(fraction: Decimal) -> Decimal {
    (fraction * dec!(100)).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_inputs() -> DeloadInputs {
        DeloadInputs {
            tsb: dec!(-5),
            muscles_over_mrv: vec![],
            plateaued_exercises: vec![],
            recent_recovery_scores: vec![dec!(70); 7],
            days_since_last_deload: Some(14),
        }
    }

    fn plateau(name: &str, weeks: u32) -> PlateauedExercise {
        PlateauedExercise {
            exercise: name.to_string(),
            weeks_without_progress: weeks,
        }
    }

    #[test]
    fn test_no_triggers() {
        let evaluation = DeloadEvaluator::new().evaluate(&quiet_inputs());

        assert!(!evaluation.should_deload);
        assert_eq!(evaluation.severity, None);
        assert_eq!(evaluation.volume_reduction, Decimal::ZERO);
        assert_eq!(evaluation.intensity_reduction, Decimal::ZERO);
        assert!(evaluation.suggestions.is_empty());
    }

    #[test]
    fn test_all_triggers_fire_severe_full() {
        let inputs = DeloadInputs {
            tsb: dec!(-30),
            muscles_over_mrv: vec!["chest".into(), "quads".into(), "back".into()],
            plateaued_exercises: vec![
                plateau("bench", 2),
                plateau("squat", 3),
                plateau("deadlift", 2),
                plateau("ohp", 4),
            ],
            recent_recovery_scores: vec![
                dec!(30),
                dec!(35),
                dec!(60),
                dec!(25),
                dec!(38),
                dec!(70),
                dec!(20),
            ],
            days_since_last_deload: Some(50),
        };

        let evaluation = DeloadEvaluator::new().evaluate(&inputs);
        assert!(evaluation.should_deload);
        assert_eq!(evaluation.triggers.len(), 4);
        assert_eq!(evaluation.severity, Some(DeloadSeverity::Severe));
        assert_eq!(evaluation.deload_type, Some(DeloadType::Full));
        assert_eq!(evaluation.volume_reduction, dec!(0.5));
        assert_eq!(evaluation.intensity_reduction, dec!(0.15));
        assert_eq!(evaluation.duration_days, 7);
        assert!(evaluation.suggestions[0].contains("50%"));
        assert!(evaluation.suggestions[1].contains("15%"));
        assert!(evaluation.suggestions.iter().any(|s| s.contains("50 days")));
    }

    #[test]
    fn test_volume_trigger_moderate() {
        let mut inputs = quiet_inputs();
        inputs.muscles_over_mrv = vec!["chest".into(), "shoulders".into()];
        inputs.recent_recovery_scores = vec![dec!(30), dec!(30), dec!(30), dec!(80)];

        let evaluation = DeloadEvaluator::new().evaluate(&inputs);
        assert_eq!(evaluation.severity, Some(DeloadSeverity::Moderate));
        assert_eq!(evaluation.deload_type, Some(DeloadType::Volume));
        assert_eq!(evaluation.volume_reduction, dec!(0.4));
        assert_eq!(evaluation.duration_days, 5);
        assert!(!evaluation.suggestions.iter().any(|s| s.contains("working weights")));
    }

    #[test]
    fn test_plateau_trigger_intensity_deload() {
        let mut inputs = quiet_inputs();
        inputs.plateaued_exercises = vec![
            plateau("bench", 2),
            plateau("squat", 2),
            plateau("row", 5),
            plateau("curl", 1),
        ];

        let evaluation = DeloadEvaluator::new().evaluate(&inputs);
        assert_eq!(evaluation.severity, Some(DeloadSeverity::Mild));
        assert_eq!(evaluation.deload_type, Some(DeloadType::Intensity));
        assert_eq!(evaluation.volume_reduction, Decimal::ZERO);
        assert_eq!(evaluation.intensity_reduction, dec!(0.10));
    }

    #[test]
    fn test_single_form_trigger_below_severe_tsb() {
        let mut inputs = quiet_inputs();
        inputs.tsb = dec!(-27);

        let evaluation = DeloadEvaluator::new().evaluate(&inputs);
        assert_eq!(evaluation.triggers, vec![DeloadTrigger::NegativeForm]);
        assert_eq!(evaluation.severity, Some(DeloadSeverity::Severe));
        assert_eq!(evaluation.deload_type, Some(DeloadType::Full));
    }

    #[test]
    fn test_default_volume_deload() {
        let mut inputs = quiet_inputs();
        inputs.tsb = dec!(-22);

        let evaluation = DeloadEvaluator::new().evaluate(&inputs);
        assert_eq!(evaluation.severity, Some(DeloadSeverity::Mild));
        assert_eq!(evaluation.deload_type, Some(DeloadType::Volume));
        assert_eq!(evaluation.volume_reduction, dec!(0.3));
    }

    #[test]
    fn test_only_last_seven_scores_count() {
        let mut inputs = quiet_inputs();
        let mut scores = vec![dec!(10); 5];
        scores.extend(vec![dec!(80); 7]);
        inputs.recent_recovery_scores = scores;

        let evaluation = DeloadEvaluator::new().evaluate(&inputs);
        assert!(!evaluation.should_deload);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_evaluation_is_pure(
            tsb in -60i32..30i32,
            muscles in 0usize..5usize,
            plateaus in proptest::collection::vec(0u32..6u32, 0..6),
            scores in proptest::collection::vec(0u32..100u32, 0..10),
            days in proptest::option::of(0u32..120u32),
        ) {
            let inputs = DeloadInputs {
                tsb: Decimal::from(tsb),
                muscles_over_mrv: (0..muscles).map(|i| format!("muscle{}", i)).collect(),
                plateaued_exercises: plateaus
                    .iter()
                    .enumerate()
                    .map(|(i, w)| plateau(&format!("exercise{}", i), *w))
                    .collect(),
                recent_recovery_scores: scores.into_iter().map(Decimal::from).collect(),
                days_since_last_deload: days,
            };
            let evaluator = DeloadEvaluator::new();
            let first = evaluator.evaluate(&inputs);
            let second = evaluator.evaluate(&inputs);

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.should_deload, !first.triggers.is_empty());
        }
    }
}
