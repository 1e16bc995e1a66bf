//! Readiness scoring from subjective and objective daily inputs
//!
//! The score is a weighted average over whichever factors were actually
//! measured. A missing factor drops out of both the numerator and the
//! denominator; it is never assumed to be "average".
//!
//! # Factors and weights
//!
//! | Factor               | Weight | Raw score                                  |
//! |----------------------|--------|--------------------------------------------|
//! | Subjective readiness | 35     | readiness / 10 × 100                       |
//! | HRV                  | 20     | z-score vs personal baseline, banded       |
//! | Sleep                | 20     | mean of quality and duration scores        |
//! | Form (TSB)           | 15     | piecewise, peaks slightly positive         |
//! | Grip strength        | 5      | percent of baseline, banded                |
//! | Vertical jump        | 5      | percent of baseline, banded                |
//!
//! # Recommendation bands
//!
//! - **push** (≥70): adjustment factor 1.00-1.10
//! - **maintain** (40-69): adjustment factor 1.00
//! - **reduce** (<40): adjustment factor 0.70-1.00

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{clamp, round_dp, ReadinessBaseline};
use crate::recommendation::repository::{AssessmentStore, BaselineProvider, RepositoryError};

/// Factor weights and band thresholds for the readiness model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    pub subjective_weight: Decimal,
    pub hrv_weight: Decimal,
    pub sleep_weight: Decimal,
    pub form_weight: Decimal,
    pub grip_weight: Decimal,
    pub jump_weight: Decimal,

    /// Scores at or above this are "push"
    pub push_threshold: Decimal,

    /// Scores below this are "reduce"
    pub reduce_threshold: Decimal,

    /// Largest upward adjustment for "push" (at score 100)
    pub max_push_adjustment: Decimal,

    /// Smallest adjustment factor for "reduce" (at score 0)
    pub min_reduce_factor: Decimal,

    /// A factor raw score below this adds a caution to the suggestions
    pub caution_threshold: Decimal,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        ReadinessConfig {
            subjective_weight: dec!(35),
            hrv_weight: dec!(20),
            sleep_weight: dec!(20),
            form_weight: dec!(15),
            grip_weight: dec!(5),
            jump_weight: dec!(5),
            push_threshold: dec!(70),
            reduce_threshold: dec!(40),
            max_push_adjustment: dec!(0.10),
            min_reduce_factor: dec!(0.70),
            caution_threshold: dec!(40),
        }
    }
}

/// One day's readiness inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessInput {
    /// Self-reported readiness (1-10)
    pub subjective_readiness: u8,

    /// Morning HRV reading (RMSSD, ms)
    pub hrv_reading: Option<Decimal>,

    /// Grip strength (kg)
    pub grip_strength: Option<Decimal>,

    /// Vertical jump (cm)
    pub vertical_jump: Option<Decimal>,

    /// Self-reported sleep quality (1-10)
    pub sleep_quality: Option<u8>,

    /// Hours slept
    pub sleep_hours: Option<Decimal>,

    /// Current form (TSB)
    pub form_value: Option<Decimal>,
}

impl ReadinessInput {
    /// Input with only the always-present subjective rating
    pub fn subjective(subjective_readiness: u8) -> Self {
        ReadinessInput {
            subjective_readiness,
            hrv_reading: None,
            grip_strength: None,
            vertical_jump: None,
            sleep_quality: None,
            sleep_hours: None,
            form_value: None,
        }
    }
}

/// Training recommendation derived from the readiness score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessRecommendation {
    Push,
    Maintain,
    Reduce,
}

impl std::fmt::Display for ReadinessRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessRecommendation::Push => write!(f, "push"),
            ReadinessRecommendation::Maintain => write!(f, "maintain"),
            ReadinessRecommendation::Reduce => write!(f, "reduce"),
        }
    }
}

/// Readiness factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessFactor {
    Subjective,
    Hrv,
    Sleep,
    Form,
    GripStrength,
    VerticalJump,
}

/// Contribution of one factor to the final score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor: ReadinessFactor,
    /// 0-100
    pub raw_score: Decimal,
    pub weight: Decimal,
}

/// Scored readiness, embedded in the stored assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessResult {
    /// 0-100
    pub score: Decimal,
    pub recommendation: ReadinessRecommendation,
    pub adjustment_factor: Decimal,
    pub breakdown: Vec<FactorScore>,
    pub suggestions: Vec<String>,
}

/// Stored readiness record, one per athlete per date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessAssessment {
    pub athlete_id: String,
    pub date: NaiveDate,
    pub input: ReadinessInput,
    pub result: ReadinessResult,
}

/// Multi-factor readiness scorer
pub struct ReadinessScorer {
    config: ReadinessConfig,
}

impl ReadinessScorer {
    pub fn new() -> Self {
        Self::with_config(ReadinessConfig::default())
    }

    pub fn with_config(config: ReadinessConfig) -> Self {
        ReadinessScorer { config }
    }

    /// Score a day's readiness against the athlete's baselines
    pub fn score(&self, input: &ReadinessInput, baseline: Option<&ReadinessBaseline>) -> ReadinessResult {
        let c = &self.config;
        let baseline = baseline.cloned().unwrap_or_default();
        let mut breakdown = Vec::with_capacity(6);

        let subjective = Decimal::from(input.subjective_readiness.clamp(1, 10));
        breakdown.push(FactorScore {
            factor: ReadinessFactor::Subjective,
            raw_score: subjective * dec!(10),
            weight: c.subjective_weight,
        });

        if let Some(hrv) = input.hrv_reading {
            breakdown.push(FactorScore {
                factor: ReadinessFactor::Hrv,
                raw_score: hrv_score(hrv, &baseline),
                weight: c.hrv_weight,
            });
        }

        if let Some(sleep) = sleep_score(input.sleep_quality, input.sleep_hours) {
            breakdown.push(FactorScore {
                factor: ReadinessFactor::Sleep,
                raw_score: sleep,
                weight: c.sleep_weight,
            });
        }

        if let Some(tsb) = input.form_value {
            breakdown.push(FactorScore {
                factor: ReadinessFactor::Form,
                raw_score: form_score(tsb),
                weight: c.form_weight,
            });
        }

        if let Some(grip) = input.grip_strength {
            breakdown.push(FactorScore {
                factor: ReadinessFactor::GripStrength,
                raw_score: performance_score(grip, baseline.avg_grip_strength),
                weight: c.grip_weight,
            });
        }

        if let Some(jump) = input.vertical_jump {
            breakdown.push(FactorScore {
                factor: ReadinessFactor::VerticalJump,
                raw_score: performance_score(jump, baseline.avg_vertical_jump),
                weight: c.jump_weight,
            });
        }

        let total_weight: Decimal = breakdown.iter().map(|f| f.weight).sum();
        let weighted: Decimal = breakdown.iter().map(|f| f.raw_score * f.weight).sum();
        let score = if total_weight.is_zero() {
            Decimal::ZERO
        } else {
            clamp(round_dp(weighted / total_weight, 0), Decimal::ZERO, dec!(100))
        };

        let (recommendation, adjustment_factor) = self.recommend(score);
        let suggestions = self.suggestions(&breakdown, recommendation);

        for factor in &mut breakdown {
            factor.raw_score = round_dp(factor.raw_score, 1);
        }

        debug!(%score, %recommendation, factors = breakdown.len(), "Scored readiness");

        ReadinessResult {
            score,
            recommendation,
            adjustment_factor,
            breakdown,
            suggestions,
        }
    }

    /// Map a score onto a recommendation band and adjustment factor
    pub fn recommend(&self, score: Decimal) -> (ReadinessRecommendation, Decimal) {
        let c = &self.config;
        if score >= c.push_threshold {
            let span = dec!(100) - c.push_threshold;
            let factor = Decimal::ONE + (score - c.push_threshold) / span * c.max_push_adjustment;
            (ReadinessRecommendation::Push, round_dp(factor, 2))
        } else if score >= c.reduce_threshold {
            (ReadinessRecommendation::Maintain, Decimal::ONE)
        } else {
            let factor = c.min_reduce_factor
                + score / c.reduce_threshold * (Decimal::ONE - c.min_reduce_factor);
            (ReadinessRecommendation::Reduce, round_dp(factor, 2))
        }
    }

    fn suggestions(&self, breakdown: &[FactorScore], recommendation: ReadinessRecommendation) -> Vec<String> {
        let mut suggestions: Vec<String> = breakdown
            .iter()
            .filter(|f| f.raw_score < self.config.caution_threshold)
            .map(|f| caution(f.factor).to_string())
            .collect();

        if suggestions.is_empty() {
            suggestions.push(
                match recommendation {
                    ReadinessRecommendation::Push => {
                        "You're well recovered - a good day for a key session"
                    }
                    ReadinessRecommendation::Maintain => {
                        "Readiness is moderate - train as planned and monitor how you feel"
                    }
                    ReadinessRecommendation::Reduce => {
                        "Readiness is low - favour easy aerobic work or rest today"
                    }
                }
                .to_string(),
            );
        }

        suggestions
    }
}

impl Default for ReadinessScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn caution(factor: ReadinessFactor) -> &'static str {
    match factor {
        ReadinessFactor::Subjective => {
            "You're reporting low readiness - consider an easier session or rest"
        }
        ReadinessFactor::Hrv => "HRV is well below your baseline - your body may still be recovering",
        ReadinessFactor::Sleep => "Sleep was poor - prioritise an early night and keep intensity low",
        ReadinessFactor::Form => "Accumulated fatigue is high - a lighter day will help absorb training",
        ReadinessFactor::GripStrength => {
            "Grip strength is down versus baseline - a sign of neuromuscular fatigue"
        }
        ReadinessFactor::VerticalJump => {
            "Jump height is down versus baseline - a sign of neuromuscular fatigue"
        }
    }
}

/// Beyond three deviations every HRV band is already saturated
const MAX_HRV_Z: Decimal = dec!(3);

/// HRV z-score against baseline, banded onto 0-100; neutral 50 without a usable baseline
pub fn hrv_score(hrv: Decimal, baseline: &ReadinessBaseline) -> Decimal {
    let (mean, std) = match (baseline.avg_hrv, baseline.std_hrv) {
        (Some(mean), Some(std)) if std > Decimal::ZERO => (mean, std),
        _ => return dec!(50),
    };

    // A degenerate baseline can push the z-score past Decimal's range
    let saturated = if hrv >= mean { MAX_HRV_Z } else { -MAX_HRV_Z };
    let z = hrv
        .checked_sub(mean)
        .and_then(|diff| diff.checked_div(std))
        .map_or(saturated, |z| clamp(z, -MAX_HRV_Z, MAX_HRV_Z));
    let score = if z >= Decimal::ONE {
        dec!(80) + (z - Decimal::ONE).min(Decimal::ONE) * dec!(20)
    } else if z >= Decimal::ZERO {
        dec!(60) + z * dec!(20)
    } else if z >= dec!(-1) {
        dec!(60) + z * dec!(20)
    } else {
        dec!(40) + (z + Decimal::ONE) * dec!(20)
    };

    clamp(score, Decimal::ZERO, dec!(100))
}

/// Average of sleep quality (linear) and sleep duration scores, whichever are present
pub fn sleep_score(quality: Option<u8>, hours: Option<Decimal>) -> Option<Decimal> {
    let quality = quality.map(|q| Decimal::from(q.clamp(1, 10)) * dec!(10));
    let duration = hours.map(sleep_duration_score);

    match (quality, duration) {
        (Some(q), Some(d)) => Some((q + d) / dec!(2)),
        (Some(q), None) => Some(q),
        (None, Some(d)) => Some(d),
        (None, None) => None,
    }
}

/// 100 for 7-9h, 60→100 ramp over 6-7h, linear to 0 below 6h
pub fn sleep_duration_score(hours: Decimal) -> Decimal {
    if hours >= dec!(7) && hours <= dec!(9) {
        dec!(100)
    } else if hours >= dec!(6) && hours < dec!(7) {
        dec!(60) + (hours - dec!(6)) * dec!(40)
    } else if hours < dec!(6) {
        clamp(hours / dec!(6) * dec!(60), Decimal::ZERO, dec!(60))
    } else {
        // Oversleeping is not penalized heavily
        clamp(dec!(100) - (hours - dec!(9)) * dec!(10), dec!(70), dec!(100))
    }
}

/// Piecewise mapping of form (TSB) onto 0-100
pub fn form_score(tsb: Decimal) -> Decimal {
    let score = if tsb > dec!(15) {
        dec!(80)
    } else if tsb >= Decimal::ZERO {
        dec!(90) + tsb / dec!(15) * dec!(10)
    } else if tsb >= dec!(-10) {
        dec!(70) + tsb * dec!(2)
    } else if tsb >= dec!(-20) {
        dec!(50) + (tsb + dec!(10)) * dec!(2)
    } else {
        dec!(30) + (tsb + dec!(20)) * dec!(1.5)
    };

    clamp(score, Decimal::ZERO, dec!(100))
}

/// Percent-of-baseline banding shared by grip strength and vertical jump
pub fn performance_score(value: Decimal, baseline: Option<Decimal>) -> Decimal {
    let baseline = match baseline {
        Some(b) if b > Decimal::ZERO => b,
        _ => return dec!(50),
    };

    let pct = value
        .checked_div(baseline)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .unwrap_or(if value > Decimal::ZERO { dec!(200) } else { Decimal::ZERO });
    let score = if pct >= dec!(100) {
        dec!(80) + (pct - dec!(100)).min(dec!(10)) * dec!(2)
    } else if pct >= dec!(95) {
        dec!(60) + (pct - dec!(95)) * dec!(4)
    } else if pct >= dec!(90) {
        dec!(40) + (pct - dec!(90)) * dec!(4)
    } else {
        pct / dec!(90) * dec!(40)
    };

    clamp(score, Decimal::ZERO, dec!(100))
}

/// Scores readiness and records the assessment through the storage callbacks
pub struct ReadinessService<'a, P> {
    scorer: ReadinessScorer,
    store: &'a P,
}

impl<'a, P> ReadinessService<'a, P>
where
    P: BaselineProvider + AssessmentStore,
{
    pub fn new(scorer: ReadinessScorer, store: &'a P) -> Self {
        ReadinessService { scorer, store }
    }

    /// Score today's inputs against the latest baseline and upsert the assessment.
    ///
    /// A later submission for the same athlete and date replaces the earlier one.
    pub fn assess(
        &self,
        athlete_id: &str,
        date: NaiveDate,
        input: ReadinessInput,
    ) -> Result<ReadinessAssessment, RepositoryError> {
        let baseline = self.store.latest_baseline(athlete_id)?;
        let result = self.scorer.score(&input, baseline.as_ref());

        let assessment = ReadinessAssessment {
            athlete_id: athlete_id.to_string(),
            date,
            input,
            result,
        };
        self.store.upsert_assessment(&assessment)?;

        info!(
            athlete_id,
            %date,
            score = %assessment.result.score,
            recommendation = %assessment.result.recommendation,
            "Recorded readiness assessment"
        );

        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> ReadinessBaseline {
        ReadinessBaseline {
            avg_hrv: Some(dec!(60)),
            std_hrv: Some(dec!(8)),
            avg_grip_strength: Some(dec!(50)),
            avg_vertical_jump: Some(dec!(40)),
        }
    }

    #[test]
    fn test_subjective_only() {
        let result = ReadinessScorer::new().score(&ReadinessInput::subjective(2), None);

        assert_eq!(result.breakdown.len(), 1);
        assert_eq!(result.breakdown[0].raw_score, dec!(20));
        assert_eq!(result.score, dec!(20));
        assert_eq!(result.recommendation, ReadinessRecommendation::Reduce);
        assert_eq!(result.adjustment_factor, dec!(0.85));
        assert!(!result.suggestions.is_empty());
    }

    #[test]
    fn test_missing_factors_excluded_from_denominator() {
        let mut input = ReadinessInput::subjective(8);
        input.sleep_quality = Some(6);

        let result = ReadinessScorer::new().score(&input, None);
        // (80 × 35 + 60 × 20) / 55 = 72.7
        assert_eq!(result.score, dec!(73));
        assert_eq!(result.recommendation, ReadinessRecommendation::Push);
    }

    #[test]
    fn test_recommendation_bands() {
        let scorer = ReadinessScorer::new();

        assert_eq!(scorer.recommend(dec!(75)).0, ReadinessRecommendation::Push);
        assert_eq!(scorer.recommend(dec!(55)).0, ReadinessRecommendation::Maintain);
        assert_eq!(scorer.recommend(dec!(10)).0, ReadinessRecommendation::Reduce);

        assert_eq!(scorer.recommend(dec!(70)).1, dec!(1.00));
        assert_eq!(scorer.recommend(dec!(100)).1, dec!(1.10));
        assert_eq!(scorer.recommend(dec!(55)).1, dec!(1.00));
        assert_eq!(scorer.recommend(dec!(0)).1, dec!(0.70));
    }

    #[test]
    fn test_hrv_bands() {
        let b = baseline();
        assert_eq!(hrv_score(dec!(76), &b), dec!(100));
        assert_eq!(hrv_score(dec!(68), &b), dec!(80));
        assert_eq!(hrv_score(dec!(60), &b), dec!(60));
        assert_eq!(hrv_score(dec!(52), &b), dec!(40));
        assert_eq!(hrv_score(dec!(36), &b), dec!(0));
        assert_eq!(hrv_score(dec!(60), &ReadinessBaseline::default()), dec!(50));
    }

    #[test]
    fn test_extreme_baselines_stay_in_range() {
        let tiny = ReadinessBaseline {
            avg_hrv: Some(dec!(60)),
            std_hrv: Some(dec!(0.0000000000000000000000000001)),
            avg_grip_strength: Some(dec!(0.0000000000000000000000000001)),
            avg_vertical_jump: None,
        };
        assert_eq!(hrv_score(dec!(250), &tiny), dec!(100));
        assert_eq!(hrv_score(Decimal::MAX, &tiny), dec!(100));
        assert_eq!(hrv_score(dec!(10), &tiny), dec!(0));
        assert_eq!(hrv_score(Decimal::MIN, &tiny), dec!(0));
        assert_eq!(hrv_score(dec!(60), &tiny), dec!(60));

        let grip = tiny.avg_grip_strength;
        assert_eq!(performance_score(dec!(50), grip), dec!(100));
        assert_eq!(performance_score(Decimal::MAX, grip), dec!(100));
        assert_eq!(performance_score(Decimal::ZERO, grip), dec!(0));

        let input = ReadinessInput {
            hrv_reading: Some(Decimal::MAX),
            grip_strength: Some(Decimal::MAX),
            ..ReadinessInput::subjective(5)
        };
        let result = ReadinessScorer::new().score(&input, Some(&tiny));
        assert!(result.score >= Decimal::ZERO && result.score <= dec!(100));
    }

    #[test]
    fn test_sleep_scores() {
        assert_eq!(sleep_duration_score(dec!(8)), dec!(100));
        assert_eq!(sleep_duration_score(dec!(6.5)), dec!(80));
        assert_eq!(sleep_duration_score(dec!(3)), dec!(30));
        assert_eq!(sleep_score(Some(8), Some(dec!(8))), Some(dec!(90)));
        assert_eq!(sleep_score(None, None), None);
    }

    #[test]
    fn test_form_bands() {
        assert_eq!(form_score(dec!(20)), dec!(80));
        assert_eq!(form_score(dec!(15)), dec!(100));
        assert_eq!(form_score(dec!(0)), dec!(90));
        assert_eq!(form_score(dec!(-5)), dec!(60));
        assert_eq!(form_score(dec!(-15)), dec!(40));
        assert_eq!(form_score(dec!(-20)), dec!(30));
        assert_eq!(form_score(dec!(-40)), dec!(0));
    }

    #[test]
    fn test_form_bands_meet_at_boundaries() {
        assert_eq!(form_score(dec!(-10)), dec!(50));
        assert_eq!(form_score(dec!(-10.5)), dec!(49));
        assert_eq!(form_score(dec!(-20)), dec!(30));
        assert_eq!(form_score(dec!(-20.5)), dec!(29.25));

        let mut tsb = dec!(-30);
        while tsb < Decimal::ZERO {
            assert!(form_score(tsb) < form_score(tsb + dec!(0.5)), "dip at {}", tsb);
            tsb += dec!(0.5);
        }
    }

    #[test]
    fn test_performance_bands() {
        assert_eq!(performance_score(dec!(52.5), Some(dec!(50))), dec!(90));
        assert_eq!(performance_score(dec!(48.75), Some(dec!(50))), dec!(70));
        assert_eq!(performance_score(dec!(46), Some(dec!(50))), dec!(48));
        assert!(performance_score(dec!(40), Some(dec!(50))) <= dec!(45));
        assert_eq!(performance_score(dec!(40), None), dec!(50));
    }

    #[test]
    fn test_full_input_with_cautions() {
        let input = ReadinessInput {
            subjective_readiness: 3,
            hrv_reading: Some(dec!(44)),
            grip_strength: Some(dec!(50)),
            vertical_jump: Some(dec!(40)),
            sleep_quality: Some(3),
            sleep_hours: Some(dec!(4)),
            form_value: Some(dec!(-25)),
        };

        let result = ReadinessScorer::new().score(&input, Some(&baseline()));
        assert_eq!(result.breakdown.len(), 6);
        assert_eq!(result.recommendation, ReadinessRecommendation::Reduce);
        // subjective, HRV, sleep and form all fall below the caution threshold
        assert_eq!(result.suggestions.len(), 4);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_score_bounds(
            subjective in 0u8..=12u8,
            hrv in proptest::option::of(0u32..200u32),
            quality in proptest::option::of(0u8..=12u8),
            hours in proptest::option::of(0u32..14u32),
            tsb in proptest::option::of(-80i32..60i32),
            grip in proptest::option::of(0u32..100u32),
            jump in proptest::option::of(0u32..90u32),
        ) {
            let input = ReadinessInput {
                subjective_readiness: subjective,
                hrv_reading: hrv.map(Decimal::from),
                grip_strength: grip.map(Decimal::from),
                vertical_jump: jump.map(Decimal::from),
                sleep_quality: quality,
                sleep_hours: hours.map(Decimal::from),
                form_value: tsb.map(Decimal::from),
            };
            let scorer = ReadinessScorer::new();
            let result = scorer.score(&input, Some(&baseline()));

            prop_assert!(result.score >= Decimal::ZERO);
            prop_assert!(result.score <= dec!(100));
            let expected = if result.score >= dec!(70) {
                ReadinessRecommendation::Push
            } else if result.score >= dec!(40) {
                ReadinessRecommendation::Maintain
            } else {
                ReadinessRecommendation::Reduce
            };
            prop_assert_eq!(result.recommendation, expected);
            prop_assert!(result.adjustment_factor >= dec!(0.70));
            prop_assert!(result.adjustment_factor <= dec!(1.10));
        }
    }
}
