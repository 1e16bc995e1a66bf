use crate::models::{round_dp, AthleteThresholds, WorkoutCategory, WorkoutTelemetry};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// TSS estimator settings; heart-rate defaults apply when the athlete has none on file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TssConfig {
    /// Resting heart rate used when the athlete has none on file
    pub default_resting_hr: u16,

    /// Maximum heart rate used when the athlete has none on file
    pub default_max_hr: u16,

    /// Default session RPE per category when nothing better is known
    pub strength_rpe: Decimal,
    pub cardio_rpe: Decimal,
    pub flexibility_rpe: Decimal,
    pub other_rpe: Decimal,
}

impl Default for TssConfig {
    fn default() -> Self {
        TssConfig {
            default_resting_hr: 50,
            default_max_hr: 190,
            strength_rpe: dec!(5),
            cardio_rpe: dec!(6),
            flexibility_rpe: dec!(3),
            other_rpe: dec!(5),
        }
    }
}

impl TssConfig {
    /// Default RPE for a workout category
    pub fn default_rpe(&self, category: WorkoutCategory) -> Decimal {
        match category {
            WorkoutCategory::Strength => self.strength_rpe,
            WorkoutCategory::Cardio => self.cardio_rpe,
            WorkoutCategory::Flexibility => self.flexibility_rpe,
            WorkoutCategory::Other => self.other_rpe,
        }
    }
}

/// TSS calculation result with method used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TssResult {
    pub tss: Decimal,
    pub method: TssMethod,
    pub intensity_factor: Option<Decimal>,
}

impl TssResult {
    fn zero(method: TssMethod) -> Self {
        TssResult {
            tss: Decimal::ZERO,
            method,
            intensity_factor: None,
        }
    }
}

/// Methods used for TSS calculation, in cascade priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TssMethod {
    PowerBased,        // hours × (power/FTP)² × 100
    HeartRateBased,    // heart-rate-reserve intensity factor
    ThirdPartyEffort,  // vendor effort score, used verbatim
    PerceivedExertion, // session RPE
    CategoryDefault,   // RPE assumed from workout category
    NoDuration,        // zero or missing duration
}

/// Core TSS calculation engine
pub struct TssCalculator {
    config: TssConfig,
}

impl TssCalculator {
    pub fn new() -> Self {
        Self::with_config(TssConfig::default())
    }

    pub fn with_config(config: TssConfig) -> Self {
        TssCalculator { config }
    }

    /// Estimate TSS using the first satisfied rule of the cascade.
    ///
    /// Never fails: missing inputs fall through to the category default.
    pub fn calculate_tss(
        &self,
        workout: &WorkoutTelemetry,
        athlete: &AthleteThresholds,
    ) -> TssResult {
        let duration_seconds = match workout.duration_seconds {
            Some(d) if d > 0 => d,
            _ => return TssResult::zero(TssMethod::NoDuration),
        };

        let result = Self::power_tss(workout, athlete, duration_seconds)
            .or_else(|| self.heart_rate_tss(workout, athlete, duration_seconds))
            .or_else(|| Self::third_party_tss(workout))
            .or_else(|| Self::rpe_tss(workout, duration_seconds))
            .unwrap_or_else(|| self.category_default_tss(workout.category, duration_seconds));

        debug!(
            method = ?result.method,
            tss = %result.tss,
            duration_seconds,
            "Estimated training stress"
        );

        result
    }

    /// TSS = hours × (power/FTP)² × 100
    pub fn power_tss(
        workout: &WorkoutTelemetry,
        athlete: &AthleteThresholds,
        duration_seconds: u32,
    ) -> Option<TssResult> {
        let ftp = athlete.ftp.filter(|ftp| *ftp > 0)?;
        let power = workout.normalized_power.or(workout.average_power)?;

        let intensity_factor = Decimal::from(power) / Decimal::from(ftp);
        let tss = hours(duration_seconds) * intensity_factor * intensity_factor * dec!(100);

        Some(TssResult {
            tss: round_dp(tss, 1),
            method: TssMethod::PowerBased,
            intensity_factor: Some(round_dp(intensity_factor, 3)),
        })
    }

    /// hrTSS using the heart-rate-reserve intensity factor
    /// IF = (avgHR − restHR) / (LTHR − restHR)
    pub fn heart_rate_tss(
        &self,
        workout: &WorkoutTelemetry,
        athlete: &AthleteThresholds,
        duration_seconds: u32,
    ) -> Option<TssResult> {
        let lthr = athlete.lthr.filter(|lthr| *lthr > 0)?;
        let avg_hr = workout.average_heart_rate?;

        let resting = athlete.resting_hr.unwrap_or(self.config.default_resting_hr);
        let max_hr = athlete.max_hr.unwrap_or(self.config.default_max_hr);
        if lthr <= resting {
            return None;
        }

        let avg_hr = avg_hr.min(max_hr);
        let reserve_used = Decimal::from(avg_hr) - Decimal::from(resting);
        let threshold_reserve = Decimal::from(lthr) - Decimal::from(resting);
        let intensity_factor = (reserve_used / threshold_reserve).max(Decimal::ZERO);

        let tss = hours(duration_seconds) * intensity_factor * intensity_factor * dec!(100);

        Some(TssResult {
            tss: round_dp(tss, 1),
            method: TssMethod::HeartRateBased,
            intensity_factor: Some(round_dp(intensity_factor, 3)),
        })
    }

    /// Vendor effort score, used verbatim and rounded
    fn third_party_tss(workout: &WorkoutTelemetry) -> Option<TssResult> {
        let effort = workout.third_party_effort?;
        Some(TssResult {
            tss: round_dp(effort.max(Decimal::ZERO), 0),
            method: TssMethod::ThirdPartyEffort,
            intensity_factor: None,
        })
    }

    fn rpe_tss(workout: &WorkoutTelemetry, duration_seconds: u32) -> Option<TssResult> {
        let rpe = workout.rpe?;
        Some(TssResult {
            tss: rpe_formula(rpe, duration_seconds),
            method: TssMethod::PerceivedExertion,
            intensity_factor: None,
        })
    }

    fn category_default_tss(&self, category: WorkoutCategory, duration_seconds: u32) -> TssResult {
        TssResult {
            tss: rpe_formula(self.config.default_rpe(category), duration_seconds),
            method: TssMethod::CategoryDefault,
            intensity_factor: None,
        }
    }
}

impl Default for TssCalculator {
    fn default() -> Self {
        Self::new()
    }
}

fn hours(duration_seconds: u32) -> Decimal {
    Decimal::from(duration_seconds) / dec!(3600)
}

/// TSS = minutes × (0.3 + 0.12 × RPE)
fn rpe_formula(rpe: Decimal, duration_seconds: u32) -> Decimal {
    let rpe = rpe.max(dec!(1)).min(dec!(10));
    let minutes = Decimal::from(duration_seconds) / dec!(60);
    round_dp(minutes * (dec!(0.3) + dec!(0.12) * rpe), 1)
}
