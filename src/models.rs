use chrono::NaiveDate;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round half away from zero to `dp` fractional digits.
///
/// `Decimal::round_dp` uses banker's rounding, which makes 72.5 round to 72.
/// Every rounded field in the engine goes through this helper instead.
pub fn round_dp(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Clamp a decimal into `[min, max]`
pub fn clamp(value: Decimal, min: Decimal, max: Decimal) -> Decimal {
    value.max(min).min(max)
}

/// Square root through f64, returning zero for negative or unrepresentable input
pub fn sqrt(value: Decimal) -> Decimal {
    let as_f64 = value.to_f64().unwrap_or(0.0);
    if as_f64 <= 0.0 {
        return Decimal::ZERO;
    }
    Decimal::from_f64(as_f64.sqrt()).unwrap_or(Decimal::ZERO)
}

/// Broad workout categories used for default effort estimation and planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutCategory {
    Strength,
    Cardio,
    Flexibility,
    Other,
}

impl std::fmt::Display for WorkoutCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkoutCategory::Strength => write!(f, "strength"),
            WorkoutCategory::Cardio => write!(f, "cardio"),
            WorkoutCategory::Flexibility => write!(f, "flexibility"),
            WorkoutCategory::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for WorkoutCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strength" => Ok(WorkoutCategory::Strength),
            "cardio" => Ok(WorkoutCategory::Cardio),
            "flexibility" | "mobility" => Ok(WorkoutCategory::Flexibility),
            "other" => Ok(WorkoutCategory::Other),
            _ => Err(format!("Unknown workout category: {}", s)),
        }
    }
}

/// One aggregate training-stress value for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLoadSample {
    /// Calendar date of the training day
    pub date: NaiveDate,

    /// Summed training stress for the day
    pub training_stress: Decimal,
}

impl DailyLoadSample {
    pub fn new(date: NaiveDate, training_stress: Decimal) -> Self {
        Self {
            date,
            training_stress,
        }
    }
}

/// Per-workout stress value prior to daily aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutLoad {
    pub workout_id: String,
    pub date: NaiveDate,
    pub training_stress: Decimal,
}

/// Fold per-workout stress into one sample per date, ordered by date.
///
/// Multiple workouts on the same day are summed; a repeated workout id keeps
/// only its last value, so an edited workout replaces its earlier stress.
pub fn aggregate_daily_samples(workouts: &[WorkoutLoad]) -> Vec<DailyLoadSample> {
    let mut by_workout: BTreeMap<(NaiveDate, &str), Decimal> = BTreeMap::new();
    for workout in workouts {
        // An edited workout may move dates; drop any earlier placement of the same id
        by_workout.retain(|(_, id), _| *id != workout.workout_id.as_str());
        by_workout.insert(
            (workout.date, workout.workout_id.as_str()),
            workout.training_stress,
        );
    }

    let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for ((date, _), stress) in by_workout {
        *by_date.entry(date).or_insert(Decimal::ZERO) += stress;
    }

    by_date
        .into_iter()
        .map(|(date, training_stress)| DailyLoadSample::new(date, training_stress))
        .collect()
}

/// Insert or replace the sample for `sample.date`, keeping the series ordered
pub fn upsert_sample(samples: &mut Vec<DailyLoadSample>, sample: DailyLoadSample) {
    match samples.binary_search_by(|s| s.date.cmp(&sample.date)) {
        Ok(idx) => samples[idx] = sample,
        Err(idx) => samples.insert(idx, sample),
    }
}

/// Rolling per-athlete readiness statistics, maintained outside the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadinessBaseline {
    /// Mean HRV (RMSSD, ms)
    pub avg_hrv: Option<Decimal>,

    /// Standard deviation of HRV (ms)
    pub std_hrv: Option<Decimal>,

    /// Mean grip strength (kg)
    pub avg_grip_strength: Option<Decimal>,

    /// Mean vertical jump (cm)
    pub avg_vertical_jump: Option<Decimal>,
}

/// Athlete thresholds consumed by the TSS estimator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AthleteThresholds {
    /// Functional Threshold Power (watts)
    pub ftp: Option<u16>,

    /// Lactate Threshold Heart Rate (bpm)
    pub lthr: Option<u16>,

    /// Resting heart rate (bpm); falls back to the configured default
    pub resting_hr: Option<u16>,

    /// Maximum heart rate (bpm); falls back to the configured default
    pub max_hr: Option<u16>,
}

/// Raw telemetry for a single workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTelemetry {
    pub category: WorkoutCategory,

    /// Moving duration in seconds
    pub duration_seconds: Option<u32>,

    /// Normalized power (watts), preferred over average power
    pub normalized_power: Option<u16>,

    /// Average power (watts)
    pub average_power: Option<u16>,

    /// Average heart rate (bpm)
    pub average_heart_rate: Option<u16>,

    /// Vendor-supplied relative effort score
    pub third_party_effort: Option<Decimal>,

    /// Session RPE (1-10)
    pub rpe: Option<Decimal>,
}

impl WorkoutTelemetry {
    pub fn new(category: WorkoutCategory, duration_seconds: u32) -> Self {
        Self {
            category,
            duration_seconds: Some(duration_seconds),
            normalized_power: None,
            average_power: None,
            average_heart_rate: None,
            third_party_effort: None,
            rpe: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_round_dp_half_away_from_zero() {
        assert_eq!(round_dp(dec!(72.5), 0), dec!(73));
        assert_eq!(round_dp(dec!(-72.5), 0), dec!(-73));
        assert_eq!(round_dp(dec!(1.25), 1), dec!(1.3));
    }

    #[test]
    fn test_aggregate_sums_same_day() {
        let loads = vec![
            WorkoutLoad {
                workout_id: "a".to_string(),
                date: date(1),
                training_stress: dec!(40),
            },
            WorkoutLoad {
                workout_id: "b".to_string(),
                date: date(1),
                training_stress: dec!(25),
            },
            WorkoutLoad {
                workout_id: "c".to_string(),
                date: date(2),
                training_stress: dec!(60),
            },
        ];

        let samples = aggregate_daily_samples(&loads);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], DailyLoadSample::new(date(1), dec!(65)));
        assert_eq!(samples[1], DailyLoadSample::new(date(2), dec!(60)));
    }

    #[test]
    fn test_aggregate_edited_workout_replaces_value() {
        let loads = vec![
            WorkoutLoad {
                workout_id: "a".to_string(),
                date: date(1),
                training_stress: dec!(40),
            },
            WorkoutLoad {
                workout_id: "a".to_string(),
                date: date(1),
                training_stress: dec!(55),
            },
        ];

        let samples = aggregate_daily_samples(&loads);
        assert_eq!(samples, vec![DailyLoadSample::new(date(1), dec!(55))]);
    }

    #[test]
    fn test_upsert_keeps_order_and_replaces() {
        let mut samples = vec![
            DailyLoadSample::new(date(1), dec!(10)),
            DailyLoadSample::new(date(3), dec!(30)),
        ];
        upsert_sample(&mut samples, DailyLoadSample::new(date(2), dec!(20)));
        upsert_sample(&mut samples, DailyLoadSample::new(date(3), dec!(35)));

        let dates: Vec<_> = samples.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![date(1), date(2), date(3)]);
        assert_eq!(samples[2].training_stress, dec!(35));
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(round_dp(sqrt(dec!(16)), 4), dec!(4));
        assert_eq!(sqrt(dec!(-4)), Decimal::ZERO);
    }
}
