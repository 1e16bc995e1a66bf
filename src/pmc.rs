use crate::models::{round_dp, sqrt, DailyLoadSample};
use chrono::{Days, NaiveDate};
use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Load aggregation errors
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
}

/// Load model configuration with customizable windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Fitness (CTL) lookback window in days (default: 42)
    pub ctl_window_days: u16,

    /// Fatigue (ATL) lookback window in days (default: 7)
    pub atl_window_days: u16,

    /// At most `window × cap_multiplier` days feed each average
    pub window_cap_multiplier: u16,

    /// Divide by the weight actually applied, so short histories are not biased toward zero
    pub normalize_partial_window: bool,

    /// Trailing days used for monotony and strain
    pub monotony_window_days: u16,

    /// Monotony reported when daily loads are identical and non-zero
    pub max_monotony: Decimal,

    /// Ramp rate calculation period in days
    pub ramp_rate_days: u16,
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            ctl_window_days: 42,
            atl_window_days: 7,
            window_cap_multiplier: 2,
            normalize_partial_window: true,
            monotony_window_days: 7,
            max_monotony: dec!(10),
            ramp_rate_days: 7,
        }
    }
}

/// Injury-risk classification thresholds (Foster monotony/strain, Gabbett ACWR)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub monotony_moderate: Decimal,
    pub monotony_high: Decimal,
    pub monotony_very_high: Decimal,

    pub strain_moderate: Decimal,
    pub strain_high: Decimal,
    pub strain_very_high: Decimal,

    /// ACWR below this is undertraining
    pub acwr_low: Decimal,
    pub acwr_moderate: Decimal,
    pub acwr_high: Decimal,
    pub acwr_very_high: Decimal,

    /// Undertraining guidance applies only above this CTL
    pub undertraining_min_ctl: Decimal,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        RiskThresholds {
            monotony_moderate: dec!(1.5),
            monotony_high: dec!(2.0),
            monotony_very_high: dec!(2.5),
            strain_moderate: dec!(3000),
            strain_high: dec!(4500),
            strain_very_high: dec!(6000),
            acwr_low: dec!(0.8),
            acwr_moderate: dec!(1.3),
            acwr_high: dec!(1.5),
            acwr_very_high: dec!(2.0),
            undertraining_min_ctl: dec!(20),
        }
    }
}

/// Fitness/fatigue/form and workload-pattern metrics for a specific date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadMetrics {
    /// Date these metrics are calculated for
    pub date: NaiveDate,

    /// Fitness: 42-day exponentially weighted average
    pub ctl: Decimal,

    /// Fatigue: 7-day exponentially weighted average
    pub atl: Decimal,

    /// Form: CTL − ATL
    pub tsb: Decimal,

    /// Acute:chronic workload ratio (ATL / CTL)
    pub acwr: Decimal,

    /// Foster monotony over the trailing week
    pub monotony: Decimal,

    /// Weekly load × monotony
    pub strain: Decimal,

    /// Total stress over the trailing week
    pub weekly_load: Decimal,

    /// Stress recorded on `date`
    pub daily_stress: Decimal,

    /// CTL change per week
    pub ctl_ramp_rate: Option<Decimal>,
}

/// Risk levels, ordered from safest to most concerning
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::VeryHigh => write!(f, "very_high"),
        }
    }
}

/// Injury-risk classification derived from [`LoadMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub monotony_level: RiskLevel,
    pub strain_level: RiskLevel,
    pub acwr_level: RiskLevel,

    /// ACWR below the low threshold while CTL is established
    pub undertraining: bool,

    pub guidance: Vec<String>,
}

/// Training Stress Balance interpretation ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormInterpretation {
    VeryFresh,    // +25 and above
    Fresh,        // +5 to +25
    Neutral,      // -10 to +5
    Fatigued,     // -30 to -10
    VeryFatigued, // Below -30
}

impl FormInterpretation {
    /// Get TSB interpretation from numeric value
    pub fn from_tsb(tsb: Decimal) -> Self {
        if tsb >= Decimal::from(25) {
            FormInterpretation::VeryFresh
        } else if tsb >= Decimal::from(5) {
            FormInterpretation::Fresh
        } else if tsb >= Decimal::from(-10) {
            FormInterpretation::Neutral
        } else if tsb >= Decimal::from(-30) {
            FormInterpretation::Fatigued
        } else {
            FormInterpretation::VeryFatigued
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FormInterpretation::VeryFresh => "Very fresh (may be losing fitness)",
            FormInterpretation::Fresh => "Fresh and ready for hard training/racing",
            FormInterpretation::Neutral => "Neutral (normal training)",
            FormInterpretation::Fatigued => "Fatigued (monitor closely)",
            FormInterpretation::VeryFatigued => "Very fatigued (rest needed)",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            FormInterpretation::VeryFresh => {
                "Consider increasing training load or plan peak performance"
            }
            FormInterpretation::Fresh => "Good time for high-intensity sessions or racing",
            FormInterpretation::Neutral => "Continue normal training progression",
            FormInterpretation::Fatigued => "Reduce intensity, focus on recovery sessions",
            FormInterpretation::VeryFatigued => {
                "Prioritize rest and recovery before resuming training"
            }
        }
    }
}

/// Core load aggregation engine
pub struct LoadAggregator {
    config: LoadConfig,
    thresholds: RiskThresholds,
}

impl LoadAggregator {
    /// Create new aggregator with default configuration
    pub fn new() -> Self {
        Self::with_config(LoadConfig::default(), RiskThresholds::default())
    }

    /// Create new aggregator with custom configuration
    pub fn with_config(config: LoadConfig, thresholds: RiskThresholds) -> Self {
        LoadAggregator { config, thresholds }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Fitness (CTL) as of `date`, rounded to 1 dp
    pub fn fitness(&self, samples: &[DailyLoadSample], date: NaiveDate) -> Decimal {
        let daily = Self::index(samples);
        round_dp(self.weighted_average(&daily, date, self.config.ctl_window_days), 1)
    }

    /// Fatigue (ATL) as of `date`, rounded to 1 dp
    pub fn fatigue(&self, samples: &[DailyLoadSample], date: NaiveDate) -> Decimal {
        let daily = Self::index(samples);
        round_dp(self.weighted_average(&daily, date, self.config.atl_window_days), 1)
    }

    /// Calculate every load metric for one reference date
    pub fn calculate_metrics(&self, samples: &[DailyLoadSample], date: NaiveDate) -> LoadMetrics {
        let daily = Self::index(samples);
        self.metrics_from_index(&daily, date)
    }

    /// Calculate metrics for every calendar day in `[start_date, end_date]`
    pub fn metrics_series(
        &self,
        samples: &[DailyLoadSample],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<LoadMetrics>, LoadError> {
        if start_date > end_date {
            return Err(LoadError::InvalidDateRange(
                "Start date must be before end date".to_string(),
            ));
        }

        let daily = Self::index(samples);
        let series = start_date
            .iter_days()
            .take_while(|d| *d <= end_date)
            .map(|d| self.metrics_from_index(&daily, d))
            .collect();

        Ok(series)
    }

    /// Recompute metrics for many athletes in parallel
    pub fn batch_metrics(
        &self,
        athletes: &[(String, Vec<DailyLoadSample>)],
        date: NaiveDate,
    ) -> Vec<(String, LoadMetrics)> {
        athletes
            .par_iter()
            .map(|(athlete_id, samples)| (athlete_id.clone(), self.calculate_metrics(samples, date)))
            .collect()
    }

    /// Classify injury risk from monotony, strain and ACWR
    pub fn assess_risk(&self, metrics: &LoadMetrics) -> RiskAssessment {
        let t = &self.thresholds;

        let monotony_level = Self::band(
            metrics.monotony,
            t.monotony_moderate,
            t.monotony_high,
            t.monotony_very_high,
        );
        let strain_level =
            Self::band(metrics.strain, t.strain_moderate, t.strain_high, t.strain_very_high);
        let acwr_level = Self::band(metrics.acwr, t.acwr_moderate, t.acwr_high, t.acwr_very_high);

        let undertraining = metrics.acwr < t.acwr_low && metrics.ctl > t.undertraining_min_ctl;
        if undertraining {
            return RiskAssessment {
                level: RiskLevel::Low,
                monotony_level,
                strain_level,
                acwr_level,
                undertraining,
                guidance: vec![format!(
                    "Training load too low: ACWR {} is below {}. Gradually increase volume to avoid detraining.",
                    metrics.acwr, t.acwr_low
                )],
            };
        }

        let level = monotony_level.max(strain_level).max(acwr_level);
        let mut guidance = Vec::new();

        if monotony_level >= RiskLevel::High {
            guidance.push(format!(
                "Training monotony is {} - vary daily load with easier and harder days",
                metrics.monotony
            ));
        }
        if strain_level >= RiskLevel::High {
            guidance.push(format!(
                "Weekly strain of {} is elevated - plan additional recovery",
                metrics.strain
            ));
        }
        if acwr_level >= RiskLevel::High {
            guidance.push(format!(
                "Acute load is {}x chronic load - reduce load this week to limit injury risk",
                metrics.acwr
            ));
        }
        if guidance.is_empty() {
            guidance.push(
                match level {
                    RiskLevel::Low => "Load pattern is within safe limits",
                    _ => "Load is rising - monitor fatigue and recovery closely",
                }
                .to_string(),
            );
        }

        RiskAssessment {
            level,
            monotony_level,
            strain_level,
            acwr_level,
            undertraining,
            guidance,
        }
    }

    fn band(value: Decimal, moderate: Decimal, high: Decimal, very_high: Decimal) -> RiskLevel {
        if value >= very_high {
            RiskLevel::VeryHigh
        } else if value >= high {
            RiskLevel::High
        } else if value >= moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    fn index(samples: &[DailyLoadSample]) -> BTreeMap<NaiveDate, Decimal> {
        samples
            .iter()
            .map(|s| (s.date, s.training_stress))
            .collect()
    }

    fn metrics_from_index(&self, daily: &BTreeMap<NaiveDate, Decimal>, date: NaiveDate) -> LoadMetrics {
        let ctl = round_dp(self.weighted_average(daily, date, self.config.ctl_window_days), 1);
        let atl = round_dp(self.weighted_average(daily, date, self.config.atl_window_days), 1);
        let tsb = ctl - atl;

        let acwr = if ctl.is_zero() {
            Decimal::ZERO
        } else {
            round_dp(atl / ctl, 2)
        };

        let week = self.trailing_loads(daily, date, self.config.monotony_window_days);
        let recorded = week.iter().filter(|(_, recorded)| *recorded).count();
        let loads: Vec<Decimal> = week.into_iter().map(|(load, _)| load).collect();
        let weekly_load: Decimal = loads.iter().sum();
        let monotony = round_dp(self.monotony(&loads, recorded), 2);
        let strain = round_dp(weekly_load * monotony, 1);

        let ctl_ramp_rate = date
            .checked_sub_days(Days::new(u64::from(self.config.ramp_rate_days)))
            .filter(|past| daily.keys().next().is_some_and(|first| past >= first))
            .map(|past| {
                let past_ctl =
                    round_dp(self.weighted_average(daily, past, self.config.ctl_window_days), 1);
                let weeks = Decimal::from(self.config.ramp_rate_days) / dec!(7);
                round_dp((ctl - past_ctl) / weeks, 1)
            });

        debug!(%date, %ctl, %atl, %tsb, %acwr, %monotony, "Calculated load metrics");

        LoadMetrics {
            date,
            ctl,
            atl,
            tsb,
            acwr,
            monotony,
            strain,
            weekly_load,
            daily_stress: daily.get(&date).copied().unwrap_or(Decimal::ZERO),
            ctl_ramp_rate,
        }
    }

    /// Exponentially weighted average with decay λ = 2/(W+1), newest day first.
    ///
    /// Days missing inside the history count as zero stress; iteration stops at
    /// the first recorded day or after `W × cap_multiplier` days.
    fn weighted_average(
        &self,
        daily: &BTreeMap<NaiveDate, Decimal>,
        reference: NaiveDate,
        window_days: u16,
    ) -> Decimal {
        let first = match daily.keys().next() {
            Some(first) if *first <= reference => *first,
            _ => return Decimal::ZERO,
        };

        let lambda = dec!(2) / Decimal::from(u32::from(window_days) + 1);
        let cap = u32::from(window_days) * u32::from(self.config.window_cap_multiplier);

        let mut acc = Decimal::ZERO;
        let mut applied = Decimal::ZERO;
        let mut weight = Decimal::ONE;
        let mut day = reference;

        for _ in 0..cap {
            if day < first {
                break;
            }
            let stress = daily.get(&day).copied().unwrap_or(Decimal::ZERO);
            acc += stress * weight * lambda;
            applied += weight * lambda;
            weight *= Decimal::ONE - lambda;

            day = match day.pred_opt() {
                Some(prev) => prev,
                None => break,
            };
        }

        if self.config.normalize_partial_window && !applied.is_zero() {
            acc / applied
        } else {
            acc
        }
    }

    /// Daily loads for the trailing window, paired with whether the day was recorded
    fn trailing_loads(
        &self,
        daily: &BTreeMap<NaiveDate, Decimal>,
        reference: NaiveDate,
        days: u16,
    ) -> Vec<(Decimal, bool)> {
        let first = match daily.keys().next() {
            Some(first) if *first <= reference => *first,
            _ => return Vec::new(),
        };

        let mut loads = Vec::with_capacity(usize::from(days));
        let mut day = reference;
        for _ in 0..days {
            if day < first {
                break;
            }
            match daily.get(&day) {
                Some(stress) => loads.push((*stress, true)),
                None => loads.push((Decimal::ZERO, false)),
            }
            day = match day.pred_opt() {
                Some(prev) => prev,
                None => break,
            };
        }
        loads
    }

    /// mean / population stddev of the daily loads
    fn monotony(&self, loads: &[Decimal], recorded: usize) -> Decimal {
        if recorded < 2 || loads.len() < 2 {
            return Decimal::ZERO;
        }

        let n = Decimal::from(loads.len());
        let mean = loads.iter().sum::<Decimal>() / n;
        let variance = loads
            .iter()
            .map(|load| (*load - mean) * (*load - mean))
            .sum::<Decimal>()
            / n;
        let stddev = sqrt(variance);

        if stddev.is_zero() {
            return if mean > Decimal::ZERO {
                self.config.max_monotony
            } else {
                Decimal::ZERO
            };
        }

        (mean / stddev).min(self.config.max_monotony)
    }
}

impl Default for LoadAggregator {
    fn default() -> Self {
        Self::new()
    }
}
