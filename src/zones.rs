//! Polarized intensity distribution analysis
//!
//! Time in five intensity zones is collapsed into three buckets:
//! - Low: zones 1-2 (below the first ventilatory threshold)
//! - Mid: zone 3 (the "grey zone" between thresholds)
//! - High: zones 4-5 (above the second threshold)
//!
//! A polarized week keeps most time easy, a meaningful slice hard, and very
//! little in between.

use crate::models::round_dp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Target easy/hard split and the thresholds that define "polarized"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarizedConfig {
    /// Target share of time in zones 1-2 (%)
    pub target_low_pct: Decimal,

    /// Target share of time in zones 4-5 (%)
    pub target_high_pct: Decimal,

    /// Zone 3 share tolerated before the compliance penalty starts (%)
    pub mid_penalty_free_pct: Decimal,

    /// Minimum low share for a polarized classification (%)
    pub polarized_min_low_pct: Decimal,

    /// Maximum mid share for a polarized classification (%)
    pub polarized_max_mid_pct: Decimal,

    /// Minimum high share for a polarized classification (%)
    pub polarized_min_high_pct: Decimal,
}

impl Default for PolarizedConfig {
    fn default() -> Self {
        PolarizedConfig {
            target_low_pct: dec!(80),
            target_high_pct: dec!(20),
            mid_penalty_free_pct: dec!(10),
            polarized_min_low_pct: dec!(75),
            polarized_max_mid_pct: dec!(15),
            polarized_min_high_pct: dec!(10),
        }
    }
}

/// Seconds spent in each of five intensity zones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneTimes {
    pub zone1_seconds: u32,
    pub zone2_seconds: u32,
    pub zone3_seconds: u32,
    pub zone4_seconds: u32,
    pub zone5_seconds: u32,
}

impl ZoneTimes {
    pub fn from_array(seconds: [u32; 5]) -> Self {
        ZoneTimes {
            zone1_seconds: seconds[0],
            zone2_seconds: seconds[1],
            zone3_seconds: seconds[2],
            zone4_seconds: seconds[3],
            zone5_seconds: seconds[4],
        }
    }

    pub fn total_seconds(&self) -> u64 {
        [
            self.zone1_seconds,
            self.zone2_seconds,
            self.zone3_seconds,
            self.zone4_seconds,
            self.zone5_seconds,
        ]
        .iter()
        .map(|s| u64::from(*s))
        .sum()
    }

    /// Accumulate another session's zone times
    pub fn add(&mut self, other: &ZoneTimes) {
        self.zone1_seconds = self.zone1_seconds.saturating_add(other.zone1_seconds);
        self.zone2_seconds = self.zone2_seconds.saturating_add(other.zone2_seconds);
        self.zone3_seconds = self.zone3_seconds.saturating_add(other.zone3_seconds);
        self.zone4_seconds = self.zone4_seconds.saturating_add(other.zone4_seconds);
        self.zone5_seconds = self.zone5_seconds.saturating_add(other.zone5_seconds);
    }
}

/// Result of a polarized-distribution analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarizedAnalysis {
    pub low_pct: Decimal,
    pub mid_pct: Decimal,
    pub high_pct: Decimal,

    /// 0-100 adherence to the target split
    pub compliance_score: Decimal,

    pub is_polarized: bool,
    pub message: String,
}

/// Polarized distribution analyzer
pub struct ZoneCalculator {
    config: PolarizedConfig,
}

impl ZoneCalculator {
    pub fn new() -> Self {
        Self::with_config(PolarizedConfig::default())
    }

    pub fn with_config(config: PolarizedConfig) -> Self {
        ZoneCalculator { config }
    }

    /// Score adherence to the target easy/moderate/hard split.
    ///
    /// compliance = 100 − |low − targetLow| − |high − targetHigh| − 2 × max(0, mid − 10)
    pub fn analyze_distribution(&self, zones: &ZoneTimes) -> PolarizedAnalysis {
        let total = zones.total_seconds();
        if total == 0 {
            return PolarizedAnalysis {
                low_pct: Decimal::ZERO,
                mid_pct: Decimal::ZERO,
                high_pct: Decimal::ZERO,
                compliance_score: Decimal::ZERO,
                is_polarized: false,
                message: "No time-in-zone data recorded for this period".to_string(),
            };
        }

        let total = Decimal::from(total);
        let pct = |seconds: u64| Decimal::from(seconds) * dec!(100) / total;

        let low_pct = pct(u64::from(zones.zone1_seconds) + u64::from(zones.zone2_seconds));
        let mid_pct = pct(u64::from(zones.zone3_seconds));
        let high_pct = pct(u64::from(zones.zone4_seconds) + u64::from(zones.zone5_seconds));

        let c = &self.config;
        let compliance = dec!(100)
            - (low_pct - c.target_low_pct).abs()
            - (high_pct - c.target_high_pct).abs()
            - dec!(2) * (mid_pct - c.mid_penalty_free_pct).max(Decimal::ZERO);
        let compliance_score = round_dp(compliance.max(Decimal::ZERO), 1);

        let is_polarized = low_pct >= c.polarized_min_low_pct
            && mid_pct <= c.polarized_max_mid_pct
            && high_pct >= c.polarized_min_high_pct;

        let message = self.describe(low_pct, mid_pct, high_pct, is_polarized);

        PolarizedAnalysis {
            low_pct: round_dp(low_pct, 1),
            mid_pct: round_dp(mid_pct, 1),
            high_pct: round_dp(high_pct, 1),
            compliance_score,
            is_polarized,
            message,
        }
    }

    fn describe(&self, low: Decimal, mid: Decimal, high: Decimal, polarized: bool) -> String {
        let c = &self.config;
        if polarized {
            return "Training distribution is polarized".to_string();
        }
        if mid > c.polarized_max_mid_pct {
            format!(
                "{}% of time in zone 3 - shift moderate sessions to easy or hard efforts",
                round_dp(mid, 1)
            )
        } else if low < c.polarized_min_low_pct {
            format!(
                "Only {}% of time is easy - add more low-intensity volume",
                round_dp(low, 1)
            )
        } else {
            format!(
                "Only {}% of time is hard - include one or two high-intensity sessions",
                round_dp(high, 1)
            )
        }
    }
}

impl Default for ZoneCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_polarized_week() {
        let zones = ZoneTimes::from_array([4000, 4000, 0, 1000, 1000]);
        let analysis = ZoneCalculator::new().analyze_distribution(&zones);

        assert_eq!(analysis.low_pct, dec!(80.0));
        assert_eq!(analysis.mid_pct, dec!(0.0));
        assert_eq!(analysis.high_pct, dec!(20.0));
        assert_eq!(analysis.compliance_score, dec!(100.0));
        assert!(analysis.is_polarized);
    }

    #[test]
    fn test_threshold_heavy_week() {
        let zones = ZoneTimes::from_array([2000, 3000, 4000, 1000, 0]);
        let analysis = ZoneCalculator::new().analyze_distribution(&zones);

        // low 50, mid 40, high 10 → 100 − 30 − 10 − 60 = 0
        assert_eq!(analysis.compliance_score, Decimal::ZERO);
        assert!(!analysis.is_polarized);
        assert!(analysis.message.contains("zone 3"));
    }

    #[test]
    fn test_mid_penalty_applies_above_ten_percent() {
        let zones = ZoneTimes::from_array([7500, 0, 1200, 1300, 0]);
        let analysis = ZoneCalculator::new().analyze_distribution(&zones);

        // low 75, mid 12, high 13 → 100 − 5 − 7 − 4 = 84
        assert_eq!(analysis.compliance_score, dec!(84.0));
        assert!(analysis.is_polarized);
    }

    #[test]
    fn test_empty_input() {
        let analysis = ZoneCalculator::new().analyze_distribution(&ZoneTimes::default());
        assert_eq!(analysis.compliance_score, Decimal::ZERO);
        assert!(!analysis.is_polarized);
        assert!(!analysis.message.is_empty());
    }

    #[test]
    fn test_accumulate_sessions() {
        let mut week = ZoneTimes::default();
        week.add(&ZoneTimes::from_array([100, 200, 0, 0, 0]));
        week.add(&ZoneTimes::from_array([0, 100, 50, 25, 25]));
        assert_eq!(week.total_seconds(), 500);
        assert_eq!(week.zone2_seconds, 300);
    }
}
