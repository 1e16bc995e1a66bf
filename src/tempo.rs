//! Time-under-tension and effective-rep helpers
//!
//! Tempo descriptors follow the eccentric-pause-concentric-pause convention,
//! e.g. `3-1-X-0`: three seconds down, one second paused at the bottom, an
//! explosive lift, no pause at the top.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Seconds assigned to an explosive ("X") phase
pub const EXPLOSIVE_PHASE_SECONDS: Decimal = dec!(0.5);

/// Reps within this many reps of failure count as effective
pub const EFFECTIVE_REP_WINDOW: u32 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum TempoError {
    #[error("Tempo must have four phases, got {count} in '{descriptor}'")]
    PhaseCount { descriptor: String, count: usize },

    #[error("Invalid tempo phase '{phase}' in '{descriptor}'")]
    InvalidPhase { descriptor: String, phase: String },
}

/// Four-phase lifting tempo, in seconds per phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub eccentric: Decimal,
    pub pause_bottom: Decimal,
    pub concentric: Decimal,
    pub pause_top: Decimal,
}

impl Tempo {
    /// Duration of a single rep
    pub fn rep_seconds(&self) -> Decimal {
        self.eccentric + self.pause_bottom + self.concentric + self.pause_top
    }

    /// Time under tension for a set of `reps`
    pub fn time_under_tension(&self, reps: u32) -> Decimal {
        self.rep_seconds() * Decimal::from(reps)
    }
}

impl FromStr for Tempo {
    type Err = TempoError;

    /// Accepts `3-1-X-0`, `3:1:X:0` or the compact `31X0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let phases: Vec<String> = if trimmed.contains(['-', ':']) {
            trimmed.split(['-', ':']).map(|p| p.trim().to_string()).collect()
        } else {
            trimmed.chars().map(|c| c.to_string()).collect()
        };

        if phases.len() != 4 {
            return Err(TempoError::PhaseCount {
                descriptor: s.to_string(),
                count: phases.len(),
            });
        }

        let parse = |phase: &str| -> Result<Decimal, TempoError> {
            if phase.eq_ignore_ascii_case("x") {
                return Ok(EXPLOSIVE_PHASE_SECONDS);
            }
            phase
                .parse::<Decimal>()
                .ok()
                .filter(|v| *v >= Decimal::ZERO)
                .ok_or_else(|| TempoError::InvalidPhase {
                    descriptor: s.to_string(),
                    phase: phase.to_string(),
                })
        };

        Ok(Tempo {
            eccentric: parse(&phases[0])?,
            pause_bottom: parse(&phases[1])?,
            concentric: parse(&phases[2])?,
            pause_top: parse(&phases[3])?,
        })
    }
}

/// Parse a descriptor and return the set's time under tension
pub fn time_under_tension(descriptor: &str, reps: u32) -> Result<Decimal, TempoError> {
    Ok(descriptor.parse::<Tempo>()?.time_under_tension(reps))
}

/// Reps in reserve from a logged RIR, or derived from RPE as 10 − RPE
pub fn reps_in_reserve(rpe: Option<Decimal>, rir: Option<u32>) -> Option<Decimal> {
    rir.map(Decimal::from)
        .or_else(|| rpe.map(|rpe| (dec!(10) - rpe).max(Decimal::ZERO)))
}

/// Reps performed within [`EFFECTIVE_REP_WINDOW`] reps of failure.
///
/// Returns `None` when neither RPE nor RIR was logged.
pub fn effective_reps(reps: u32, rpe: Option<Decimal>, rir: Option<u32>) -> Option<u32> {
    let rir = reps_in_reserve(rpe, rir)?;
    let effective = (Decimal::from(EFFECTIVE_REP_WINDOW) - rir).floor();
    if effective <= Decimal::ZERO {
        return Some(0);
    }
    Some(effective.to_u32().unwrap_or(0).min(reps))
}
