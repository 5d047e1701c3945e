// Three-phase memorization curriculum.
// Phase 1 and 2 are daily repetitions up to a fixed target, Phase 3 is a
// monthly review with no end.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PHASE1_TARGET: u32 = 5;
pub const PHASE2_TARGET: u32 = 45;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum MemorizationPhase {
    Phase1,
    Phase2,
    Phase3,
}

impl MemorizationPhase {
    pub const ALL: [MemorizationPhase; 3] = [
        MemorizationPhase::Phase1,
        MemorizationPhase::Phase2,
        MemorizationPhase::Phase3,
    ];

    pub fn from_number(n: u8) -> Option<MemorizationPhase> {
        match n {
            1 => Some(MemorizationPhase::Phase1),
            2 => Some(MemorizationPhase::Phase2),
            3 => Some(MemorizationPhase::Phase3),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            MemorizationPhase::Phase1 => 1,
            MemorizationPhase::Phase2 => 2,
            MemorizationPhase::Phase3 => 3,
        }
    }

    /// Units needed to leave this phase. `None` for the open-ended Phase 3.
    pub fn target(self) -> Option<u32> {
        match self {
            MemorizationPhase::Phase1 => Some(PHASE1_TARGET),
            MemorizationPhase::Phase2 => Some(PHASE2_TARGET),
            MemorizationPhase::Phase3 => None,
        }
    }

    pub fn next(self) -> Option<MemorizationPhase> {
        match self {
            MemorizationPhase::Phase1 => Some(MemorizationPhase::Phase2),
            MemorizationPhase::Phase2 => Some(MemorizationPhase::Phase3),
            MemorizationPhase::Phase3 => None,
        }
    }

    /// Phase 1 and 2 log one unit per day, Phase 3 one per month.
    pub fn is_monthly(self) -> bool {
        self == MemorizationPhase::Phase3
    }

    pub fn unit_name(self) -> &'static str {
        if self.is_monthly() { "months" } else { "days" }
    }
}

impl fmt::Display for MemorizationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phase {}", self.number())
    }
}

impl FromStr for MemorizationPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let digits = s
            .strip_prefix("phase")
            .map(str::trim)
            .unwrap_or(s.as_str());
        digits
            .parse::<u8>()
            .ok()
            .and_then(MemorizationPhase::from_number)
            .ok_or_else(|| format!("unknown phase: {s}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    /// Days completed for Phase 1/2, months completed for Phase 3.
    pub units_completed: u32,
    pub start_date: Option<DateTime<Utc>>,
    pub last_completion: Option<DateTime<Utc>>,
}

impl PhaseProgress {
    pub fn log_unit(&mut self, at: DateTime<Utc>) {
        self.units_completed += 1;
        self.last_completion = Some(at);
        if self.start_date.is_none() {
            self.start_date = Some(at);
        }
    }

    pub fn reached_target_of(&self, phase: MemorizationPhase) -> bool {
        match phase.target() {
            Some(target) => self.units_completed >= target,
            None => false,
        }
    }

    pub fn missing_start(&self) -> bool {
        self.units_completed > 0 && self.start_date.is_none()
    }
}

/// Progress for all three phases, keyed by phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub phase1: PhaseProgress,
    pub phase2: PhaseProgress,
    pub phase3: PhaseProgress,
}

impl Progress {
    pub fn get(&self, phase: MemorizationPhase) -> &PhaseProgress {
        match phase {
            MemorizationPhase::Phase1 => &self.phase1,
            MemorizationPhase::Phase2 => &self.phase2,
            MemorizationPhase::Phase3 => &self.phase3,
        }
    }

    pub fn get_mut(&mut self, phase: MemorizationPhase) -> &mut PhaseProgress {
        match phase {
            MemorizationPhase::Phase1 => &mut self.phase1,
            MemorizationPhase::Phase2 => &mut self.phase2,
            MemorizationPhase::Phase3 => &mut self.phase3,
        }
    }

    /// Latest unit logged in any phase.
    pub fn latest_completion(&self) -> Option<DateTime<Utc>> {
        MemorizationPhase::ALL
            .iter()
            .filter_map(|&p| self.get(p).last_completion)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered() {
        assert!(MemorizationPhase::Phase1 < MemorizationPhase::Phase2);
        assert!(MemorizationPhase::Phase2 < MemorizationPhase::Phase3);
        assert_eq!(MemorizationPhase::Phase3.next(), None);
        assert_eq!(
            MemorizationPhase::Phase1.next(),
            Some(MemorizationPhase::Phase2)
        );
    }

    #[test]
    fn targets() {
        assert_eq!(MemorizationPhase::Phase1.target(), Some(5));
        assert_eq!(MemorizationPhase::Phase2.target(), Some(45));
        assert_eq!(MemorizationPhase::Phase3.target(), None);
    }

    #[test]
    fn parse_phase() {
        assert_eq!("2".parse::<MemorizationPhase>(), Ok(MemorizationPhase::Phase2));
        assert_eq!("Phase3".parse::<MemorizationPhase>(), Ok(MemorizationPhase::Phase3));
        assert_eq!("phase 1".parse::<MemorizationPhase>(), Ok(MemorizationPhase::Phase1));
        assert!("4".parse::<MemorizationPhase>().is_err());
        assert_eq!(MemorizationPhase::Phase2.to_string(), "Phase 2");
    }

    #[test]
    fn log_unit_sets_start_once() {
        let first = Utc::now();
        let later = first + chrono::Days::new(1);
        let mut p = PhaseProgress::default();
        p.log_unit(first);
        p.log_unit(later);
        assert_eq!(p.units_completed, 2);
        assert_eq!(p.start_date, Some(first));
        assert_eq!(p.last_completion, Some(later));
    }

    #[test]
    fn phase3_never_reaches_target() {
        let p = PhaseProgress {
            units_completed: 1000,
            ..Default::default()
        };
        assert!(!p.reached_target_of(MemorizationPhase::Phase3));
        assert!(p.reached_target_of(MemorizationPhase::Phase2));
    }
}
