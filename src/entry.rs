use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phase::{MemorizationPhase, PHASE1_TARGET, PHASE2_TARGET, Progress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorizationEntry {
    pub id: Uuid,
    pub reference: String,
    pub text: String,
    pub date_added: DateTime<Utc>,
    /// `false` makes this a plain flashcard with no scheduling.
    pub system_managed: bool,
    pub current_phase: MemorizationPhase,
    pub progress: Progress,
    /// Last unit logged in any phase.
    pub last_completion: Option<DateTime<Utc>>,
}

impl MemorizationEntry {
    pub fn new(reference: impl Into<String>, text: impl Into<String>, added: DateTime<Utc>) -> Self {
        MemorizationEntry {
            id: Uuid::new_v4(),
            reference: reference.into(),
            text: text.into(),
            date_added: added,
            system_managed: true,
            current_phase: MemorizationPhase::Phase1,
            progress: Progress::default(),
            last_completion: None,
        }
    }

    pub fn flashcard(
        reference: impl Into<String>,
        text: impl Into<String>,
        added: DateTime<Utc>,
    ) -> Self {
        MemorizationEntry {
            system_managed: false,
            ..MemorizationEntry::new(reference, text, added)
        }
    }

    pub fn units_in(&self, phase: MemorizationPhase) -> u32 {
        self.progress.get(phase).units_completed
    }

    /// First phase invariant this entry breaks, if any.
    pub fn phase_violation(&self) -> Option<&'static str> {
        let p1 = self.units_in(MemorizationPhase::Phase1);
        let p2 = self.units_in(MemorizationPhase::Phase2);
        match self.current_phase {
            MemorizationPhase::Phase2 if p1 < PHASE1_TARGET => {
                Some("in Phase 2 without completing Phase 1")
            }
            MemorizationPhase::Phase3 if p1 < PHASE1_TARGET => {
                Some("in Phase 3 without completing Phase 1")
            }
            MemorizationPhase::Phase3 if p2 < PHASE2_TARGET => {
                Some("in Phase 3 without completing Phase 2")
            }
            _ => MemorizationPhase::ALL
                .iter()
                .find(|&&p| self.progress.get(p).missing_start())
                .map(|_| "progress logged without a start date"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_starts_in_phase1() {
        let e = MemorizationEntry::new("John 3:16", "For God so loved the world", Utc::now());
        assert!(e.system_managed);
        assert_eq!(e.current_phase, MemorizationPhase::Phase1);
        assert_eq!(e.progress, Progress::default());
        assert!(e.last_completion.is_none());
        assert!(e.phase_violation().is_none());
    }

    #[test]
    fn flashcard_is_unmanaged() {
        let e = MemorizationEntry::flashcard("Ps 23:1", "The Lord is my shepherd", Utc::now());
        assert!(!e.system_managed);
    }

    #[test]
    fn detects_phase_violations() {
        let mut e = MemorizationEntry::new("Rom 8:28", "", Utc::now());
        e.current_phase = MemorizationPhase::Phase3;
        e.progress.phase1.units_completed = 5;
        e.progress.phase1.start_date = Some(Utc::now());
        e.progress.phase2.units_completed = 10;
        e.progress.phase2.start_date = Some(Utc::now());
        assert_eq!(
            e.phase_violation(),
            Some("in Phase 3 without completing Phase 2")
        );

        e.current_phase = MemorizationPhase::Phase2;
        assert!(e.phase_violation().is_none());

        e.progress.phase2.start_date = None;
        assert_eq!(
            e.phase_violation(),
            Some("progress logged without a start date")
        );
    }
}
