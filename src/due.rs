use chrono::NaiveDate;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::entry::MemorizationEntry;
use crate::error::Error;
use crate::phase::MemorizationPhase;

/// Scheduling engine bound to a calendar and a configuration.
///
/// Due evaluation lives here; completion, repair and statistics are added
/// by their own modules.
#[derive(Debug, Clone)]
pub struct Tracker<C: Clock> {
    pub(crate) clock: C,
    pub(crate) config: TrackerConfig,
}

/// Today's queue split by phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseQueues<'a> {
    pub phase1: Vec<&'a MemorizationEntry>,
    pub phase2: Vec<&'a MemorizationEntry>,
    pub phase3: Vec<&'a MemorizationEntry>,
}

impl PhaseQueues<'_> {
    pub fn len(&self) -> usize {
        self.phase1.len() + self.phase2.len() + self.phase3.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Tracker<SystemClock> {
    /// Wall-clock tracker using the configured offset, or the host's.
    pub fn from_config(config: TrackerConfig) -> Result<Self, Error> {
        let clock = match config.offset()? {
            Some(offset) => SystemClock::with_offset(offset),
            None => SystemClock::default(),
        };
        Ok(Tracker { clock, config })
    }
}

impl<C: Clock> Tracker<C> {
    pub fn new(clock: C, config: TrackerConfig) -> Self {
        Tracker { clock, config }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Whether `entry` needs a unit logged on calendar day `day`.
    pub fn needs_completion_on(&self, day: NaiveDate, entry: &MemorizationEntry) -> bool {
        if !self.config.memorization_enabled || !entry.system_managed {
            return false;
        }
        if day < self.clock.day_of(entry.date_added) {
            return false;
        }
        if let Some(last) = entry.last_completion
            && self.clock.day_of(last) == day
        {
            return false;
        }

        let units = entry.units_in(entry.current_phase);
        match entry.current_phase.target() {
            Some(target) => units < target,
            None => match entry.last_completion {
                Some(last) => !self.clock.same_month_as(last, day),
                None => true,
            },
        }
    }

    pub fn verses_needing_completion<'a>(
        &self,
        day: NaiveDate,
        entries: &'a [MemorizationEntry],
    ) -> Vec<&'a MemorizationEntry> {
        entries
            .iter()
            .filter(|e| e.system_managed && self.needs_completion_on(day, e))
            .collect()
    }

    /// Entries due today, grouped by their current phase.
    pub fn verses_by_phase<'a>(&self, entries: &'a [MemorizationEntry]) -> PhaseQueues<'a> {
        let today = self.today();
        let mut queues = PhaseQueues::default();
        for entry in self.verses_needing_completion(today, entries) {
            match entry.current_phase {
                MemorizationPhase::Phase1 => queues.phase1.push(entry),
                MemorizationPhase::Phase2 => queues.phase2.push(entry),
                MemorizationPhase::Phase3 => queues.phase3.push(entry),
            }
        }
        queues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{DateTime, Utc};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        FixedClock::on_day(ymd(y, m, d)).now()
    }

    fn tracker(y: i32, m: u32, d: u32) -> Tracker<FixedClock> {
        Tracker::new(FixedClock::on_day(ymd(y, m, d)), TrackerConfig::default())
    }

    fn entry(phase: MemorizationPhase, units: u32) -> MemorizationEntry {
        let mut e = MemorizationEntry::new("Isaiah 40:31", "They that wait", at(2025, 1, 1));
        e.current_phase = phase;
        e.progress.get_mut(phase).units_completed = units;
        e
    }

    #[test]
    fn new_entry_is_due() {
        let t = tracker(2025, 6, 1);
        let e = entry(MemorizationPhase::Phase1, 0);
        assert!(t.needs_completion_on(t.today(), &e));
    }

    #[test]
    fn unmanaged_never_due() {
        let t = tracker(2025, 6, 1);
        let mut e = entry(MemorizationPhase::Phase1, 0);
        e.system_managed = false;
        assert!(!t.needs_completion_on(t.today(), &e));
        assert!(t.verses_needing_completion(t.today(), &[e]).is_empty());
    }

    #[test]
    fn disabled_config_nothing_due() {
        let config = TrackerConfig {
            memorization_enabled: false,
            ..TrackerConfig::default()
        };
        let t = Tracker::new(FixedClock::on_day(ymd(2025, 6, 1)), config);
        let e = entry(MemorizationPhase::Phase1, 0);
        assert!(!t.needs_completion_on(t.today(), &e));
    }

    #[test]
    fn completed_today_not_due() {
        let t = tracker(2025, 6, 1);
        let mut e = entry(MemorizationPhase::Phase2, 10);
        e.last_completion = Some(at(2025, 6, 1));
        assert!(!t.needs_completion_on(t.today(), &e));
        // still due the next day
        assert!(t.needs_completion_on(ymd(2025, 6, 2), &e));
    }

    #[test]
    fn phase_targets_stop_being_due() {
        let t = tracker(2025, 6, 1);
        assert!(t.needs_completion_on(t.today(), &entry(MemorizationPhase::Phase1, 4)));
        assert!(!t.needs_completion_on(t.today(), &entry(MemorizationPhase::Phase1, 5)));
        assert!(t.needs_completion_on(t.today(), &entry(MemorizationPhase::Phase2, 44)));
        assert!(!t.needs_completion_on(t.today(), &entry(MemorizationPhase::Phase2, 45)));
    }

    #[test]
    fn phase3_due_once_per_month() {
        let t = tracker(2025, 6, 20);
        let mut e = entry(MemorizationPhase::Phase3, 2);
        assert!(t.needs_completion_on(t.today(), &e));

        e.last_completion = Some(at(2025, 6, 3));
        assert!(!t.needs_completion_on(t.today(), &e));

        e.last_completion = Some(at(2025, 5, 31));
        assert!(t.needs_completion_on(t.today(), &e));
    }

    #[test]
    fn not_due_before_added() {
        let t = tracker(2025, 6, 1);
        let e = entry(MemorizationPhase::Phase1, 0);
        assert!(!t.needs_completion_on(ymd(2024, 12, 31), &e));
        assert!(t.needs_completion_on(ymd(2025, 1, 1), &e));
    }

    #[test]
    fn groups_by_phase() {
        let t = tracker(2025, 6, 1);
        let mut done = entry(MemorizationPhase::Phase2, 3);
        done.last_completion = Some(at(2025, 6, 1));
        let entries = vec![
            entry(MemorizationPhase::Phase1, 0),
            entry(MemorizationPhase::Phase1, 2),
            entry(MemorizationPhase::Phase2, 3),
            done,
            entry(MemorizationPhase::Phase3, 1),
        ];
        let queues = t.verses_by_phase(&entries);
        assert_eq!(queues.phase1.len(), 2);
        assert_eq!(queues.phase2.len(), 1);
        assert_eq!(queues.phase3.len(), 1);
        assert_eq!(queues.len(), 4);
    }
}
