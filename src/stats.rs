use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::{Clock, days_before};
use crate::due::Tracker;
use crate::entry::MemorizationEntry;
use crate::phase::MemorizationPhase;

/// How far back the streak walk looks before giving up.
pub const STREAK_LOOKBACK_DAYS: u64 = 365;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_verses: usize,
    pub phase1_count: usize,
    pub phase2_count: usize,
    pub phase3_count: usize,
    pub due_today: usize,
}

impl Statistics {
    /// Share of verses with nothing left to do today. 0 with no verses.
    pub fn completion_rate(&self) -> f64 {
        if self.total_verses == 0 {
            return 0.0;
        }
        let done = self.total_verses.saturating_sub(self.due_today);
        done as f64 / self.total_verses as f64
    }
}

impl<C: Clock> Tracker<C> {
    /// Entries whose last unit was logged on `day`.
    pub fn completed_on<'a>(
        &self,
        day: NaiveDate,
        entries: &'a [MemorizationEntry],
    ) -> Vec<&'a MemorizationEntry> {
        entries
            .iter()
            .filter(|e| e.system_managed)
            .filter(|e| e.last_completion.is_some_and(|t| self.clock.day_of(t) == day))
            .collect()
    }

    /// Consecutive days, ending today, on which every due verse was done.
    ///
    /// Days with nothing due neither count nor break the streak. A day with
    /// due verses left undone ends it.
    pub fn completion_streak(&self, entries: &[MemorizationEntry]) -> u32 {
        if !self.config.memorization_enabled {
            return 0;
        }
        let today = self.today();
        let mut streak = 0;

        for back in 0..STREAK_LOOKBACK_DAYS {
            let day = days_before(today, back);
            let completed: HashSet<Uuid> =
                self.completed_on(day, entries).iter().map(|e| e.id).collect();
            // a verse finished that day was due that day too
            let due: HashSet<Uuid> = self
                .verses_needing_completion(day, entries)
                .iter()
                .map(|e| e.id)
                .chain(completed.iter().copied())
                .collect();

            if due.is_empty() {
                continue;
            }
            if completed.is_empty() || !due.is_subset(&completed) {
                break;
            }
            streak += 1;
        }
        streak
    }

    pub fn statistics(&self, entries: &[MemorizationEntry]) -> Statistics {
        let mut stats = Statistics::default();
        for entry in entries.iter().filter(|e| e.system_managed) {
            stats.total_verses += 1;
            match entry.current_phase {
                MemorizationPhase::Phase1 => stats.phase1_count += 1,
                MemorizationPhase::Phase2 => stats.phase2_count += 1,
                MemorizationPhase::Phase3 => stats.phase3_count += 1,
            }
        }
        stats.due_today = self.verses_needing_completion(self.today(), entries).len();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::TrackerConfig;
    use chrono::{DateTime, Utc};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: NaiveDate) -> DateTime<Utc> {
        FixedClock::on_day(day).now()
    }

    fn tracker(day: NaiveDate) -> Tracker<FixedClock> {
        Tracker::new(FixedClock::on_day(day), TrackerConfig::default())
    }

    fn verse(phase: MemorizationPhase, added: NaiveDate) -> MemorizationEntry {
        let mut e = MemorizationEntry::new("Proverbs 3:5", "Trust in the Lord", at(added));
        e.current_phase = phase;
        if phase > MemorizationPhase::Phase1 {
            e.progress.phase1.units_completed = 5;
        }
        if phase > MemorizationPhase::Phase2 {
            e.progress.phase2.units_completed = 45;
        }
        e
    }

    #[test]
    fn empty_set_has_no_streak() {
        let t = tracker(ymd(2025, 6, 20));
        assert_eq!(t.completion_streak(&[]), 0);
    }

    #[test]
    fn streak_counts_today_when_all_done() {
        let today = ymd(2025, 6, 20);
        let t = tracker(today);
        let mut e = verse(MemorizationPhase::Phase1, today);
        e.last_completion = Some(at(today));
        assert_eq!(t.completion_streak(&[e]), 1);
    }

    #[test]
    fn undone_verse_today_breaks_streak() {
        let today = ymd(2025, 6, 20);
        let t = tracker(today);
        let mut done = verse(MemorizationPhase::Phase1, today);
        done.last_completion = Some(at(today));
        let pending = verse(MemorizationPhase::Phase2, today);
        assert_eq!(t.completion_streak(&[done, pending]), 0);
    }

    #[test]
    fn quiet_days_are_skipped() {
        let today = ymd(2025, 6, 20);
        let t = tracker(today);
        let four_days_ago = ymd(2025, 6, 16);
        let mut e = verse(MemorizationPhase::Phase3, four_days_ago);
        e.last_completion = Some(at(four_days_ago));
        assert_eq!(t.completion_streak(&[e]), 1);
    }

    #[test]
    fn each_review_day_counts_once() {
        // two monthly verses reviewed on different days of June
        let today = ymd(2025, 6, 20);
        let t = tracker(today);
        let mut a = verse(MemorizationPhase::Phase3, ymd(2025, 6, 2));
        a.last_completion = Some(at(ymd(2025, 6, 2)));
        let mut b = verse(MemorizationPhase::Phase3, ymd(2025, 6, 10));
        b.last_completion = Some(at(ymd(2025, 6, 10)));
        assert_eq!(t.completion_streak(&[a, b]), 2);
    }

    #[test]
    fn missed_yesterday_ends_streak() {
        let today = ymd(2025, 6, 20);
        let t = tracker(today);
        // due every day, but only ever marked done today
        let mut entries = Vec::new();
        for _ in 0..3 {
            let mut e = verse(MemorizationPhase::Phase3, ymd(2020, 1, 1));
            e.last_completion = Some(at(today));
            entries.push(e);
        }
        let streak = t.completion_streak(&entries);
        assert!(streak as u64 <= STREAK_LOOKBACK_DAYS);
        assert_eq!(streak, 1);
    }

    #[test]
    fn streak_stops_at_lookback_window() {
        // one verse done every tenth day for 400 days, nothing else ever due
        let today = ymd(2025, 6, 20);
        let t = tracker(today);
        let entries: Vec<_> = (0..40)
            .map(|k| {
                let day = days_before(today, k * 10);
                let mut e = verse(MemorizationPhase::Phase1, day);
                e.progress.phase1.units_completed = 5;
                e.last_completion = Some(at(day));
                e
            })
            .collect();

        // days 0, 10, ..., 360 fall inside the window; 370..390 do not
        assert_eq!(t.completion_streak(&entries), 37);
    }

    #[test]
    fn statistics_by_phase() {
        let today = ymd(2025, 6, 20);
        let t = tracker(today);
        let mut done = verse(MemorizationPhase::Phase2, ymd(2025, 1, 1));
        done.last_completion = Some(at(today));
        let mut card = verse(MemorizationPhase::Phase1, ymd(2025, 1, 1));
        card.system_managed = false;
        let entries = vec![
            verse(MemorizationPhase::Phase1, ymd(2025, 1, 1)),
            done,
            verse(MemorizationPhase::Phase3, ymd(2025, 1, 1)),
            card,
        ];

        let stats = t.statistics(&entries);
        assert_eq!(
            stats,
            Statistics {
                total_verses: 3,
                phase1_count: 1,
                phase2_count: 1,
                phase3_count: 1,
                due_today: 2,
            }
        );
        assert!((stats.completion_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn completion_rate_of_nothing_is_zero() {
        assert_eq!(Statistics::default().completion_rate(), 0.0);
    }
}
