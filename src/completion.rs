use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::clock::Clock;
use crate::due::Tracker;
use crate::entry::MemorizationEntry;
use crate::error::Error;
use crate::phase::{MemorizationPhase, Progress};
use crate::store::EntryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// A unit was already logged on this calendar day. Nothing changed.
    AlreadyLoggedToday,
    Logged {
        phase: MemorizationPhase,
        units: u32,
        advanced_to: Option<MemorizationPhase>,
    },
}

/// Progress for an entry imported part-way through the curriculum.
#[derive(Debug, Clone, PartialEq)]
pub struct Bootstrap {
    pub current_phase: MemorizationPhase,
    pub progress: Progress,
    pub last_completion: Option<DateTime<Utc>>,
}

/// What a user reports about practice done before an entry was tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorProgress {
    pub phase: MemorizationPhase,
    pub completed: u32,
    pub completed_today: bool,
}

impl Bootstrap {
    pub fn apply_to(&self, entry: &mut MemorizationEntry) {
        entry.current_phase = self.current_phase;
        entry.progress = self.progress.clone();
        entry.last_completion = self.last_completion;
    }
}

impl<C: Clock> Tracker<C> {
    /// Logs one unit for `entry` at `at` and writes it back through `store`.
    ///
    /// A second call on the same calendar day is a no-op and does not touch
    /// the store. If the save fails the in-memory change is kept and
    /// [`Error::Persistence`] is returned.
    pub fn process_completion<S: EntryStore + ?Sized>(
        &self,
        entry: &mut MemorizationEntry,
        at: DateTime<Utc>,
        store: &mut S,
    ) -> Result<CompletionOutcome, Error> {
        let outcome = self.record_completion(entry, at);
        if outcome == CompletionOutcome::AlreadyLoggedToday {
            return Ok(outcome);
        }
        store.save(entry).map_err(|source| {
            warn!("progress not saved for {} ({}): {source}", entry.reference, entry.id);
            Error::Persistence {
                id: entry.id,
                source,
            }
        })?;
        Ok(outcome)
    }

    pub fn complete_now<S: EntryStore + ?Sized>(
        &self,
        entry: &mut MemorizationEntry,
        store: &mut S,
    ) -> Result<CompletionOutcome, Error> {
        self.process_completion(entry, self.clock.now(), store)
    }

    /// The state transition alone, without persistence.
    ///
    /// The re-entry guard is per calendar day in every phase, so Phase 3 can
    /// log more than one month on different days of the same month.
    pub fn record_completion(
        &self,
        entry: &mut MemorizationEntry,
        at: DateTime<Utc>,
    ) -> CompletionOutcome {
        if let Some(last) = entry.last_completion
            && self.clock.same_day(last, at)
        {
            debug!("{} already logged on {}", entry.id, self.clock.day_of(at));
            return CompletionOutcome::AlreadyLoggedToday;
        }

        let phase = entry.current_phase;
        let progress = entry.progress.get_mut(phase);
        progress.log_unit(at);
        let units = progress.units_completed;
        let reached = progress.reached_target_of(phase);
        entry.last_completion = Some(at);

        let mut advanced_to = None;
        if reached && let Some(next) = phase.next() {
            entry.current_phase = next;
            entry.progress.get_mut(next).start_date.get_or_insert(at);
            info!("{} advanced from {phase} to {next}", entry.reference);
            advanced_to = Some(next);
        }

        CompletionOutcome::Logged {
            phase,
            units,
            advanced_to,
        }
    }

    /// Builds consistent progress for an entry whose user reports being
    /// `completed` units into `phase`.
    ///
    /// Earlier phases are filled to their targets and later ones stay empty.
    /// `completed` is taken as given; see
    /// [`configure_existing_entry_checked`](Self::configure_existing_entry_checked).
    pub fn configure_existing_entry(
        &self,
        phase: MemorizationPhase,
        completed: u32,
        completed_today: bool,
    ) -> Bootstrap {
        let now = self.clock.now();
        let mut progress = Progress::default();

        for p in MemorizationPhase::ALL {
            let slot = progress.get_mut(p);
            if p < phase {
                slot.units_completed = p.target().unwrap_or(0);
                slot.start_date = Some(now);
            } else if p == phase {
                slot.units_completed = completed;
                if completed > 0 || p != MemorizationPhase::Phase1 {
                    slot.start_date = Some(now);
                }
                if completed_today {
                    slot.last_completion = Some(now);
                }
            }
        }

        Bootstrap {
            current_phase: phase,
            progress,
            last_completion: completed_today.then_some(now),
        }
    }

    /// Like [`configure_existing_entry`](Self::configure_existing_entry) but
    /// rejects counts beyond the phase target. A count that reaches the
    /// target moves the entry on to the next phase, as a live completion
    /// would.
    pub fn configure_existing_entry_checked(
        &self,
        phase: MemorizationPhase,
        completed: u32,
        completed_today: bool,
    ) -> Result<Bootstrap, Error> {
        if let Some(max) = phase.target()
            && completed > max
        {
            return Err(Error::InvalidBootstrap {
                phase,
                count: completed,
                max,
                units: phase.unit_name(),
            });
        }
        let mut bootstrap = self.configure_existing_entry(phase, completed, completed_today);
        if bootstrap.progress.get(phase).reached_target_of(phase)
            && let Some(next) = phase.next()
        {
            bootstrap.current_phase = next;
            bootstrap
                .progress
                .get_mut(next)
                .start_date
                .get_or_insert(self.clock.now());
            debug!("bootstrap at {phase} target starts in {next}");
        }
        Ok(bootstrap)
    }

    /// Builds a new entry for the CLI and HTTP surfaces, optionally carrying
    /// progress made before it was tracked.
    ///
    /// Flashcards are never scheduled, so they cannot carry phase progress.
    pub fn new_entry(
        &self,
        reference: impl Into<String>,
        text: impl Into<String>,
        flashcard: bool,
        prior: Option<PriorProgress>,
    ) -> Result<MemorizationEntry, Error> {
        let now = self.clock.now();
        if flashcard {
            if prior.is_some() {
                return Err(Error::FlashcardProgress);
            }
            return Ok(MemorizationEntry::flashcard(reference, text, now));
        }

        let mut entry = MemorizationEntry::new(reference, text, now);
        if let Some(prior) = prior {
            self.configure_existing_entry_checked(prior.phase, prior.completed, prior.completed_today)?
                .apply_to(&mut entry);
        }
        Ok(entry)
    }
}
