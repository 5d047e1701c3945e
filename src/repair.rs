//! Self-healing pass over the record set.
//!
//! Entries whose current phase is ahead of their progress are demoted, and
//! progress logged without a start date gets `date_added` as its start. The
//! backfill is a best guess, not the real historical date.

use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::due::Tracker;
use crate::entry::MemorizationEntry;
use crate::error::Error;
use crate::phase::{MemorizationPhase, PHASE1_TARGET, PHASE2_TARGET};
use crate::store::EntryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Repair {
    Demoted {
        from: MemorizationPhase,
        to: MemorizationPhase,
    },
    BackfilledStart {
        phase: MemorizationPhase,
    },
}

#[derive(Debug, Default)]
pub struct RepairReport {
    pub examined: usize,
    pub repaired: Vec<(Uuid, Vec<Repair>)>,
    /// Entries repaired in memory whose save failed.
    pub failed: Vec<Error>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty() && self.failed.is_empty()
    }
}

/// Repairs `entry` would need, in the order they are applied.
pub fn plan_repairs(entry: &MemorizationEntry) -> Vec<Repair> {
    let mut repairs = Vec::new();
    let p1 = entry.units_in(MemorizationPhase::Phase1);
    let p2 = entry.units_in(MemorizationPhase::Phase2);

    match entry.current_phase {
        MemorizationPhase::Phase2 if p1 < PHASE1_TARGET => repairs.push(Repair::Demoted {
            from: MemorizationPhase::Phase2,
            to: MemorizationPhase::Phase1,
        }),
        MemorizationPhase::Phase3 if p1 < PHASE1_TARGET || p2 < PHASE2_TARGET => {
            let to = if p1 < PHASE1_TARGET {
                MemorizationPhase::Phase1
            } else {
                MemorizationPhase::Phase2
            };
            repairs.push(Repair::Demoted {
                from: MemorizationPhase::Phase3,
                to,
            });
        }
        _ => {}
    }

    for phase in MemorizationPhase::ALL {
        if entry.progress.get(phase).missing_start() {
            repairs.push(Repair::BackfilledStart { phase });
        }
    }
    repairs
}

pub fn apply_repairs(entry: &mut MemorizationEntry, repairs: &[Repair]) {
    for repair in repairs {
        match *repair {
            Repair::Demoted { to, .. } => entry.current_phase = to,
            Repair::BackfilledStart { phase } => {
                entry.progress.get_mut(phase).start_date = Some(entry.date_added);
            }
        }
    }
}

impl<C: Clock> Tracker<C> {
    /// Repairs every system-managed entry in place and saves the ones that
    /// changed. A failed save is recorded and the pass carries on.
    pub fn validate_and_repair<S: EntryStore + ?Sized>(
        &self,
        entries: &mut [MemorizationEntry],
        store: &mut S,
    ) -> RepairReport {
        let mut report = RepairReport::default();

        for entry in entries.iter_mut().filter(|e| e.system_managed) {
            report.examined += 1;
            let repairs = plan_repairs(entry);
            if repairs.is_empty() {
                continue;
            }
            apply_repairs(entry, &repairs);
            info!("repaired {} ({}): {:?}", entry.reference, entry.id, repairs);

            if let Err(source) = store.save(entry) {
                warn!("repair of {} not saved: {source}", entry.id);
                report.failed.push(Error::Persistence {
                    id: entry.id,
                    source,
                });
            }
            report.repaired.push((entry.id, repairs));
        }
        report
    }
}
