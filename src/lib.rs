pub mod clock;
pub mod completion;
pub mod config;
pub mod due;
pub mod entry;
pub mod error;
pub mod phase;
pub mod repair;
pub mod stats;
pub mod store;
pub mod web;

pub use clock::{Clock, FixedClock, SystemClock};
pub use completion::{Bootstrap, CompletionOutcome, PriorProgress};
pub use config::TrackerConfig;
pub use due::{PhaseQueues, Tracker};
pub use entry::MemorizationEntry;
pub use error::{Error, StoreError};
pub use phase::{MemorizationPhase, PhaseProgress, Progress};
pub use repair::{Repair, RepairReport};
pub use stats::Statistics;
pub use store::{CsvStore, EntryStore, MemoryStore};
