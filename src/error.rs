use thiserror::Error;
use uuid::Uuid;

use crate::phase::MemorizationPhase;

/// Failure inside an [`EntryStore`](crate::store::EntryStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(Box<csv::Error>),

    #[error("invalid {field} in {location}: {value:?}")]
    Parse {
        field: &'static str,
        value: String,
        location: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<csv::Error> for StoreError {
    fn from(error: csv::Error) -> Self {
        StoreError::Csv(Box::new(error))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// The in-memory entry was updated but could not be written back.
    #[error("progress not saved for entry {id}: {source}")]
    Persistence {
        id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("{phase} cannot start with {count} completed {units}; expected 0..={max}")]
    InvalidBootstrap {
        phase: MemorizationPhase,
        count: u32,
        max: u32,
        units: &'static str,
    },

    #[error("flashcards carry no phase progress")]
    FlashcardProgress,

    #[error("no entry with id {0}")]
    UnknownEntry(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence { .. })
    }
}
