//! Persistence for bargate.
//!
//! - `StateFile`: whole-file JSON state written atomically (temp + rename),
//!   shared by the onboarding map, drawdown window and open-risk ledger
//! - `JsonLinesWriter`: append-only, daily-rotated JSON Lines journal
//! - `EventJournal`: decision event sink backed by the journal

pub mod error;
pub mod journal;
pub mod state_file;

pub use error::{PersistenceError, PersistenceResult};
pub use journal::{EventJournal, JsonLinesWriter};
pub use state_file::StateFile;
