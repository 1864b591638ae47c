//! `traveljournal` - A journal of visited places kept in a live collection
//!
//! This library keeps a local, continuously updated mirror of a remote
//! collection of travel locations, derives filtered and sectioned views from
//! it, and routes user intents back to the store as asynchronous mutations.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod derive;
pub mod error;
pub mod expense;
pub mod live;
pub mod logging;
pub mod maps;
pub mod photos;
pub mod record;
pub mod remote;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use expense::{Expense, NewExpense};
pub use live::{LiveCollection, LoadState, Notice, Snapshot, SortPolicy};
pub use logging::init_logging;
pub use record::{NewRecord, Record, RecordPatch};
pub use remote::{RemoteCollection, RemotePath};
pub use storage::SqliteStore;
