//! Folio persistence adapter
//!
//! Durable job records as one JSON document per deployment plus one
//! append-only log file per job. Favors availability over strict error
//! surfacing: a corrupt or missing store document reads as an empty store.

pub mod job_log;
pub mod json_store;

pub use crate::job_log::{JobLogger, read_log_from, tail_log};
pub use crate::json_store::{JobCounts, JsonJobStore, StoreError};
