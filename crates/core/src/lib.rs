//! Folio core domain
//!
//! This crate contains the job aggregate root, the status state machine,
//! the partial-update record and the output-derived progress heuristic.
//! It has no I/O of its own: persistence lives in `folio-store` and process
//! supervision in `folio-manager`.

pub mod error;
pub mod job;
pub mod progress;

pub use crate::error::{DomainError, DomainResult};
pub use crate::job::{Job, JobId, JobKind, JobPatch, JobStatus, validate_inputs};
pub use crate::progress::estimate;

pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
