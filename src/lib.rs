//! Core library for label-playlist-sync
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod api;
pub mod indexed;
pub mod reorder;
pub mod plan;
pub mod retry;
pub mod sync;
pub mod util;

pub use error::{TracklistError, TransientError};
pub use indexed::IndexedSequence;
pub use reorder::{compute_add_remove, compute_reorders, AddRemovePlan, ReorderOperation, MAX_REORDER_LENGTH};
