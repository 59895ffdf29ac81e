use thiserror::Error;

/// Contract violations raised by the tracklist planning core.
///
/// None of these are expected in correct operation; they point at a bug in
/// whoever computed the inputs and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TracklistError {
    /// An identifier appears twice where uniqueness is required.
    #[error("duplicate value in tracklist: {0}")]
    DuplicateValue(String),

    /// A value was looked up but is not part of the sequence.
    #[error("value not found in tracklist: {0}")]
    NotFound(String),

    /// Target and current orderings do not hold the same items.
    #[error("target and current tracklists differ as sets ({only_in_target} only in target, {only_in_current} only in current)")]
    SetMismatch {
        only_in_target: usize,
        only_in_current: usize,
    },

    /// A remote playlist item has no track id (local file, removed track),
    /// so positions in the remote playlist cannot be addressed by id.
    #[error("playlist item at position {position} has no track id")]
    MissingTrackId { position: usize },

    /// A slice operation reached past the end of the sequence.
    #[error("range {start}..{start}+{length} out of bounds for tracklist of length {len}")]
    OutOfRange {
        start: usize,
        length: usize,
        len: usize,
    },
}

/// A provider failure worth retrying (rate limiting, gateway errors, timeouts
/// reported by the remote side).
#[derive(Debug, Clone, Error)]
#[error("transient provider error: {message}")]
pub struct TransientError {
    pub message: String,
    /// Seconds the remote asked us to wait, when it said so.
    pub retry_after: Option<u64>,
}

impl TransientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }
}
