//! Error taxonomy for the scheduling engine.
//!
//! Every public fallible operation resolves to one of these four variants.
//! DFS searches never raise: infeasible hops are pruned silently and surface
//! only as the absence of a path.

use std::path::PathBuf;

/// The single error type returned by the public surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input key did not resolve to a target, resolved to an undisambiguated
    /// conflict set, or pointed at a free period (nothing to move).
    #[error("{0}")]
    Lookup(#[from] LookupError),

    /// Upstream HTTP failure, transient or permanent.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The cache layer failed to persist a valid payload.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A parsed structure violated an invariant.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("no target matches `{text}`")]
    NotFound { text: String },

    #[error("`{text}` is ambiguous; candidates: {candidates:?}")]
    Ambiguous { text: String, candidates: Vec<String> },

    #[error("{teacher} has no lesson at weekday {weekday} period {period} (free period)")]
    FreePeriod {
        teacher: String,
        weekday: u8,
        period: u8,
    },

    #[error("unknown teacher `{0}`")]
    UnknownTeacher(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("upstream responded with status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to parse response from {url}: {source}")]
    ParseFailed {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("request to {url} timed out after {attempts} attempt(s)")]
    Exhausted { url: String, attempts: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize cache payload for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("timetable row {weekday} has length {actual}, expected {expected}")]
    RowLength {
        weekday: usize,
        expected: usize,
        actual: usize,
    },

    #[error("timetable did not carry exactly 5 weekday rows (found {0})")]
    RowCount(usize),

    #[error("could not locate a table in upstream HTML with rows of width 7")]
    NoTimetableMatched,

    #[error("streak lengths for {source} weekday {weekday} summed to {actual}, expected {expected}")]
    StreakConservation {
        source: String,
        weekday: u8,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
