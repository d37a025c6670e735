use thiserror::Error;

/// Errors from constructing a client or talking to the flag store.
///
/// Evaluation methods never return these. A missing flag reads as `false`,
/// and a failed refresh falls back to the cached snapshot; the error then
/// only surfaces through [`Freshness::Stale`](crate::Freshness::Stale).
#[derive(Error, Debug)]
pub enum FlagError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("flag record has no attributes")]
    RecordMissing,

    #[error("failed to decode flag document: {0}")]
    DataParsing(String),

    #[error("flag store request failed: {0}")]
    StoreUnavailable(String),
}
