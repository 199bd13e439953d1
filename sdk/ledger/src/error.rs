use thiserror::Error;

/// Errors reported by external capabilities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// RPC / relayer transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote side refused the request (reverted tx, bad signature, ...)
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("index {index} out of range (count {count})")]
    IndexOutOfRange { index: u64, count: u64 },

    /// Capability not usable yet (engine still loading, wallet locked)
    #[error("unavailable: {0}")]
    Unavailable(String),
}
