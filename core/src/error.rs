//! Error taxonomy shared by the store pipeline, the reveal pipeline and the
//! ledger view.
//!
//! Three families:
//! - caller input or local state is wrong (`PreconditionFailed`), never retried
//! - the envelope layer refused the data (`MalformedEnvelope`,
//!   `AuthenticationFailed`, `EncodingError`, `InvalidIdentity`), never
//!   retried since the same inputs fail the same way
//! - a remote round-trip failed (`AuthorizationDenied`, `FetchError`,
//!   `Transport`, `Timeout`), retryable

use std::time::Duration;

use privdock_envelope::EnvelopeError;
use privdock_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DockError {
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("envelope authentication failed")]
    AuthenticationFailed,

    #[error("decrypted locator is not valid UTF-8")]
    EncodingError,

    #[error("invalid identity")]
    InvalidIdentity,

    #[error("authorization denied")]
    AuthorizationDenied,

    #[error("ledger fetch failed: {0}")]
    FetchError(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },
}

/// Payload-free discriminant of [`DockError`], safe to keep in view state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PreconditionFailed,
    MalformedEnvelope,
    AuthenticationFailed,
    EncodingError,
    InvalidIdentity,
    AuthorizationDenied,
    FetchError,
    Transport,
    Timeout,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::PreconditionFailed => "precondition failed",
            ErrorKind::MalformedEnvelope => "malformed envelope",
            ErrorKind::AuthenticationFailed => "authentication failed",
            ErrorKind::EncodingError => "encoding error",
            ErrorKind::InvalidIdentity => "invalid identity",
            ErrorKind::AuthorizationDenied => "authorization denied",
            ErrorKind::FetchError => "fetch error",
            ErrorKind::Transport => "transport error",
            ErrorKind::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

impl DockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DockError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            DockError::MalformedEnvelope(_) => ErrorKind::MalformedEnvelope,
            DockError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            DockError::EncodingError => ErrorKind::EncodingError,
            DockError::InvalidIdentity => ErrorKind::InvalidIdentity,
            DockError::AuthorizationDenied => ErrorKind::AuthorizationDenied,
            DockError::FetchError(_) => ErrorKind::FetchError,
            DockError::Transport(_) => ErrorKind::Transport,
            DockError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Whether retrying the same request can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DockError::AuthorizationDenied
                | DockError::FetchError(_)
                | DockError::Transport(_)
                | DockError::Timeout { .. }
        )
    }

    /// Message fit for an end user. Remote causes and envelope internals
    /// stay out of it.
    pub fn user_message(&self) -> String {
        match self {
            DockError::PreconditionFailed(reason) => reason.clone(),
            DockError::MalformedEnvelope(_)
            | DockError::AuthenticationFailed
            | DockError::EncodingError
            | DockError::InvalidIdentity => {
                "The stored record could not be decrypted with the recovered key.".into()
            }
            DockError::AuthorizationDenied => "Decryption failed. Please try again.".into(),
            DockError::FetchError(_) => "Could not load your files. Please retry.".into(),
            DockError::Transport(_) => "Network request failed. Please retry.".into(),
            DockError::Timeout { .. } => "The request timed out. Please retry.".into(),
        }
    }

    pub(crate) fn precondition(reason: impl Into<String>) -> Self {
        DockError::PreconditionFailed(reason.into())
    }
}

impl From<EnvelopeError> for DockError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::InvalidIdentity => DockError::InvalidIdentity,
            EnvelopeError::MalformedEnvelope(reason) => {
                DockError::MalformedEnvelope(reason.to_string())
            }
            EnvelopeError::AuthenticationFailed => DockError::AuthenticationFailed,
            EnvelopeError::EncodingError => DockError::EncodingError,
            EnvelopeError::EmptyPlaintext => DockError::precondition("locator is empty"),
        }
    }
}

impl From<LedgerError> for DockError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::IndexOutOfRange { index, count } => DockError::PreconditionFailed(
                format!("index {index} out of range (count {count})"),
            ),
            LedgerError::Transport(cause)
            | LedgerError::Rejected(cause)
            | LedgerError::Unavailable(cause) => DockError::Transport(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_split() {
        assert!(!DockError::precondition("no owner").is_retryable());
        assert!(!DockError::AuthenticationFailed.is_retryable());
        assert!(!DockError::MalformedEnvelope("bad iv".into()).is_retryable());
        assert!(!DockError::InvalidIdentity.is_retryable());

        assert!(DockError::AuthorizationDenied.is_retryable());
        assert!(DockError::FetchError("down".into()).is_retryable());
        assert!(DockError::Transport("reset".into()).is_retryable());
        assert!(
            DockError::Timeout {
                stage: "reveal",
                after: Duration::from_secs(30)
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_user_message_hides_causes() {
        let err = DockError::Transport("connection refused at 10.0.0.3:8545".into());
        assert!(!err.user_message().contains("10.0.0.3"));

        let err = DockError::MalformedEnvelope("iv must be 12 bytes".into());
        assert!(!err.user_message().contains("iv"));

        assert_eq!(
            DockError::precondition("Choose a file first.").user_message(),
            "Choose a file first."
        );
    }

    #[test]
    fn test_conversions_keep_category() {
        assert_eq!(
            DockError::from(EnvelopeError::AuthenticationFailed),
            DockError::AuthenticationFailed
        );
        assert_eq!(
            DockError::from(EnvelopeError::MalformedEnvelope("expected 3 fields")).kind(),
            ErrorKind::MalformedEnvelope
        );
        assert_eq!(
            DockError::from(LedgerError::IndexOutOfRange { index: 4, count: 2 }).kind(),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(
            DockError::from(LedgerError::Rejected("reverted".into())).kind(),
            ErrorKind::Transport
        );
    }
}
