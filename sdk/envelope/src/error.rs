use thiserror::Error;

/// Envelope and key-derivation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("invalid identity: expected 20-byte hex address")]
    InvalidIdentity,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("decrypted payload is not valid UTF-8")]
    EncodingError,

    #[error("refusing to seal an empty plaintext")]
    EmptyPlaintext,
}
