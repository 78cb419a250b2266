//! Error types for cookie encoding and decoding

/// Errors from the signed cookie codec.
///
/// `Integrity`, `Expired` and `Malformed` all mean the cookie cannot be
/// trusted; callers treat the cookie as absent and clear it. `Misconfigured`
/// only comes from construction or encoding and points at bad keys.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cookie integrity check failed: {0}")]
    Integrity(String),

    #[error("cookie signature has expired")]
    Expired,

    #[error("malformed cookie value: {0}")]
    Malformed(String),

    #[error("cookie codec misconfigured: {0}")]
    Misconfigured(String),
}

/// Errors from the flash message queue.
#[derive(Debug, thiserror::Error)]
pub enum FlashError {
    #[error("failed to decode flash cookie: {0}")]
    Decode(String),

    #[error("failed to encode flashes: {0}")]
    Encode(String),

    #[error("flash cookie too large ({len} bytes, max {max})")]
    TooLarge { len: usize, max: usize },
}

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
