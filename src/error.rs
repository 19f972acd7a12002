//! # Error Types
//!
//! Error handling for the MessageU client.
//!
//! Two taxonomies are kept apart on purpose and never conflated:
//!
//! ## Error Categories
//! - **Protocol Errors** ([`ProtocolError`]): wire and framing violations, such as a general
//!   error signaled by the server, an unexpected response code, or a payload size that does
//!   not match what the client expects.
//! - **Session Errors** ([`SessionError`]): application level conditions, such as a missing
//!   key, an unknown target, or a request made before registering.
//! - **Crypto Errors** ([`CryptoError`]): failures reported by the key types in
//!   [`crate::utils::crypto`].
//!
//! The top-level [`Error`] wraps all of them, plus a single normalized
//! [`Error::ConnectionFailed`] condition for any failure while establishing a connection.
//! Every variant renders as a one-line message suitable for a console front end.
//!
//! ## Example Usage
//! ```rust
//! use messageu_client::error::{Error, SessionError};
//!
//! fn describe(err: &Error) -> String {
//!     match err {
//!         Error::Session(SessionError::Unauthorized) => "register first".to_string(),
//!         other => other.to_string(),
//!     }
//! }
//!
//! assert_eq!(describe(&SessionError::Unauthorized.into()), "register first");
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::types::{ClientId, Code, PayloadSize};

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Connection errors
    pub const ERR_CONNECTION_FAILED: &str = "can not initialize a connection with the server";

    /// Dispatcher errors
    pub const ERR_UNKNOWN_SENDER: &str = "Can not resolve the sender id.";
    pub const ERR_MISSING_CONTENT: &str = "message content does not exist";

    /// Identity file errors
    pub const ERR_IDENTITY_USERNAME: &str = "failed to read the username";
    pub const ERR_IDENTITY_CLIENT_ID: &str = "failed to read the client_id";
    pub const ERR_IDENTITY_PRIVATE_KEY: &str = "failed to read the private_key";

    /// Crypto errors
    pub const ERR_INVALID_PADDING: &str = "invalid block padding";
    pub const ERR_TRUNCATED_CIPHERTEXT: &str = "ciphertext is not a whole number of blocks";
}

/// Wire-level violations. All of them are terminal for the request in flight.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("server responded with a general error")]
    GeneralError,

    #[error("unexpected response code (expected {expected}, received {received})")]
    UnexpectedResponseCode { expected: Code, received: Code },

    #[error("payload size mismatch (expected {expected}, received {received})")]
    PayloadSizeMismatch {
        expected: PayloadSize,
        received: PayloadSize,
    },

    #[error("content size {content_size} exceeds the remaining payload ({remaining} bytes)")]
    ContentMismatch { content_size: u32, remaining: u32 },

    #[error("content is too large ({size} bytes, limit is {max} bytes)")]
    ContentTooLarge { max: u64, size: u64 },

    #[error("response is for client {received}, requested {expected}")]
    TargetMismatch {
        expected: ClientId,
        received: ClientId,
    },
}

/// Which piece of key material a peer record was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Symmetric,
    Public,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Symmetric => f.write_str("symmetric"),
            KeyKind::Public => f.write_str("public"),
        }
    }
}

/// Application-level conditions raised by [`crate::session::Session`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("missing the target's {0} key")]
    MissingKey(KeyKind),

    #[error("the username '{0}' is too long")]
    UsernameTooLong(String),

    #[error("already registered with the server")]
    AlreadyRegistered,

    #[error("you must register before performing this request")]
    Unauthorized,

    #[error("unknown target '{0}', try refreshing the client list")]
    UnknownTarget(String),

    #[error("can not open the file '{}'", .0.display())]
    UnknownFilePath(PathBuf),
}

/// Failures of the default cryptographic primitives.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("key encoding error: {0}")]
    Encoding(String),

    #[error("random generator failure: {0}")]
    Random(String),

    #[error("invalid key length: {0} bytes")]
    InvalidKeyLength(usize),

    #[error("input too large for the cipher: {0} bytes")]
    InputTooLarge(usize),

    #[error("{0}")]
    Malformed(&'static str),
}

/// Top-level error returned by every public operation of the crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{}", constants::ERR_CONNECTION_FAILED)]
    ConnectionFailed,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] io::Error),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Type alias for Results using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_render_on_one_line() {
        let errors: Vec<Error> = vec![
            SessionError::MissingKey(KeyKind::Symmetric).into(),
            SessionError::UsernameTooLong("x".repeat(300)).into(),
            SessionError::AlreadyRegistered.into(),
            SessionError::Unauthorized.into(),
            SessionError::UnknownTarget("bob".into()).into(),
            SessionError::UnknownFilePath(PathBuf::from("/nope")).into(),
            Error::ConnectionFailed,
        ];
        for err in errors {
            assert!(!err.to_string().contains('\n'), "{err}");
        }
    }

    #[test]
    fn test_protocol_error_reports_both_codes() {
        let err = ProtocolError::UnexpectedResponseCode {
            expected: Code::new(2100),
            received: Code::new(2101),
        };
        let text = err.to_string();
        assert!(text.contains("2100"));
        assert!(text.contains("2101"));
    }

    #[test]
    fn test_missing_key_names_the_kind() {
        assert_eq!(
            SessionError::MissingKey(KeyKind::Public).to_string(),
            "missing the target's public key"
        );
    }
}
