//! # Core Protocol Components
//!
//! Wire types and message content storage.
//!
//! This module provides the foundation for the protocol: every field that crosses the
//! socket is one of the fixed-width types in [`types`], and every message body is a
//! [`content::Content`] streamed to or from disk.
//!
//! ## Wire Format
//! ```text
//! Request:  [SenderId(16)] [Version(1)] [Code(2)] [PayloadSize(4)] [Payload(N)]
//! Response: [Version(1)] [Code(2)] [PayloadSize(4)] [Payload(N)]
//! ```
//!
//! All integers are little-endian.

pub mod content;
pub mod types;
