//! # Utility Modules
//!
//! Supporting utilities for cryptography, logging, and metrics.
//!
//! ## Components
//! - **Crypto**: RSA-1024 OAEP key exchange and AES-128-CBC content encryption
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters
//!
//! ## Security
//! - Cryptographically secure RNG (getrandom, OsRng)
//! - Memory zeroing for symmetric keys (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
