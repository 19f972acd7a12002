//! # Protocol Layer
//!
//! Request encoding, response decoding and the classification of received messages.
//!
//! ## Components
//! - **Request**: header plus code-specific payload, content streamed in blocks
//! - **Response**: header validation and streaming readers for variable-length bodies
//! - **Message**: message type codes and the closed set of received-message outcomes
//! - **Dispatcher**: per-record decryption of pending messages
//!
//! ## Codes
//! | Request | Code | Response | Code |
//! |---------|------|----------|------|
//! | Register | 1100 | Registered | 2100 |
//! | ClientList | 1101 | ClientList | 2101 |
//! | GetPublicKey | 1102 | PublicKey | 2102 |
//! | SendMessage | 1103 | MessageSent | 2103 |
//! | RetrievePendingMessages | 1104 | PendingMessages | 2104 |
//! | | | GeneralError | 9000 |

pub mod dispatcher;
pub mod message;
pub mod request;
pub mod response;

#[cfg(test)]
mod tests;
