//! Message kinds carried by `SendMessage` requests and pending-message responses.

use std::fmt;

use crate::core::content::Content;
use crate::core::types::{ClientId, MessageId, RawMessageType};

/// Message type codes understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    SymmetricKeyRequest = 1,
    SymmetricKey = 2,
    Text = 3,
    File = 4,
}

impl MessageType {
    /// Returns `None` for codes the client does not know.
    pub fn from_raw(raw: RawMessageType) -> Option<Self> {
        match raw.value() {
            1 => Some(Self::SymmetricKeyRequest),
            2 => Some(Self::SymmetricKey),
            3 => Some(Self::Text),
            4 => Some(Self::File),
            _ => None,
        }
    }

    pub fn raw(self) -> RawMessageType {
        RawMessageType::new(self as u8)
    }
}

/// One record of a pending-messages response, content still encrypted.
#[derive(Debug)]
pub struct PendingMessage {
    pub sender_id: ClientId,
    pub id: MessageId,
    pub kind: RawMessageType,
    /// `None` when the record declared a zero content size.
    pub content: Option<Content>,
}

/// Result of classifying and decrypting one pending message.
#[derive(Debug)]
pub enum ReceivedMessage {
    /// The sender asks us to send them a symmetric key.
    SymmetricKeyRequest { from: String },
    /// A symmetric key from the sender was decrypted and stored.
    SymmetricKeyReceived { from: String },
    Text { from: String, text: String },
    /// Decrypted file, retained on disk.
    File { from: String, content: Content },
    /// Missing key, failed decryption or unknown message type.
    Undecryptable { from: String },
    Error { from: String, reason: String },
}

impl ReceivedMessage {
    pub fn sender(&self) -> &str {
        match self {
            Self::SymmetricKeyRequest { from }
            | Self::SymmetricKeyReceived { from }
            | Self::Text { from, .. }
            | Self::File { from, .. }
            | Self::Undecryptable { from }
            | Self::Error { from, .. } => from,
        }
    }
}

impl fmt::Display for ReceivedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\nFrom: {}\nContent:\n", self.sender())?;
        match self {
            Self::SymmetricKeyRequest { .. } => f.write_str("Request for symmetric key")?,
            Self::SymmetricKeyReceived { .. } => f.write_str("Received symmetric key")?,
            Self::Text { text, .. } => f.write_str(text)?,
            Self::File { content, .. } => write!(f, "[File] {}", content.path().display())?,
            Self::Undecryptable { .. } => f.write_str("Can not decrypt this message")?,
            Self::Error { reason, .. } => write!(f, "[ERROR] {reason}")?,
        }
        f.write_str("\n====<EOM>====")
    }
}
