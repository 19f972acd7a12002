//! # Message Dispatcher
//!
//! Classifies each pending record and applies the matching decrypt path. Every record
//! produces exactly one [`ReceivedMessage`]:
//!
//! | Record | Result |
//! |--------|--------|
//! | sender not in the registry | `Error` from `"Unknown"` |
//! | unknown message type | `Undecryptable` |
//! | symmetric key request (1) | `SymmetricKeyRequest` |
//! | no content for types 2, 3, 4 | `Error` |
//! | symmetric key (2) | decrypted with our private key and stored, `SymmetricKeyReceived` |
//! | text (3) | decrypted with the sender's symmetric key, `Text` |
//! | file (4) | decrypted with the sender's symmetric key and retained, `File` |
//!
//! A missing key or a failed decryption turns types 2 to 4 into `Undecryptable`.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::core::content::{Content, ContentStore};
use crate::core::types::ClientId;
use crate::error::{constants, Result, SessionError};
use crate::protocol::message::{MessageType, PendingMessage, ReceivedMessage};
use crate::session::registry::PeerRegistry;
use crate::utils::crypto::{Decryptor, SymmetricKey, SYMMETRIC_KEY_SIZE};

/// Sender name reported when a record comes from an id missing from the registry.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Classifies pending messages and applies the matching decrypt path.
///
/// Borrows the session state it needs for the duration of one retrieval: the registry to
/// resolve senders and store received keys, our private key for key exchange, and the
/// content store for decrypted bodies.
pub struct Dispatcher<'a> {
    registry: &'a mut PeerRegistry,
    private_key: &'a dyn Decryptor,
    store: &'a ContentStore,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        registry: &'a mut PeerRegistry,
        private_key: &'a dyn Decryptor,
        store: &'a ContentStore,
    ) -> Self {
        Self {
            registry,
            private_key,
            store,
        }
    }

    /// Turn one record into exactly one [`ReceivedMessage`]. Never fails: problems with a
    /// single record are reported in the returned value.
    pub fn dispatch(&mut self, message: PendingMessage) -> ReceivedMessage {
        let Some(from) = self
            .registry
            .by_id(&message.sender_id)
            .map(|client| client.username().to_string())
        else {
            warn!(sender = %message.sender_id, id = %message.id, "Message from unknown sender");
            return ReceivedMessage::Error {
                from: UNKNOWN_SENDER.to_string(),
                reason: constants::ERR_UNKNOWN_SENDER.to_string(),
            };
        };

        let Some(kind) = MessageType::from_raw(message.kind) else {
            warn!(%from, kind = %message.kind, "Unknown message type");
            return ReceivedMessage::Undecryptable { from };
        };

        if kind == MessageType::SymmetricKeyRequest {
            return ReceivedMessage::SymmetricKeyRequest { from };
        }

        let Some(content) = message.content else {
            return ReceivedMessage::Error {
                from,
                reason: constants::ERR_MISSING_CONTENT.to_string(),
            };
        };

        let outcome = match kind {
            MessageType::SymmetricKey => self
                .receive_symmetric_key(&message.sender_id, &content)
                .map(|()| ReceivedMessage::SymmetricKeyReceived { from: from.clone() }),
            MessageType::Text => self
                .open(&message.sender_id, &content)
                .and_then(|plain| fs::read(plain.path()).map_err(Into::into))
                .map(|bytes| ReceivedMessage::Text {
                    from: from.clone(),
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                }),
            MessageType::File => self.open(&message.sender_id, &content).map(|plain| {
                plain.retain();
                ReceivedMessage::File {
                    from: from.clone(),
                    content: plain,
                }
            }),
            MessageType::SymmetricKeyRequest => Ok(ReceivedMessage::SymmetricKeyRequest {
                from: from.clone(),
            }),
        };

        outcome.unwrap_or_else(|e| {
            debug!(%from, id = %message.id, error = %e, "Message could not be decrypted");
            ReceivedMessage::Undecryptable { from }
        })
    }

    fn receive_symmetric_key(&mut self, sender: &ClientId, content: &Content) -> Result<()> {
        let mut plain = Vec::with_capacity(SYMMETRIC_KEY_SIZE);
        self.private_key
            .decrypt(&mut BufReader::new(content.reader()?), &mut plain)?;
        let key = SymmetricKey::from_slice(&plain);
        plain.zeroize();
        let key = key?;
        if let Some(client) = self.registry.by_id_mut(sender) {
            client.set_symmetric_key(key);
        }
        Ok(())
    }

    /// Decrypt `content` with the sender's symmetric key into a fresh content file.
    fn open(&self, sender: &ClientId, content: &Content) -> Result<Content> {
        let key = self
            .registry
            .by_id(sender)
            .ok_or_else(|| SessionError::UnknownTarget(sender.to_hex()))?
            .symmetric_key()?;

        let name = content
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let plain = self.store.create(&format!("{name}.decrypted"))?;
        let mut output = BufWriter::new(plain.writer()?);
        key.decrypt(&mut BufReader::new(content.reader()?), &mut output)?;
        output.flush()?;
        Ok(plain)
    }
}
