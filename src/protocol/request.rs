//! # Requests
//!
//! Every request starts with the same header:
//!
//! ```text
//! [SenderId(16)] [Version(1)] [Code(2)] [PayloadSize(4)]
//! ```
//!
//! followed by a code-specific payload. The payload size is computed from the field widths
//! (plus the declared content length for `SendMessage`) when the request is built, never from
//! what is actually streamed.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

use crate::core::content::Content;
use crate::core::types::{
    ClientId, Code, ContentSize, PayloadSize, PublicKeyBlob, RawMessageType, Username, Version,
    BLOCK_SIZE,
};
use crate::error::ProtocolError;
use crate::protocol::message::MessageType;

/// Version byte sent with every request.
pub const CLIENT_VERSION: Version = Version::new(2);

pub const REGISTER_CODE: Code = Code::new(1100);
pub const CLIENT_LIST_CODE: Code = Code::new(1101);
pub const PUBLIC_KEY_CODE: Code = Code::new(1102);
pub const SEND_MESSAGE_CODE: Code = Code::new(1103);
pub const PENDING_MESSAGES_CODE: Code = Code::new(1104);

/// Size of the common request header.
pub const HEADER_SIZE: usize = ClientId::SIZE + Version::SIZE + Code::SIZE + PayloadSize::SIZE;

/// Fixed part of a `SendMessage` payload, before the content bytes.
pub const SEND_MESSAGE_FIXED_SIZE: usize =
    ClientId::SIZE + RawMessageType::SIZE + ContentSize::SIZE;

/// A request ready to be written to a connection.
#[derive(Debug, Clone)]
pub enum Request {
    Register {
        username: Username,
        public_key: PublicKeyBlob,
    },
    ClientList {
        sender: ClientId,
    },
    GetPublicKey {
        sender: ClientId,
        target: ClientId,
    },
    SendMessage {
        sender: ClientId,
        target: ClientId,
        kind: MessageType,
        content_size: ContentSize,
        content: Option<Content>,
    },
    RetrievePendingMessages {
        sender: ClientId,
    },
}

impl Request {
    pub fn register(username: Username, public_key: PublicKeyBlob) -> Self {
        Self::Register {
            username,
            public_key,
        }
    }

    pub fn client_list(sender: ClientId) -> Self {
        Self::ClientList { sender }
    }

    pub fn get_public_key(sender: ClientId, target: ClientId) -> Self {
        Self::GetPublicKey { sender, target }
    }

    pub fn retrieve_pending_messages(sender: ClientId) -> Self {
        Self::RetrievePendingMessages { sender }
    }

    /// Build a `SendMessage` request. `None` content sends an empty body.
    ///
    /// # Errors
    /// `ContentTooLarge` when the content length cannot be encoded in the 4-byte size
    /// fields, `Io` when the content length cannot be read.
    pub fn send_message(
        sender: ClientId,
        target: ClientId,
        kind: MessageType,
        content: Option<Content>,
    ) -> Result<Self, ProtocolError> {
        let len = match &content {
            Some(content) => content.len()?,
            None => 0,
        };
        let content_size = Self::checked_content_size(len)?;
        Ok(Self::SendMessage {
            sender,
            target,
            kind,
            content_size,
            content,
        })
    }

    fn checked_content_size(len: u64) -> Result<ContentSize, ProtocolError> {
        let max = u64::from(ContentSize::MAX.value());
        let size = u32::try_from(len)
            .map_err(|_| ProtocolError::ContentTooLarge { max, size: len })?;

        // The header's payload size must also stay encodable.
        let payload_max = u64::from(PayloadSize::MAX.value()) - SEND_MESSAGE_FIXED_SIZE as u64;
        if len > payload_max {
            return Err(ProtocolError::ContentTooLarge {
                max: payload_max,
                size: len,
            });
        }
        Ok(ContentSize::new(size))
    }

    pub fn code(&self) -> Code {
        match self {
            Self::Register { .. } => REGISTER_CODE,
            Self::ClientList { .. } => CLIENT_LIST_CODE,
            Self::GetPublicKey { .. } => PUBLIC_KEY_CODE,
            Self::SendMessage { .. } => SEND_MESSAGE_CODE,
            Self::RetrievePendingMessages { .. } => PENDING_MESSAGES_CODE,
        }
    }

    pub fn sender(&self) -> ClientId {
        match self {
            Self::Register { .. } => ClientId::UNREGISTERED,
            Self::ClientList { sender }
            | Self::GetPublicKey { sender, .. }
            | Self::SendMessage { sender, .. }
            | Self::RetrievePendingMessages { sender } => *sender,
        }
    }

    pub fn payload_size(&self) -> PayloadSize {
        match self {
            Self::Register { .. } => PayloadSize::fixed(Username::SIZE + PublicKeyBlob::SIZE),
            Self::ClientList { .. } | Self::RetrievePendingMessages { .. } => PayloadSize::fixed(0),
            Self::GetPublicKey { .. } => PayloadSize::fixed(ClientId::SIZE),
            Self::SendMessage { content_size, .. } => PayloadSize::new(
                (SEND_MESSAGE_FIXED_SIZE as u32).saturating_add(content_size.value()),
            ),
        }
    }

    /// Header plus every fixed-width payload field.
    fn fixed_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + Username::SIZE + PublicKeyBlob::SIZE);
        buf.put_slice(&self.sender().encode());
        buf.put_slice(&CLIENT_VERSION.encode());
        buf.put_slice(&self.code().encode());
        buf.put_slice(&self.payload_size().encode());

        match self {
            Self::Register {
                username,
                public_key,
            } => {
                buf.put_slice(&username.encode());
                buf.put_slice(&public_key.encode());
            }
            Self::GetPublicKey { target, .. } => buf.put_slice(&target.encode()),
            Self::SendMessage {
                target,
                kind,
                content_size,
                ..
            } => {
                buf.put_slice(&target.encode());
                buf.put_slice(&kind.raw().encode());
                buf.put_slice(&content_size.encode());
            }
            Self::ClientList { .. } | Self::RetrievePendingMessages { .. } => {}
        }
        buf
    }

    /// Write the request, streaming any content in [`BLOCK_SIZE`] blocks.
    ///
    /// Returns the number of bytes written.
    #[instrument(skip(self, writer), fields(code = %self.code()), level = "debug")]
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<u64, ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        let fixed = self.fixed_bytes();
        writer.write_all(&fixed).await?;
        let mut written = fixed.len() as u64;

        if let Self::SendMessage {
            content: Some(content),
            ..
        } = self
        {
            let mut file = tokio::fs::File::open(content.path()).await?;
            let mut block = [0u8; BLOCK_SIZE];
            loop {
                let n = file.read(&mut block).await?;
                if n == 0 {
                    break;
                }
                writer.write_all(&block[..n]).await?;
                written += n as u64;
            }
        }

        writer.flush().await?;
        debug!(bytes = written, payload_size = %self.payload_size(), "Request written");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::core::content::ContentStore;

    #[test]
    fn test_send_message_rejects_unencodable_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();
        let content = store.create("huge").unwrap();
        // Sparse file, nothing is actually allocated.
        content
            .writer()
            .unwrap()
            .set_len(u64::from(u32::MAX) + 1)
            .unwrap();

        let err = Request::send_message(
            ClientId::default(),
            ClientId::default(),
            MessageType::File,
            Some(content),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ContentTooLarge { max, size }
                if max == u64::from(u32::MAX) && size == u64::from(u32::MAX) + 1
        ));
    }

    #[test]
    fn test_send_message_rejects_payload_overflow() {
        let err = Request::checked_content_size(u64::from(u32::MAX)).unwrap_err();
        assert!(matches!(err, ProtocolError::ContentTooLarge { .. }));
        assert!(Request::checked_content_size(u64::from(u32::MAX) - 21).is_ok());
    }

    #[tokio::test]
    async fn test_empty_send_message_layout() {
        let request = Request::send_message(
            ClientId::new([1; 16]),
            ClientId::new([2; 16]),
            MessageType::SymmetricKeyRequest,
            None,
        )
        .unwrap();
        let mut out = Vec::new();
        let written = request.write_to(&mut out).await.unwrap();

        assert_eq!(written as usize, HEADER_SIZE + SEND_MESSAGE_FIXED_SIZE);
        assert_eq!(&out[..16], &[1; 16]);
        assert_eq!(out[16], 2);
        assert_eq!(&out[17..19], &1103u16.to_le_bytes());
        assert_eq!(&out[19..23], &21u32.to_le_bytes());
        assert_eq!(&out[23..39], &[2; 16]);
        assert_eq!(out[39], 1);
        assert_eq!(&out[40..44], &0u32.to_le_bytes());
    }
}
