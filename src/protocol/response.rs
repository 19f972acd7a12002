//! # Responses
//!
//! Every response starts with:
//!
//! ```text
//! [Version(1)] [Code(2)] [PayloadSize(4)]
//! ```
//!
//! The header is validated before any payload byte is interpreted: a general error code
//! fails immediately, a code other than the one expected for the request in flight fails
//! with both codes reported, and a payload size that does not match the body layout fails
//! with both sizes reported.
//!
//! Client lists and pending messages have variable-length bodies. Their response types own
//! the connection and hand records to a callback one at a time, so the body is never
//! buffered as a whole.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::core::content::ContentStore;
use crate::core::types::{
    ClientId, Code, ContentSize, MessageId, PayloadSize, PublicKeyBlob, RawMessageType, Username,
    Version, BLOCK_SIZE,
};
use crate::error::ProtocolError;
use crate::protocol::message::PendingMessage;

pub const REGISTER_CODE: Code = Code::new(2100);
pub const CLIENT_LIST_CODE: Code = Code::new(2101);
pub const PUBLIC_KEY_CODE: Code = Code::new(2102);
pub const MESSAGE_SENT_CODE: Code = Code::new(2103);
pub const PENDING_MESSAGES_CODE: Code = Code::new(2104);
pub const GENERAL_ERROR_CODE: Code = Code::new(9000);

/// Size of the common response header.
pub const HEADER_SIZE: usize = Version::SIZE + Code::SIZE + PayloadSize::SIZE;

/// Size of one client-list record.
pub const CLIENT_RECORD_SIZE: usize = ClientId::SIZE + Username::SIZE;

/// Size of a pending-message record before its content.
pub const MESSAGE_HEADER_SIZE: usize =
    ClientId::SIZE + MessageId::SIZE + RawMessageType::SIZE + ContentSize::SIZE;

async fn read_array<R, const N: usize>(reader: &mut R) -> Result<[u8; N], ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Common prefix of every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub version: Version,
    pub code: Code,
    pub payload_size: PayloadSize,
}

impl ResponseHeader {
    /// Read the header and check its code against `expected`.
    pub async fn read<R>(reader: &mut R, expected: Code) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let raw: [u8; HEADER_SIZE] = read_array(reader).await?;
        let header = Self {
            version: Version::decode([raw[0]]),
            code: Code::decode([raw[1], raw[2]]),
            payload_size: PayloadSize::decode([raw[3], raw[4], raw[5], raw[6]]),
        };
        debug!(
            version = %header.version,
            code = %header.code,
            payload_size = %header.payload_size,
            "Response header received"
        );

        if header.code == GENERAL_ERROR_CODE {
            return Err(ProtocolError::GeneralError);
        }
        if header.code != expected {
            return Err(ProtocolError::UnexpectedResponseCode {
                expected,
                received: header.code,
            });
        }
        Ok(header)
    }

    fn expect_payload(&self, expected: usize) -> Result<(), ProtocolError> {
        let expected = PayloadSize::fixed(expected);
        if self.payload_size != expected {
            return Err(ProtocolError::PayloadSizeMismatch {
                expected,
                received: self.payload_size,
            });
        }
        Ok(())
    }
}

/// Reply to a registration: the id the server assigned to us.
#[derive(Debug, Clone, Copy)]
pub struct RegisterResponse {
    pub header: ResponseHeader,
    pub client_id: ClientId,
}

impl RegisterResponse {
    pub async fn read<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let header = ResponseHeader::read(reader, REGISTER_CODE).await?;
        header.expect_payload(ClientId::SIZE)?;
        let client_id = ClientId::decode(read_array(reader).await?);
        Ok(Self { header, client_id })
    }
}

/// A peer as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub id: ClientId,
    pub username: Username,
}

/// Streaming reader over a client-list body.
#[derive(Debug)]
pub struct ClientListResponse<R> {
    reader: R,
    header: ResponseHeader,
    remaining: u32,
}

impl<R> ClientListResponse<R>
where
    R: AsyncRead + Unpin,
{
    /// Read the header and take ownership of the connection for the records that follow.
    pub async fn read(mut reader: R) -> Result<Self, ProtocolError> {
        let header = ResponseHeader::read(&mut reader, CLIENT_LIST_CODE).await?;
        let payload = header.payload_size.value() as usize;
        let count = payload / CLIENT_RECORD_SIZE;
        header.expect_payload(count * CLIENT_RECORD_SIZE)?;
        Ok(Self {
            reader,
            header,
            remaining: count as u32,
        })
    }

    pub fn header(&self) -> &ResponseHeader {
        &self.header
    }

    /// Records not yet handed to a callback.
    pub fn client_count(&self) -> u32 {
        self.remaining
    }

    /// Hand every remaining record to `process`, in arrival order. Records whose username
    /// is not valid UTF-8 are consumed and skipped. Returns the number of records handed over.
    pub async fn read_clients<F>(&mut self, mut process: F) -> Result<u32, ProtocolError>
    where
        F: FnMut(ClientRecord),
    {
        let mut read = 0;
        while self.remaining > 0 {
            let id = ClientId::decode(read_array(&mut self.reader).await?);
            let slot = read_array(&mut self.reader).await?;
            self.remaining -= 1;
            let Some(username) = Username::decode(slot) else {
                warn!(client = %id, "Skipping client with a non UTF-8 username");
                continue;
            };
            read += 1;
            process(ClientRecord { id, username });
        }
        Ok(read)
    }
}

/// Reply to a public key request.
#[derive(Debug, Clone, Copy)]
pub struct PublicKeyResponse {
    pub header: ResponseHeader,
    pub target_id: ClientId,
    pub public_key: PublicKeyBlob,
}

impl PublicKeyResponse {
    pub async fn read<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let header = ResponseHeader::read(reader, PUBLIC_KEY_CODE).await?;
        header.expect_payload(ClientId::SIZE + PublicKeyBlob::SIZE)?;
        let target_id = ClientId::decode(read_array(reader).await?);
        let public_key = PublicKeyBlob::decode(read_array(reader).await?);
        Ok(Self {
            header,
            target_id,
            public_key,
        })
    }
}

/// Acknowledgement of a sent message.
#[derive(Debug, Clone, Copy)]
pub struct MessageSentResponse {
    pub header: ResponseHeader,
    pub target_id: ClientId,
    pub message_id: MessageId,
}

impl MessageSentResponse {
    pub async fn read<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let header = ResponseHeader::read(reader, MESSAGE_SENT_CODE).await?;
        header.expect_payload(ClientId::SIZE + MessageId::SIZE)?;
        let target_id = ClientId::decode(read_array(reader).await?);
        let message_id = MessageId::decode(read_array(reader).await?);
        Ok(Self {
            header,
            target_id,
            message_id,
        })
    }
}

/// Streaming reader over a pending-messages body.
#[derive(Debug)]
pub struct PendingMessagesResponse<R> {
    reader: R,
    header: ResponseHeader,
    remaining: PayloadSize,
}

impl<R> PendingMessagesResponse<R>
where
    R: AsyncRead + Unpin,
{
    pub async fn read(mut reader: R) -> Result<Self, ProtocolError> {
        let header = ResponseHeader::read(&mut reader, PENDING_MESSAGES_CODE).await?;
        Ok(Self {
            reader,
            header,
            remaining: header.payload_size,
        })
    }

    pub fn header(&self) -> &ResponseHeader {
        &self.header
    }

    /// Whether any declared payload is left to parse.
    pub fn has_pending(&self) -> bool {
        self.remaining.value() > 0
    }

    /// Parse every record, streaming content into files from `store`, and hand each record
    /// to `process` as soon as it is complete.
    ///
    /// # Errors
    /// `ContentMismatch` when a record declares more content than the payload has left; no
    /// further records are read.
    pub async fn read_messages<F>(
        &mut self,
        store: &ContentStore,
        mut process: F,
    ) -> Result<usize, ProtocolError>
    where
        F: FnMut(PendingMessage),
    {
        let record_header = PayloadSize::fixed(MESSAGE_HEADER_SIZE);
        let mut count = 0;

        while self.remaining >= record_header {
            self.remaining -= record_header;

            let sender_id = ClientId::decode(read_array(&mut self.reader).await?);
            let id = MessageId::decode(read_array(&mut self.reader).await?);
            let kind = RawMessageType::decode(read_array(&mut self.reader).await?);
            let content_size = ContentSize::decode(read_array(&mut self.reader).await?);

            let content = if content_size.value() > 0 {
                if self.remaining.value() < content_size.value() {
                    return Err(ProtocolError::ContentMismatch {
                        content_size: content_size.value(),
                        remaining: self.remaining.value(),
                    });
                }
                self.remaining -= PayloadSize::new(content_size.value());

                let content = store.create(&format!("message_{id}"))?;
                self.stream_content(content.path(), content_size).await?;
                Some(content)
            } else {
                None
            };

            debug!(%sender_id, %id, kind = %kind, %content_size, "Pending message parsed");
            count += 1;
            process(PendingMessage {
                sender_id,
                id,
                kind,
                content,
            });
        }

        if self.has_pending() {
            warn!(
                leftover = %self.remaining,
                "Ignoring trailing bytes smaller than a message header"
            );
        }
        Ok(count)
    }

    async fn stream_content(
        &mut self,
        path: &std::path::Path,
        size: ContentSize,
    ) -> Result<(), ProtocolError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .await?;
        let mut block = [0u8; BLOCK_SIZE];
        let mut left = size.value() as usize;

        while left > 0 {
            let want = left.min(BLOCK_SIZE);
            let n = self.reader.read(&mut block[..want]).await?;
            if n == 0 {
                return Err(ProtocolError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            file.write_all(&block[..n]).await?;
            left -= n;
        }
        file.flush().await?;
        Ok(())
    }
}
