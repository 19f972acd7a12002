// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::content::{Content, ContentStore};
use crate::core::types::{ClientId, MessageId, RawMessageType};
use crate::error::{constants, ProtocolError};
use crate::protocol::dispatcher::{Dispatcher, UNKNOWN_SENDER};
use crate::protocol::message::{MessageType, PendingMessage, ReceivedMessage};
use crate::protocol::response::{PendingMessagesResponse, MESSAGE_HEADER_SIZE};
use crate::session::registry::{Client, PeerRegistry};
use crate::utils::crypto::{generate_key_pair, Encryptor, PrivateKey, PublicKey, SymmetricKey};

const BOB: ClientId = ClientId::new([0xB0; 16]);

struct Fixture {
    _dir: tempfile::TempDir,
    store: ContentStore,
    registry: PeerRegistry,
    public: PublicKey,
    private: PrivateKey,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();
        let mut registry = PeerRegistry::new();
        registry.insert(Client::new(BOB, "bob"));
        let (public, private) = generate_key_pair().unwrap();
        Self {
            _dir: dir,
            store,
            registry,
            public,
            private,
        }
    }

    fn sealed(&self, key: &dyn Encryptor, plain: &[u8]) -> Content {
        let mut out = Vec::new();
        key.encrypt(&mut &plain[..], &mut out).unwrap();
        self.store.create_with("sealed", &out).unwrap()
    }

    fn dispatch(&mut self, message: PendingMessage) -> ReceivedMessage {
        Dispatcher::new(&mut self.registry, &self.private, &self.store).dispatch(message)
    }
}

fn pending(sender: ClientId, kind: u8, content: Option<Content>) -> PendingMessage {
    PendingMessage {
        sender_id: sender,
        id: MessageId::new(7),
        kind: RawMessageType::new(kind),
        content,
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

#[test]
fn test_unknown_sender_reported_not_dropped() {
    let mut fx = Fixture::new();
    let received = fx.dispatch(pending(ClientId::new([0xEE; 16]), 3, None));
    match received {
        ReceivedMessage::Error { from, reason } => {
            assert_eq!(from, UNKNOWN_SENDER);
            assert_eq!(reason, constants::ERR_UNKNOWN_SENDER);
        }
        other => panic!("expected an error, got {other:?}"),
    }
}

#[test]
fn test_symmetric_key_request_needs_no_content() {
    let mut fx = Fixture::new();
    let received = fx.dispatch(pending(BOB, MessageType::SymmetricKeyRequest as u8, None));
    assert!(matches!(received, ReceivedMessage::SymmetricKeyRequest { from } if from == "bob"));
    assert!(fx.registry.by_id(&BOB).unwrap().symmetric_key().is_err());
}

#[test]
fn test_received_symmetric_key_is_stored() {
    let mut fx = Fixture::new();
    let key = SymmetricKey::generate().unwrap();
    let content = fx.sealed(&fx.public, key.as_bytes());

    let received = fx.dispatch(pending(BOB, MessageType::SymmetricKey as u8, Some(content)));
    assert!(matches!(received, ReceivedMessage::SymmetricKeyReceived { from } if from == "bob"));
    assert_eq!(fx.registry.by_id(&BOB).unwrap().symmetric_key().unwrap(), &key);
}

#[test]
fn test_symmetric_key_of_wrong_length_is_undecryptable() {
    let mut fx = Fixture::new();
    let content = fx.sealed(&fx.public, &[1u8; 15]);

    let received = fx.dispatch(pending(BOB, MessageType::SymmetricKey as u8, Some(content)));
    assert!(matches!(received, ReceivedMessage::Undecryptable { .. }));
    assert!(fx.registry.by_id(&BOB).unwrap().symmetric_key().is_err());
}

#[test]
fn test_text_decrypted_with_sender_key() {
    let mut fx = Fixture::new();
    let key = SymmetricKey::generate().unwrap();
    fx.registry.by_id_mut(&BOB).unwrap().set_symmetric_key(key.clone());
    let content = fx.sealed(&key, b"hello");

    let received = fx.dispatch(pending(BOB, MessageType::Text as u8, Some(content)));
    match received {
        ReceivedMessage::Text { from, text } => {
            assert_eq!(from, "bob");
            assert_eq!(text, "hello");
        }
        other => panic!("expected text, got {other:?}"),
    }
}

#[test]
fn test_text_without_key_is_undecryptable() {
    let mut fx = Fixture::new();
    let key = SymmetricKey::generate().unwrap();
    let content = fx.sealed(&key, b"hello");

    let received = fx.dispatch(pending(BOB, MessageType::Text as u8, Some(content)));
    assert!(matches!(received, ReceivedMessage::Undecryptable { from } if from == "bob"));
}

#[test]
fn test_garbage_ciphertext_is_undecryptable() {
    let mut fx = Fixture::new();
    fx.registry
        .by_id_mut(&BOB)
        .unwrap()
        .set_symmetric_key(SymmetricKey::generate().unwrap());
    let content = fx.store.create_with("garbage", &[0xAA; 20]).unwrap();

    let received = fx.dispatch(pending(BOB, MessageType::Text as u8, Some(content)));
    assert!(matches!(received, ReceivedMessage::Undecryptable { .. }));
}

#[test]
fn test_file_is_decrypted_and_retained() {
    let mut fx = Fixture::new();
    let key = SymmetricKey::generate().unwrap();
    fx.registry.by_id_mut(&BOB).unwrap().set_symmetric_key(key.clone());
    let body: Vec<u8> = (0..3000u32).map(|i| (i % 256) as u8).collect();
    let content = fx.sealed(&key, &body);

    let received = fx.dispatch(pending(BOB, MessageType::File as u8, Some(content)));
    let ReceivedMessage::File { content, .. } = received else {
        panic!("expected a file");
    };
    let path = content.path().to_path_buf();
    assert!(path.to_string_lossy().ends_with(".decrypted"));
    drop(content);
    assert_eq!(std::fs::read(&path).unwrap(), body);
}

#[test]
fn test_unknown_type_is_undecryptable() {
    let mut fx = Fixture::new();
    let content = fx.store.create_with("odd", b"x").unwrap();
    let received = fx.dispatch(pending(BOB, 42, Some(content)));
    assert!(matches!(received, ReceivedMessage::Undecryptable { .. }));
}

#[test]
fn test_missing_content_is_an_error() {
    let mut fx = Fixture::new();
    for kind in [MessageType::SymmetricKey, MessageType::Text, MessageType::File] {
        let received = fx.dispatch(pending(BOB, kind as u8, None));
        assert!(
            matches!(&received, ReceivedMessage::Error { reason, .. } if reason == constants::ERR_MISSING_CONTENT),
            "{kind:?}: {received:?}"
        );
    }
}

// ============================================================================
// PENDING MESSAGES PARSING
// ============================================================================

fn pending_response(records: &[(u8, u32, u8, &[u8], Option<u32>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (sender, id, kind, content, declared) in records {
        body.extend_from_slice(&[*sender; 16]);
        body.extend_from_slice(&id.to_le_bytes());
        body.push(*kind);
        let size = declared.unwrap_or(content.len() as u32);
        body.extend_from_slice(&size.to_le_bytes());
        body.extend_from_slice(content);
    }
    let mut out = vec![2];
    out.extend_from_slice(&2104u16.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

#[tokio::test]
async fn test_empty_records_each_reach_the_callback() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::new(dir.path()).unwrap();
    let records: Vec<_> = (0..5u32).map(|i| (1u8, i, 1u8, &[] as &[u8], None)).collect();
    let bytes = pending_response(&records);

    let mut response = PendingMessagesResponse::read(&bytes[..]).await.unwrap();
    assert!(response.has_pending());
    let mut seen = Vec::new();
    let count = response
        .read_messages(&store, |message| {
            assert!(message.content.is_none());
            seen.push(message.id.value());
        })
        .await
        .unwrap();

    assert_eq!(count, 5);
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert!(!response.has_pending());
}

#[tokio::test]
async fn test_content_streamed_across_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::new(dir.path()).unwrap();
    let big: Vec<u8> = (0..2500u32).map(|i| (i % 253) as u8).collect();
    let bytes = pending_response(&[(1, 10, 3, &big[..], None), (2, 11, 3, &b"tail"[..], None)]);

    let mut response = PendingMessagesResponse::read(&bytes[..]).await.unwrap();
    let mut bodies = Vec::new();
    response
        .read_messages(&store, |message| {
            let content = message.content.expect("content");
            assert!(content
                .path()
                .to_string_lossy()
                .ends_with(&format!("message_{}", message.id)));
            bodies.push(std::fs::read(content.path()).unwrap());
        })
        .await
        .unwrap();

    assert_eq!(bodies, vec![big, b"tail".to_vec()]);
}

#[tokio::test]
async fn test_oversized_content_stops_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::new(dir.path()).unwrap();
    let bytes = pending_response(&[
        (1, 1, 3, &b""[..], None),
        (1, 2, 3, &b"abc"[..], Some(1000)),
        (1, 3, 3, &b""[..], None),
    ]);

    let mut response = PendingMessagesResponse::read(&bytes[..]).await.unwrap();
    let mut seen = 0;
    let err = response
        .read_messages(&store, |_| seen += 1)
        .await
        .unwrap_err();

    assert_eq!(seen, 1);
    let remaining = (3 + MESSAGE_HEADER_SIZE) as u32;
    assert!(matches!(
        err,
        ProtocolError::ContentMismatch { content_size: 1000, remaining: r } if r == remaining
    ));
}

#[tokio::test]
async fn test_trailing_bytes_shorter_than_a_record_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::new(dir.path()).unwrap();
    let mut bytes = pending_response(&[(1, 1, 1, &b""[..], None)]);
    // Declare and append three extra bytes.
    let declared = (MESSAGE_HEADER_SIZE + 3) as u32;
    bytes[3..7].copy_from_slice(&declared.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0]);

    let mut response = PendingMessagesResponse::read(&bytes[..]).await.unwrap();
    let count = response.read_messages(&store, |_| {}).await.unwrap();
    assert_eq!(count, 1);
    assert!(response.has_pending());
}
