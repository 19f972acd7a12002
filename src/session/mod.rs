//! # Session Engine
//!
//! A [`Session`] is the client's whole state: who we are, who we know and how to reach the
//! server. Every operation is one request/response exchange over a fresh connection that is
//! closed when the call returns, on success and on error alike.
//!
//! ## States
//! - **Unauthenticated**: no [`MyInfo`]. Only [`Session::register`] is allowed; everything
//!   else fails with [`SessionError::Unauthorized`].
//! - **Authenticated**: [`MyInfo`] is set, either loaded from the identity store at startup
//!   or produced by a successful registration. It is never replaced afterwards.
//!
//! Preconditions (registration, known target, key material, readable file, encodable content
//! size) are all checked before a connection is opened, so a failed precondition never
//! writes a byte to the server.
//!
//! ## Example
//! ```rust,no_run
//! use messageu_client::config::ClientConfig;
//! use messageu_client::session::Session;
//!
//! # async fn run() -> messageu_client::error::Result<()> {
//! let config = ClientConfig::default();
//! let mut session = Session::new(&config)?;
//! if !session.is_registered() {
//!     session.register("alice").await?;
//! }
//! session.update_client_list(|name| println!("{name}")).await?;
//! session.retrieve_pending_messages(|message| println!("{message}")).await?;
//! # Ok(())
//! # }
//! ```

pub mod endpoint;
pub mod identity;
pub mod registry;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::core::content::{Content, ContentStore};
use crate::core::types::{ClientId, MessageId, Username};
use crate::error::{ProtocolError, Result, SessionError};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::{MessageType, ReceivedMessage};
use crate::protocol::request::Request;
use crate::protocol::response::{
    ClientListResponse, MessageSentResponse, PendingMessagesResponse, PublicKeyResponse,
    RegisterResponse,
};
use crate::utils::crypto::{generate_key_pair, Encryptor, PublicKey, SymmetricKey};
use crate::utils::metrics::Metrics;

pub use endpoint::Endpoint;
pub use identity::{FileIdentityStore, IdentityStore, MyInfo};
pub use registry::{Client, PeerRegistry};

/// Encrypt everything `input` yields into a new content file.
fn seal(
    store: &ContentStore,
    key: &dyn Encryptor,
    input: &mut dyn Read,
    name: &str,
) -> Result<Content> {
    let sealed = store.create(name)?;
    let mut output = BufWriter::new(sealed.writer()?);
    key.encrypt(input, &mut output)?;
    output.flush()?;
    Ok(sealed)
}

/// Client session against one server.
pub struct Session<S = FileIdentityStore> {
    endpoint: Endpoint,
    identity: Option<MyInfo>,
    registry: PeerRegistry,
    content: ContentStore,
    store: S,
    metrics: Metrics,
}

impl Session<FileIdentityStore> {
    /// Build a session from configuration, loading any saved identity from
    /// `storage.identity_file`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let store = FileIdentityStore::new(&config.storage.identity_file);
        Self::with_store(config, store)
    }
}

impl<S: IdentityStore> Session<S> {
    /// Build a session that persists its identity through `store`.
    ///
    /// An identity that fails to load is logged and the session starts unregistered.
    pub fn with_store(config: &ClientConfig, store: S) -> Result<Self> {
        let content = ContentStore::new(&config.storage.content_dir)?;
        let identity = match store.load() {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Failed to load the saved identity, starting unregistered");
                None
            }
        };
        if let Some(identity) = &identity {
            info!(username = identity.username(), id = %identity.client_id(), "Identity loaded");
        }

        Ok(Self {
            endpoint: Endpoint::from_config(&config.server),
            identity,
            registry: PeerRegistry::new(),
            content,
            store,
            metrics: Metrics::new(),
        })
    }

    pub fn is_registered(&self) -> bool {
        self.identity.is_some()
    }

    pub fn my_info(&self) -> Option<&MyInfo> {
        self.identity.as_ref()
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoint
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.content
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn me(&self) -> Result<&MyInfo> {
        Ok(self.identity.as_ref().ok_or(SessionError::Unauthorized)?)
    }

    /// Record and convert a protocol failure.
    fn track<T>(&self, result: std::result::Result<T, ProtocolError>) -> Result<T> {
        result.map_err(|e| {
            self.metrics.protocol_error();
            warn!(error = %e, "Protocol error");
            e.into()
        })
    }

    /// Connect and write `request`. The returned stream is ready for the response.
    async fn open_connection(&mut self, request: &Request) -> Result<TcpStream> {
        let mut stream = match self.endpoint.connect().await {
            Ok(stream) => stream,
            Err(e) => {
                self.metrics.connection_error();
                return Err(e);
            }
        };
        self.metrics.connection_established();

        let written = self.track(request.write_to(&mut stream).await)?;
        self.metrics.request_sent(written);
        Ok(stream)
    }

    /// Register `username` with the server under a freshly generated key pair.
    ///
    /// The identity is adopted as soon as the server assigns an id, then saved to the
    /// identity store.
    #[instrument(skip(self))]
    pub async fn register(&mut self, username: &str) -> Result<ClientId> {
        if self.identity.is_some() {
            return Err(SessionError::AlreadyRegistered.into());
        }
        let name = Username::new(username).map_err(SessionError::UsernameTooLong)?;

        let (public_key, private_key) = generate_key_pair()?;
        let request = Request::register(name, public_key.export()?);

        let mut stream = self.open_connection(&request).await?;
        let response = self.track(RegisterResponse::read(&mut stream).await)?;
        let client_id = response.client_id;

        let identity = MyInfo::new(username, client_id, private_key);
        let saved = self.store.save(&identity);
        self.identity = Some(identity);
        saved?;

        info!(id = %client_id, "Registered");
        Ok(client_id)
    }

    /// Replace the peer registry with the server's current client list, calling
    /// `on_client` with each username in arrival order.
    #[instrument(skip(self, on_client))]
    pub async fn update_client_list<F>(&mut self, mut on_client: F) -> Result<u32>
    where
        F: FnMut(&str),
    {
        let sender = self.me()?.client_id();

        let stream = self.open_connection(&Request::client_list(sender)).await?;
        let mut response = self.track(ClientListResponse::read(stream).await)?;

        let mut clients = Vec::with_capacity(response.client_count() as usize);
        let read = response
            .read_clients(|record| {
                on_client(record.username.as_str());
                clients.push(Client::new(record.id, record.username.into_string()));
            })
            .await;
        let count = self.track(read)?;

        self.registry.replace(clients);
        debug!(count, "Client list updated");
        Ok(count)
    }

    /// Fetch and store the public key of `username`.
    #[instrument(skip(self))]
    pub async fn get_public_key(&mut self, username: &str) -> Result<()> {
        let sender = self.me()?.client_id();
        let target = self.registry.resolve(username)?.id();

        let mut stream = self
            .open_connection(&Request::get_public_key(sender, target))
            .await?;
        let response = self.track(PublicKeyResponse::read(&mut stream).await)?;
        if response.target_id != target {
            // Never store a key under a client we did not ask about.
            return self.track(Err(ProtocolError::TargetMismatch {
                expected: target,
                received: response.target_id,
            }));
        }

        let key = PublicKey::import(&response.public_key)?;
        self.registry.resolve_mut(username)?.set_public_key(key);
        Ok(())
    }

    /// Fetch every pending message, decrypt what can be decrypted and hand one
    /// [`ReceivedMessage`] per record to `on_message`.
    #[instrument(skip(self, on_message))]
    pub async fn retrieve_pending_messages<F>(&mut self, mut on_message: F) -> Result<usize>
    where
        F: FnMut(ReceivedMessage),
    {
        let sender = self.me()?.client_id();

        let stream = self
            .open_connection(&Request::retrieve_pending_messages(sender))
            .await?;
        let mut response = self.track(PendingMessagesResponse::read(stream).await)?;

        let read = {
            let Self {
                identity,
                registry,
                content,
                metrics,
                ..
            } = &mut *self;
            let private_key = identity
                .as_ref()
                .ok_or(SessionError::Unauthorized)?
                .private_key();
            let mut dispatcher = Dispatcher::new(registry, private_key, content);

            response
                .read_messages(content, |pending| {
                    let size = pending
                        .content
                        .as_ref()
                        .and_then(|content| content.len().ok())
                        .unwrap_or(0);
                    metrics.message_received(size);

                    let received = dispatcher.dispatch(pending);
                    if matches!(received, ReceivedMessage::Undecryptable { .. }) {
                        metrics.undecryptable_message();
                    }
                    on_message(received);
                })
                .await
        };
        let count = self.track(read)?;
        debug!(count, "Pending messages retrieved");
        Ok(count)
    }

    /// Encrypt `text` with the peer's symmetric key and send it.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send_message(&mut self, username: &str, text: &str) -> Result<MessageId> {
        self.me()?;
        let client = self.registry.resolve(username)?;
        let target = client.id();
        let sealed = seal(
            &self.content,
            client.symmetric_key()?,
            &mut text.as_bytes(),
            "new_message",
        )?;
        self.send(target, MessageType::Text, Some(sealed)).await
    }

    /// Encrypt the file at `path` with the peer's symmetric key and send it.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn send_file(&mut self, username: &str, path: impl AsRef<Path>) -> Result<MessageId> {
        let path = path.as_ref();
        self.me()?;
        let client = self.registry.resolve(username)?;
        let target = client.id();
        let key = client.symmetric_key()?;

        let file = File::open(path)
            .ok()
            .filter(|file| file.metadata().map(|m| m.is_file()).unwrap_or(false))
            .ok_or_else(|| SessionError::UnknownFilePath(path.to_path_buf()))?;
        let sealed = seal(
            &self.content,
            key,
            &mut BufReader::new(file),
            "encrypted_file",
        )?;
        self.send(target, MessageType::File, Some(sealed)).await
    }

    /// Ask the peer to send us a symmetric key.
    #[instrument(skip(self))]
    pub async fn request_symmetric_key(&mut self, username: &str) -> Result<MessageId> {
        self.me()?;
        let target = self.registry.resolve(username)?.id();
        self.send(target, MessageType::SymmetricKeyRequest, None).await
    }

    /// Generate a fresh symmetric key, send it encrypted with the peer's public key, and
    /// store it for the peer once the server accepts the message.
    #[instrument(skip(self))]
    pub async fn send_symmetric_key(&mut self, username: &str) -> Result<MessageId> {
        self.me()?;
        let client = self.registry.resolve(username)?;
        let target = client.id();
        let public_key = client.public_key()?;

        let key = SymmetricKey::generate()?;
        let sealed = seal(
            &self.content,
            public_key,
            &mut &key.as_bytes()[..],
            "symmetric_key",
        )?;

        let message_id = self
            .send(target, MessageType::SymmetricKey, Some(sealed))
            .await?;
        if let Some(client) = self.registry.by_id_mut(&target) {
            client.set_symmetric_key(key);
        }
        Ok(message_id)
    }

    async fn send(
        &mut self,
        target: ClientId,
        kind: MessageType,
        content: Option<Content>,
    ) -> Result<MessageId> {
        let sender = self.me()?.client_id();
        let request = self.track(Request::send_message(sender, target, kind, content))?;

        let mut stream = self.open_connection(&request).await?;
        let response = self.track(MessageSentResponse::read(&mut stream).await)?;
        if response.target_id != target {
            warn!(expected = %target, received = %response.target_id, "Message sent to another client");
        }
        debug!(id = %response.message_id, kind = ?kind, "Message sent");
        Ok(response.message_id)
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("identity", &self.identity)
            .field("peers", &self.registry.len())
            .finish_non_exhaustive()
    }
}
