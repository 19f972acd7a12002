//! Peer registry: every known client, reachable by id and by username.
//!
//! Records are owned by a single map keyed by [`ClientId`]; the username index stores ids,
//! never references, so both lookups always land on the same record.

use std::collections::HashMap;

use crate::core::types::ClientId;
use crate::error::{KeyKind, SessionError};
use crate::utils::crypto::{PublicKey, SymmetricKey};

/// A known peer and the key material we hold for it.
#[derive(Debug, Clone)]
pub struct Client {
    id: ClientId,
    username: String,
    symmetric_key: Option<SymmetricKey>,
    public_key: Option<PublicKey>,
}

impl Client {
    pub fn new(id: ClientId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            symmetric_key: None,
            public_key: None,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn symmetric_key(&self) -> Result<&SymmetricKey, SessionError> {
        self.symmetric_key
            .as_ref()
            .ok_or(SessionError::MissingKey(KeyKind::Symmetric))
    }

    /// Replaces any previous key.
    pub fn set_symmetric_key(&mut self, key: SymmetricKey) {
        self.symmetric_key = Some(key);
    }

    pub fn public_key(&self) -> Result<&PublicKey, SessionError> {
        self.public_key
            .as_ref()
            .ok_or(SessionError::MissingKey(KeyKind::Public))
    }

    /// Replaces any previous key.
    pub fn set_public_key(&mut self, key: PublicKey) {
        self.public_key = Some(key);
    }
}

#[derive(Debug, Default)]
pub struct PeerRegistry {
    clients: HashMap<ClientId, Client>,
    by_username: HashMap<String, ClientId>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clear(&mut self) {
        self.clients.clear();
        self.by_username.clear();
    }

    /// Insert a peer, evicting any record that shares its id or its username.
    pub fn insert(&mut self, client: Client) {
        if let Some(old) = self.clients.remove(&client.id) {
            self.by_username.remove(&old.username);
        }
        if let Some(old_id) = self.by_username.remove(&client.username) {
            self.clients.remove(&old_id);
        }
        self.by_username.insert(client.username.clone(), client.id);
        self.clients.insert(client.id, client);
    }

    /// Discard every record and rebuild from `clients`.
    pub fn replace<I>(&mut self, clients: I)
    where
        I: IntoIterator<Item = Client>,
    {
        self.clear();
        for client in clients {
            self.insert(client);
        }
    }

    pub fn by_id(&self, id: &ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn by_id_mut(&mut self, id: &ClientId) -> Option<&mut Client> {
        self.clients.get_mut(id)
    }

    pub fn by_username(&self, username: &str) -> Option<&Client> {
        self.by_username
            .get(username)
            .and_then(|id| self.clients.get(id))
    }

    pub fn by_username_mut(&mut self, username: &str) -> Option<&mut Client> {
        let id = *self.by_username.get(username)?;
        self.clients.get_mut(&id)
    }

    /// Look a peer up by username, failing with `UnknownTarget`.
    pub fn resolve(&self, username: &str) -> Result<&Client, SessionError> {
        self.by_username(username)
            .ok_or_else(|| SessionError::UnknownTarget(username.to_string()))
    }

    pub fn resolve_mut(&mut self, username: &str) -> Result<&mut Client, SessionError> {
        self.by_username_mut(username)
            .ok_or_else(|| SessionError::UnknownTarget(username.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }
}
