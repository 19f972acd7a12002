//! Our own registered identity and where it is persisted.
//!
//! The default [`FileIdentityStore`] writes three lines:
//!
//! ```text
//! <username>
//! <client id, 32 hex characters>
//! <private key, base64 PKCS#8 DER>
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::types::{ClientId, Username};
use crate::error::{constants, Error, Result};
use crate::utils::crypto::PrivateKey;

/// The local node's identity. Present only once registered.
#[derive(Debug, Clone)]
pub struct MyInfo {
    username: String,
    client_id: ClientId,
    private_key: PrivateKey,
}

impl MyInfo {
    pub fn new(username: impl Into<String>, client_id: ClientId, private_key: PrivateKey) -> Self {
        Self {
            username: username.into(),
            client_id,
            private_key,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

/// Persistence for [`MyInfo`].
pub trait IdentityStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<MyInfo>>;

    fn save(&self, identity: &MyInfo) -> Result<()>;
}

/// Identity kept in a single text file.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn invalid(&self, what: &str) -> Error {
        Error::Identity(format!("{what} from {}", self.path.display()))
    }

    fn parse(&self, contents: &str) -> Result<MyInfo> {
        let mut lines = contents.lines();

        let username = lines
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| self.invalid(constants::ERR_IDENTITY_USERNAME))?;
        if Username::new(username).is_err() {
            return Err(Error::Identity(
                "the username in the info file is too long".to_string(),
            ));
        }

        let client_id = lines
            .next()
            .and_then(|line| ClientId::from_hex(line.trim()))
            .ok_or_else(|| self.invalid(constants::ERR_IDENTITY_CLIENT_ID))?;

        let private_key = lines
            .next()
            .and_then(|line| STANDARD.decode(line.trim()).ok())
            .and_then(|der| PrivateKey::import(&der).ok())
            .ok_or_else(|| self.invalid(constants::ERR_IDENTITY_PRIVATE_KEY))?;

        Ok(MyInfo::new(username, client_id, private_key))
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<MyInfo>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let identity = self.parse(&contents)?;
        debug!(path = %self.path.display(), username = identity.username(), "Identity loaded");
        Ok(Some(identity))
    }

    fn save(&self, identity: &MyInfo) -> Result<()> {
        let key = STANDARD.encode(identity.private_key.export()?);
        let contents = format!(
            "{}\n{}\n{}\n",
            identity.username,
            identity.client_id.to_hex(),
            key
        );
        fs::write(&self.path, contents)?;
        debug!(path = %self.path.display(), "Identity saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::utils::crypto::generate_key_pair;

    #[test]
    fn test_missing_file_means_unregistered() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("my.info"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("my.info"));
        let (public, private) = generate_key_pair().unwrap();
        let identity = MyInfo::new("alice", ClientId::new([0x5A; 16]), private);
        store.save(&identity).unwrap();

        let loaded = store.load().unwrap().expect("identity");
        assert_eq!(loaded.username(), "alice");
        assert_eq!(loaded.client_id(), identity.client_id());
        assert_eq!(loaded.private_key().public_key(), public);

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.lines().nth(1), Some("5a".repeat(16).as_str()));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my.info");
        let store = FileIdentityStore::new(&path);

        fs::write(&path, "alice\nnot-hex\nAAAA\n").unwrap();
        assert!(matches!(store.load(), Err(Error::Identity(_))));

        fs::write(&path, format!("alice\n{}\n!!!\n", "00".repeat(16))).unwrap();
        assert!(matches!(store.load(), Err(Error::Identity(_))));

        fs::write(&path, "").unwrap();
        assert!(matches!(store.load(), Err(Error::Identity(_))));
    }
}
