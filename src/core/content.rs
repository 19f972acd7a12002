//! # Message Content
//!
//! Message bodies can be arbitrarily large, so they never live in memory as a whole. A
//! [`Content`] is a shared handle to a file created by a [`ContentStore`]; cloning the handle
//! shares the same file, and the file is removed once the last handle is dropped unless it
//! was [retained](Content::retain).
//!
//! ```rust,no_run
//! use messageu_client::core::content::ContentStore;
//! use std::io::Write;
//!
//! # fn main() -> std::io::Result<()> {
//! let store = ContentStore::new(std::env::temp_dir().join("MessageU"))?;
//! let content = store.create("new_message")?;
//! content.writer()?.write_all(b"hello")?;
//! assert_eq!(content.len()?, 5);
//! # Ok(())
//! # }
//! ```

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Creates content files under a single directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    /// Use `dir` as the backing directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new, empty content file. `name` becomes the suffix of a unique file name.
    pub fn create(&self, name: &str) -> io::Result<Content> {
        let file = tempfile::Builder::new()
            .prefix("")
            .rand_bytes(8)
            .suffix(&format!("_{name}"))
            .tempfile_in(&self.dir)?;
        // The file outlives the builder; deletion is driven by the Content handle.
        let (_, path) = file.keep().map_err(|e| e.error)?;
        debug!(path = %path.display(), "Created content file");
        Ok(Content {
            inner: Arc::new(ContentFile {
                path,
                retained: AtomicBool::new(false),
            }),
        })
    }

    /// Create a content file holding `bytes`.
    pub fn create_with(&self, name: &str, bytes: &[u8]) -> io::Result<Content> {
        use std::io::Write;

        let content = self.create(name)?;
        content.writer()?.write_all(bytes)?;
        Ok(content)
    }
}

#[derive(Debug)]
struct ContentFile {
    path: PathBuf,
    retained: AtomicBool,
}

impl Drop for ContentFile {
    fn drop(&mut self) {
        let keep = self.retained.load(Ordering::Relaxed)
            && fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false);
        if keep {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(error = %e, path = %self.path.display(), "Failed to remove content file");
            }
        }
    }
}

/// Shared handle to a content file.
#[derive(Debug, Clone)]
pub struct Content {
    inner: Arc<ContentFile>,
}

impl Content {
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Current length of the content in bytes.
    pub fn len(&self) -> io::Result<u64> {
        Ok(fs::metadata(self.path())?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Open the content for reading from the start.
    pub fn reader(&self) -> io::Result<File> {
        File::open(self.path())
    }

    /// Open the content for writing, discarding what it held before.
    pub fn writer(&self) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.path())
    }

    /// Keep the file on disk after the last handle is dropped. Empty files are still removed.
    pub fn retain(&self) {
        self.inner.retained.store(true, Ordering::Relaxed);
    }

    /// Number of live handles sharing this content.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}
