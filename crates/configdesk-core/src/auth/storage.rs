//! Persistence backends for the session slot.
//!
//! Every backend holds a single text value under [`SESSION_KEY`]. The
//! contents are opaque here; `SessionStore` owns the serialization format.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use keyring::Entry;
use parking_lot::Mutex;

/// Key under which the serialized session record is stored
pub const SESSION_KEY: &str = "currentUser";

/// Keyring service name for the keyring backend
const SERVICE_NAME: &str = "configdesk";

/// A key-value slot holding the serialized session.
pub trait SessionStorage: Send + Sync {
    /// Read the stored value, `Ok(None)` if the key is absent
    fn read(&self) -> Result<Option<String>>;

    /// Replace the stored value
    fn write(&self, value: &str) -> Result<()>;

    /// Remove the stored value. Removing an absent key is not an error.
    fn remove(&self) -> Result<()>;
}

/// Stores the session as `<dir>/currentUser.json`.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", SESSION_KEY))
    }
}

impl SessionStorage for FileStorage {
    fn read(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        Ok(Some(contents))
    }

    fn write(&self, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create session directory {}", self.dir.display()))?;
        std::fs::write(self.path(), value).context("Failed to write session file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Stores the session in the OS keychain.
pub struct KeyringStorage {
    entry: Entry,
}

impl KeyringStorage {
    pub fn new() -> Result<Self> {
        let entry = Entry::new(SERVICE_NAME, SESSION_KEY).context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }
}

impl SessionStorage for KeyringStorage {
    fn read(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read session from keychain"),
        }
    }

    fn write(&self, value: &str) -> Result<()> {
        self.entry
            .set_password(value)
            .context("Failed to store session in keychain")
    }

    fn remove(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}

/// Process-local storage. Clones share the same slot, which lets tests
/// simulate a restart by opening a second store over a clone.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with raw contents
    pub fn with_contents(value: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(value.to_string()))),
        }
    }
}

impl SessionStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.slot.lock().clone())
    }

    fn write(&self, value: &str) -> Result<()> {
        *self.slot.lock() = Some(value.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}
