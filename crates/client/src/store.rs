//! Credential store.
//!
//! Holds the current access credential in a single slot. Reads and writes are
//! synchronous: once `set` or `clear` returns, every later `get` observes it.
//!
//! Two implementations are provided:
//!
//! - [`MemoryCredentialStore`] - lives as long as the process
//! - [`FileCredentialStore`] - one file per API origin and slot key, so the
//!   credential survives a restart the way browser storage survives a reload
//!
//! [`SessionCookieFile`] keeps the session cookie next to the credential for
//! front-ends that restart between calls.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use stockwatch_core::Credential;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Errors raised by a credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A writer panicked while holding the slot.
    #[error("credential slot lock poisoned")]
    Poisoned,

    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

/// A single-slot store for the access credential.
///
/// Injected into the clients that need it rather than reached through a
/// global, so the session machinery can be tested in isolation.
pub trait CredentialStore: Send + Sync {
    /// Current credential, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the slot cannot be read.
    fn get(&self) -> Result<Option<Credential>, StoreError>;

    /// Replace the stored credential.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the slot cannot be written.
    fn set(&self, credential: Credential) -> Result<(), StoreError>;

    /// Remove the stored credential. Clearing an empty slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the slot cannot be written.
    fn clear(&self) -> Result<(), StoreError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local credential slot.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `credential`.
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: RwLock::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<Credential>, StoreError> {
        Ok(read(&self.slot)?.clone())
    }

    fn set(&self, credential: Credential) -> Result<(), StoreError> {
        *write(&self.slot)? = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *write(&self.slot)? = None;
        Ok(())
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// Credential slot persisted to `<data_dir>/<origin>/<key>`.
///
/// The file is written through on every `set`/`clear` while the in-memory
/// copy is locked, so a `get` never observes a value the file does not hold.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cache: RwLock<Option<Credential>>,
}

impl FileCredentialStore {
    /// Open the slot for `key` under the directory reserved for `origin`.
    ///
    /// Loads any credential persisted by a previous run.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if an existing slot file cannot be read.
    #[instrument(skip(data_dir, origin), fields(origin = %origin))]
    pub fn open(data_dir: &Path, origin: &Url, key: &str) -> Result<Self, StoreError> {
        let path = data_dir.join(origin_dir_name(origin)).join(key);

        let cached = match fs::read_to_string(&path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| Credential::new(token))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), restored = cached.is_some(), "Opened credential store");

        Ok(Self {
            path,
            cache: RwLock::new(cached),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<Credential>, StoreError> {
        Ok(read(&self.cache)?.clone())
    }

    fn set(&self, credential: Credential) -> Result<(), StoreError> {
        let mut slot = write(&self.cache)?;
        write_private(&self.path, credential.expose())?;
        *slot = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut slot = write(&self.cache)?;
        remove_if_present(&self.path)?;
        *slot = None;
        Ok(())
    }
}

// =============================================================================
// Session cookie file
// =============================================================================

/// File name of the cookie slot. Credential keys may not start with a dot,
/// so it never shares a file with a credential slot.
const SESSION_COOKIE_FILE: &str = ".session_cookies";

/// `Cookie` header for the API origin, persisted to
/// `<data_dir>/<origin>/.session_cookies`.
#[derive(Debug, Clone)]
pub struct SessionCookieFile {
    path: PathBuf,
}

impl SessionCookieFile {
    #[must_use]
    pub fn new(data_dir: &Path, origin: &Url) -> Self {
        Self {
            path: data_dir.join(origin_dir_name(origin)).join(SESSION_COOKIE_FILE),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved header, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if an existing file cannot be read.
    pub fn load(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let header = contents.trim();
                Ok((!header.is_empty()).then(|| header.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the saved header.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be written.
    pub fn save(&self, header: &str) -> Result<(), StoreError> {
        write_private(&self.path, header)
    }

    /// Remove the saved header. Clearing a missing file succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), StoreError> {
        remove_if_present(&self.path)
    }
}

/// Write `contents` owner-only, through a sibling file and a rename so a crash
/// never leaves half a value behind.
fn write_private(path: &Path, contents: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut file = open_private(&tmp)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Directory name for an origin: `<scheme>_<host>_<port>`.
fn origin_dir_name(origin: &Url) -> String {
    let host: String = origin
        .host_str()
        .unwrap_or("local")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let port = origin.port_or_known_default().unwrap_or(0);
    format!("{}_{host}_{port}", origin.scheme())
}

fn read(lock: &RwLock<Option<Credential>>) -> Result<RwLockReadGuard<'_, Option<Credential>>, StoreError> {
    lock.read().map_err(|_| StoreError::Poisoned)
}

fn write(lock: &RwLock<Option<Credential>>) -> Result<RwLockWriteGuard<'_, Option<Credential>>, StoreError> {
    lock.write().map_err(|_| StoreError::Poisoned)
}
