//! Token store adapters.
//!
//! [`FileTokenStore`] keeps the session in a JSON file inside a
//! capability-scoped directory and replaces it atomically (temp file plus
//! rename). [`MemoryTokenStore`] keeps it for the lifetime of the process.

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use cap_std::ambient_authority;
use cap_std::fs::{Dir, OpenOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::SessionTokens;
use crate::domain::ports::{TokenStore, TokenStoreError};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize, Deserialize)]
struct StoredTokens {
    access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh: Option<String>,
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<SessionTokens>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<SessionTokens>, TokenStoreError> {
        Ok(self
            .tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store(&self, tokens: &SessionTokens) -> Result<(), TokenStoreError> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Token store persisting the session as JSON in one file.
pub struct FileTokenStore {
    dir: Dir,
    file_name: String,
}

impl FileTokenStore {
    /// Open (creating if needed) the directory holding `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreError::Io`] when `path` has no file name or the
    /// parent directory cannot be created or opened.
    pub fn open(path: &Path) -> Result<Self, TokenStoreError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                TokenStoreError::io(format!(
                    "token path {} must name a UTF-8 file",
                    path.display()
                ))
            })?
            .to_owned();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        Dir::create_ambient_dir_all(parent, ambient_authority())
            .and_then(|()| Dir::open_ambient_dir(parent, ambient_authority()))
            .map(|dir| Self { dir, file_name })
            .map_err(|error| {
                TokenStoreError::io(format!("cannot open {}: {error}", parent.display()))
            })
    }

    fn write_atomic(&self, contents: &str) -> io::Result<()> {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(".{}.tmp.{}.{}", self.file_name, std::process::id(), counter);

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        let written = self
            .dir
            .open_with(&tmp_name, &options)
            .and_then(|mut file| {
                file.write_all(contents.as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| self.dir.rename(&tmp_name, &self.dir, &self.file_name));

        if written.is_err() {
            // Best-effort cleanup; the original error is what matters.
            drop(self.dir.remove_file(&tmp_name));
        }
        written
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<SessionTokens>, TokenStoreError> {
        let contents = match self.dir.read_to_string(&self.file_name) {
            Ok(contents) => Zeroizing::new(contents),
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(TokenStoreError::io(format!(
                    "cannot read {}: {error}",
                    self.file_name
                )));
            }
        };

        let stored: StoredTokens = serde_json::from_str(&contents).map_err(|error| {
            TokenStoreError::corrupt(format!("{} is not valid JSON: {error}", self.file_name))
        })?;
        if stored.access.is_empty() && stored.refresh.is_none() {
            return Err(TokenStoreError::corrupt(format!(
                "{} holds no tokens",
                self.file_name
            )));
        }
        debug!(file = %self.file_name, "loaded stored session");
        Ok(Some(SessionTokens::new(stored.access, stored.refresh)))
    }

    fn store(&self, tokens: &SessionTokens) -> Result<(), TokenStoreError> {
        let stored = StoredTokens {
            access: tokens.access().to_owned(),
            refresh: tokens.refresh().map(str::to_owned),
        };
        let contents = serde_json::to_string(&stored)
            .map(Zeroizing::new)
            .map_err(|error| TokenStoreError::io(format!("cannot encode tokens: {error}")))?;

        self.write_atomic(&contents)
            .map_err(|error| TokenStoreError::io(format!("cannot write {}: {error}", self.file_name)))
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match self.dir.remove_file(&self.file_name) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(TokenStoreError::io(format!(
                "cannot remove {}: {error}",
                self.file_name
            ))),
        }
    }
}
