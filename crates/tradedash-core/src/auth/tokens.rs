//! Persistence of the access/refresh token pair.
//!
//! Every store keeps the two tokens together: a pair is written in one go and
//! a store holding only one of the keys reports no pair at all.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Storage key for the short-lived bearer credential
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the renewal credential
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenPair { .. }")
    }
}

pub trait TokenStore: Send + Sync {
    /// The stored pair, or `None` unless both keys are present
    fn load(&self) -> Result<Option<TokenPair>>;

    fn save(&self, pair: &TokenPair) -> Result<()>;

    /// Remove both keys. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;

    fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|pair| pair.refresh_token))
    }

    fn access_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|pair| pair.access_token))
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            pair: Mutex::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.pair.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        *self.pair.lock().unwrap_or_else(|e| e.into_inner()) = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.pair.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// On-disk layout of `session.json`. Keys are optional so a hand-edited or
/// half-written file is read as "no session" rather than an error.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    access_token: Option<String>,
    refresh_token: Option<String>,
    saved_at: Option<DateTime<Utc>>,
}

pub struct FileTokenStore {
    cache_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    pub fn path(&self) -> PathBuf {
        self.session_path()
    }

    fn read_file(path: &Path) -> Result<Option<SessionFile>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        let file = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(file))
    }

    /// When the pair on disk was written, if there is one
    pub fn saved_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(Self::read_file(&self.session_path())?.and_then(|f| f.saved_at))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        let Some(file) = Self::read_file(&self.session_path())? else {
            return Ok(None);
        };
        match (file.access_token, file.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Ok(Some(TokenPair::new(access, refresh)))
            }
            (None, None) => Ok(None),
            _ => {
                warn!("Session file holds only one token, ignoring it");
                Ok(None)
            }
        }
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir).context("Failed to create cache directory")?;
        let file = SessionFile {
            access_token: Some(pair.access_token.clone()),
            refresh_token: Some(pair.refresh_token.clone()),
            saved_at: Some(Utc::now()),
        };
        let contents = serde_json::to_string_pretty(&file)?;

        // Write then rename so readers never see half a pair.
        let path = self.session_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        std::fs::rename(&tmp, &path).context("Failed to replace session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}
