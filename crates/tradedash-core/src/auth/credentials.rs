use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::tokens::{TokenPair, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::config::APP_NAME;

/// Token pair kept in the OS keychain, one entry per key.
pub struct KeyringTokenStore {
    service: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(APP_NAME)
    }
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    /// Read one key, treating a missing entry as absent
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        match (self.get(ACCESS_TOKEN_KEY)?, self.get(REFRESH_TOKEN_KEY)?) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair::new(access, refresh))),
            (None, None) => Ok(None),
            _ => {
                warn!("Keychain holds only one token, ignoring it");
                Ok(None)
            }
        }
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        self.entry(ACCESS_TOKEN_KEY)?
            .set_password(&pair.access_token)
            .context("Failed to store access token in keychain")?;

        if let Err(e) = self.entry(REFRESH_TOKEN_KEY)?.set_password(&pair.refresh_token) {
            // Never leave a lone access token behind
            if let Err(rollback) = self.delete(ACCESS_TOKEN_KEY) {
                warn!(error = %rollback, "Failed to roll back access token");
            }
            return Err(e).context("Failed to store refresh token in keychain");
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let access = self.delete(ACCESS_TOKEN_KEY);
        let refresh = self.delete(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }
}
