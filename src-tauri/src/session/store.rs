use std::sync::Mutex;

use keyring::Entry;
use tracing::{info, warn};

use crate::error::AppError;

const KEYRING_SERVICE: &str = "foodloops-backoffice-session";
const KEYRING_USER: &str = "foodloops-backoffice";

/// Where the refresh token survives between app launches.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, AppError>;
    fn save(&self, refresh_token: &str) -> Result<(), AppError>;
    fn clear(&self) -> Result<(), AppError>;
}

/// Refresh token kept in the OS keychain.
pub struct KeyringSessionStore;

impl KeyringSessionStore {
    fn entry() -> Result<Entry, AppError> {
        Entry::new(KEYRING_SERVICE, KEYRING_USER).map_err(|e| {
            warn!("Failed to create keyring entry for {}: {}", KEYRING_SERVICE, e);
            AppError::Auth(e.to_string())
        })
    }
}

impl SessionStore for KeyringSessionStore {
    fn load(&self) -> Result<Option<String>, AppError> {
        match Self::entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => {
                info!("No persisted session found");
                Ok(None)
            }
            Err(e) => {
                warn!("Failed to read persisted session: {}", e);
                Err(AppError::Auth(e.to_string()))
            }
        }
    }

    fn save(&self, refresh_token: &str) -> Result<(), AppError> {
        Self::entry()?.set_password(refresh_token).map_err(|e| {
            warn!("Failed to persist session: {}", e);
            AppError::Auth(e.to_string())
        })
    }

    fn clear(&self) -> Result<(), AppError> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!("Failed to delete persisted session: {}", e);
                Err(AppError::Auth(e.to_string()))
            }
        }
    }
}

/// In-process store, for tests and for running without a keychain.
#[derive(Default)]
pub struct MemorySessionStore {
    token: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<String>, AppError> {
        Ok(self.token.lock().map_err(|e| AppError::Auth(e.to_string()))?.clone())
    }

    fn save(&self, refresh_token: &str) -> Result<(), AppError> {
        *self.token.lock().map_err(|e| AppError::Auth(e.to_string()))? =
            Some(refresh_token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        *self.token.lock().map_err(|e| AppError::Auth(e.to_string()))? = None;
        Ok(())
    }
}
