use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::identity::IdentityVerifier;
use crate::services::pricing::PricingPolicy;
use crate::services::storage::BlobStore;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub pricing: PricingPolicy,
    pub identity: Box<dyn IdentityVerifier>,
    pub blobs: Box<dyn BlobStore>,
}

impl AppState {
    /// Locks the shared connection. Never hold the guard across an `.await`.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database lock poisoned")))
    }
}
