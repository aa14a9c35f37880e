use std::sync::{Arc, Mutex};

use affiliate_core::store::LedgerStore;
use anyhow::{Context, Result};

use crate::config::Config;

/// rusqlite connections are not Sync; every query takes the lock on the
/// blocking pool.
pub struct AppState {
    pub config: Config,
    pub store: Mutex<LedgerStore>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let store = if config.database_path == ":memory:" {
            LedgerStore::in_memory()?
        } else {
            LedgerStore::open(&config.database_path)
                .with_context(|| format!("opening {}", config.database_path))?
        };
        store.migrate()?;
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: LedgerStore) -> Arc<Self> {
        Arc::new(Self {
            config,
            store: Mutex::new(store),
        })
    }
}
