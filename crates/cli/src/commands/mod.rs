pub mod chat;
pub mod config_cmd;
pub mod conversations;
pub mod history;

use std::sync::Arc;
use stepwise_config::{AppConfig, StoreBackend};
use stepwise_core::store::ConversationStore;
use stepwise_store::{FileStore, InMemoryStore};

/// Open the configured conversation store.
pub fn open_store(config: &AppConfig) -> Arc<dyn ConversationStore> {
    match config.store.backend {
        StoreBackend::File => Arc::new(FileStore::new(config.store.resolved_path())),
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
    }
}

/// Load configuration with a readable error.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
