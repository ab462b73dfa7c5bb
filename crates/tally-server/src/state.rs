//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tally_cache::{Cache, MemoryCache, NullCache};
use tally_core::Identity;
use tally_crypto::jwt::TokenSigner;
use tokio::sync::Mutex;

use crate::config::ServerConfig;

/// State handed to every handler. Clones share everything.
#[derive(Clone)]
pub struct AppState {
    /// The single database connection.
    pub db: Arc<Mutex<Connection>>,
    pub identity: Arc<Identity>,
    pub cache: Arc<dyn Cache>,
    pub user_ttl: Duration,
    pub balance_ttl: Duration,
}

impl AppState {
    pub fn new(
        conn: Connection,
        identity: Identity,
        cache: Arc<dyn Cache>,
        user_ttl: Duration,
        balance_ttl: Duration,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            identity: Arc::new(identity),
            cache,
            user_ttl,
            balance_ttl,
        }
    }

    /// Build the state described by `config` over an open connection.
    pub fn from_config(config: &ServerConfig, conn: Connection) -> anyhow::Result<Self> {
        let signer = TokenSigner::new(
            config.auth.jwt_secret.as_bytes(),
            &config.auth.issuer,
            &config.auth.audience,
            config.auth.access_ttl_secs(),
        )?;
        let identity = Identity::new(signer, config.auth.identity_settings());
        let cache: Arc<dyn Cache> = if config.cache.enabled {
            Arc::new(MemoryCache::new())
        } else {
            Arc::new(NullCache)
        };
        Ok(Self::new(
            conn,
            identity,
            cache,
            config.cache.user_ttl(),
            config.cache.balance_ttl(),
        ))
    }
}
