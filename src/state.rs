//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::ipfs::{IpfsClient, IpfsError};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    ipfs: IpfsClient,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config) -> Result<Self, IpfsError> {
        let ipfs = IpfsClient::new(&config.ipfs)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, ipfs }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the storage node client
    pub fn ipfs(&self) -> &IpfsClient {
        &self.inner.ipfs
    }
}
