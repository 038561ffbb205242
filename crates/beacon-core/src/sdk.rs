//! The explicitly constructed SDK context.
//!
//! [`BeaconSdk::init`] loads the identity seed from storage, generating and
//! persisting a fresh one on first run, and derives the long-term identity
//! from it. Everything that needs the identity receives it from here.

use std::sync::Arc;

use beacon_crypto::{generate_seed, Identity};
use tracing::{debug, info};

use crate::blockchain::BlockchainRegistry;
use crate::config::BeaconConfig;
use crate::controller::ConnectionController;
use crate::data::AppMetadata;
use crate::errors::CoreError;
use crate::identifier;
use crate::message::Serializer;
use crate::storage::{Storage, StorageManager};
use crate::transport::Transport;

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version written into outgoing messages.
pub const PROTOCOL_VERSION: &str = "3";

pub struct BeaconSdk {
    config: BeaconConfig,
    identity: Arc<Identity>,
    storage: StorageManager,
    registry: Arc<BlockchainRegistry>,
    serializer: Serializer,
    beacon_id: String,
    sender_id: String,
}

impl BeaconSdk {
    /// Build the context. Failing to load or create the identity is fatal.
    pub async fn init(
        config: BeaconConfig,
        storage: Arc<dyn Storage>,
        registry: BlockchainRegistry,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let serializer = Serializer::from_name(&config.messaging.serializer).ok_or_else(|| {
            CoreError::Initialization(format!(
                "unknown serializer '{}'",
                config.messaging.serializer
            ))
        })?;
        for blockchain in &config.messaging.blockchains {
            if !registry.contains(blockchain) {
                return Err(CoreError::Initialization(format!(
                    "no compatibility strategy registered for '{blockchain}'"
                )));
            }
        }

        let storage = StorageManager::new(storage);
        storage.set_sdk_version(SDK_VERSION).await?;

        let seed = match storage.sdk_secret_seed().await? {
            Some(seed) => seed,
            None => {
                debug!("generating new identity seed");
                let seed = generate_seed()?;
                storage.set_sdk_secret_seed(&seed).await?;
                seed
            }
        };
        let identity = Identity::from_seed(&seed);

        let public_key = identity.public_key();
        let beacon_id = identifier::beacon_id(&public_key);
        let sender_id = identifier::sender_id(&public_key)?;
        info!(
            beacon_id = %&beacon_id[..8],
            app = %config.app.name,
            version = SDK_VERSION,
            "beacon sdk initialized"
        );

        Ok(Self {
            config,
            identity: Arc::new(identity),
            storage,
            registry: Arc::new(registry),
            serializer,
            beacon_id,
            sender_id,
        })
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    /// Hex encoded public key.
    pub fn beacon_id(&self) -> &str {
        &self.beacon_id
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn registry(&self) -> &Arc<BlockchainRegistry> {
        &self.registry
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    pub fn app_metadata(&self) -> AppMetadata {
        AppMetadata {
            sender_id: self.sender_id.clone(),
            name: self.config.app.name.clone(),
            icon: self.config.app.icon.clone(),
            blockchain_identifier: None,
        }
    }

    pub fn connection_controller(&self, transports: Vec<Arc<dyn Transport>>) -> ConnectionController {
        ConnectionController::new(transports, self.serializer.clone())
    }
}
