//! Storage abstraction for peers, app metadata, permissions and the SDK seed.
//!
//! [`Storage`] is the raw key-value collaborator an embedding application
//! provides. [`StorageManager`] layers the list semantics on top (lookup by
//! predicate, replace-on-add) and serializes its read-modify-write cycles.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::data::{AppMetadata, P2pPeer, Permission};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage operation failed: {0}")]
    OperationFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

// ============================================================================
// Storage Trait
// ============================================================================

#[async_trait]
pub trait Storage: Send + Sync {
    async fn p2p_peers(&self) -> Result<Vec<P2pPeer>, StorageError>;
    async fn set_p2p_peers(&self, peers: Vec<P2pPeer>) -> Result<(), StorageError>;

    async fn app_metadata(&self) -> Result<Vec<AppMetadata>, StorageError>;
    async fn set_app_metadata(&self, metadata: Vec<AppMetadata>) -> Result<(), StorageError>;

    async fn permissions(&self) -> Result<Vec<Permission>, StorageError>;
    async fn set_permissions(&self, permissions: Vec<Permission>) -> Result<(), StorageError>;

    async fn sdk_secret_seed(&self) -> Result<Option<String>, StorageError>;
    async fn set_sdk_secret_seed(&self, seed: &str) -> Result<(), StorageError>;

    async fn sdk_version(&self) -> Result<Option<String>, StorageError>;
    async fn set_sdk_version(&self, version: &str) -> Result<(), StorageError>;
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

#[derive(Default)]
struct InMemoryData {
    peers: Vec<P2pPeer>,
    app_metadata: Vec<AppMetadata>,
    permissions: Vec<Permission>,
    secret_seed: Option<String>,
    sdk_version: Option<String>,
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    data: Arc<RwLock<InMemoryData>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn p2p_peers(&self) -> Result<Vec<P2pPeer>, StorageError> {
        Ok(self.data.read().await.peers.clone())
    }

    async fn set_p2p_peers(&self, peers: Vec<P2pPeer>) -> Result<(), StorageError> {
        self.data.write().await.peers = peers;
        Ok(())
    }

    async fn app_metadata(&self) -> Result<Vec<AppMetadata>, StorageError> {
        Ok(self.data.read().await.app_metadata.clone())
    }

    async fn set_app_metadata(&self, metadata: Vec<AppMetadata>) -> Result<(), StorageError> {
        self.data.write().await.app_metadata = metadata;
        Ok(())
    }

    async fn permissions(&self) -> Result<Vec<Permission>, StorageError> {
        Ok(self.data.read().await.permissions.clone())
    }

    async fn set_permissions(&self, permissions: Vec<Permission>) -> Result<(), StorageError> {
        self.data.write().await.permissions = permissions;
        Ok(())
    }

    async fn sdk_secret_seed(&self) -> Result<Option<String>, StorageError> {
        Ok(self.data.read().await.secret_seed.clone())
    }

    async fn set_sdk_secret_seed(&self, seed: &str) -> Result<(), StorageError> {
        self.data.write().await.secret_seed = Some(seed.to_string());
        Ok(())
    }

    async fn sdk_version(&self) -> Result<Option<String>, StorageError> {
        Ok(self.data.read().await.sdk_version.clone())
    }

    async fn set_sdk_version(&self, version: &str) -> Result<(), StorageError> {
        self.data.write().await.sdk_version = Some(version.to_string());
        Ok(())
    }
}

// ============================================================================
// Storage Manager
// ============================================================================

const PEER_UPDATES_BUFFER: usize = 64;

/// List semantics over a raw [`Storage`].
///
/// Clones share one write lock and one peer update channel.
#[derive(Clone)]
pub struct StorageManager {
    storage: Arc<dyn Storage>,
    write_lock: Arc<Mutex<()>>,
    peer_updates: broadcast::Sender<Vec<P2pPeer>>,
}

impl StorageManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let (peer_updates, _) = broadcast::channel(PEER_UPDATES_BUFFER);
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
            peer_updates,
        }
    }

    /// Peers passed to [`StorageManager::add_peers`] from now on, one batch
    /// per call, after they are persisted.
    pub fn peer_updates(&self) -> broadcast::Receiver<Vec<P2pPeer>> {
        self.peer_updates.subscribe()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // ------------------------------------------------------------------------
    // Peers
    // ------------------------------------------------------------------------

    pub async fn peers(&self) -> Result<Vec<P2pPeer>, StorageError> {
        self.storage.p2p_peers().await
    }

    pub async fn find_peer<F>(&self, predicate: F) -> Result<Option<P2pPeer>, StorageError>
    where
        F: Fn(&P2pPeer) -> bool + Send,
    {
        Ok(self.storage.p2p_peers().await?.into_iter().find(|p| predicate(p)))
    }

    /// Add peers, replacing any stored peer with the same public key.
    pub async fn add_peers(&self, peers: Vec<P2pPeer>) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.storage.p2p_peers().await?;
        for peer in &peers {
            match stored.iter_mut().find(|p| p.public_key == peer.public_key) {
                Some(existing) => *existing = peer.clone(),
                None => stored.push(peer.clone()),
            }
        }
        self.storage.set_p2p_peers(stored).await?;
        // No receivers is fine.
        let _ = self.peer_updates.send(peers);
        Ok(())
    }

    /// Remove every peer matching `predicate`, returning the removed peers.
    pub async fn remove_peers<F>(&self, predicate: F) -> Result<Vec<P2pPeer>, StorageError>
    where
        F: Fn(&P2pPeer) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .storage
            .p2p_peers()
            .await?
            .into_iter()
            .partition(|p| predicate(p));
        self.storage.set_p2p_peers(kept).await?;
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // App metadata
    // ------------------------------------------------------------------------

    pub async fn find_app_metadata<F>(&self, predicate: F) -> Result<Option<AppMetadata>, StorageError>
    where
        F: Fn(&AppMetadata) -> bool + Send,
    {
        Ok(self.storage.app_metadata().await?.into_iter().find(|m| predicate(m)))
    }

    /// Add metadata, replacing entries with the same sender id.
    pub async fn add_app_metadata(&self, metadata: Vec<AppMetadata>) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.storage.app_metadata().await?;
        for entry in metadata {
            stored.retain(|m| m.sender_id != entry.sender_id);
            stored.push(entry);
        }
        self.storage.set_app_metadata(stored).await
    }

    pub async fn remove_app_metadata<F>(&self, predicate: F) -> Result<(), StorageError>
    where
        F: Fn(&AppMetadata) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.storage.app_metadata().await?;
        stored.retain(|m| !predicate(m));
        self.storage.set_app_metadata(stored).await
    }

    // ------------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------------

    pub async fn find_permissions<F>(&self, predicate: F) -> Result<Vec<Permission>, StorageError>
    where
        F: Fn(&Permission) -> bool + Send,
    {
        Ok(self
            .storage
            .permissions()
            .await?
            .into_iter()
            .filter(|p| predicate(p))
            .collect())
    }

    /// Add permissions, replacing entries for the same account and sender.
    pub async fn add_permissions(&self, permissions: Vec<Permission>) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.storage.permissions().await?;
        for permission in permissions {
            stored.retain(|p| {
                !(p.account_id == permission.account_id && p.sender_id == permission.sender_id)
            });
            stored.push(permission);
        }
        self.storage.set_permissions(stored).await
    }

    pub async fn remove_permissions<F>(&self, predicate: F) -> Result<(), StorageError>
    where
        F: Fn(&Permission) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.storage.permissions().await?;
        stored.retain(|p| !predicate(p));
        self.storage.set_permissions(stored).await
    }

    // ------------------------------------------------------------------------
    // SDK
    // ------------------------------------------------------------------------

    pub async fn sdk_secret_seed(&self) -> Result<Option<String>, StorageError> {
        self.storage.sdk_secret_seed().await
    }

    pub async fn set_sdk_secret_seed(&self, seed: &str) -> Result<(), StorageError> {
        self.storage.set_sdk_secret_seed(seed).await
    }

    pub async fn sdk_version(&self) -> Result<Option<String>, StorageError> {
        self.storage.sdk_version().await
    }

    pub async fn set_sdk_version(&self, version: &str) -> Result<(), StorageError> {
        self.storage.set_sdk_version(version).await
    }
}
