//! Per-peer cache of directional session keys.

use std::sync::Arc;

use beacon_crypto::{derive_session_keys, Identity, SessionKeyPair, SessionRole};
use dashmap::DashMap;
use tracing::debug;

use crate::error::P2pError;

/// Derives session keys once per peer and reuses them afterwards.
///
/// Concurrent first contacts may both derive, but only the first insert is
/// kept and every caller observes that value.
pub struct SessionManager {
    identity: Arc<Identity>,
    role: SessionRole,
    sessions: DashMap<String, SessionKeyPair>,
}

impl SessionManager {
    pub fn new(identity: Arc<Identity>, role: SessionRole) -> Self {
        Self {
            identity,
            role,
            sessions: DashMap::new(),
        }
    }

    pub async fn get_or_derive(&self, peer_public_key: &[u8]) -> Result<SessionKeyPair, P2pError> {
        let key = hex::encode(peer_public_key);
        if let Some(keys) = self.sessions.get(&key) {
            return Ok(keys.clone());
        }

        let identity = self.identity.clone();
        let role = self.role;
        let peer = peer_public_key.to_vec();
        let derived = tokio::task::spawn_blocking(move || derive_session_keys(role, &identity, &peer))
            .await
            .map_err(|e| P2pError::Task(e.to_string()))??;
        debug!(peer = %&key[..key.len().min(8)], role = ?role, "derived session keys");

        Ok(self.insert_if_absent(peer_public_key, derived))
    }

    /// Drop the cached keys for a peer. Returns whether keys were cached.
    pub fn invalidate(&self, peer_public_key: &[u8]) -> bool {
        self.sessions.remove(&hex::encode(peer_public_key)).is_some()
    }

    pub fn contains(&self, peer_public_key: &[u8]) -> bool {
        self.sessions.contains_key(&hex::encode(peer_public_key))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Cache `keys` unless the peer already has keys; returns the cached pair.
    fn insert_if_absent(&self, peer_public_key: &[u8], keys: SessionKeyPair) -> SessionKeyPair {
        self.sessions
            .entry(hex::encode(peer_public_key))
            .or_insert(keys)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_crypto::CryptoError;

    fn manager(seed: &str) -> SessionManager {
        SessionManager::new(Arc::new(Identity::from_seed(seed)), SessionRole::Server)
    }

    #[tokio::test]
    async fn test_derives_once_and_caches() {
        let sessions = manager("wallet");
        let peer = Identity::from_seed("dapp").public_key();

        assert!(!sessions.contains(&peer));
        let first = sessions.get_or_derive(&peer).await.unwrap();
        assert!(sessions.contains(&peer));
        let second = sessions.get_or_derive(&peer).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_first_insert_wins() {
        let sessions = manager("wallet");
        let peer = [9u8; 32];
        let first = SessionKeyPair::new([1u8; 32], [2u8; 32]);
        let second = SessionKeyPair::new([3u8; 32], [4u8; 32]);

        assert_eq!(sessions.insert_if_absent(&peer, first.clone()), first);
        assert_eq!(sessions.insert_if_absent(&peer, second), first);
        assert_eq!(sessions.get_or_derive(&peer).await.unwrap(), first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_contact_converges() {
        let sessions = Arc::new(manager("wallet"));
        let peer = Identity::from_seed("dapp").public_key();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let sessions = sessions.clone();
                tokio::spawn(async move { sessions.get_or_derive(&peer).await.unwrap() })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let sessions = manager("wallet");
        let peer = Identity::from_seed("dapp").public_key();
        sessions.get_or_derive(&peer).await.unwrap();
        assert!(sessions.invalidate(&peer));
        assert!(!sessions.invalidate(&peer));
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_peer_key_is_not_cached() {
        let sessions = manager("wallet");
        let err = sessions.get_or_derive(&[1u8; 5]).await.unwrap_err();
        assert_eq!(
            err,
            P2pError::Crypto(CryptoError::InvalidKeyLength {
                expected: 32,
                got: 5
            })
        );
        assert!(sessions.is_empty());
    }
}
