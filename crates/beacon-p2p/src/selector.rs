//! Deterministic relay selection.
//!
//! Every node name is hashed (optionally with a replica nonce) and the node
//! whose hash is numerically closest to the target hash wins. Both parties
//! share the node pool, so they pick the same relay for a given mailbox
//! without talking to each other.

use std::cmp::Ordering;
use std::sync::Arc;

use beacon_crypto::hash::hash32;

#[derive(Debug, Clone)]
pub struct RelaySelector {
    nodes: Arc<[String]>,
}

impl RelaySelector {
    pub fn new(nodes: Vec<String>) -> Self {
        Self {
            nodes: nodes.into(),
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Node closest to `target_hash`. The first minimum in pool order wins;
    /// an empty pool yields an empty string.
    pub fn select(&self, target_hash: &[u8; 32], nonce: Option<&str>) -> String {
        let nonce = nonce.unwrap_or_default();
        let mut best: Option<(&String, [u8; 32])> = None;
        for node in self.nodes.iter() {
            let node_hash = hash32(format!("{node}{nonce}").as_bytes());
            let distance = abs_diff(target_hash, &node_hash);
            let closer = match &best {
                Some((_, d)) => distance.cmp(d) == Ordering::Less,
                None => true,
            };
            if closer {
                best = Some((node, distance));
            }
        }
        best.map(|(node, _)| node.clone()).unwrap_or_default()
    }

    /// Relay for the mailbox of `public_key`, optionally for replica `replica`.
    pub fn select_for(&self, public_key: &[u8], replica: Option<usize>) -> String {
        let nonce = replica.map(replica_nonce);
        self.select(&hash32(public_key), nonce.as_deref())
    }
}

/// Lower-case hex of the replica index, padded to an even length.
pub fn replica_nonce(replica: usize) -> String {
    let hex = format!("{replica:x}");
    if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else {
        hex
    }
}

/// |a - b| over 256-bit big-endian unsigned integers.
fn abs_diff(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    let mut out = [0u8; 32];
    let mut borrow = 0i16;
    for i in (0..32).rev() {
        let mut d = hi[i] as i16 - lo[i] as i16 - borrow;
        if d < 0 {
            d += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out[i] = d as u8;
    }
    out
}
