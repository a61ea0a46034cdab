//! Cluster transport seam for the distributed map-reduce variants.
//!
//! The core only needs strictly synchronous point-to-point sends and
//! receives of byte buffers plus one global barrier; anything that can do
//! that (MPI bindings, TCP, the in-process [`LocalCluster`]) can carry a
//! distributed run. Framing on top of the raw buffers follows the shuffle
//! protocol: a leading entry count, the flat array of keys, the flat array
//! of per-key sizes (for variable-length value lists) or the values
//! directly. Buffers are postcard-encoded.

use crate::shuffle::Key;
use anyhow::{Context, Result, ensure};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Barrier, Condvar, Mutex};

/// Blocking point-to-point message passing within a fixed-size group of
/// cooperating processes.
///
/// `rank` and `node_count` are immutable for the process lifetime. A send
/// must be matched by exactly one receive on the destination; there is no
/// buffer inspection, timeout, or retry; transient failures are not
/// modeled, and a stalled peer stalls its consumers indefinitely.
pub trait ClusterTransport: Send + Sync {
    /// This process's identity within the run, in `[0, node_count)`.
    fn rank(&self) -> usize;

    /// Total number of cooperating processes.
    fn node_count(&self) -> usize;

    /// Blocking send of one buffer to `dest`.
    fn send(&self, dest: usize, buf: &[u8]) -> Result<()>;

    /// Blocking receive of one buffer from `src`.
    fn recv(&self, src: usize) -> Result<Vec<u8>>;

    /// Wait until every node of the run has reached the barrier.
    fn barrier(&self);
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).context("cluster wire encode failed")
}

fn decode<T: DeserializeOwned>(buf: &[u8]) -> Result<T> {
    postcard::from_bytes(buf).context("cluster wire decode failed")
}

/// Send a key -> value-list mapping: count, keys, per-key sizes, then one
/// buffer per value list.
pub fn send_keyed_lists<V: Serialize>(
    transport: &dyn ClusterTransport,
    dest: usize,
    map: &BTreeMap<Key, Vec<V>>,
) -> Result<()> {
    let keys: Vec<u64> = map.keys().map(|&k| k as u64).collect();
    let sizes: Vec<u64> = map.values().map(|v| v.len() as u64).collect();
    transport.send(dest, &encode(&(keys.len() as u64))?)?;
    transport.send(dest, &encode(&keys)?)?;
    transport.send(dest, &encode(&sizes)?)?;
    for values in map.values() {
        transport.send(dest, &encode(values)?)?;
    }
    Ok(())
}

/// Receive the counterpart of [`send_keyed_lists`]. Count mismatches mean
/// the peers disagree about the protocol and are reported as errors (the
/// map-reduce variants treat them as fatal).
pub fn recv_keyed_lists<V: DeserializeOwned>(
    transport: &dyn ClusterTransport,
    src: usize,
) -> Result<BTreeMap<Key, Vec<V>>> {
    let count: u64 = decode(&transport.recv(src)?)?;
    let keys: Vec<u64> = decode(&transport.recv(src)?)?;
    let sizes: Vec<u64> = decode(&transport.recv(src)?)?;
    ensure!(
        keys.len() as u64 == count && sizes.len() as u64 == count,
        "keyed-list framing mismatch from rank {src}: {count} entries announced, \
         {} keys / {} sizes received",
        keys.len(),
        sizes.len()
    );

    let mut map = BTreeMap::new();
    for (key, size) in keys.into_iter().zip(sizes) {
        let values: Vec<V> = decode(&transport.recv(src)?)?;
        ensure!(
            values.len() as u64 == size,
            "keyed-list value count mismatch from rank {src} for key {key}"
        );
        map.insert(key as Key, values);
    }
    Ok(map)
}

/// Send a key -> value mapping: count, keys, then the flat value array.
pub fn send_keyed_values<V: Serialize>(
    transport: &dyn ClusterTransport,
    dest: usize,
    map: &BTreeMap<Key, V>,
) -> Result<()> {
    let keys: Vec<u64> = map.keys().map(|&k| k as u64).collect();
    let values: Vec<&V> = map.values().collect();
    transport.send(dest, &encode(&(keys.len() as u64))?)?;
    transport.send(dest, &encode(&keys)?)?;
    transport.send(dest, &encode(&values)?)?;
    Ok(())
}

/// Receive the counterpart of [`send_keyed_values`].
pub fn recv_keyed_values<V: DeserializeOwned>(
    transport: &dyn ClusterTransport,
    src: usize,
) -> Result<BTreeMap<Key, V>> {
    let count: u64 = decode(&transport.recv(src)?)?;
    let keys: Vec<u64> = decode(&transport.recv(src)?)?;
    let values: Vec<V> = decode(&transport.recv(src)?)?;
    ensure!(
        keys.len() as u64 == count && values.len() as u64 == count,
        "keyed-value framing mismatch from rank {src}: {count} entries announced, \
         {} keys / {} values received",
        keys.len(),
        values.len()
    );
    Ok(keys.iter().map(|&k| k as Key).zip(values).collect())
}

/// In-process transport: every "node" is a thread of the same process.
///
/// Useful for exercising the distributed protocol on one host (and for the
/// distributed tests). Each ordered (src, dst) pair gets its own mailbox, so
/// sends never block and receives block only on their own edge, preserving
/// the pairwise exchange semantics of a real message-passing runtime.
pub struct LocalCluster;

impl LocalCluster {
    /// Create the transports for a run of `node_count` cooperating threads,
    /// one per rank.
    pub fn new(node_count: usize) -> Vec<LocalNode> {
        assert!(node_count > 0, "cluster needs at least one node");
        let shared = Arc::new(SharedState {
            mailboxes: (0..node_count * node_count).map(|_| Mailbox::new()).collect(),
            barrier: Barrier::new(node_count),
            node_count,
        });
        (0..node_count)
            .map(|rank| LocalNode {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

struct Mailbox {
    queue: Mutex<VecDeque<Vec<u8>>>,
    available: Condvar,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    fn put(&self, buf: Vec<u8>) {
        self.queue.lock().unwrap().push_back(buf);
        self.available.notify_one();
    }

    fn take(&self) -> Vec<u8> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            if let Some(buf) = queue.pop_front() {
                return buf;
            }
            queue = self.available.wait(queue).unwrap();
        }
    }
}

struct SharedState {
    /// Indexed `src * node_count + dst`.
    mailboxes: Vec<Mailbox>,
    barrier: Barrier,
    node_count: usize,
}

/// One rank's endpoint of a [`LocalCluster`].
pub struct LocalNode {
    rank: usize,
    shared: Arc<SharedState>,
}

impl ClusterTransport for LocalNode {
    fn rank(&self) -> usize {
        self.rank
    }

    fn node_count(&self) -> usize {
        self.shared.node_count
    }

    fn send(&self, dest: usize, buf: &[u8]) -> Result<()> {
        ensure!(dest < self.shared.node_count, "send to unknown rank {dest}");
        self.shared.mailboxes[self.rank * self.shared.node_count + dest].put(buf.to_vec());
        Ok(())
    }

    fn recv(&self, src: usize) -> Result<Vec<u8>> {
        ensure!(src < self.shared.node_count, "recv from unknown rank {src}");
        Ok(self.shared.mailboxes[src * self.shared.node_count + self.rank].take())
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }
}
