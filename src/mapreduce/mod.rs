//! Map-reduce execution patterns.
//!
//! Three variants share one shape: a map phase fanning one work item per
//! input element into mapper workers, a shuffle that regroups the tagged
//! partial results by key, and a reduce phase over the regrouped values. All
//! variants are [`ExecNode`](crate::node::ExecNode)s over
//! `Vec<Handle<In>> -> MapReduceResult<V>` and own a set of worker threads
//! that poll their queues in map → shuffle → reduce priority order.
//!
//! - [`MapReduceHorizontal`] reduces each key's value list in one call.
//! - [`MapReduceVertical`] combines whole intermediate mappings two at a
//!   time until one remains.
//! - [`MapReduceGlobal`] is the horizontal variant plus a mandatory
//!   cross-node key exchange driven by a [`Distributer`].
//!
//! With a [`ClusterTransport`] attached, the final aggregation ships every
//! rank's partial result to rank 0 and reduces once more per key there.
//! Afterwards **only rank 0 holds the true result; every other rank observes
//! an empty mapping**. Callers that need the result elsewhere must broadcast
//! it themselves; the asymmetry is part of the contract.

mod global;
mod horizontal;
mod vertical;

pub use global::MapReduceGlobal;
pub use horizontal::MapReduceHorizontal;
pub use vertical::MapReduceVertical;

use crate::algorithm::Distributer;
use crate::cluster::{
    ClusterTransport, recv_keyed_lists, recv_keyed_values, send_keyed_lists, send_keyed_values,
};
use crate::shuffle::Key;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The externally observed output of a map-reduce node.
pub type MapReduceResult<V> = BTreeMap<Key, V>;

/// Bound for map-reduce value types: owned, sendable, and wire-encodable
/// (the distributed shuffle moves values between ranks).
pub trait MrValue: Send + Serialize + DeserializeOwned + 'static {}
impl<T> MrValue for T where T: Send + Serialize + DeserializeOwned + 'static {}

/// Shared worker poll loop: run `attempt` until the stop flag is raised,
/// yielding whenever no queue had work.
pub(crate) fn poll_loop(stop: Arc<AtomicBool>, mut attempt: impl FnMut() -> bool) {
    while !stop.load(Ordering::Acquire) {
        if !attempt() {
            std::thread::yield_now();
        }
    }
}

/// Redistribute a locally shuffled mapping so that every key ends up on the
/// node the [`Distributer`] assigns it to.
///
/// Every pair of nodes exchanges exactly one send and one receive; the
/// lower-ranked side sends first and the higher-ranked side receives first,
/// so no two nodes ever wait on each other. Protocol failures are fatal:
/// silently misrouted keys would corrupt results invisibly.
pub(crate) fn exchange_by_owner<V: MrValue>(
    transport: &dyn ClusterTransport,
    distributer: &dyn Distributer,
    local: BTreeMap<Key, Vec<V>>,
) -> BTreeMap<Key, Vec<V>> {
    let nodes = transport.node_count();
    if nodes < 2 {
        return local;
    }

    let mut outgoing: Vec<BTreeMap<Key, Vec<V>>> = (0..nodes).map(|_| BTreeMap::new()).collect();
    for (key, values) in local {
        let owner = distributer.owner(key);
        assert!(
            owner < nodes,
            "distributer routed key {key} to unknown node {owner} (cluster has {nodes})"
        );
        outgoing[owner].insert(key, values);
    }

    let rank = transport.rank();
    let mut mine = std::mem::take(&mut outgoing[rank]);

    for peer in 0..nodes {
        if peer == rank {
            continue;
        }
        let to_send = std::mem::take(&mut outgoing[peer]);
        let received = if rank < peer {
            send_keyed_lists(transport, peer, &to_send)
                .expect("cluster shuffle send failed");
            recv_keyed_lists(transport, peer).expect("cluster shuffle receive failed")
        } else {
            let received =
                recv_keyed_lists(transport, peer).expect("cluster shuffle receive failed");
            send_keyed_lists(transport, peer, &to_send)
                .expect("cluster shuffle send failed");
            received
        };
        for (key, values) in received {
            mine.entry(key).or_default().extend(values);
        }
    }
    mine
}

/// Gather every rank's partial result on rank 0 and reduce the per-rank
/// contributions once more per key.
///
/// Ranks above 0 send their keys and values, then clear their local result.
pub(crate) fn aggregate_to_root<V: MrValue>(
    transport: &dyn ClusterTransport,
    result: &mut MapReduceResult<V>,
    reduce: impl Fn(Vec<V>) -> V,
) {
    let nodes = transport.node_count();
    if nodes < 2 {
        return;
    }

    if transport.rank() > 0 {
        send_keyed_values(transport, 0, result).expect("final aggregation send failed");
        result.clear();
        return;
    }

    let mut contributions: BTreeMap<Key, Vec<V>> = std::mem::take(result)
        .into_iter()
        .map(|(key, value)| (key, vec![value]))
        .collect();
    for src in 1..nodes {
        let incoming: MapReduceResult<V> =
            recv_keyed_values(transport, src).expect("final aggregation receive failed");
        for (key, value) in incoming {
            contributions.entry(key).or_default().push(value);
        }
    }

    *result = contributions
        .into_iter()
        .map(|(key, values)| (key, reduce(values)))
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::ModuloDistributer;
    use crate::cluster::LocalCluster;

    #[test]
    fn exchange_routes_every_key_to_its_owner() {
        let mut nodes = LocalCluster::new(2);
        let n1 = nodes.pop().unwrap();
        let n0 = nodes.pop().unwrap();

        let t = std::thread::spawn(move || {
            let mut local: BTreeMap<Key, Vec<u64>> = BTreeMap::new();
            local.insert(2, vec![20]);
            local.insert(3, vec![30]);
            exchange_by_owner(&n1, &ModuloDistributer::new(2), local)
        });

        let mut local: BTreeMap<Key, Vec<u64>> = BTreeMap::new();
        local.insert(2, vec![21]);
        local.insert(5, vec![50]);
        let mine0 = exchange_by_owner(&n0, &ModuloDistributer::new(2), local);
        let mine1 = t.join().unwrap();

        // Node 0 owns the even keys with both nodes' contributions.
        assert_eq!(mine0.keys().copied().collect::<Vec<_>>(), vec![2]);
        let mut key2 = mine0[&2].clone();
        key2.sort_unstable();
        assert_eq!(key2, vec![20, 21]);

        let mut odd_keys = mine1.keys().copied().collect::<Vec<_>>();
        odd_keys.sort_unstable();
        assert_eq!(odd_keys, vec![3, 5]);
    }

    #[test]
    fn aggregation_leaves_non_root_ranks_empty() {
        let mut nodes = LocalCluster::new(2);
        let n1 = nodes.pop().unwrap();
        let n0 = nodes.pop().unwrap();

        let t = std::thread::spawn(move || {
            let mut partial: MapReduceResult<u64> = BTreeMap::new();
            partial.insert(4, 40);
            partial.insert(6, 60);
            aggregate_to_root(&n1, &mut partial, |values| values.into_iter().sum());
            partial
        });

        let mut partial: MapReduceResult<u64> = BTreeMap::new();
        partial.insert(4, 2);
        aggregate_to_root(&n0, &mut partial, |values| values.into_iter().sum());

        assert!(t.join().unwrap().is_empty());
        assert_eq!(partial[&4], 42);
        assert_eq!(partial[&6], 60);
    }
}
