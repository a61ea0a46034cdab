//! Globally distributed map-reduce: keys are owned by cluster nodes.

use super::{MapReduceResult, MrValue, aggregate_to_root, exchange_by_owner, poll_loop};
use crate::algorithm::Distributer;
use crate::cluster::ClusterTransport;
use crate::executor::Executor;
use crate::node::{ExecNode, Lifecycle, NodePtr};
use crate::promise::{self, Handle, Promise};
use crate::queue::{WorkItem, WorkQueue};
use crate::shuffle::{Key, KeyedShuffleBuffer};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::JoinHandle;

struct ShuffleItem<V> {
    result: Handle<BTreeMap<Key, Vec<V>>>,
    buffer: Arc<KeyedShuffleBuffer<V>>,
    done: Promise<()>,
}

/// Map → shuffle → cross-node exchange → list-reduce → rank-0 aggregation.
///
/// The horizontal control flow plus the mandatory distributed shuffle: after
/// the local shuffle quiesces, every key's value list is shipped to the node
/// the [`Distributer`] assigns it to (pairwise, rank-ordered to avoid mutual
/// deadlock), each node reduces exactly the keys it owns, and the per-rank
/// partials are finally merged on rank 0. Ranks above 0 observe an empty
/// result.
pub struct MapReduceGlobal<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    mapper: Arc<Executor<In, BTreeMap<Key, Vec<V>>>>,
    reducer: Arc<Executor<Vec<V>, V>>,
    distributer: Arc<dyn Distributer>,
    transport: Arc<dyn ClusterTransport>,
    map_queue: Arc<WorkQueue<WorkItem<In, BTreeMap<Key, Vec<V>>>>>,
    shuffle_queue: Arc<WorkQueue<ShuffleItem<V>>>,
    reduce_queue: Arc<WorkQueue<WorkItem<Vec<V>, V>>>,
    workers: usize,
    threads: Mutex<Vec<JoinHandle<()>>>,
    lifecycle: Lifecycle,
}

impl<In, V> MapReduceGlobal<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    pub fn new(
        mapper: NodePtr<In, BTreeMap<Key, Vec<V>>>,
        reducer: NodePtr<Vec<V>, V>,
        workers: usize,
        distributer: Arc<dyn Distributer>,
        transport: Arc<dyn ClusterTransport>,
    ) -> Self {
        assert!(workers > 0, "mapreduce needs at least one worker");
        Self {
            mapper: Arc::new(Executor::new(mapper, workers)),
            reducer: Arc::new(Executor::new(reducer, workers)),
            distributer,
            transport,
            map_queue: Arc::new(WorkQueue::new()),
            shuffle_queue: Arc::new(WorkQueue::new()),
            reduce_queue: Arc::new(WorkQueue::new()),
            workers,
            threads: Mutex::new(Vec::new()),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn create(
        mapper: NodePtr<In, BTreeMap<Key, Vec<V>>>,
        reducer: NodePtr<Vec<V>, V>,
        workers: usize,
        distributer: Arc<dyn Distributer>,
        transport: Arc<dyn ClusterTransport>,
    ) -> NodePtr<Vec<Handle<In>>, MapReduceResult<V>> {
        Arc::new(Self::new(mapper, reducer, workers, distributer, transport))
    }

    fn reduce_now(&self, values: Vec<V>) -> V {
        let (slot, handle) = promise::channel();
        self.reducer.compute(promise::ready(values), slot);
        handle.wait()
    }
}

impl<In, V> ExecNode<Vec<Handle<In>>, MapReduceResult<V>> for MapReduceGlobal<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    fn initialize(&self) {
        if !self.lifecycle.begin_init() {
            return;
        }
        self.mapper.initialize();
        self.reducer.initialize();

        let mut threads = self.threads.lock().unwrap();
        for _ in 0..self.workers {
            let stop = self.lifecycle.stop_flag();
            let mapper = Arc::clone(&self.mapper);
            let reducer = Arc::clone(&self.reducer);
            let map_queue = Arc::clone(&self.map_queue);
            let shuffle_queue = Arc::clone(&self.shuffle_queue);
            let reduce_queue = Arc::clone(&self.reduce_queue);
            threads.push(std::thread::spawn(move || {
                poll_loop(stop, || {
                    if let Some(item) = map_queue.try_pop() {
                        mapper.compute(item.input, item.output);
                        return true;
                    }
                    if let Some(item) = shuffle_queue.try_pop() {
                        for (key, values) in item.result.wait() {
                            item.buffer.add_many(key, values);
                        }
                        item.done.fulfill(());
                        return true;
                    }
                    if let Some(item) = reduce_queue.try_pop() {
                        reducer.compute(item.input, item.output);
                        return true;
                    }
                    false
                });
            }));
        }
    }

    fn submit(&self, input: Handle<Vec<Handle<In>>>) -> Handle<MapReduceResult<V>> {
        self.lifecycle.assert_live("mapreduce_global");
        let inputs = input.wait();

        let buffer = Arc::new(KeyedShuffleBuffer::new());
        let mut acknowledgements = Vec::with_capacity(inputs.len());
        for element in inputs {
            let (map_slot, map_handle) = promise::channel();
            let (done_slot, done_handle) = promise::channel();
            self.map_queue.push(WorkItem::new(element, map_slot));
            self.shuffle_queue.push(ShuffleItem {
                result: map_handle,
                buffer: Arc::clone(&buffer),
                done: done_slot,
            });
            acknowledgements.push(done_handle);
        }
        for done in acknowledgements {
            done.wait();
        }

        // Drop empty buckets before the exchange; only keys that actually
        // carry values travel the wire.
        let local: BTreeMap<Key, Vec<V>> = buffer
            .drain_map()
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .collect();

        let owned = exchange_by_owner(
            self.transport.as_ref(),
            self.distributer.as_ref(),
            local,
        );

        let mut pending = Vec::new();
        for (key, values) in owned {
            let (slot, handle) = promise::channel();
            self.reduce_queue.push(WorkItem::new(promise::ready(values), slot));
            pending.push((key, handle));
        }
        let mut result: MapReduceResult<V> = pending
            .into_iter()
            .map(|(key, handle)| (key, handle.wait()))
            .collect();

        aggregate_to_root(self.transport.as_ref(), &mut result, |values| {
            self.reduce_now(values)
        });

        promise::ready(result)
    }

    fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let joined: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        for thread in joined {
            thread.join().expect("mapreduce_global worker panicked");
        }
        self.mapper.dispose();
        self.reducer.dispose();
    }

    fn replicate(&self) -> NodePtr<Vec<Handle<In>>, MapReduceResult<V>> {
        self.lifecycle.assert_uninitialized("mapreduce_global");
        Arc::new(Self::new(
            self.mapper.replicate_node(),
            self.reducer.replicate_node(),
            self.workers,
            Arc::clone(&self.distributer),
            Arc::clone(&self.transport),
        ))
    }

    fn thread_count(&self) -> usize {
        self.workers + self.mapper.thread_count() + self.reducer.thread_count()
    }

    fn name(&self) -> String {
        format!(
            "mapreduce_global({},{},{},{})",
            self.mapper.name(),
            self.reducer.name(),
            self.workers,
            self.transport.node_count()
        )
    }
}

impl<In, V> Drop for MapReduceGlobal<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
