//! Horizontal map-reduce: each key's value list is reduced in one call.

use super::{MapReduceResult, MrValue, aggregate_to_root, poll_loop};
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

/// A pending shuffle insertion: one mapper result to fan into the epoch's
/// buffer, acknowledged through `done`.
struct ShuffleItem<V> {
    result: Handle<BTreeMap<Key, Vec<V>>>,
    buffer: Arc<KeyedShuffleBuffer<V>>,
    done: Promise<()>,
}

/// Map → shuffle → list-reduce.
///
/// The mapper turns one input into a key-tagged mapping of partial value
/// lists; the reducer turns one key's complete value list into the final
/// value. `submit` blocks at the shuffle completion barrier (every mapper's
/// insertion acknowledged) and returns once the reduce phase has drained.
///
/// With a transport attached and more than one node in the run, the local
/// phases are followed by a global barrier and rank-0 final aggregation:
/// each key present on several ranks is reduced once more across the ranks'
/// partial values. Keys are *not* redistributed between nodes; that is
/// [`MapReduceGlobal`](super::MapReduceGlobal)'s job.
pub struct MapReduceHorizontal<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    mapper: Arc<Executor<In, BTreeMap<Key, Vec<V>>>>,
    reducer: Arc<Executor<Vec<V>, V>>,
    map_queue: Arc<WorkQueue<WorkItem<In, BTreeMap<Key, Vec<V>>>>>,
    shuffle_queue: Arc<WorkQueue<ShuffleItem<V>>>,
    reduce_queue: Arc<WorkQueue<WorkItem<Vec<V>, V>>>,
    workers: usize,
    transport: Option<Arc<dyn ClusterTransport>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    lifecycle: Lifecycle,
}

impl<In, V> MapReduceHorizontal<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    pub fn new(
        mapper: NodePtr<In, BTreeMap<Key, Vec<V>>>,
        reducer: NodePtr<Vec<V>, V>,
        workers: usize,
    ) -> Self {
        assert!(workers > 0, "mapreduce needs at least one worker");
        Self {
            mapper: Arc::new(Executor::new(mapper, workers)),
            reducer: Arc::new(Executor::new(reducer, workers)),
            map_queue: Arc::new(WorkQueue::new()),
            shuffle_queue: Arc::new(WorkQueue::new()),
            reduce_queue: Arc::new(WorkQueue::new()),
            workers,
            transport: None,
            threads: Mutex::new(Vec::new()),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Same node, but participating in a multi-rank run.
    pub fn with_transport(
        mapper: NodePtr<In, BTreeMap<Key, Vec<V>>>,
        reducer: NodePtr<Vec<V>, V>,
        workers: usize,
        transport: Arc<dyn ClusterTransport>,
    ) -> Self {
        let mut node = Self::new(mapper, reducer, workers);
        node.transport = Some(transport);
        node
    }

    pub fn create(
        mapper: NodePtr<In, BTreeMap<Key, Vec<V>>>,
        reducer: NodePtr<Vec<V>, V>,
        workers: usize,
    ) -> NodePtr<Vec<Handle<In>>, MapReduceResult<V>> {
        Arc::new(Self::new(mapper, reducer, workers))
    }

    fn node_count(&self) -> usize {
        self.transport.as_ref().map_or(1, |t| t.node_count())
    }

    /// Run one reduction on the calling thread (used by final aggregation,
    /// where the per-key work no longer flows through the queues).
    fn reduce_now(&self, values: Vec<V>) -> V {
        let (slot, handle) = promise::channel();
        self.reducer.compute(promise::ready(values), slot);
        handle.wait()
    }
}

impl<In, V> ExecNode<Vec<Handle<In>>, MapReduceResult<V>> for MapReduceHorizontal<In, V>
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
        self.lifecycle.assert_live("mapreduce_h");
        let inputs = input.wait();

        // Map fan-out: one map item and one shuffle item per input element.
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

        // Shuffle completion barrier: the buffer is quiescent afterwards.
        for done in acknowledgements {
            done.wait();
        }
        let shuffled = buffer.drain_map();

        if let Some(transport) = &self.transport {
            if transport.node_count() > 1 {
                transport.barrier();
            }
        }

        // Reduce phase, one call per non-empty key.
        let mut pending = Vec::new();
        for (key, values) in shuffled {
            if values.is_empty() {
                continue;
            }
            let (slot, handle) = promise::channel();
            self.reduce_queue.push(WorkItem::new(promise::ready(values), slot));
            pending.push((key, handle));
        }
        let mut result: MapReduceResult<V> = pending
            .into_iter()
            .map(|(key, handle)| (key, handle.wait()))
            .collect();

        if let Some(transport) = &self.transport {
            aggregate_to_root(transport.as_ref(), &mut result, |values| {
                self.reduce_now(values)
            });
        }

        promise::ready(result)
    }

    fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let joined: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        for thread in joined {
            thread.join().expect("mapreduce_h worker panicked");
        }
        self.mapper.dispose();
        self.reducer.dispose();
    }

    fn replicate(&self) -> NodePtr<Vec<Handle<In>>, MapReduceResult<V>> {
        self.lifecycle.assert_uninitialized("mapreduce_h");
        let mut copy = Self::new(
            self.mapper.replicate_node(),
            self.reducer.replicate_node(),
            self.workers,
        );
        copy.transport = self.transport.clone();
        Arc::new(copy)
    }

    fn thread_count(&self) -> usize {
        self.workers + self.mapper.thread_count() + self.reducer.thread_count()
    }

    fn name(&self) -> String {
        format!(
            "mapreduce_h({},{},{},{})",
            self.mapper.name(),
            self.reducer.name(),
            self.workers,
            self.node_count()
        )
    }
}

impl<In, V> Drop for MapReduceHorizontal<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
