//! Vertical map-reduce: intermediate mappings are merged two at a time.

use super::{MapReduceResult, MrValue, poll_loop};
use crate::cluster::{ClusterTransport, recv_keyed_values, send_keyed_values};
use crate::executor::Executor;
use crate::node::{ExecNode, Lifecycle, NodePtr};
use crate::promise::{self, Handle, Promise};
use crate::queue::{WorkItem, WorkQueue};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::JoinHandle;

/// A pending pairwise combine of two resolved intermediate mappings.
struct PairItem<V> {
    first: MapReduceResult<V>,
    second: MapReduceResult<V>,
    output: Promise<MapReduceResult<V>>,
}

/// Map → tree reduce.
///
/// The mapper turns one input into a complete key -> value mapping; the
/// reducer merges two such mappings into one. Reduction is a binary tree
/// over the map outputs: `n` outputs take `n - 1` combines, each pairing the
/// two oldest unconsumed results and appending the merge to the work list.
/// An odd generation leaves one result unpaired; it simply waits and pairs
/// with the next combined result, so any `n >= 1` terminates with a single
/// mapping (and `n == 0` yields an empty one).
///
/// With a transport attached, rank-0 final aggregation combines the
/// per-rank mappings with the same pairwise reducer; other ranks end up
/// empty.
pub struct MapReduceVertical<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    mapper: Arc<Executor<In, MapReduceResult<V>>>,
    reducer: Arc<Executor<(MapReduceResult<V>, MapReduceResult<V>), MapReduceResult<V>>>,
    map_queue: Arc<WorkQueue<WorkItem<In, MapReduceResult<V>>>>,
    reduce_queue: Arc<WorkQueue<PairItem<V>>>,
    workers: usize,
    transport: Option<Arc<dyn ClusterTransport>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    lifecycle: Lifecycle,
}

impl<In, V> MapReduceVertical<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    pub fn new(
        mapper: NodePtr<In, MapReduceResult<V>>,
        reducer: NodePtr<(MapReduceResult<V>, MapReduceResult<V>), MapReduceResult<V>>,
        workers: usize,
    ) -> Self {
        assert!(workers > 0, "mapreduce needs at least one worker");
        Self {
            mapper: Arc::new(Executor::new(mapper, workers)),
            reducer: Arc::new(Executor::new(reducer, workers)),
            map_queue: Arc::new(WorkQueue::new()),
            reduce_queue: Arc::new(WorkQueue::new()),
            workers,
            transport: None,
            threads: Mutex::new(Vec::new()),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Same node, but participating in a multi-rank run.
    pub fn with_transport(
        mapper: NodePtr<In, MapReduceResult<V>>,
        reducer: NodePtr<(MapReduceResult<V>, MapReduceResult<V>), MapReduceResult<V>>,
        workers: usize,
        transport: Arc<dyn ClusterTransport>,
    ) -> Self {
        let mut node = Self::new(mapper, reducer, workers);
        node.transport = Some(transport);
        node
    }

    pub fn create(
        mapper: NodePtr<In, MapReduceResult<V>>,
        reducer: NodePtr<(MapReduceResult<V>, MapReduceResult<V>), MapReduceResult<V>>,
        workers: usize,
    ) -> NodePtr<Vec<Handle<In>>, MapReduceResult<V>> {
        Arc::new(Self::new(mapper, reducer, workers))
    }

    fn node_count(&self) -> usize {
        self.transport.as_ref().map_or(1, |t| t.node_count())
    }

    fn combine_now(
        &self,
        first: MapReduceResult<V>,
        second: MapReduceResult<V>,
    ) -> MapReduceResult<V> {
        let (slot, handle) = promise::channel();
        self.reducer.compute(promise::ready((first, second)), slot);
        handle.wait()
    }

    /// Gather per-rank mappings on rank 0 and fold them with the pairwise
    /// reducer; other ranks send theirs and clear.
    fn aggregate_to_root(&self, result: &mut MapReduceResult<V>) {
        let Some(transport) = &self.transport else {
            return;
        };
        let nodes = transport.node_count();
        if nodes < 2 {
            return;
        }

        if transport.rank() > 0 {
            send_keyed_values(transport.as_ref(), 0, result)
                .expect("final aggregation send failed");
            result.clear();
            return;
        }

        let mut partials: VecDeque<MapReduceResult<V>> = VecDeque::new();
        partials.push_back(std::mem::take(result));
        for src in 1..nodes {
            partials.push_back(
                recv_keyed_values(transport.as_ref(), src)
                    .expect("final aggregation receive failed"),
            );
        }
        while partials.len() > 1 {
            let first = partials.pop_front().unwrap();
            let second = partials.pop_front().unwrap();
            partials.push_back(self.combine_now(first, second));
        }
        *result = partials.pop_front().unwrap();
    }
}

impl<In, V> ExecNode<Vec<Handle<In>>, MapReduceResult<V>> for MapReduceVertical<In, V>
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
            let reduce_queue = Arc::clone(&self.reduce_queue);
            threads.push(std::thread::spawn(move || {
                poll_loop(stop, || {
                    if let Some(item) = map_queue.try_pop() {
                        mapper.compute(item.input, item.output);
                        return true;
                    }
                    if let Some(item) = reduce_queue.try_pop() {
                        let input = promise::ready((item.first, item.second));
                        reducer.compute(input, item.output);
                        return true;
                    }
                    false
                });
            }));
        }
    }

    fn submit(&self, input: Handle<Vec<Handle<In>>>) -> Handle<MapReduceResult<V>> {
        self.lifecycle.assert_live("mapreduce_v");
        let inputs = input.wait();

        let mut outputs: VecDeque<Handle<MapReduceResult<V>>> =
            VecDeque::with_capacity(inputs.len());
        for element in inputs {
            let (map_slot, map_handle) = promise::channel();
            self.map_queue.push(WorkItem::new(element, map_slot));
            outputs.push_back(map_handle);
        }

        let mut result = if outputs.is_empty() {
            MapReduceResult::new()
        } else {
            // n - 1 combines over the chain of oldest unconsumed results.
            let combines = outputs.len() - 1;
            for _ in 0..combines {
                let first = outputs.pop_front().unwrap().wait();
                let second = outputs.pop_front().unwrap().wait();
                let (slot, handle) = promise::channel();
                self.reduce_queue.push(PairItem {
                    first,
                    second,
                    output: slot,
                });
                outputs.push_back(handle);
            }
            outputs.pop_front().unwrap().wait()
        };

        self.aggregate_to_root(&mut result);

        promise::ready(result)
    }

    fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let joined: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        for thread in joined {
            thread.join().expect("mapreduce_v worker panicked");
        }
        self.mapper.dispose();
        self.reducer.dispose();
    }

    fn replicate(&self) -> NodePtr<Vec<Handle<In>>, MapReduceResult<V>> {
        self.lifecycle.assert_uninitialized("mapreduce_v");
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
            "mapreduce_v({},{},{},{})",
            self.mapper.name(),
            self.reducer.name(),
            self.workers,
            self.node_count()
        )
    }
}

impl<In, V> Drop for MapReduceVertical<In, V>
where
    In: Send + 'static,
    V: MrValue,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
