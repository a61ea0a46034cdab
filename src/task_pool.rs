//! Worker pool: N threads draining one queue through one executor.

use crate::executor::Executor;
use crate::node::{ExecNode, Lifecycle, NodePtr};
use crate::promise::{self, Handle};
use crate::queue::{WorkItem, WorkQueue};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::thread::JoinHandle;

/// A pool of `workers` threads, each looping try-pop → compute → yield over
/// the shared queue. `submit` only enqueues; which worker runs an item is
/// decoupled from submission order. Dispose stops the loops after their next
/// failed pop and joins them; items already popped run to completion.
pub struct TaskPool<In: Send + 'static, Out: Send + 'static> {
    executor: Arc<Executor<In, Out>>,
    queue: Arc<WorkQueue<WorkItem<In, Out>>>,
    workers: usize,
    threads: Mutex<Vec<JoinHandle<()>>>,
    lifecycle: Lifecycle,
}

impl<In, Out> TaskPool<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Pool over `workers` threads, with one replica of `node` per worker.
    pub fn new(node: NodePtr<In, Out>, workers: usize) -> Self {
        assert!(workers > 0, "taskpool needs at least one worker");
        Self {
            executor: Arc::new(Executor::new(node, workers)),
            queue: Arc::new(WorkQueue::new()),
            workers,
            threads: Mutex::new(Vec::new()),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn create(node: NodePtr<In, Out>, workers: usize) -> NodePtr<In, Out> {
        Arc::new(Self::new(node, workers))
    }
}

impl<In, Out> ExecNode<In, Out> for TaskPool<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    fn initialize(&self) {
        if !self.lifecycle.begin_init() {
            return;
        }
        self.executor.initialize();

        let mut threads = self.threads.lock().unwrap();
        for _ in 0..self.workers {
            let stop = self.lifecycle.stop_flag();
            let queue = Arc::clone(&self.queue);
            let executor = Arc::clone(&self.executor);
            threads.push(std::thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    match queue.try_pop() {
                        Some(item) => executor.compute(item.input, item.output),
                        None => std::thread::yield_now(),
                    }
                }
            }));
        }
    }

    fn submit(&self, input: Handle<In>) -> Handle<Out> {
        self.lifecycle.assert_live("taskpool");
        let (slot, handle) = promise::channel();
        self.queue.push(WorkItem::new(input, slot));
        handle
    }

    fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let joined: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        for thread in joined {
            thread.join().expect("taskpool worker panicked");
        }
        self.executor.dispose();
    }

    fn replicate(&self) -> NodePtr<In, Out> {
        self.lifecycle.assert_uninitialized("taskpool");
        Arc::new(Self::new(self.executor.replicate_node(), self.workers))
    }

    fn thread_count(&self) -> usize {
        self.workers + self.executor.thread_count()
    }

    fn name(&self) -> String {
        format!("taskpool({},{})", self.workers, self.executor.name())
    }
}

impl<In, Out> Drop for TaskPool<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AlgorithmAdapter;
    use crate::algorithm::FnAlgorithm;
    use crate::promise::ready;

    fn doubler() -> NodePtr<u64, u64> {
        AlgorithmAdapter::create(FnAlgorithm::new("double", |x: u64| x * 2))
    }

    #[test]
    fn processes_all_items() {
        let pool = TaskPool::create(doubler(), 4);
        pool.initialize();

        let handles: Vec<_> = (0..64).map(|i| pool.submit(ready(i))).collect();
        let outputs = promise::unpack(handles);
        assert_eq!(outputs, (0..64).map(|i| i * 2).collect::<Vec<_>>());

        pool.dispose();
    }

    #[test]
    fn thread_count_and_name() {
        let pool = TaskPool::new(doubler(), 3);
        assert_eq!(pool.thread_count(), 3);
        assert_eq!(pool.name(), "taskpool(3,double)");
    }

    #[test]
    fn dispose_twice_is_noop() {
        let pool = TaskPool::create(doubler(), 2);
        pool.initialize();
        pool.dispose();
        pool.dispose();
    }

    #[test]
    #[should_panic(expected = "not initialized")]
    fn submit_after_dispose_panics() {
        let pool = TaskPool::create(doubler(), 2);
        pool.initialize();
        pool.dispose();
        let _ = pool.submit(ready(1));
    }
}
