//! Two-stage pipeline with an eager intermediate handoff.

use crate::executor::Executor;
use crate::node::{ExecNode, Lifecycle, NodePtr};
use crate::promise::{self, Handle};
use crate::queue::{WorkItem, WorkQueue};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::thread::JoinHandle;

/// Chains two nodes through an intermediate result slot.
///
/// `submit` pushes both work items eagerly: stage 1 gets (input,
/// intermediate slot), stage 2 gets (intermediate handle, final slot). The
/// stage-2 driver blocks on the intermediate handle until stage 1 fulfills
/// it, so a given item's second stage always starts after its own first
/// stage, while stage 1 is already free to work on the next item. Each
/// stage runs on its own driver thread draining its own queue.
pub struct Pipeline<In, Mid, Out>
where
    In: Send + 'static,
    Mid: Send + 'static,
    Out: Send + 'static,
{
    first: Arc<Executor<In, Mid>>,
    second: Arc<Executor<Mid, Out>>,
    first_queue: Arc<WorkQueue<WorkItem<In, Mid>>>,
    second_queue: Arc<WorkQueue<WorkItem<Mid, Out>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    lifecycle: Lifecycle,
}

impl<In, Mid, Out> Pipeline<In, Mid, Out>
where
    In: Send + 'static,
    Mid: Send + 'static,
    Out: Send + 'static,
{
    pub fn new(first: NodePtr<In, Mid>, second: NodePtr<Mid, Out>) -> Self {
        Self {
            first: Arc::new(Executor::new(first, 1)),
            second: Arc::new(Executor::new(second, 1)),
            first_queue: Arc::new(WorkQueue::new()),
            second_queue: Arc::new(WorkQueue::new()),
            threads: Mutex::new(Vec::new()),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Chain two nodes into a [`NodePtr`] (the intermediate type is erased).
    pub fn create(first: NodePtr<In, Mid>, second: NodePtr<Mid, Out>) -> NodePtr<In, Out> {
        Arc::new(Self::new(first, second))
    }

    fn spawn_stage<A, B>(
        stop: Arc<std::sync::atomic::AtomicBool>,
        queue: Arc<WorkQueue<WorkItem<A, B>>>,
        executor: Arc<Executor<A, B>>,
    ) -> JoinHandle<()>
    where
        A: Send + 'static,
        B: Send + 'static,
    {
        std::thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                match queue.try_pop() {
                    Some(item) => executor.compute(item.input, item.output),
                    None => std::thread::yield_now(),
                }
            }
        })
    }
}

impl<In, Mid, Out> ExecNode<In, Out> for Pipeline<In, Mid, Out>
where
    In: Send + 'static,
    Mid: Send + 'static,
    Out: Send + 'static,
{
    fn initialize(&self) {
        if !self.lifecycle.begin_init() {
            return;
        }
        self.first.initialize();
        self.second.initialize();

        let mut threads = self.threads.lock().unwrap();
        threads.push(Self::spawn_stage(
            self.lifecycle.stop_flag(),
            Arc::clone(&self.first_queue),
            Arc::clone(&self.first),
        ));
        threads.push(Self::spawn_stage(
            self.lifecycle.stop_flag(),
            Arc::clone(&self.second_queue),
            Arc::clone(&self.second),
        ));
    }

    fn submit(&self, input: Handle<In>) -> Handle<Out> {
        self.lifecycle.assert_live("pipeline");
        let (mid_slot, mid_handle) = promise::channel();
        let (out_slot, out_handle) = promise::channel();
        self.first_queue.push(WorkItem::new(input, mid_slot));
        self.second_queue.push(WorkItem::new(mid_handle, out_slot));
        out_handle
    }

    fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let joined: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        for thread in joined {
            thread.join().expect("pipeline stage panicked");
        }
        self.first.dispose();
        self.second.dispose();
    }

    fn replicate(&self) -> NodePtr<In, Out> {
        self.lifecycle.assert_uninitialized("pipeline");
        Arc::new(Self::new(
            self.first.replicate_node(),
            self.second.replicate_node(),
        ))
    }

    fn thread_count(&self) -> usize {
        self.first.thread_count() + self.second.thread_count() + 2
    }

    fn name(&self) -> String {
        format!("pipeline({},{})", self.first.name(), self.second.name())
    }
}

impl<In, Mid, Out> Drop for Pipeline<In, Mid, Out>
where
    In: Send + 'static,
    Mid: Send + 'static,
    Out: Send + 'static,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
