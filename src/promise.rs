//! Single-value result cells for cross-thread handoff.
//!
//! Every value that moves between execution nodes travels through a
//! [`Promise`]/[`Handle`] pair: the producer side fulfills the promise exactly
//! once, the consumer side blocks on the handle until the value arrives. This
//! is the only cross-thread completion signal in the crate; nodes that want
//! to surface a failure encode it in their output type.
//!
//! ```
//! use parloom::promise;
//!
//! let (slot, handle) = promise::channel();
//! std::thread::spawn(move || slot.fulfill(41 + 1));
//! assert_eq!(handle.wait(), 42);
//! ```

use std::sync::{Arc, Condvar, Mutex};

enum State<T> {
    Pending,
    Ready(T),
    /// The promise was dropped without a value. Waiting on this is a bug in
    /// the producing node, not a recoverable condition.
    Broken,
}

struct Cell<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

/// The producer half of a result cell. Fulfilled exactly once; consumed by
/// [`Promise::fulfill`].
pub struct Promise<T> {
    cell: Arc<Cell<T>>,
    fulfilled: bool,
}

/// The consumer half of a result cell. [`Handle::wait`] blocks until the
/// paired promise is fulfilled and takes ownership of the value.
pub struct Handle<T> {
    cell: Arc<Cell<T>>,
}

/// Create a connected promise/handle pair.
pub fn channel<T>() -> (Promise<T>, Handle<T>) {
    let cell = Arc::new(Cell {
        state: Mutex::new(State::Pending),
        ready: Condvar::new(),
    });
    (
        Promise {
            cell: Arc::clone(&cell),
            fulfilled: false,
        },
        Handle { cell },
    )
}

/// Create a handle that is already resolved with `value`.
pub fn ready<T>(value: T) -> Handle<T> {
    Handle {
        cell: Arc::new(Cell {
            state: Mutex::new(State::Ready(value)),
            ready: Condvar::new(),
        }),
    }
}

impl<T> Promise<T> {
    /// Publish the value and wake the waiting consumer.
    pub fn fulfill(mut self, value: T) {
        {
            let mut state = self.cell.state.lock().unwrap();
            match *state {
                State::Pending => *state = State::Ready(value),
                _ => panic!("promise fulfilled twice"),
            }
        }
        self.fulfilled = true;
        self.cell.ready.notify_all();
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if self.fulfilled {
            return;
        }
        let mut state = self.cell.state.lock().unwrap();
        if matches!(*state, State::Pending) {
            *state = State::Broken;
            self.cell.ready.notify_all();
        }
    }
}

impl<T> Handle<T> {
    /// Block until the value is available and take it.
    ///
    /// # Panics
    ///
    /// Panics if the paired promise was dropped without being fulfilled; an
    /// unfulfilled slot is a defect in the producing node.
    pub fn wait(self) -> T {
        let mut state = self.cell.state.lock().unwrap();
        loop {
            match std::mem::replace(&mut *state, State::Pending) {
                State::Ready(value) => return value,
                State::Broken => panic!("promise dropped without a value"),
                State::Pending => state = self.cell.ready.wait(state).unwrap(),
            }
        }
    }

    /// Non-blocking probe: take the value if it is already there.
    pub fn try_wait(self) -> Result<T, Handle<T>> {
        {
            let mut state = self.cell.state.lock().unwrap();
            if matches!(*state, State::Ready(_)) {
                match std::mem::replace(&mut *state, State::Pending) {
                    State::Ready(value) => return Ok(value),
                    _ => unreachable!(),
                }
            }
        }
        Err(self)
    }
}

/// Wrap each value of a vector into an already-resolved handle.
///
/// Inputs to a map-reduce node are handed over as `Vec<Handle<T>>` so the
/// producer of those inputs may itself be another node; plain in-memory data
/// enters the graph through this function.
pub fn pack<T>(values: Vec<T>) -> Vec<Handle<T>> {
    values.into_iter().map(ready).collect()
}

/// Resolve every handle of a vector, in order.
pub fn unpack<T>(handles: Vec<Handle<T>>) -> Vec<T> {
    handles.into_iter().map(Handle::wait).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfill_then_wait() {
        let (slot, handle) = channel();
        slot.fulfill(7u32);
        assert_eq!(handle.wait(), 7);
    }

    #[test]
    fn wait_blocks_until_fulfilled() {
        let (slot, handle) = channel();
        let t = std::thread::spawn(move || handle.wait());
        std::thread::sleep(std::time::Duration::from_millis(10));
        slot.fulfill("done");
        assert_eq!(t.join().unwrap(), "done");
    }

    #[test]
    fn try_wait_on_pending_returns_handle() {
        let (slot, handle) = channel::<i32>();
        let handle = handle.try_wait().unwrap_err();
        slot.fulfill(3);
        assert_eq!(handle.wait(), 3);
    }

    #[test]
    #[should_panic(expected = "promise dropped without a value")]
    fn dropped_promise_poisons_handle() {
        let (slot, handle) = channel::<i32>();
        drop(slot);
        handle.wait();
    }

    #[test]
    fn pack_unpack_round_trip() {
        let handles = pack(vec![1, 2, 3]);
        assert_eq!(unpack(handles), vec![1, 2, 3]);
    }
}
