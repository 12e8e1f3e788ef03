//! Per-thread event pump for threads other than the application's.
//!
//! A thread that owns receivers of queued connections runs a `ThreadLoop`
//! to deliver the posted events addressed to it. The loop parks on a
//! condition variable between batches; posting to the thread wakes it
//! through the waker registry.
//!
//! # Example
//!
//! ```ignore
//! let handle_tx = std::sync::mpsc::channel();
//! std::thread::spawn(move || {
//!     let receiver = Receiver::new();          // owned by this thread
//!     let event_loop = ThreadLoop::new();
//!     handle_tx.send(event_loop.handle()).unwrap();
//!     event_loop.exec();                       // delivers queued slots
//! });
//! ```

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::{Condvar, Mutex};

use crate::application::{register_waker, unregister_waker};
use crate::event::posted_queue;
use crate::object;

struct LoopState {
    woken: bool,
    quit: bool,
    code: i32,
}

struct LoopShared {
    state: Mutex<LoopState>,
    condvar: Condvar,
}

impl LoopShared {
    fn wake(&self) {
        let mut state = self.state.lock();
        state.woken = true;
        self.condvar.notify_one();
    }
}

/// An event pump bound to the thread that created it.
///
/// Not `Send`: the loop drains the posted-event queue for its own thread
/// and must be executed there.
pub struct ThreadLoop {
    shared: Arc<LoopShared>,
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl ThreadLoop {
    /// Create a loop for the current thread and register its waker.
    pub fn new() -> Self {
        let thread = std::thread::current().id();
        let shared = Arc::new(LoopShared {
            state: Mutex::new(LoopState {
                woken: false,
                quit: false,
                code: 0,
            }),
            condvar: Condvar::new(),
        });
        let waker = shared.clone();
        register_waker(thread, Arc::new(move || waker.wake()));
        Self {
            shared,
            thread,
            _not_send: PhantomData,
        }
    }

    /// A sendable handle for quitting or waking this loop.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: self.shared.clone(),
        }
    }

    /// Deliver this thread's queued events until told to quit.
    /// Returns the exit code.
    pub fn exec(&self) -> i32 {
        tracing::debug!(target: "signet_core::event_loop", "thread loop entered");
        loop {
            self.drain();
            let mut state = self.shared.state.lock();
            if state.quit {
                let code = state.code;
                drop(state);
                tracing::debug!(target: "signet_core::event_loop", code, "thread loop exited");
                return code;
            }
            if !state.woken {
                self.shared.condvar.wait(&mut state);
            }
            state.woken = false;
        }
    }

    /// Deliver one batch of this thread's queued events without blocking.
    /// Returns how many events were delivered.
    pub fn process_events(&self) -> usize {
        self.drain()
    }

    fn drain(&self) -> usize {
        let batch = posted_queue().take_for_thread(self.thread);
        let count = batch.len();
        for mut posted in batch {
            object::deliver(posted.receiver, &mut posted.event);
        }
        count
    }
}

impl Default for ThreadLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadLoop {
    fn drop(&mut self) {
        unregister_waker(self.thread);
    }
}

/// Cross-thread control handle for a [`ThreadLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<LoopShared>,
}

impl LoopHandle {
    /// Ask the loop to exit with code 0.
    pub fn quit(&self) {
        self.exit(0);
    }

    /// Ask the loop to exit with `code`.
    pub fn exit(&self, code: i32) {
        let mut state = self.shared.state.lock();
        state.quit = true;
        state.code = code;
        state.woken = true;
        self.shared.condvar.notify_one();
    }

    /// Wake the loop so it re-checks its queue.
    pub fn wake(&self) {
        self.shared.wake();
    }
}
