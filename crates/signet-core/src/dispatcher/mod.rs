//! The abstract event-dispatching surface and its shared internals.
//!
//! A dispatcher owns the platform event source for one loop: it pumps
//! native work, fires due timers and watches socket notifiers. Exactly one
//! dispatcher belongs to the application; drivers implement
//! [`EventDispatcher`] behind which the platform specifics live.
//!
//! Two drivers ship with the kernel: the portable poll/selector driver
//! ([`PollDispatcher`](poll::PollDispatcher), unix) and a GLib
//! main-context driver (`glib` cargo feature). Both share the
//! [`TimerTable`], which implements the timer semantics: every record
//! whose deadline has passed fires exactly once per pump, re-armed from
//! `now` so a stalled loop does not replay missed ticks, with ties broken
//! by registration order.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::event::Event;
use crate::object::{self, ObjectId};

#[cfg(unix)]
pub mod poll;

#[cfg(all(feature = "glib", unix))]
pub mod glib;

/// A process-unique timer identifier.
///
/// Allocated monotonically; an id is never reused within a process
/// lifetime, even after the timer is killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value; always positive.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// How a pump iteration may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpMode {
    /// One non-blocking iteration.
    Poll,
    /// Suspend until the next timer deadline, socket activity or a
    /// [`wake_up`](EventDispatcher::wake_up).
    Wait,
}

/// The direction a socket notifier watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketInterest {
    /// Readable.
    Read,
    /// Writable.
    Write,
    /// Exceptional condition (out-of-band data and friends).
    Exception,
}

/// Registration of interest in one socket descriptor's activity.
///
/// When the platform reports the watched direction ready, the dispatcher
/// delivers a socket-activity event to the receiver. A notifier whose
/// descriptor turns invalid is disabled rather than removed.
pub struct SocketNotifier {
    fd: i32,
    interest: SocketInterest,
    receiver: ObjectId,
    enabled: AtomicBool,
}

impl SocketNotifier {
    /// Watch `fd` for `interest`, delivering to `receiver`.
    pub fn new(fd: i32, interest: SocketInterest, receiver: ObjectId) -> Arc<Self> {
        Arc::new(Self {
            fd,
            interest,
            receiver,
            enabled: AtomicBool::new(true),
        })
    }

    /// The watched descriptor.
    pub fn fd(&self) -> i32 {
        self.fd
    }

    /// The watched direction.
    pub fn interest(&self) -> SocketInterest {
        self.interest
    }

    /// The object socket-activity events are delivered to.
    pub fn receiver(&self) -> ObjectId {
        self.receiver
    }

    /// Whether the notifier currently participates in polling.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the notifier without unregistering it.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl fmt::Debug for SocketNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketNotifier")
            .field("fd", &self.fd)
            .field("interest", &self.interest)
            .field("receiver", &self.receiver)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// The scheduling surface the application pumps.
///
/// Implementations are shared (`Arc`) and fully interior-mutable; every
/// operation takes `&self` and is safe to call from any thread, though
/// `process_events` is meant to be driven from the loop's own thread.
pub trait EventDispatcher: Send + Sync {
    /// Run one pump iteration: service the native source, deliver socket
    /// activity, fire due timers. Returns `true` if any work was done.
    fn process_events(&self, mode: PumpMode) -> bool;

    /// Make a blocked [`PumpMode::Wait`] iteration return promptly.
    /// Idempotent.
    fn wake_up(&self);

    /// Request the current `process_events` iteration to stop early.
    fn interrupt(&self);

    /// Register (or re-arm) a timer delivering to `receiver` every
    /// `interval`.
    fn register_timer(&self, id: TimerId, interval: Duration, receiver: ObjectId);

    /// Remove one timer. Returns whether it existed.
    fn unregister_timer(&self, id: TimerId) -> bool;

    /// Remove every timer delivering to `receiver`. Returns whether any
    /// existed.
    fn unregister_timers(&self, receiver: ObjectId) -> bool;

    /// Time until the timer's next deadline; zero when overdue, `None` for
    /// unknown ids.
    fn remaining_time(&self, id: TimerId) -> Option<Duration>;

    /// Add a socket notifier to the poll set.
    fn register_socket_notifier(&self, notifier: Arc<SocketNotifier>);

    /// Remove a socket notifier from the poll set.
    fn unregister_socket_notifier(&self, notifier: &Arc<SocketNotifier>);

    /// Setup hook, paired with [`shutting_down`](Self::shutting_down).
    fn starting_up(&self) {}

    /// Teardown hook: release native resources and clear registrations.
    fn shutting_down(&self) {}
}

struct TimerRecord {
    id: TimerId,
    interval: Duration,
    deadline: Instant,
    receiver: ObjectId,
}

/// The timer bookkeeping shared by all drivers.
///
/// Records keep registration order; [`take_due`](Self::take_due) fires each
/// due record exactly once and re-arms it from `now`.
pub struct TimerTable {
    records: Mutex<Vec<TimerRecord>>,
}

impl TimerTable {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Insert a timer, or re-arm it if the id is already registered.
    pub fn register(&self, id: TimerId, interval: Duration, receiver: ObjectId) {
        let now = Instant::now();
        let mut records = self.records.lock();
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.interval = interval;
            record.receiver = receiver;
            record.deadline = now + interval;
            return;
        }
        records.push(TimerRecord {
            id,
            interval,
            deadline: now + interval,
            receiver,
        });
    }

    /// Remove one timer.
    pub fn unregister(&self, id: TimerId) -> bool {
        let mut records = self.records.lock();
        match records.iter().position(|r| r.id == id) {
            Some(pos) => {
                records.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove every timer delivering to `receiver`.
    pub fn unregister_receiver(&self, receiver: ObjectId) -> bool {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.receiver != receiver);
        records.len() != before
    }

    /// Time until the timer's deadline; zero when overdue.
    pub fn remaining(&self, id: TimerId) -> Option<Duration> {
        let now = Instant::now();
        self.records
            .lock()
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.deadline.saturating_duration_since(now))
    }

    /// Time until the earliest deadline, `None` when no timers exist.
    pub fn time_until_next(&self) -> Option<Duration> {
        let now = Instant::now();
        self.records
            .lock()
            .iter()
            .map(|r| r.deadline.saturating_duration_since(now))
            .min()
    }

    /// Collect every record whose deadline has passed, in registration
    /// order, re-arming each from `now`.
    pub fn take_due(&self, now: Instant) -> Vec<(TimerId, ObjectId)> {
        let mut due = Vec::new();
        let mut records = self.records.lock();
        for record in records.iter_mut() {
            if record.deadline <= now {
                record.deadline = now + record.interval;
                due.push((record.id, record.receiver));
            }
        }
        due
    }

    /// Number of registered timers.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for TimerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver a kernel-generated event: synchronously when the pumping thread
/// owns the receiver, through the posted queue otherwise.
pub(crate) fn deliver_or_post(receiver: ObjectId, event: Event) -> bool {
    match object::thread_of(receiver) {
        None => false,
        Some(owner) if owner == std::thread::current().id() => {
            let mut event = event;
            object::deliver(receiver, &mut event)
        }
        Some(_) => crate::application::post_to(receiver, event),
    }
}
