//! The process-wide signal→slot routing table.
//!
//! Connections name their endpoints: a sender id, a signal declared on the
//! sender's class chain, a receiver id and a slot (method) declared on the
//! receiver's chain. Emission snapshots the matching connections under the
//! table lock, releases it, and then delivers to each connection in
//! insertion order, so slots are free to connect and disconnect, affecting
//! only subsequent emissions.
//!
//! Delivery per connection resolves the effective mode first: `Auto`
//! compares the emitting thread with the receiver's owning thread at every
//! emission. Direct delivery invokes synchronously on the emitting thread;
//! queued delivery posts a meta-call event to the receiver's loop; blocking
//! delivery posts and then waits on a completion handle (degrading to
//! direct on the receiver's own thread, where waiting would deadlock).
//!
//! Slot errors are logged and isolated to their connection; an emission
//! never aborts because one slot failed.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::application;
use crate::event::Event;
use crate::invocation::{completion_pair, DeliveryError};
use crate::object::{self, Object, ObjectId};
use crate::value::Value;

/// How a connection delivers its slot invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// Direct when sender and receiver share a thread, queued otherwise.
    /// Re-evaluated at every emission.
    #[default]
    Auto,
    /// Invoke synchronously on the emitting thread.
    Direct,
    /// Post a meta-call event to the receiver's owning loop.
    Queued,
    /// Like `Queued`, but the emitting thread waits until the slot has run.
    /// Degrades to `Direct` on the receiver's own thread.
    Blocking,
}

/// One routing-table entry. Identity is the (sender, signal, receiver,
/// slot) four-tuple; duplicates are rejected at connect time.
#[derive(Debug, Clone)]
pub struct Connection {
    /// The emitting object.
    pub sender: ObjectId,
    /// The signal name on the sender's class chain.
    pub signal: String,
    /// The receiving object.
    pub receiver: ObjectId,
    /// The slot name on the receiver's class chain.
    pub slot: String,
    /// Delivery mode.
    pub mode: ConnectionMode,
    /// Disabled connections are skipped at emission.
    pub enabled: bool,
}

impl Connection {
    fn same_endpoints(&self, other: &Connection) -> bool {
        self.sender == other.sender
            && self.signal == other.signal
            && self.receiver == other.receiver
            && self.slot == other.slot
    }
}

enum Resolved {
    Direct,
    Queued,
    Blocking,
}

/// The process-wide routing table, bucketed by sender.
pub struct ConnectionManager {
    connections: Mutex<HashMap<ObjectId, Vec<Connection>>>,
}

impl ConnectionManager {
    fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Create a connection after validating both endpoints.
    ///
    /// Returns `false` when the signal is not declared on the sender's
    /// class chain, the slot is not declared on the receiver's chain, or an
    /// identical connection already exists.
    pub fn connect(
        &self,
        sender: &dyn Object,
        signal: &str,
        receiver: &dyn Object,
        slot: &str,
        mode: ConnectionMode,
    ) -> bool {
        if sender.meta_object().find_signal(signal).is_none() {
            tracing::warn!(
                target: "signet_core::connection",
                class = sender.meta_object().class_name(),
                signal,
                "connect rejected: unknown signal"
            );
            return false;
        }
        if receiver.meta_object().find_method(slot).is_none() {
            tracing::warn!(
                target: "signet_core::connection",
                class = receiver.meta_object().class_name(),
                slot,
                "connect rejected: unknown slot"
            );
            return false;
        }

        let connection = Connection {
            sender: sender.object_id(),
            signal: signal.to_string(),
            receiver: receiver.object_id(),
            slot: slot.to_string(),
            mode,
            enabled: true,
        };

        let mut table = self.connections.lock();
        let bucket = table.entry(connection.sender).or_default();
        if bucket.iter().any(|c| c.same_endpoints(&connection)) {
            return false;
        }
        tracing::trace!(
            target: "signet_core::connection",
            sender = ?connection.sender,
            signal,
            receiver = ?connection.receiver,
            slot,
            ?mode,
            "connected"
        );
        bucket.push(connection);
        true
    }

    /// Remove the first connection matching the given pattern.
    ///
    /// `None` acts as a wildcard for the signal, receiver and slot.
    pub fn disconnect(
        &self,
        sender: ObjectId,
        signal: Option<&str>,
        receiver: Option<ObjectId>,
        slot: Option<&str>,
    ) -> bool {
        let mut table = self.connections.lock();
        let Some(bucket) = table.get_mut(&sender) else {
            return false;
        };
        let position = bucket.iter().position(|c| {
            signal.map_or(true, |s| c.signal == s)
                && receiver.map_or(true, |r| c.receiver == r)
                && slot.map_or(true, |s| c.slot == s)
        });
        match position {
            Some(pos) => {
                bucket.remove(pos);
                if bucket.is_empty() {
                    table.remove(&sender);
                }
                true
            }
            None => false,
        }
    }

    /// Remove every connection naming `object` as sender or receiver.
    pub fn disconnect_all(&self, object: ObjectId) {
        let mut table = self.connections.lock();
        table.remove(&object);
        table.retain(|_, bucket| {
            bucket.retain(|c| c.receiver != object);
            !bucket.is_empty()
        });
    }

    /// Number of outgoing connections currently registered for `sender`.
    pub fn sender_connection_count(&self, sender: ObjectId) -> usize {
        self.connections
            .lock()
            .get(&sender)
            .map_or(0, |bucket| bucket.len())
    }

    /// Invoke every slot connected to (`sender`, `signal`).
    ///
    /// The connection list is snapshotted under the lock and processed
    /// outside it, in insertion order; each connection fires at most once
    /// per emission.
    #[tracing::instrument(skip(self, args), target = "signet_core::connection", level = "trace")]
    pub fn emit(&self, sender: ObjectId, signal: &str, args: &[Value]) {
        let snapshot: Vec<Connection> = {
            let table = self.connections.lock();
            match table.get(&sender) {
                Some(bucket) => bucket
                    .iter()
                    .filter(|c| c.signal == signal && c.enabled)
                    .cloned()
                    .collect(),
                None => return,
            }
        };

        let current = std::thread::current().id();
        for connection in &snapshot {
            self.deliver(connection, args, current);
        }
    }

    fn deliver(&self, connection: &Connection, args: &[Value], current: ThreadId) {
        // The receiver can be destroyed between snapshot and delivery; its
        // destructor has already severed the connection for later emissions.
        let Some(receiver_thread) = object::thread_of(connection.receiver) else {
            return;
        };
        let same_thread = receiver_thread == current;

        let resolved = match connection.mode {
            ConnectionMode::Direct => Resolved::Direct,
            ConnectionMode::Queued => Resolved::Queued,
            ConnectionMode::Auto if same_thread => Resolved::Direct,
            ConnectionMode::Auto => Resolved::Queued,
            ConnectionMode::Blocking if same_thread => Resolved::Direct,
            ConnectionMode::Blocking => Resolved::Blocking,
        };

        match resolved {
            Resolved::Direct => self.invoke_direct(connection, args),
            Resolved::Queued => {
                let event = Event::meta_call(connection.slot.clone(), args.to_vec());
                if !application::post_to(connection.receiver, event) {
                    tracing::warn!(
                        target: "signet_core::connection",
                        slot = %connection.slot,
                        "queued delivery dropped: no application or receiver destroyed"
                    );
                }
            }
            Resolved::Blocking => {
                if application::Application::try_instance().is_none() {
                    tracing::error!(
                        target: "signet_core::connection",
                        slot = %connection.slot,
                        error = %DeliveryError::NoEventLoop,
                        "blocking delivery dropped"
                    );
                    return;
                }
                let (handle, waiter) = completion_pair();
                let event =
                    Event::meta_call_blocking(connection.slot.clone(), args.to_vec(), handle);
                if !application::post_to(connection.receiver, event) {
                    // The receiver vanished after the snapshot; nothing to wait on.
                    return;
                }
                if let Err(err) = waiter.wait() {
                    tracing::error!(
                        target: "signet_core::connection",
                        slot = %connection.slot,
                        error = %err,
                        "blocking delivery failed"
                    );
                }
            }
        }
    }

    fn invoke_direct(&self, connection: &Connection, args: &[Value]) {
        let Some(receiver) = object::live(connection.receiver) else {
            return;
        };
        let Some(method) = receiver.meta_object().find_method(&connection.slot) else {
            tracing::error!(
                target: "signet_core::connection",
                slot = %connection.slot,
                class = receiver.meta_object().class_name(),
                "slot vanished from receiver's class chain"
            );
            return;
        };
        if let Err(err) = method.invoke(&*receiver, args) {
            tracing::error!(
                target: "signet_core::connection",
                slot = %connection.slot,
                error = %err,
                "slot invocation failed"
            );
        }
    }
}

/// The process-wide [`ConnectionManager`] singleton.
pub fn connection_manager() -> &'static ConnectionManager {
    static MANAGER: OnceLock<ConnectionManager> = OnceLock::new();
    MANAGER.get_or_init(ConnectionManager::new)
}

/// Connect `sender`'s `signal` to `receiver`'s `slot`.
pub fn connect(
    sender: &dyn Object,
    signal: &str,
    receiver: &dyn Object,
    slot: &str,
    mode: ConnectionMode,
) -> bool {
    connection_manager().connect(sender, signal, receiver, slot, mode)
}

/// Remove the first connection matching the pattern; `None` is a wildcard.
pub fn disconnect(
    sender: &dyn Object,
    signal: Option<&str>,
    receiver: Option<&dyn Object>,
    slot: Option<&str>,
) -> bool {
    connection_manager().disconnect(
        sender.object_id(),
        signal,
        receiver.map(|r| r.object_id()),
        slot,
    )
}

/// Notify every slot connected to (`sender`, `signal`).
pub(crate) fn emit(sender: ObjectId, signal: &str, args: &[Value]) {
    connection_manager().emit(sender, signal, args);
}
