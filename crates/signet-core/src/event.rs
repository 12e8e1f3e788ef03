//! Event types and the process-wide posted-event queue.
//!
//! Events are tagged payloads delivered to an object's event hook, either
//! synchronously (`send`) or through the posted-event queue (`post`). Once
//! posted, the queue owns the event and destroys it after dispatch, even
//! when the receiver destroys itself while handling it, which is exactly
//! what a deferred-delete event does.
//!
//! The queue is a single process-wide FIFO. Each pumping thread drains only
//! the events whose receiver it owns, so per-receiver post order is
//! preserved for any single posting thread.

use std::collections::VecDeque;
use std::sync::OnceLock;
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::dispatcher::{SocketInterest, TimerId};
use crate::invocation::CompletionHandle;
use crate::object::ObjectId;
use crate::value::Value;

/// The payload of a queued cross-thread slot invocation.
///
/// Owns a copy of the slot name and arguments so the event can outlive the
/// emit site, and optionally the completion handle of a blocking emission.
#[derive(Debug)]
pub struct MetaCallEvent {
    /// The slot to invoke on the receiver.
    pub slot: String,
    /// The argument list, cloned at emit time.
    pub args: Vec<Value>,
    /// Present for blocking deliveries; signaled with the slot's result.
    pub completion: Option<CompletionHandle>,
}

/// A timer event view, as seen by [`Object::timer_event`](crate::object::Object::timer_event).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    /// The timer that fired.
    pub timer_id: TimerId,
}

/// Whether a child was attached or detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildAction {
    /// The child was added to the receiver.
    Added,
    /// The child was removed from the receiver.
    Removed,
}

/// A child event view, as seen by [`Object::child_event`](crate::object::Object::child_event).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildEvent {
    /// What happened.
    pub action: ChildAction,
    /// The affected child.
    pub child: ObjectId,
}

/// The tagged payload of an [`Event`].
#[derive(Debug)]
pub enum EventKind {
    /// A registered timer's interval elapsed.
    Timer {
        /// The timer that fired.
        id: TimerId,
    },
    /// A child was attached to the receiver.
    ChildAdded {
        /// The new child.
        child: ObjectId,
    },
    /// A child was detached from the receiver.
    ChildRemoved {
        /// The removed child.
        child: ObjectId,
    },
    /// A queued slot invocation.
    MetaCall(MetaCallEvent),
    /// Destroy the receiver when processed.
    DeferredDelete,
    /// A socket notifier's descriptor reported activity.
    SocketActivity {
        /// The ready descriptor.
        fd: i32,
        /// The direction that became ready.
        interest: SocketInterest,
    },
    /// Application-defined event.
    User {
        /// Application-defined discriminator.
        kind: u32,
        /// Optional payload.
        payload: Option<Value>,
    },
}

/// Discriminant-only tag, used to filter posted events by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// [`EventKind::Timer`].
    Timer,
    /// [`EventKind::ChildAdded`].
    ChildAdded,
    /// [`EventKind::ChildRemoved`].
    ChildRemoved,
    /// [`EventKind::MetaCall`].
    MetaCall,
    /// [`EventKind::DeferredDelete`].
    DeferredDelete,
    /// [`EventKind::SocketActivity`].
    SocketActivity,
    /// [`EventKind::User`].
    User,
}

impl EventKind {
    /// The discriminant tag of this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Timer { .. } => EventType::Timer,
            Self::ChildAdded { .. } => EventType::ChildAdded,
            Self::ChildRemoved { .. } => EventType::ChildRemoved,
            Self::MetaCall(_) => EventType::MetaCall,
            Self::DeferredDelete => EventType::DeferredDelete,
            Self::SocketActivity { .. } => EventType::SocketActivity,
            Self::User { .. } => EventType::User,
        }
    }
}

/// One event, with its acceptance state.
#[derive(Debug)]
pub struct Event {
    kind: EventKind,
    accepted: bool,
}

impl Event {
    /// Wrap a payload in an unaccepted event.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            accepted: false,
        }
    }

    /// A timer event.
    pub fn timer(id: TimerId) -> Self {
        Self::new(EventKind::Timer { id })
    }

    /// A queued slot invocation.
    pub fn meta_call(slot: impl Into<String>, args: Vec<Value>) -> Self {
        Self::new(EventKind::MetaCall(MetaCallEvent {
            slot: slot.into(),
            args,
            completion: None,
        }))
    }

    /// A queued slot invocation carrying a blocking completion handle.
    pub fn meta_call_blocking(
        slot: impl Into<String>,
        args: Vec<Value>,
        completion: CompletionHandle,
    ) -> Self {
        Self::new(EventKind::MetaCall(MetaCallEvent {
            slot: slot.into(),
            args,
            completion: Some(completion),
        }))
    }

    /// A deferred-delete request.
    pub fn deferred_delete() -> Self {
        Self::new(EventKind::DeferredDelete)
    }

    /// A child-added notification.
    pub fn child_added(child: ObjectId) -> Self {
        Self::new(EventKind::ChildAdded { child })
    }

    /// A child-removed notification.
    pub fn child_removed(child: ObjectId) -> Self {
        Self::new(EventKind::ChildRemoved { child })
    }

    /// A socket-activity notification.
    pub fn socket_activity(fd: i32, interest: SocketInterest) -> Self {
        Self::new(EventKind::SocketActivity { fd, interest })
    }

    /// An application-defined event.
    pub fn user(kind: u32, payload: Option<Value>) -> Self {
        Self::new(EventKind::User { kind, payload })
    }

    /// The payload.
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Mutable access to the payload (used to take a meta-call's completion
    /// handle during dispatch).
    pub fn kind_mut(&mut self) -> &mut EventKind {
        &mut self.kind
    }

    /// The discriminant tag of the payload.
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Mark the event as accepted.
    pub fn accept(&mut self) {
        self.accepted = true;
    }

    /// Mark the event as not accepted.
    pub fn ignore(&mut self) {
        self.accepted = false;
    }

    /// Whether the event has been accepted.
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }
}

/// A queued event awaiting delivery.
#[derive(Debug)]
pub struct PostedEvent {
    /// The object the event is addressed to.
    pub receiver: ObjectId,
    /// The event itself, owned by the queue until delivery.
    pub event: Event,
    /// Reserved; always zero for now.
    pub priority: i32,
}

/// The process-wide posted-event FIFO.
pub struct PostedEventQueue {
    events: Mutex<VecDeque<PostedEvent>>,
}

impl PostedEventQueue {
    fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an event for `receiver`. The queue takes ownership.
    pub fn push(&self, receiver: ObjectId, event: Event) {
        self.events.lock().push_back(PostedEvent {
            receiver,
            event,
            priority: 0,
        });
    }

    /// Remove (and destroy) queued events addressed to `receiver`.
    ///
    /// With a `kind` filter, only events of that type are removed. Dropping
    /// a meta-call event releases its completion handle, so a blocked
    /// sender is not stranded.
    pub fn remove_for(&self, receiver: ObjectId, kind: Option<EventType>) -> usize {
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|posted| {
            !(posted.receiver == receiver
                && kind.map_or(true, |k| posted.event.event_type() == k))
        });
        before - events.len()
    }

    /// Drain, in FIFO order, every event whose receiver is owned by
    /// `thread`. Events addressed to destroyed receivers are dropped here.
    pub fn take_for_thread(&self, thread: ThreadId) -> Vec<PostedEvent> {
        let mut events = self.events.lock();
        let mut taken = Vec::new();
        let mut rest = VecDeque::with_capacity(events.len());
        for posted in events.drain(..) {
            match crate::object::thread_of(posted.receiver) {
                Some(owner) if owner == thread => taken.push(posted),
                Some(_) => rest.push_back(posted),
                None => drop(posted),
            }
        }
        *events = rest;
        taken
    }

    /// Number of queued events.
    pub fn pending_count(&self) -> usize {
        self.events.lock().len()
    }
}

/// The process-wide [`PostedEventQueue`] singleton.
pub fn posted_queue() -> &'static PostedEventQueue {
    static QUEUE: OnceLock<PostedEventQueue> = OnceLock::new();
    QUEUE.get_or_init(PostedEventQueue::new)
}
