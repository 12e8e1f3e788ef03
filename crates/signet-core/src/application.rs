//! The application singleton: event-loop entry, event posting and the
//! timer-id allocator.
//!
//! Exactly one [`Application`] exists per process. It owns the dispatcher,
//! pumps it in [`exec`](Application::exec), and is the funnel for posting
//! and sending events. Posted events land in the process-wide queue and
//! wake the loop of the receiver's owning thread: the application's
//! dispatcher for its own thread, a [`ThreadLoop`](crate::thread_loop::ThreadLoop)
//! waker for helper threads. Posting to a thread that runs no loop leaves
//! the event queued until a loop appears, the receiver is destroyed, or
//! the events are removed explicitly.
//!
//! Timer ids come from a process-global monotonic counter and are never
//! reused within a process lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::dispatcher::{EventDispatcher, PumpMode, TimerId};
use crate::error::{Result, SignetError};
use crate::event::{posted_queue, Event, EventType};
use crate::object::{self, ObjectId};

static APPLICATION: OnceLock<Application> = OnceLock::new();

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate the next process-unique timer id.
pub(crate) fn next_timer_id() -> TimerId {
    TimerId::new(NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed))
}

type Waker = Arc<dyn Fn() + Send + Sync>;

fn wakers() -> &'static Mutex<HashMap<ThreadId, Waker>> {
    static WAKERS: OnceLock<Mutex<HashMap<ThreadId, Waker>>> = OnceLock::new();
    WAKERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register the waker that releases `thread`'s parked event loop.
pub(crate) fn register_waker(thread: ThreadId, waker: Waker) {
    wakers().lock().insert(thread, waker);
}

/// Remove `thread`'s waker when its loop exits.
pub(crate) fn unregister_waker(thread: ThreadId) {
    wakers().lock().remove(&thread);
}

/// Wake the loop running on `thread`, if one is registered.
pub(crate) fn wake_thread(thread: ThreadId) -> bool {
    let waker = wakers().lock().get(&thread).cloned();
    match waker {
        Some(waker) => {
            waker();
            true
        }
        None => false,
    }
}

/// Post an event to `receiver`'s owning loop.
///
/// The queue takes ownership. Returns `false`, destroying the event,
/// when no application exists or the receiver is already gone.
pub(crate) fn post_to(receiver: ObjectId, event: Event) -> bool {
    if Application::try_instance().is_none() {
        tracing::warn!(
            target: "signet_core::event_loop",
            event_type = ?event.event_type(),
            "posted event dropped: no application"
        );
        return false;
    }
    let Some(owner) = object::thread_of(receiver) else {
        return false;
    };
    posted_queue().push(receiver, event);
    if !wake_thread(owner) {
        tracing::debug!(
            target: "signet_core::event_loop",
            ?receiver,
            "event posted to a thread with no running loop"
        );
    }
    true
}

/// The process-global application: dispatcher owner and event-loop entry.
pub struct Application {
    dispatcher: Arc<dyn EventDispatcher>,
    quit: AtomicBool,
    exit_code: AtomicI32,
}

impl Application {
    /// Initialize the application with the default platform dispatcher.
    ///
    /// Fails when an application already exists or no dispatcher can be
    /// built for this target.
    pub fn new() -> Result<&'static Application> {
        #[cfg(unix)]
        {
            let dispatcher: Arc<dyn EventDispatcher> =
                Arc::new(crate::dispatcher::poll::PollDispatcher::new()?);
            Self::with_dispatcher(dispatcher)
        }
        #[cfg(not(unix))]
        {
            Err(SignetError::DispatcherInit(
                "no platform dispatcher for this target; supply one with with_dispatcher".into(),
            ))
        }
    }

    /// Initialize the application with an explicit dispatcher.
    pub fn with_dispatcher(dispatcher: Arc<dyn EventDispatcher>) -> Result<&'static Application> {
        let app = Application {
            dispatcher,
            quit: AtomicBool::new(false),
            exit_code: AtomicI32::new(0),
        };
        APPLICATION
            .set(app)
            .map_err(|_| SignetError::ApplicationAlreadyInitialized)?;
        let app = APPLICATION.get().expect("application just initialized");
        app.dispatcher.starting_up();
        tracing::debug!(target: "signet_core::event_loop", "application initialized");
        Ok(app)
    }

    /// The application instance.
    ///
    /// # Panics
    ///
    /// Panics when [`Application::new`] has not run yet.
    pub fn instance() -> &'static Application {
        APPLICATION
            .get()
            .expect("Application not initialized; call Application::new() first")
    }

    /// The application instance, or `None` before initialization.
    pub fn try_instance() -> Option<&'static Application> {
        APPLICATION.get()
    }

    /// The dispatcher this application owns.
    pub fn dispatcher(&self) -> &Arc<dyn EventDispatcher> {
        &self.dispatcher
    }

    /// Run the event loop on the calling thread until [`quit`](Self::quit)
    /// or [`exit`](Self::exit). Returns the exit code.
    #[tracing::instrument(skip(self), target = "signet_core::event_loop", level = "debug")]
    pub fn exec(&self) -> i32 {
        self.quit.store(false, Ordering::SeqCst);
        self.exit_code.store(0, Ordering::SeqCst);

        let thread = std::thread::current().id();
        let dispatcher = self.dispatcher.clone();
        register_waker(thread, Arc::new(move || dispatcher.wake_up()));

        tracing::debug!(target: "signet_core::event_loop", "entering event loop");
        loop {
            if self.quit.load(Ordering::SeqCst) {
                break;
            }
            self.dispatcher.process_events(PumpMode::Wait);
            self.deliver_posted();
        }
        unregister_waker(thread);
        tracing::debug!(target: "signet_core::event_loop", "event loop exited");

        self.exit_code.load(Ordering::SeqCst)
    }

    /// Run one non-blocking pump on the calling thread: native sources,
    /// timers, then this thread's share of the posted-event queue.
    /// Returns `true` if any work was done.
    pub fn process_events(&self) -> bool {
        let native = self.dispatcher.process_events(PumpMode::Poll);
        let delivered = self.deliver_posted();
        native || delivered > 0
    }

    fn deliver_posted(&self) -> usize {
        let batch = posted_queue().take_for_thread(std::thread::current().id());
        let count = batch.len();
        for mut posted in batch {
            object::deliver(posted.receiver, &mut posted.event);
        }
        count
    }

    /// Ask the loop to exit with code 0.
    pub fn quit(&self) {
        self.exit(0);
    }

    /// Ask the loop to exit with `code`.
    pub fn exit(&self, code: i32) {
        tracing::debug!(target: "signet_core::event_loop", code, "exit requested");
        self.exit_code.store(code, Ordering::SeqCst);
        self.quit.store(true, Ordering::SeqCst);
        self.dispatcher.wake_up();
    }

    /// Post `event` to `receiver`'s owning loop; the queue takes
    /// ownership. A dead receiver destroys the event and returns `false`.
    pub fn post_event(&self, receiver: ObjectId, event: Event) -> bool {
        post_to(receiver, event)
    }

    /// Deliver `event` synchronously through `receiver`'s event hook,
    /// returning its acceptance.
    pub fn send_event(&self, receiver: ObjectId, event: &mut Event) -> bool {
        object::deliver(receiver, event)
    }

    /// Remove queued events addressed to `receiver`, optionally filtered
    /// by type. Returns how many were destroyed.
    pub fn remove_posted_events(&self, receiver: ObjectId, kind: Option<EventType>) -> usize {
        posted_queue().remove_for(receiver, kind)
    }

    /// Stop the dispatcher and release its native resources.
    ///
    /// Runs the dispatcher's teardown hook; the connection table and
    /// object registry drain afterward as the remaining objects drop.
    pub fn shutdown(&self) {
        self.dispatcher.interrupt();
        self.dispatcher.shutting_down();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::meta::MetaObject;
    use crate::object::{base_meta, track, Object, ObjectBase, ObjectExt};
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn app() -> &'static Application {
        let _ = Application::new();
        Application::instance()
    }

    struct Probe {
        base: ObjectBase,
        users: AtomicU32,
        timers: AtomicU32,
    }

    impl Probe {
        fn new() -> Arc<Self> {
            track(Self {
                base: ObjectBase::new::<Self>(),
                users: AtomicU32::new(0),
                timers: AtomicU32::new(0),
            })
        }

        fn meta() -> &'static MetaObject {
            static META: OnceLock<MetaObject> = OnceLock::new();
            META.get_or_init(|| MetaObject::builder("Probe").parent(base_meta()).build())
        }
    }

    impl Object for Probe {
        fn object_id(&self) -> ObjectId {
            self.base.id()
        }

        fn meta_object(&self) -> &'static MetaObject {
            Self::meta()
        }

        fn event(&self, event: &mut crate::event::Event) -> bool {
            match event.kind() {
                EventKind::User { .. } => {
                    self.users.fetch_add(1, Ordering::SeqCst);
                    true
                }
                _ => false,
            }
        }

        fn timer_event(&self, _event: &crate::event::TimerEvent) {
            self.timers.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_post_then_pump_delivers_on_owning_thread() {
        let app = app();
        let probe = Probe::new();

        assert!(app.post_event(probe.object_id(), Event::user(1, None)));
        assert!(app.process_events());
        assert_eq!(probe.users.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_event_returns_acceptance() {
        let app = app();
        let probe = Probe::new();

        let mut accepted = Event::user(1, None);
        assert!(app.send_event(probe.object_id(), &mut accepted));
        assert!(accepted.is_accepted());

        // Deferred-delete is handled by default handling; a plain unknown
        // custom kind the object ignores is not.
        let mut ignored = Event::socket_activity(-1, crate::dispatcher::SocketInterest::Read);
        assert!(!app.send_event(probe.object_id(), &mut ignored));
    }

    #[test]
    fn test_remove_posted_events() {
        let app = app();
        let probe = Probe::new();

        app.post_event(probe.object_id(), Event::user(1, None));
        app.post_event(probe.object_id(), Event::user(2, None));
        assert_eq!(app.remove_posted_events(probe.object_id(), Some(EventType::User)), 2);

        app.process_events();
        assert_eq!(probe.users.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_post_to_dead_receiver_is_noop() {
        let app = app();
        let probe = Probe::new();
        let id = probe.object_id();
        drop(probe);

        assert!(!app.post_event(id, Event::user(1, None)));
    }

    #[test]
    fn test_timer_id_allocation_monotonic() {
        let first = next_timer_id();
        let second = next_timer_id();
        assert!(second.as_u64() > first.as_u64());
        assert!(first.as_u64() > 0);
    }

    #[test]
    fn test_start_timer_and_fire() {
        let app = app();
        let probe = Probe::new();

        let id = probe.start_timer(Duration::from_millis(5)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        app.process_events();
        assert!(probe.timers.load(Ordering::SeqCst) >= 1);

        assert!(probe.kill_timer(id));
        let fired = probe.timers.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        app.process_events();
        assert_eq!(probe.timers.load(Ordering::SeqCst), fired);
    }

    #[test]
    fn test_second_initialization_fails() {
        let _ = app();
        assert!(matches!(
            Application::new(),
            Err(SignetError::ApplicationAlreadyInitialized)
        ));
    }
}
