//! The GLib main-context dispatcher driver.
//!
//! Attaches the kernel's pump to a [`glib::MainContext`]: each
//! `process_events` runs one non-blocking iteration of the context so
//! foreign GLib sources stay serviced, then runs the shared poll/timer
//! walk that delivers socket activity and fires due timers.
//!
//! A blocked [`PumpMode::Wait`] iteration parks in the poll set and is
//! released by kernel activity: timers, watched sockets, posted events,
//! [`wake_up`](EventDispatcher::wake_up). Foreign context sources are
//! serviced on each pump but do not themselves release a blocked wait;
//! have such sources call `wake_up` when they need immediate attention.

use std::sync::Arc;
use std::time::Duration;

use crate::dispatcher::poll::PollDispatcher;
use crate::dispatcher::{EventDispatcher, PumpMode, SocketNotifier, TimerId};
use crate::object::ObjectId;

/// Dispatcher driver that services a GLib main context alongside the
/// kernel's own sources.
pub struct GlibDispatcher {
    context: glib::MainContext,
    poll: PollDispatcher,
}

impl GlibDispatcher {
    /// Attach to the default main context.
    pub fn new() -> crate::error::Result<Self> {
        Self::with_context(glib::MainContext::default())
    }

    /// Attach to an explicit main context.
    pub fn with_context(context: glib::MainContext) -> crate::error::Result<Self> {
        Ok(Self {
            context,
            poll: PollDispatcher::new()?,
        })
    }

    /// The attached main context.
    pub fn context(&self) -> &glib::MainContext {
        &self.context
    }

    fn iterate_context(&self) -> bool {
        match self.context.acquire() {
            Ok(_guard) => self.context.iteration(false),
            Err(_) => {
                tracing::warn!(
                    target: "signet_core::dispatcher",
                    "main context owned by another thread; skipping iteration"
                );
                false
            }
        }
    }
}

impl EventDispatcher for GlibDispatcher {
    fn process_events(&self, mode: PumpMode) -> bool {
        let mut work = self.iterate_context();
        work |= self.poll.process_events(mode);
        if mode == PumpMode::Wait {
            // Catch context sources that became ready while parked.
            work |= self.iterate_context();
        }
        work
    }

    fn wake_up(&self) {
        self.poll.wake_up();
        self.context.wakeup();
    }

    fn interrupt(&self) {
        self.poll.interrupt();
        self.context.wakeup();
    }

    fn register_timer(&self, id: TimerId, interval: Duration, receiver: ObjectId) {
        self.poll.register_timer(id, interval, receiver);
    }

    fn unregister_timer(&self, id: TimerId) -> bool {
        self.poll.unregister_timer(id)
    }

    fn unregister_timers(&self, receiver: ObjectId) -> bool {
        self.poll.unregister_timers(receiver)
    }

    fn remaining_time(&self, id: TimerId) -> Option<Duration> {
        self.poll.remaining_time(id)
    }

    fn register_socket_notifier(&self, notifier: Arc<SocketNotifier>) {
        self.poll.register_socket_notifier(notifier);
    }

    fn unregister_socket_notifier(&self, notifier: &Arc<SocketNotifier>) {
        self.poll.unregister_socket_notifier(notifier);
    }

    fn shutting_down(&self) {
        self.poll.shutting_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaObject;
    use crate::object::{base_meta, track, Object, ObjectBase};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::OnceLock;

    struct TickSink {
        base: ObjectBase,
        ticks: AtomicU32,
    }

    impl TickSink {
        fn new() -> Arc<Self> {
            track(Self {
                base: ObjectBase::new::<Self>(),
                ticks: AtomicU32::new(0),
            })
        }

        fn meta() -> &'static MetaObject {
            static META: OnceLock<MetaObject> = OnceLock::new();
            META.get_or_init(|| MetaObject::builder("TickSink").parent(base_meta()).build())
        }
    }

    impl Object for TickSink {
        fn object_id(&self) -> ObjectId {
            self.base.id()
        }

        fn meta_object(&self) -> &'static MetaObject {
            Self::meta()
        }

        fn timer_event(&self, _event: &crate::event::TimerEvent) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_timer_fires_through_glib_pump() {
        let dispatcher = GlibDispatcher::new().unwrap();
        let sink = TickSink::new();

        dispatcher.register_timer(
            TimerId::new(2001),
            Duration::from_millis(5),
            sink.object_id(),
        );
        std::thread::sleep(Duration::from_millis(20));
        assert!(dispatcher.process_events(PumpMode::Poll));
        assert_eq!(sink.ticks.load(Ordering::SeqCst), 1);
    }
}
