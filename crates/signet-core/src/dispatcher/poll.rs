//! The portable poll/selector dispatcher driver.
//!
//! One `poll(2)` set per dispatcher: a self-pipe that [`wake_up`]
//! interrupts blocked waits through, plus every enabled socket notifier's
//! descriptor. In [`PumpMode::Wait`] the poll timeout is the time to the
//! next timer deadline (or unbounded when no timers exist); in
//! [`PumpMode::Poll`] the iteration never blocks.
//!
//! After the poll returns, ready notifiers get a socket-activity event and
//! due timers fire, each at most once per pump. Events go synchronously to
//! receivers owned by the pumping thread and through the posted queue
//! otherwise.
//!
//! [`wake_up`]: EventDispatcher::wake_up

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::dispatcher::{
    deliver_or_post, EventDispatcher, PumpMode, SocketInterest, SocketNotifier, TimerId,
    TimerTable,
};
use crate::error::SignetError;
use crate::event::Event;
use crate::object::ObjectId;

fn interest_events(interest: SocketInterest) -> libc::c_short {
    match interest {
        SocketInterest::Read => libc::POLLIN,
        SocketInterest::Write => libc::POLLOUT,
        SocketInterest::Exception => libc::POLLPRI,
    }
}

fn set_nonblocking_cloexec(fd: i32) {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
        let fd_flags = libc::fcntl(fd, libc::F_GETFD);
        if fd_flags >= 0 {
            libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC);
        }
    }
}

/// The poll-based dispatcher driver.
pub struct PollDispatcher {
    wake_read: i32,
    wake_write: i32,
    notifiers: Mutex<Vec<Arc<SocketNotifier>>>,
    timers: TimerTable,
    interrupted: AtomicBool,
}

impl PollDispatcher {
    /// Create the driver, allocating its wake pipe.
    pub fn new() -> crate::error::Result<Self> {
        let mut fds = [0i32; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(SignetError::DispatcherInit(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        set_nonblocking_cloexec(fds[0]);
        set_nonblocking_cloexec(fds[1]);
        Ok(Self {
            wake_read: fds[0],
            wake_write: fds[1],
            notifiers: Mutex::new(Vec::new()),
            timers: TimerTable::new(),
            interrupted: AtomicBool::new(false),
        })
    }

    fn drain_wake_pipe(&self) {
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe {
                libc::read(
                    self.wake_read,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if n <= 0 {
                break;
            }
        }
    }

    fn poll_timeout(&self, mode: PumpMode) -> libc::c_int {
        match mode {
            PumpMode::Poll => 0,
            PumpMode::Wait => match self.timers.time_until_next() {
                Some(remaining) => remaining.as_millis().min(i32::MAX as u128) as libc::c_int,
                None => -1,
            },
        }
    }
}

impl EventDispatcher for PollDispatcher {
    fn process_events(&self, mode: PumpMode) -> bool {
        if self.interrupted.swap(false, Ordering::SeqCst) {
            return false;
        }

        let enabled: Vec<Arc<SocketNotifier>> = self
            .notifiers
            .lock()
            .iter()
            .filter(|n| n.is_enabled())
            .cloned()
            .collect();

        let mut pollfds = Vec::with_capacity(enabled.len() + 1);
        pollfds.push(libc::pollfd {
            fd: self.wake_read,
            events: libc::POLLIN,
            revents: 0,
        });
        for notifier in &enabled {
            pollfds.push(libc::pollfd {
                fd: notifier.fd(),
                events: interest_events(notifier.interest()),
                revents: 0,
            });
        }

        let rc = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                self.poll_timeout(mode),
            )
        };

        let mut work = false;
        if rc > 0 {
            if pollfds[0].revents & libc::POLLIN != 0 {
                self.drain_wake_pipe();
            }
            for (pfd, notifier) in pollfds[1..].iter().zip(&enabled) {
                if self.interrupted.load(Ordering::SeqCst) {
                    break;
                }
                if pfd.revents & libc::POLLNVAL != 0 {
                    tracing::warn!(
                        target: "signet_core::dispatcher",
                        fd = notifier.fd(),
                        "socket notifier descriptor invalid; disabling"
                    );
                    notifier.set_enabled(false);
                    continue;
                }
                if pfd.revents & (pfd.events | libc::POLLERR | libc::POLLHUP) != 0 {
                    deliver_or_post(
                        notifier.receiver(),
                        Event::socket_activity(notifier.fd(), notifier.interest()),
                    );
                    work = true;
                }
            }
        }

        for (id, receiver) in self.timers.take_due(Instant::now()) {
            if self.interrupted.load(Ordering::SeqCst) {
                break;
            }
            deliver_or_post(receiver, Event::timer(id));
            work = true;
        }

        work
    }

    fn wake_up(&self) {
        let byte = 1u8;
        // A full pipe already has a wake pending; the failed write is fine.
        unsafe {
            libc::write(self.wake_write, &byte as *const u8 as *const libc::c_void, 1);
        }
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.wake_up();
    }

    fn register_timer(&self, id: TimerId, interval: Duration, receiver: ObjectId) {
        self.timers.register(id, interval, receiver);
        self.wake_up();
    }

    fn unregister_timer(&self, id: TimerId) -> bool {
        self.timers.unregister(id)
    }

    fn unregister_timers(&self, receiver: ObjectId) -> bool {
        self.timers.unregister_receiver(receiver)
    }

    fn remaining_time(&self, id: TimerId) -> Option<Duration> {
        self.timers.remaining(id)
    }

    fn register_socket_notifier(&self, notifier: Arc<SocketNotifier>) {
        self.notifiers.lock().push(notifier);
        self.wake_up();
    }

    fn unregister_socket_notifier(&self, notifier: &Arc<SocketNotifier>) {
        self.notifiers
            .lock()
            .retain(|n| !Arc::ptr_eq(n, notifier));
        self.wake_up();
    }

    fn shutting_down(&self) {
        self.notifiers.lock().clear();
        self.timers.clear();
    }
}

impl Drop for PollDispatcher {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.wake_read);
            libc::close(self.wake_write);
        }
    }
}
