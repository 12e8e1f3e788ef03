//! Core systems for Signet.
//!
//! This crate is a reflective, signal-driven object kernel:
//!
//! - **Meta-Object System**: per-class descriptors of properties, methods
//!   and signals, with a process-wide registry for lookup and dynamic
//!   construction by class name
//! - **Object Model**: parent-child ownership, naming, dynamic properties,
//!   thread affinity, event hooks
//! - **Signal/Slot Routing**: a process-wide connection table with
//!   per-connection delivery modes (auto, direct, queued, blocking)
//! - **Event System**: tagged events with acceptance state and a posted
//!   queue drained by each thread's loop
//! - **Dispatchers**: pluggable platform drivers behind one scheduling
//!   surface (poll/selector by default, GLib main context behind the
//!   `glib` feature)
//! - **Timers**: monotonic process-unique ids, fire-once-per-pump
//!   semantics, per-receiver cleanup
//!
//! # Signal/Slot Example
//!
//! ```no_run
//! use std::sync::{Arc, OnceLock};
//! use signet_core::{
//!     base_meta, connect, invoker1, track, ConnectionMode, MetaObject, Object,
//!     ObjectBase, ObjectExt, ObjectId, Property, Value,
//! };
//!
//! struct Sender {
//!     base: ObjectBase,
//! }
//!
//! impl Sender {
//!     fn new() -> Arc<Self> {
//!         track(Self { base: ObjectBase::new::<Self>() })
//!     }
//!
//!     fn meta() -> &'static MetaObject {
//!         static META: OnceLock<MetaObject> = OnceLock::new();
//!         META.get_or_init(|| {
//!             MetaObject::builder("Sender")
//!                 .parent(base_meta())
//!                 .signal("fired", "fired(i32)")
//!                 .build()
//!         })
//!     }
//! }
//!
//! impl Object for Sender {
//!     fn object_id(&self) -> ObjectId {
//!         self.base.id()
//!     }
//!     fn meta_object(&self) -> &'static MetaObject {
//!         Self::meta()
//!     }
//! }
//!
//! struct Receiver {
//!     base: ObjectBase,
//!     last: Property<i32>,
//! }
//!
//! impl Receiver {
//!     fn new() -> Arc<Self> {
//!         track(Self {
//!             base: ObjectBase::new::<Self>(),
//!             last: Property::new(0),
//!         })
//!     }
//!
//!     fn meta() -> &'static MetaObject {
//!         static META: OnceLock<MetaObject> = OnceLock::new();
//!         META.get_or_init(|| {
//!             MetaObject::builder("Receiver")
//!                 .parent(base_meta())
//!                 .method("on_fired", "on_fired(i32)", invoker1(|r: &Receiver, v: i32| {
//!                     r.last.set(v);
//!                 }))
//!                 .build()
//!         })
//!     }
//! }
//!
//! impl Object for Receiver {
//!     fn object_id(&self) -> ObjectId {
//!         self.base.id()
//!     }
//!     fn meta_object(&self) -> &'static MetaObject {
//!         Self::meta()
//!     }
//! }
//!
//! let sender = Sender::new();
//! let receiver = Receiver::new();
//! connect(&*sender, "fired", &*receiver, "on_fired", ConnectionMode::Auto);
//! sender.emit_signal("fired", &[Value::from(7)]);
//! assert_eq!(receiver.last.get(), 7);
//! ```
//!
//! # Event Loop Example
//!
//! ```no_run
//! use signet_core::Application;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Application::new()?;
//!     // Create objects, connect signals, start timers...
//!     std::process::exit(app.exec());
//! }
//! ```

#![warn(missing_docs)]
// Type-erased accessor and invoker signatures are long by nature.
#![allow(clippy::type_complexity)]

mod application;
pub mod connection;
pub mod dispatcher;
mod error;
pub mod event;
pub mod invocation;
pub mod logging;
pub mod meta;
pub mod object;
pub mod property;
pub mod thread_check;
pub mod thread_loop;
pub mod value;

pub use application::Application;
pub use connection::{connect, disconnect, connection_manager, Connection, ConnectionManager, ConnectionMode};
pub use dispatcher::{
    EventDispatcher, PumpMode, SocketInterest, SocketNotifier, TimerId, TimerTable,
};
#[cfg(unix)]
pub use dispatcher::poll::PollDispatcher;
#[cfg(all(feature = "glib", unix))]
pub use dispatcher::glib::GlibDispatcher;
pub use error::{Result, SignetError};
pub use event::{
    posted_queue, ChildAction, ChildEvent, Event, EventKind, EventType, MetaCallEvent,
    PostedEvent, PostedEventQueue, TimerEvent,
};
pub use invocation::{
    completion_pair, invoker0, invoker1, invoker2, invoker3, CompletionHandle, CompletionWaiter,
    DeliveryError,
};
pub use meta::{
    meta_registry, MetaError, MetaMethod, MetaObject, MetaObjectBuilder, MetaProperty,
    MetaRegistry, MetaResult, MetaSignal, MethodInvoker,
};
pub use object::{
    base_meta, default_event, destroy, object_cast, object_registry, property, set_parent,
    set_property, track, Object, ObjectBase, ObjectError, ObjectExt, ObjectId, ObjectRegistry,
    ObjectResult,
};
pub use property::Property;
pub use thread_check::{are_thread_checks_enabled, set_thread_checks_enabled, ThreadAffinity};
pub use thread_loop::{LoopHandle, ThreadLoop};
pub use value::{FromValue, IntoValue, Value};
