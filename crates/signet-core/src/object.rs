//! The object kernel: identity, ownership tree, dynamic properties,
//! thread affinity and the event hook.
//!
//! Objects are reached through generational [`ObjectId`]s handed out by an
//! arena registry; the tree holds the owning [`Arc`]s, so destroying a
//! parent deterministically destroys its still-attached children and a
//! stale id simply fails to resolve instead of dangling.
//!
//! A type participates in the kernel by embedding an [`ObjectBase`],
//! implementing [`Object`], and finishing construction with [`track`]:
//!
//! ```ignore
//! struct Widget {
//!     base: ObjectBase,
//!     value: Property<i32>,
//! }
//!
//! impl Widget {
//!     fn new() -> Arc<Self> {
//!         track(Self {
//!             base: ObjectBase::new::<Self>(),
//!             value: Property::new(0),
//!         })
//!     }
//! }
//!
//! impl Object for Widget {
//!     fn object_id(&self) -> ObjectId {
//!         self.base.id()
//!     }
//!
//!     fn meta_object(&self) -> &'static MetaObject {
//!         Self::meta()
//!     }
//! }
//! ```
//!
//! Destruction runs in a fixed order: connections naming the object are
//! severed, its timers and posted events are reclaimed, it detaches from
//! its parent, then still-attached children are destroyed in reverse
//! insertion order. Dropping the last `Arc` of a root funnels through the
//! same path.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use crate::application;
use crate::dispatcher::TimerId;
use crate::event::{ChildAction, ChildEvent, Event, EventKind, TimerEvent};
use crate::invocation::DeliveryError;
use crate::meta::{MetaError, MetaObject};
use crate::thread_check::ThreadAffinity;
use crate::value::Value;

new_key_type! {
    /// A generational identifier for a kernel object.
    ///
    /// Ids stay valid while the object lives and fail to resolve afterward;
    /// they are never reused for a different object generation.
    pub struct ObjectId;
}

/// Errors from object-graph operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// The object id is invalid or the object has been destroyed.
    InvalidObjectId,
    /// The requested parent is the object itself or one of its descendants.
    CircularParentage,
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidObjectId => write!(f, "invalid or destroyed object id"),
            Self::CircularParentage => {
                write!(f, "cannot parent an object to itself or a descendant")
            }
        }
    }
}

impl std::error::Error for ObjectError {}

/// Result type for object operations.
pub type ObjectResult<T> = std::result::Result<T, ObjectError>;

/// The base trait of every kernel object.
///
/// `event` is the first-chance hook: return `true` to consume an event
/// before the kernel's default handling. Unconsumed events fall through to
/// [`default_event`], which dispatches meta-calls, timers, child events and
/// deferred deletion. `timer_event` and `child_event` are the convenience
/// sinks that default handling fans out to.
pub trait Object: Any + Send + Sync {
    /// This object's kernel identity.
    fn object_id(&self) -> ObjectId;

    /// The descriptor of this object's class.
    fn meta_object(&self) -> &'static MetaObject;

    /// First-chance event hook. Return `true` to consume the event.
    fn event(&self, event: &mut Event) -> bool {
        let _ = event;
        false
    }

    /// Called by default handling when a timer owned by this object fires.
    fn timer_event(&self, event: &TimerEvent) {
        let _ = event;
    }

    /// Called by default handling when a child is attached or detached.
    fn child_event(&self, event: &ChildEvent) {
        let _ = event;
    }
}

/// Downcast a dynamic object reference to a concrete type.
pub fn object_cast<T: Object>(obj: &dyn Object) -> Option<&T> {
    (obj as &dyn Any).downcast_ref::<T>()
}

/// The root class descriptor every object chain terminates in.
pub fn base_meta() -> &'static MetaObject {
    static META: OnceLock<MetaObject> = OnceLock::new();
    META.get_or_init(|| MetaObject::builder("Object").build())
}

struct ObjectEntry {
    name: String,
    type_name: &'static str,
    parent: Option<ObjectId>,
    children: Vec<Arc<dyn Object>>,
    dynamic: HashMap<String, Value>,
    thread: ThreadId,
    pending_delete: bool,
    live: Option<Weak<dyn Object>>,
}

impl ObjectEntry {
    fn new(type_name: &'static str, thread: ThreadId) -> Self {
        Self {
            name: String::new(),
            type_name,
            parent: None,
            children: Vec::new(),
            dynamic: HashMap::new(),
            thread,
            pending_delete: false,
            live: None,
        }
    }
}

/// The process-wide object arena: relationships, names, dynamic properties
/// and thread affinity for every living object.
pub struct ObjectRegistry {
    inner: RwLock<SlotMap<ObjectId, ObjectEntry>>,
}

impl ObjectRegistry {
    fn new() -> Self {
        Self {
            inner: RwLock::new(SlotMap::with_key()),
        }
    }

    fn register<T: Object>(&self, thread: ThreadId) -> ObjectId {
        let id = self
            .inner
            .write()
            .insert(ObjectEntry::new(std::any::type_name::<T>(), thread));
        tracing::trace!(
            target: "signet_core::object",
            ?id,
            type_name = std::any::type_name::<T>(),
            "registered object"
        );
        id
    }

    fn attach_live(&self, id: ObjectId, weak: Weak<dyn Object>) {
        if let Some(entry) = self.inner.write().get_mut(id) {
            entry.live = Some(weak);
        }
    }

    /// Whether an object with this id still exists.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.inner.read().contains_key(id)
    }

    /// The thread that owns the object.
    pub fn thread(&self, id: ObjectId) -> Option<ThreadId> {
        self.inner.read().get(id).map(|e| e.thread)
    }

    /// The object's parent, if it has one.
    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.inner.read().get(id).and_then(|e| e.parent)
    }

    /// The object's children, in insertion order.
    pub fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.inner
            .read()
            .get(id)
            .map(|e| e.children.iter().map(|c| c.object_id()).collect())
            .unwrap_or_default()
    }

    /// The object's display name.
    pub fn object_name(&self, id: ObjectId) -> Option<String> {
        self.inner.read().get(id).map(|e| e.name.clone())
    }

    /// Set the object's display name.
    pub fn set_object_name(&self, id: ObjectId, name: impl Into<String>) -> bool {
        match self.inner.write().get_mut(id) {
            Some(entry) => {
                entry.name = name.into();
                true
            }
            None => false,
        }
    }

    /// The object's Rust type name, for diagnostics.
    pub fn type_name(&self, id: ObjectId) -> Option<&'static str> {
        self.inner.read().get(id).map(|e| e.type_name)
    }

    /// Find a direct child by display name.
    pub fn find_child_by_name(&self, id: ObjectId, name: &str) -> Option<ObjectId> {
        let inner = self.inner.read();
        let entry = inner.get(id)?;
        entry
            .children
            .iter()
            .map(|c| c.object_id())
            .find(|&child| inner.get(child).is_some_and(|e| e.name == name))
    }

    /// Store a dynamic property. Insertion order is not preserved.
    pub fn set_dynamic_property(&self, id: ObjectId, name: impl Into<String>, value: Value) -> bool {
        match self.inner.write().get_mut(id) {
            Some(entry) => {
                entry.dynamic.insert(name.into(), value);
                true
            }
            None => false,
        }
    }

    /// Read a dynamic property.
    pub fn dynamic_property(&self, id: ObjectId, name: &str) -> Option<Value> {
        self.inner.read().get(id)?.dynamic.get(name).cloned()
    }

    /// The names of the object's dynamic properties, in no particular order.
    pub fn dynamic_property_names(&self, id: ObjectId) -> Vec<String> {
        self.inner
            .read()
            .get(id)
            .map(|e| e.dynamic.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Objects that currently have no parent.
    pub fn root_objects(&self) -> Vec<ObjectId> {
        self.inner
            .read()
            .iter()
            .filter(|(_, e)| e.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of living objects.
    pub fn object_count(&self) -> usize {
        self.inner.read().len()
    }

    fn live(&self, id: ObjectId) -> Option<Arc<dyn Object>> {
        self.inner.read().get(id)?.live.as_ref()?.upgrade()
    }

    fn mark_pending_delete(&self, id: ObjectId) -> bool {
        match self.inner.write().get_mut(id) {
            Some(entry) if !entry.pending_delete => {
                entry.pending_delete = true;
                true
            }
            _ => false,
        }
    }

    fn clear_pending_delete(&self, id: ObjectId) {
        if let Some(entry) = self.inner.write().get_mut(id) {
            entry.pending_delete = false;
        }
    }
}

/// The process-wide [`ObjectRegistry`] singleton.
pub fn object_registry() -> &'static ObjectRegistry {
    static REGISTRY: OnceLock<ObjectRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ObjectRegistry::new)
}

/// Resolve a living object for delivery.
pub(crate) fn live(id: ObjectId) -> Option<Arc<dyn Object>> {
    object_registry().live(id)
}

/// The owning thread of a living object.
pub(crate) fn thread_of(id: ObjectId) -> Option<ThreadId> {
    object_registry().thread(id)
}

/// Embedded helper that ties a struct into the object kernel.
///
/// Construction registers the object and captures the current thread as its
/// owning thread; dropping the base funnels into [`destroy`].
pub struct ObjectBase {
    id: ObjectId,
    affinity: ThreadAffinity,
}

impl ObjectBase {
    /// Register a new object of type `T` on the current thread.
    pub fn new<T: Object>() -> Self {
        let affinity = ThreadAffinity::current();
        let id = object_registry().register::<T>(affinity.thread_id());
        Self { id, affinity }
    }

    /// The object's kernel identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The thread this object belongs to.
    pub fn affinity(&self) -> ThreadAffinity {
        self.affinity
    }

    /// The object's display name.
    pub fn name(&self) -> String {
        object_registry().object_name(self.id).unwrap_or_default()
    }

    /// Set the object's display name.
    pub fn set_name(&self, name: impl Into<String>) {
        object_registry().set_object_name(self.id, name);
    }

    /// The parent object, if any.
    pub fn parent(&self) -> Option<ObjectId> {
        object_registry().parent(self.id)
    }

    /// Child ids in insertion order.
    pub fn children(&self) -> Vec<ObjectId> {
        object_registry().children(self.id)
    }

    /// Find a direct child by display name.
    pub fn find_child_by_name(&self, name: &str) -> Option<ObjectId> {
        object_registry().find_child_by_name(self.id, name)
    }
}

impl Drop for ObjectBase {
    fn drop(&mut self) {
        destroy(self.id);
    }
}

impl fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBase").field("id", &self.id).finish()
    }
}

/// Finish constructing a kernel object, handing the kernel the weak handle
/// it uses to deliver events and invoke slots.
pub fn track<T: Object>(obj: T) -> Arc<T> {
    let arc = Arc::new(obj);
    let as_dyn: Arc<dyn Object> = arc.clone();
    object_registry().attach_live(arc.object_id(), Arc::downgrade(&as_dyn));
    arc
}

/// Reparent `child`, detaching it from any previous parent.
///
/// A no-op when the parent is unchanged. Posts child-added/removed events
/// to the affected parents when an application exists.
pub fn set_parent(child: Arc<dyn Object>, new_parent: Option<ObjectId>) -> ObjectResult<()> {
    let child_id = child.object_id();
    let old_parent;
    let detached;
    {
        let mut inner = object_registry().inner.write();
        if !inner.contains_key(child_id) {
            return Err(ObjectError::InvalidObjectId);
        }
        if let Some(parent_id) = new_parent {
            if !inner.contains_key(parent_id) {
                return Err(ObjectError::InvalidObjectId);
            }
            // Walk up from the new parent; hitting the child means a cycle.
            let mut current = Some(parent_id);
            while let Some(id) = current {
                if id == child_id {
                    return Err(ObjectError::CircularParentage);
                }
                current = inner.get(id).and_then(|e| e.parent);
            }
        }

        old_parent = inner.get(child_id).and_then(|e| e.parent);
        if old_parent == new_parent {
            return Ok(());
        }

        detached = old_parent.and_then(|pid| {
            inner.get_mut(pid).and_then(|parent_entry| {
                parent_entry
                    .children
                    .iter()
                    .position(|c| c.object_id() == child_id)
                    .map(|pos| parent_entry.children.remove(pos))
            })
        });

        if let Some(entry) = inner.get_mut(child_id) {
            entry.parent = new_parent;
        }
        if let Some(parent_id) = new_parent {
            if let Some(parent_entry) = inner.get_mut(parent_id) {
                parent_entry.children.push(child.clone());
            }
        }
    }

    if let Some(pid) = old_parent {
        application::post_to(pid, Event::child_removed(child_id));
    }
    if let Some(pid) = new_parent {
        application::post_to(pid, Event::child_added(child_id));
    }
    // Released outside the registry lock: dropping the last strong
    // reference re-enters destroy().
    drop(detached);
    Ok(())
}

/// Destroy an object: sever its connections, reclaim its timers and posted
/// events, detach it from its parent, then destroy still-attached children
/// in reverse insertion order.
///
/// Idempotent; a stale id is ignored. User-held `Arc`s keep the memory
/// alive but the object no longer participates in the kernel.
pub fn destroy(id: ObjectId) {
    let (entry, detached_self) = {
        let mut inner = object_registry().inner.write();
        let Some(entry) = inner.remove(id) else {
            return;
        };
        let detached_self = entry.parent.and_then(|pid| {
            inner.get_mut(pid).and_then(|parent_entry| {
                parent_entry
                    .children
                    .iter()
                    .position(|c| c.object_id() == id)
                    .map(|pos| parent_entry.children.remove(pos))
            })
        });
        (entry, detached_self)
    };
    tracing::trace!(
        target: "signet_core::object",
        ?id,
        type_name = entry.type_name,
        children = entry.children.len(),
        "destroying object"
    );

    crate::connection::connection_manager().disconnect_all(id);
    crate::event::posted_queue().remove_for(id, None);
    if let Some(app) = application::Application::try_instance() {
        app.dispatcher().unregister_timers(id);
    }

    let mut children = entry.children;
    while let Some(child) = children.pop() {
        let child_id = child.object_id();
        drop(child);
        destroy(child_id);
    }
    drop(detached_self);
}

/// Deliver an event to a living receiver through its event hook.
pub(crate) fn deliver(receiver: ObjectId, event: &mut Event) -> bool {
    let Some(obj) = live(receiver) else {
        return false;
    };
    deliver_to_object(&obj, event)
}

pub(crate) fn deliver_to_object(obj: &Arc<dyn Object>, event: &mut Event) -> bool {
    if obj.event(event) {
        event.accept();
        return true;
    }
    let handled = default_event(&**obj, event);
    if handled {
        event.accept();
    }
    handled
}

/// The kernel's default event handling, applied when an object's
/// [`Object::event`] hook does not consume the event.
///
/// Meta-calls invoke the named method and signal any completion handle;
/// timer and child events fan out to their sinks; deferred-delete destroys
/// the receiver. Returns `false` for unrecognized events.
pub fn default_event(obj: &dyn Object, event: &mut Event) -> bool {
    match event.kind_mut() {
        EventKind::MetaCall(call) => {
            let completion = call.completion.take();
            let result = match obj.meta_object().find_method(&call.slot) {
                Some(method) => method.invoke(obj, &call.args),
                None => Err(MetaError::MethodNotFound {
                    name: call.slot.clone(),
                }),
            };
            if let Some(handle) = completion {
                handle.signal(result.map_err(DeliveryError::Invoke));
            } else if let Err(err) = result {
                tracing::error!(
                    target: "signet_core::object",
                    slot = %call.slot,
                    error = %err,
                    "queued slot invocation failed"
                );
            }
            true
        }
        EventKind::Timer { id } => {
            obj.timer_event(&TimerEvent { timer_id: *id });
            true
        }
        EventKind::ChildAdded { child } => {
            obj.child_event(&ChildEvent {
                action: ChildAction::Added,
                child: *child,
            });
            true
        }
        EventKind::ChildRemoved { child } => {
            obj.child_event(&ChildEvent {
                action: ChildAction::Removed,
                child: *child,
            });
            true
        }
        EventKind::DeferredDelete => {
            destroy(obj.object_id());
            true
        }
        _ => false,
    }
}

/// Set a property by name: the typed meta property when one is declared on
/// the class chain, the dynamic-property map otherwise.
///
/// Returns `false` when a typed set is rejected (unknown type, read-only);
/// the rejection is logged.
pub fn set_property(obj: &dyn Object, name: &str, value: Value) -> bool {
    if let Some(prop) = obj.meta_object().find_property(name) {
        match prop.set(obj, value) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    target: "signet_core::object",
                    property = name,
                    error = %err,
                    "typed property set rejected"
                );
                false
            }
        }
    } else {
        object_registry().set_dynamic_property(obj.object_id(), name, value)
    }
}

/// Read a property by name: typed first, then dynamic.
pub fn property(obj: &dyn Object, name: &str) -> Option<Value> {
    if let Some(prop) = obj.meta_object().find_property(name) {
        match prop.get(obj) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    target: "signet_core::object",
                    property = name,
                    error = %err,
                    "typed property read failed"
                );
                None
            }
        }
    } else {
        object_registry().dynamic_property(obj.object_id(), name)
    }
}

/// Convenience surface every sized [`Object`] type gets for free.
pub trait ObjectExt: Object {
    /// See [`set_property`].
    fn set_property(&self, name: &str, value: Value) -> bool
    where
        Self: Sized,
    {
        set_property(self, name, value)
    }

    /// See [`property`].
    fn property(&self, name: &str) -> Option<Value>
    where
        Self: Sized,
    {
        property(self, name)
    }

    /// Names of this object's dynamic properties.
    fn dynamic_property_names(&self) -> Vec<String>
    where
        Self: Sized,
    {
        object_registry().dynamic_property_names(self.object_id())
    }

    /// The thread this object belongs to.
    fn thread(&self) -> Option<ThreadId>
    where
        Self: Sized,
    {
        thread_of(self.object_id())
    }

    /// Notify every slot connected to `signal` on this object.
    fn emit_signal(&self, signal: &str, args: &[Value])
    where
        Self: Sized,
    {
        crate::connection::emit(self.object_id(), signal, args);
    }

    /// Schedule this object's destruction through the event loop.
    ///
    /// Safe to call from a slot running on the object; the destruction
    /// happens when the owning loop processes the event. Repeated calls
    /// before processing post a single event.
    fn delete_later(&self)
    where
        Self: Sized,
    {
        let id = self.object_id();
        if !object_registry().mark_pending_delete(id) {
            return;
        }
        if !application::post_to(id, Event::deferred_delete()) {
            object_registry().clear_pending_delete(id);
        }
    }

    /// Start a repeating timer delivering to this object.
    ///
    /// Returns `None` when no application (and thus no dispatcher) exists.
    fn start_timer(&self, interval: Duration) -> Option<TimerId>
    where
        Self: Sized,
    {
        let app = application::Application::try_instance()?;
        let id = application::next_timer_id();
        app.dispatcher().register_timer(id, interval, self.object_id());
        tracing::trace!(
            target: "signet_core::timer",
            ?id,
            ?interval,
            receiver = ?self.object_id(),
            "timer started"
        );
        Some(id)
    }

    /// Stop one timer.
    fn kill_timer(&self, id: TimerId) -> bool
    where
        Self: Sized,
    {
        application::Application::try_instance()
            .is_some_and(|app| app.dispatcher().unregister_timer(id))
    }

    /// Stop every timer delivering to this object.
    fn kill_timers(&self) -> bool
    where
        Self: Sized,
    {
        application::Application::try_instance()
            .is_some_and(|app| app.dispatcher().unregister_timers(self.object_id()))
    }
}

impl<T: Object> ObjectExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    struct TestObject {
        base: ObjectBase,
        value: Property<i32>,
    }

    impl TestObject {
        fn new(value: i32) -> Arc<Self> {
            track(Self {
                base: ObjectBase::new::<Self>(),
                value: Property::new(value),
            })
        }

        fn meta() -> &'static MetaObject {
            static META: OnceLock<MetaObject> = OnceLock::new();
            META.get_or_init(|| {
                MetaObject::builder("TestObject")
                    .parent(base_meta())
                    .property(
                        "value",
                        "i32",
                        |o: &TestObject| o.value.get(),
                        |o, v| {
                            o.value.set(v);
                        },
                    )
                    .build()
            })
        }
    }

    impl Object for TestObject {
        fn object_id(&self) -> ObjectId {
            self.base.id()
        }

        fn meta_object(&self) -> &'static MetaObject {
            Self::meta()
        }
    }

    fn as_dyn(obj: &Arc<TestObject>) -> Arc<dyn Object> {
        obj.clone()
    }

    #[test]
    fn test_object_registration_and_name() {
        let obj = TestObject::new(1);
        assert!(object_registry().contains(obj.object_id()));

        obj.base.set_name("first");
        assert_eq!(obj.base.name(), "first");
    }

    #[test]
    fn test_owning_thread_captured() {
        let obj = TestObject::new(1);
        assert_eq!(obj.thread(), Some(std::thread::current().id()));

        let handle = std::thread::spawn(TestObject::new_remote);
        let (remote_id, remote_thread) = handle.join().unwrap();
        assert_eq!(thread_of(remote_id), Some(remote_thread));
    }

    impl TestObject {
        fn new_remote() -> (ObjectId, ThreadId) {
            let obj = TestObject::new(0);
            // Leak a clone so the object outlives the constructing thread.
            std::mem::forget(obj.clone());
            (obj.object_id(), std::thread::current().id())
        }
    }

    #[test]
    fn test_parent_child_and_reparent() {
        let parent1 = TestObject::new(1);
        let parent2 = TestObject::new(2);
        let child = TestObject::new(3);

        set_parent(as_dyn(&child), Some(parent1.object_id())).unwrap();
        assert_eq!(child.base.parent(), Some(parent1.object_id()));
        assert!(parent1.base.children().contains(&child.object_id()));

        set_parent(as_dyn(&child), Some(parent2.object_id())).unwrap();
        assert!(!parent1.base.children().contains(&child.object_id()));
        assert!(parent2.base.children().contains(&child.object_id()));

        set_parent(as_dyn(&child), None).unwrap();
        assert_eq!(child.base.parent(), None);
    }

    #[test]
    fn test_circular_parentage_rejected() {
        let a = TestObject::new(1);
        let b = TestObject::new(2);

        set_parent(as_dyn(&b), Some(a.object_id())).unwrap();
        let err = set_parent(as_dyn(&a), Some(b.object_id())).unwrap_err();
        assert_eq!(err, ObjectError::CircularParentage);

        let err = set_parent(as_dyn(&a), Some(a.object_id())).unwrap_err();
        assert_eq!(err, ObjectError::CircularParentage);
    }

    #[test]
    fn test_cascade_destroy() {
        let parent = TestObject::new(1);
        let child1 = TestObject::new(2);
        let child2 = TestObject::new(3);
        let grandchild = TestObject::new(4);

        set_parent(as_dyn(&child1), Some(parent.object_id())).unwrap();
        set_parent(as_dyn(&child2), Some(parent.object_id())).unwrap();
        set_parent(as_dyn(&grandchild), Some(child1.object_id())).unwrap();

        let ids = [
            parent.object_id(),
            child1.object_id(),
            child2.object_id(),
            grandchild.object_id(),
        ];

        destroy(parent.object_id());

        for id in ids {
            assert!(!object_registry().contains(id));
        }
    }

    #[test]
    fn test_drop_of_last_arc_destroys() {
        let obj = TestObject::new(1);
        let id = obj.object_id();
        drop(obj);
        assert!(!object_registry().contains(id));
        assert!(live(id).is_none());
    }

    #[test]
    fn test_find_child_by_name() {
        let parent = TestObject::new(1);
        let alpha = TestObject::new(2);
        let beta = TestObject::new(3);
        alpha.base.set_name("alpha");
        beta.base.set_name("beta");

        set_parent(as_dyn(&alpha), Some(parent.object_id())).unwrap();
        set_parent(as_dyn(&beta), Some(parent.object_id())).unwrap();

        assert_eq!(
            parent.base.find_child_by_name("beta"),
            Some(beta.object_id())
        );
        assert_eq!(parent.base.find_child_by_name("gamma"), None);
    }

    #[test]
    fn test_typed_property_first_dynamic_on_miss() {
        let obj = TestObject::new(42);

        // Typed hit.
        assert_eq!(obj.property("value"), Some(Value::from(42)));
        assert!(obj.set_property("value", Value::from(100)));
        assert_eq!(obj.value.get(), 100);

        // Typed mismatch is a rejection, not a dynamic fallback.
        assert!(!obj.set_property("value", Value::from("oops")));
        assert_eq!(obj.value.get(), 100);

        // Unknown names go to the dynamic map.
        assert!(obj.set_property("tag", Value::from("blue")));
        assert_eq!(obj.property("tag"), Some(Value::from("blue")));
        assert!(obj.dynamic_property_names().contains(&"tag".to_string()));
    }

    #[test]
    fn test_object_cast() {
        let obj = TestObject::new(7);
        let dynamic: Arc<dyn Object> = obj.clone();

        let cast = object_cast::<TestObject>(&*dynamic);
        assert!(cast.is_some());
        assert_eq!(cast.unwrap().value.get(), 7);

        struct Other {
            base: ObjectBase,
        }
        impl Object for Other {
            fn object_id(&self) -> ObjectId {
                self.base.id()
            }
            fn meta_object(&self) -> &'static MetaObject {
                base_meta()
            }
        }
        assert!(object_cast::<Other>(&*dynamic).is_none());
    }

    #[test]
    fn test_default_event_unknown_kind_unhandled() {
        let obj = TestObject::new(1);
        let mut event = Event::user(9, None);
        assert!(!default_event(&*obj, &mut event));
        assert!(!event.is_accepted());
    }

    #[test]
    fn test_deferred_delete_event_destroys() {
        let obj = TestObject::new(1);
        let id = obj.object_id();
        let dynamic: Arc<dyn Object> = obj.clone();
        drop(obj);

        let mut event = Event::deferred_delete();
        assert!(deliver_to_object(&dynamic, &mut event));
        assert!(!object_registry().contains(id));
    }
}
