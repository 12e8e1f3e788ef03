//! Meta-object descriptors and the process-wide class registry.
//!
//! Each object class describes its reflective surface (named properties,
//! invocable methods, declared signals, an optional factory and a parent
//! descriptor link) in a [`MetaObject`]. Descriptors are built once
//! per class, typically behind a `OnceLock` in a `meta()` associated
//! function, and registered in the [`MetaRegistry`] for lookup and dynamic
//! construction by class name.
//!
//! Name lookups search the class itself first and recurse into the parent
//! descriptor on a miss, so a class chain behaves like an inheritance
//! hierarchy even though the implementing Rust types are unrelated.
//!
//! # Example
//!
//! ```ignore
//! impl Widget {
//!     fn meta() -> &'static MetaObject {
//!         static META: OnceLock<MetaObject> = OnceLock::new();
//!         META.get_or_init(|| {
//!             MetaObject::builder("Widget")
//!                 .parent(object::base_meta())
//!                 .factory(|| Widget::new())
//!                 .property("value", "i32", |w: &Widget| w.value.get(), |w, v| {
//!                     w.value.set(v);
//!                 })
//!                 .method("calculate", "calculate() -> i64", invoker0(Widget::calculate))
//!                 .signal("value_changed", "value_changed(i32)")
//!                 .build()
//!         })
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::object::{object_cast, Object};
use crate::value::{FromValue, IntoValue, Value};

/// Errors surfaced by descriptor lookups and type-erased invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    /// The property has no setter.
    PropertyReadOnly {
        /// The read-only property's name.
        name: String,
    },
    /// A value's tag did not match the property's declared type.
    TypeMismatch {
        /// The declared type tag.
        expected: &'static str,
        /// The tag of the value that arrived.
        got: &'static str,
    },
    /// No method with the given name on the class chain.
    MethodNotFound {
        /// The method name that missed.
        name: String,
    },
    /// The argument list length did not match the method's arity.
    ArityMismatch {
        /// Declared parameter count.
        expected: usize,
        /// Arguments supplied.
        got: usize,
    },
    /// One argument's tag did not match the parameter type.
    ArgumentMismatch {
        /// Zero-based argument position.
        index: usize,
        /// The parameter's type name.
        expected: &'static str,
        /// The tag of the value that arrived.
        got: &'static str,
    },
    /// The receiver was not an instance of the declaring class.
    ReceiverMismatch {
        /// The declaring class's Rust type name.
        expected: &'static str,
    },
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PropertyReadOnly { name } => write!(f, "property '{name}' is read-only"),
            Self::TypeMismatch { expected, got } => {
                write!(f, "property type mismatch: expected {expected}, got {got}")
            }
            Self::MethodNotFound { name } => write!(f, "method '{name}' not found"),
            Self::ArityMismatch { expected, got } => {
                write!(f, "arity mismatch: expected {expected} arguments, got {got}")
            }
            Self::ArgumentMismatch {
                index,
                expected,
                got,
            } => write!(
                f,
                "argument {index} type mismatch: expected {expected}, got {got}"
            ),
            Self::ReceiverMismatch { expected } => {
                write!(f, "receiver is not an instance of {expected}")
            }
        }
    }
}

impl std::error::Error for MetaError {}

/// Result type for meta-object operations.
pub type MetaResult<T> = std::result::Result<T, MetaError>;

/// The uniform call site for a type-erased method invocation.
pub type MethodInvoker = Arc<dyn Fn(&dyn Object, &[Value]) -> MetaResult<Value> + Send + Sync>;

type PropertyGetter = Arc<dyn Fn(&dyn Object) -> MetaResult<Value> + Send + Sync>;
type PropertySetter = Arc<dyn Fn(&dyn Object, Value) -> MetaResult<()> + Send + Sync>;
type Factory = Box<dyn Fn() -> Arc<dyn Object> + Send + Sync>;

/// Descriptor of one named property: type tag, accessors, optional notify.
#[derive(Clone)]
pub struct MetaProperty {
    name: &'static str,
    type_name: &'static str,
    getter: PropertyGetter,
    setter: Option<PropertySetter>,
    notify: Option<&'static str>,
}

impl MetaProperty {
    /// The property name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared type tag.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the property has no setter.
    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }

    /// The signal emitted after a successful set, if declared.
    pub fn notify_signal(&self) -> Option<&'static str> {
        self.notify
    }

    /// Read the property from `object`.
    pub fn get(&self, object: &dyn Object) -> MetaResult<Value> {
        (*self.getter)(object)
    }

    /// Write the property on `object`, then emit the notify signal with the
    /// new value if one is declared.
    pub fn set(&self, object: &dyn Object, value: Value) -> MetaResult<()> {
        let notify_value = self.notify.map(|_| value.clone());
        let setter = self.setter.as_ref().ok_or_else(|| MetaError::PropertyReadOnly {
            name: self.name.to_string(),
        })?;
        (**setter)(object, value)?;
        if let (Some(signal), Some(value)) = (self.notify, notify_value) {
            crate::connection::emit(object.object_id(), signal, &[value]);
        }
        Ok(())
    }
}

impl fmt::Debug for MetaProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaProperty")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("read_only", &self.is_read_only())
            .field("notify", &self.notify)
            .finish()
    }
}

/// Descriptor of one invocable method (slot).
#[derive(Clone)]
pub struct MetaMethod {
    name: &'static str,
    signature: &'static str,
    invoker: MethodInvoker,
}

impl MetaMethod {
    /// The method name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The textual signature, for diagnostics.
    pub fn signature(&self) -> &'static str {
        self.signature
    }

    /// Invoke the method on `object` with the given argument list.
    pub fn invoke(&self, object: &dyn Object, args: &[Value]) -> MetaResult<Value> {
        (*self.invoker)(object, args)
    }
}

impl fmt::Debug for MetaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaMethod")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Descriptor of one declared signal.
#[derive(Debug, Clone)]
pub struct MetaSignal {
    name: &'static str,
    signature: &'static str,
}

impl MetaSignal {
    /// The signal name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The textual signature, for diagnostics.
    pub fn signature(&self) -> &'static str {
        self.signature
    }
}

/// The per-class descriptor: reflective surface plus parent link and factory.
pub struct MetaObject {
    class_name: &'static str,
    parent: Option<&'static MetaObject>,
    factory: Option<Factory>,
    properties: Vec<MetaProperty>,
    methods: Vec<MetaMethod>,
    signals: Vec<MetaSignal>,
}

impl MetaObject {
    /// Start building a descriptor for `class_name`.
    pub fn builder(class_name: &'static str) -> MetaObjectBuilder {
        MetaObjectBuilder {
            meta: MetaObject {
                class_name,
                parent: None,
                factory: None,
                properties: Vec::new(),
                methods: Vec::new(),
                signals: Vec::new(),
            },
        }
    }

    /// The class name this descriptor was registered under.
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// The parent descriptor, if any.
    pub fn parent(&self) -> Option<&'static MetaObject> {
        self.parent
    }

    /// Number of properties declared locally (excluding the parent chain).
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// The locally declared property at `index`.
    pub fn property_at(&self, index: usize) -> Option<&MetaProperty> {
        self.properties.get(index)
    }

    /// Find a property by name, searching the parent chain on a miss.
    pub fn find_property(&self, name: &str) -> Option<&MetaProperty> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.parent.and_then(|p| p.find_property(name)))
    }

    /// Number of methods declared locally.
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// The locally declared method at `index`.
    pub fn method_at(&self, index: usize) -> Option<&MetaMethod> {
        self.methods.get(index)
    }

    /// Find a method by name, searching the parent chain on a miss.
    pub fn find_method(&self, name: &str) -> Option<&MetaMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.parent.and_then(|p| p.find_method(name)))
    }

    /// Number of signals declared locally.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// The locally declared signal at `index`.
    pub fn signal_at(&self, index: usize) -> Option<&MetaSignal> {
        self.signals.get(index)
    }

    /// Find a signal by name, searching the parent chain on a miss.
    pub fn find_signal(&self, name: &str) -> Option<&MetaSignal> {
        self.signals
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.parent.and_then(|p| p.find_signal(name)))
    }

    /// Construct a new instance through the factory.
    ///
    /// Returns `None` for abstract classes (no factory registered).
    pub fn create_instance(&self) -> Option<Arc<dyn Object>> {
        self.factory.as_ref().map(|f| f())
    }

    /// Whether this class's parent chain passes through `other`.
    pub fn inherits(&self, other: &'static MetaObject) -> bool {
        let mut current = Some(self);
        while let Some(meta) = current {
            if std::ptr::eq(meta as *const MetaObject, other as *const MetaObject) {
                return true;
            }
            current = meta.parent.map(|p| p as &MetaObject);
        }
        false
    }
}

impl fmt::Debug for MetaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaObject")
            .field("class_name", &self.class_name)
            .field("parent", &self.parent.map(|p| p.class_name))
            .field("has_factory", &self.factory.is_some())
            .field("properties", &self.properties)
            .field("methods", &self.methods)
            .field("signals", &self.signals)
            .finish()
    }
}

/// Builder for [`MetaObject`] descriptors.
pub struct MetaObjectBuilder {
    meta: MetaObject,
}

impl MetaObjectBuilder {
    /// Link the parent descriptor; name lookups recurse into it on a miss.
    pub fn parent(mut self, parent: &'static MetaObject) -> Self {
        self.meta.parent = Some(parent);
        self
    }

    /// Register the factory used by [`MetaObject::create_instance`].
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Object> + Send + Sync + 'static,
    {
        self.meta.factory = Some(Box::new(factory));
        self
    }

    /// Declare a read-write property with typed accessors.
    ///
    /// The setter receives the already-extracted typed value; a tag mismatch
    /// is reported before it runs.
    pub fn property<T, V, G, S>(
        self,
        name: &'static str,
        type_name: &'static str,
        get: G,
        set: S,
    ) -> Self
    where
        T: Object,
        V: IntoValue + FromValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, V) + Send + Sync + 'static,
    {
        self.property_full(name, type_name, get, Some(set), None)
    }

    /// Declare a read-write property that emits `notify` after each set.
    pub fn property_notify<T, V, G, S>(
        self,
        name: &'static str,
        type_name: &'static str,
        get: G,
        set: S,
        notify: &'static str,
    ) -> Self
    where
        T: Object,
        V: IntoValue + FromValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, V) + Send + Sync + 'static,
    {
        self.property_full(name, type_name, get, Some(set), Some(notify))
    }

    /// Declare a read-only property.
    pub fn property_readonly<T, V, G>(
        self,
        name: &'static str,
        type_name: &'static str,
        get: G,
    ) -> Self
    where
        T: Object,
        V: IntoValue + FromValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.property_full::<T, V, G, fn(&T, V)>(name, type_name, get, None, None)
    }

    fn property_full<T, V, G, S>(
        mut self,
        name: &'static str,
        type_name: &'static str,
        get: G,
        set: Option<S>,
        notify: Option<&'static str>,
    ) -> Self
    where
        T: Object,
        V: IntoValue + FromValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, V) + Send + Sync + 'static,
    {
        let getter: PropertyGetter = Arc::new(move |obj: &dyn Object| {
            let typed = object_cast::<T>(obj).ok_or(MetaError::ReceiverMismatch {
                expected: std::any::type_name::<T>(),
            })?;
            Ok(get(typed).into_value())
        });
        let setter: Option<PropertySetter> = set.map(|set| {
            let setter: PropertySetter = Arc::new(move |obj: &dyn Object, value: Value| {
                let typed = object_cast::<T>(obj).ok_or(MetaError::ReceiverMismatch {
                    expected: std::any::type_name::<T>(),
                })?;
                let extracted = V::from_value(&value).ok_or(MetaError::TypeMismatch {
                    expected: type_name,
                    got: value.type_name(),
                })?;
                set(typed, extracted);
                Ok(())
            });
            setter
        });
        self.meta.properties.push(MetaProperty {
            name,
            type_name,
            getter,
            setter,
            notify,
        });
        self
    }

    /// Declare an invocable method; build the invoker with the
    /// [`invoker0`](crate::invocation::invoker0) family of adapters.
    pub fn method(
        mut self,
        name: &'static str,
        signature: &'static str,
        invoker: MethodInvoker,
    ) -> Self {
        self.meta.methods.push(MetaMethod {
            name,
            signature,
            invoker,
        });
        self
    }

    /// Declare a signal.
    pub fn signal(mut self, name: &'static str, signature: &'static str) -> Self {
        self.meta.signals.push(MetaSignal { name, signature });
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> MetaObject {
        self.meta
    }
}

/// The process-wide class registry: class name → descriptor.
///
/// Registration is idempotent; the last registration wins for a given name.
/// Well-formed programs register each class once, at initialization.
pub struct MetaRegistry {
    classes: Mutex<HashMap<&'static str, &'static MetaObject>>,
}

impl MetaRegistry {
    fn new() -> Self {
        Self {
            classes: Mutex::new(HashMap::new()),
        }
    }

    /// Register `meta` under its class name.
    pub fn register(&self, meta: &'static MetaObject) {
        tracing::trace!(
            target: "signet_core::meta",
            class = meta.class_name(),
            "registering class"
        );
        self.classes.lock().insert(meta.class_name(), meta);
    }

    /// Look up a descriptor by class name.
    pub fn find(&self, class_name: &str) -> Option<&'static MetaObject> {
        self.classes.lock().get(class_name).copied()
    }

    /// Whether a class is registered.
    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.lock().contains_key(class_name)
    }

    /// Construct an instance of a registered class by name.
    ///
    /// Returns `None` for unknown names and for abstract classes.
    pub fn create_instance(&self, class_name: &str) -> Option<Arc<dyn Object>> {
        self.find(class_name)?.create_instance()
    }

    /// Snapshot of the currently registered class names.
    pub fn registered_class_names(&self) -> Vec<&'static str> {
        self.classes.lock().keys().copied().collect()
    }

    /// Number of registered classes.
    pub fn class_count(&self) -> usize {
        self.classes.lock().len()
    }

    /// Remove every registration. Test support.
    pub fn clear(&self) {
        self.classes.lock().clear();
    }
}

/// The process-wide [`MetaRegistry`] singleton.
pub fn meta_registry() -> &'static MetaRegistry {
    static REGISTRY: OnceLock<MetaRegistry> = OnceLock::new();
    REGISTRY.get_or_init(MetaRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::invoker0;
    use crate::object::{base_meta, track, Object, ObjectBase, ObjectId};
    use crate::property::Property;

    struct Gadget {
        base: ObjectBase,
        level: Property<i32>,
    }

    impl Gadget {
        fn new() -> Arc<Self> {
            track(Self {
                base: ObjectBase::new::<Self>(),
                level: Property::new(3),
            })
        }

        fn meta() -> &'static MetaObject {
            static META: OnceLock<MetaObject> = OnceLock::new();
            META.get_or_init(|| {
                MetaObject::builder("Gadget")
                    .parent(base_meta())
                    .factory(|| Gadget::new())
                    .property(
                        "level",
                        "i32",
                        |g: &Gadget| g.level.get(),
                        |g, v| {
                            g.level.set(v);
                        },
                    )
                    .method("level_squared", "level_squared() -> i32", invoker0(
                        |g: &Gadget| g.level.get() * g.level.get(),
                    ))
                    .signal("level_changed", "level_changed(i32)")
                    .build()
            })
        }
    }

    impl Object for Gadget {
        fn object_id(&self) -> ObjectId {
            self.base.id()
        }

        fn meta_object(&self) -> &'static MetaObject {
            Self::meta()
        }
    }

    #[test]
    fn test_property_round_trip() {
        let gadget = Gadget::new();
        let meta = gadget.meta_object();

        let prop = meta.find_property("level").unwrap();
        assert_eq!(prop.get(&*gadget).unwrap(), Value::from(3));

        prop.set(&*gadget, Value::from(9)).unwrap();
        assert_eq!(gadget.level.get(), 9);
    }

    #[test]
    fn test_property_type_mismatch_rejected() {
        let gadget = Gadget::new();
        let prop = gadget.meta_object().find_property("level").unwrap();

        let err = prop.set(&*gadget, Value::from("nope")).unwrap_err();
        assert_eq!(
            err,
            MetaError::TypeMismatch {
                expected: "i32",
                got: "str"
            }
        );
        assert_eq!(gadget.level.get(), 3);
    }

    #[test]
    fn test_method_invocation() {
        let gadget = Gadget::new();
        gadget.level.set(5);

        let method = gadget.meta_object().find_method("level_squared").unwrap();
        assert_eq!(method.invoke(&*gadget, &[]).unwrap(), Value::from(25));
    }

    #[test]
    fn test_lookup_traverses_parent_chain() {
        let meta = Gadget::meta();
        assert!(meta.find_signal("level_changed").is_some());
        assert!(meta.find_signal("missing").is_none());
        // Gadget itself declares nothing named like the base class root,
        // but inherits() sees the chain.
        assert!(meta.inherits(base_meta()));
        assert!(!base_meta().inherits(meta));
    }

    #[test]
    fn test_registry_register_find_create() {
        let registry = meta_registry();
        registry.register(Gadget::meta());

        assert!(registry.contains("Gadget"));
        assert!(registry.find("Gadget").is_some());
        assert!(registry.find("NoSuchClass").is_none());
        assert!(registry.create_instance("NoSuchClass").is_none());

        let instance = registry.create_instance("Gadget").unwrap();
        assert_eq!(instance.meta_object().class_name(), "Gadget");
    }

    #[test]
    fn test_registry_register_idempotent() {
        let registry = meta_registry();
        registry.register(Gadget::meta());
        registry.register(Gadget::meta());
        assert!(registry.contains("Gadget"));
    }

    #[test]
    fn test_abstract_class_has_no_factory() {
        assert!(base_meta().create_instance().is_none());
    }
}
