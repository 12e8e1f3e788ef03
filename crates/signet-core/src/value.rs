//! The type-erased argument/result container for the meta-object system.
//!
//! Signal arguments, slot parameters, method results and dynamic properties
//! all travel through [`Value`], a tagged sum over a small palette of
//! primitives plus an opaque payload variant for user types. Type tags are
//! textual so diagnostics can name what was expected and what arrived;
//! runtime extraction returns an `Option` rather than panicking.
//!
//! # Example
//!
//! ```
//! use signet_core::value::{FromValue, Value};
//!
//! let v = Value::from(42i32);
//! assert_eq!(v.type_name(), "i32");
//! assert_eq!(i32::from_value(&v), Some(42));
//! // No implicit widening: an i32 does not satisfy an i64 parameter.
//! assert_eq!(i64::from_value(&v), None);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A tagged, clonable container for one argument or result.
///
/// The palette covers the primitives the kernel itself traffics in; anything
/// else rides in [`Value::Any`] as a shared opaque payload.
#[derive(Clone)]
pub enum Value {
    /// No value; the result of a `()`-returning slot.
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 64-bit float.
    F64(f64),
    /// Owned string.
    Str(String),
    /// Opaque user payload, shared by reference count.
    Any(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary `Send + Sync` payload.
    pub fn any<T: Any + Send + Sync>(value: T) -> Self {
        Self::Any(Arc::new(value))
    }

    /// The textual tag of this value, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F64(_) => "f64",
            Self::Str(_) => "str",
            Self::Any(_) => "any",
        }
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the opaque payload as `T`, if this is an `Any` of that type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Any(payload) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::I32(v) => write!(f, "I32({v})"),
            Self::I64(v) => write!(f, "I64({v})"),
            Self::F64(v) => write!(f, "F64({v})"),
            Self::Str(v) => write!(f, "Str({v:?})"),
            Self::Any(_) => write!(f, "Any(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::F64(a), Self::F64(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            // Opaque payloads compare by identity.
            (Self::Any(a), Self::Any(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Conversion of a typed slot result into a [`Value`].
pub trait IntoValue {
    /// Package `self` as a [`Value`].
    fn into_value(self) -> Value;
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

macro_rules! into_value_via_from {
    ($($ty:ty),* $(,)?) => {
        $(impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::from(self)
            }
        })*
    };
}

into_value_via_from!(bool, i32, i64, f64, String);

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::from(self)
    }
}

/// Extraction of a typed slot argument from a [`Value`].
///
/// Returns `None` on a tag mismatch; adapters surface that as an argument
/// conversion failure without calling the slot.
pub trait FromValue: Sized {
    /// Extract `Self` from `value`, or `None` when the tags do not match.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_primitives() {
        assert_eq!(bool::from_value(&Value::from(true)), Some(true));
        assert_eq!(i32::from_value(&Value::from(7)), Some(7));
        assert_eq!(i64::from_value(&Value::from(7i64)), Some(7));
        assert_eq!(f64::from_value(&Value::from(1.5)), Some(1.5));
        assert_eq!(
            String::from_value(&Value::from("hello")),
            Some("hello".to_string())
        );
    }

    #[test]
    fn test_no_implicit_widening() {
        assert_eq!(i64::from_value(&Value::from(7i32)), None);
        assert_eq!(i32::from_value(&Value::from(7i64)), None);
        assert_eq!(f64::from_value(&Value::from(7i32)), None);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::from(1i32).type_name(), "i32");
        assert_eq!(Value::from("x").type_name(), "str");
        assert_eq!(Value::any(vec![1u8]).type_name(), "any");
    }

    #[test]
    fn test_any_payload() {
        #[derive(Debug, PartialEq)]
        struct Payload(u32);

        let v = Value::any(Payload(9));
        assert_eq!(v.downcast_ref::<Payload>(), Some(&Payload(9)));
        assert!(v.downcast_ref::<String>().is_none());

        // Clones share the payload.
        let w = v.clone();
        assert_eq!(v, w);
    }

    #[test]
    fn test_unit_into_value() {
        assert!(().into_value().is_null());
    }
}
