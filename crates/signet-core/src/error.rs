//! Crate-level error type.

use std::fmt;

use crate::invocation::DeliveryError;
use crate::meta::MetaError;
use crate::object::ObjectError;

/// The aggregate error type for kernel operations.
#[derive(Debug)]
pub enum SignetError {
    /// A second application was initialized in the same process.
    ApplicationAlreadyInitialized,
    /// The platform dispatcher could not be created.
    DispatcherInit(String),
    /// Object-graph error.
    Object(ObjectError),
    /// Meta-object error.
    Meta(MetaError),
    /// Queued or blocking delivery error.
    Delivery(DeliveryError),
}

impl fmt::Display for SignetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApplicationAlreadyInitialized => {
                write!(f, "application has already been initialized")
            }
            Self::DispatcherInit(msg) => write!(f, "failed to create event dispatcher: {msg}"),
            Self::Object(err) => write!(f, "object error: {err}"),
            Self::Meta(err) => write!(f, "meta-object error: {err}"),
            Self::Delivery(err) => write!(f, "delivery error: {err}"),
        }
    }
}

impl std::error::Error for SignetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Object(err) => Some(err),
            Self::Meta(err) => Some(err),
            Self::Delivery(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ObjectError> for SignetError {
    fn from(err: ObjectError) -> Self {
        Self::Object(err)
    }
}

impl From<MetaError> for SignetError {
    fn from(err: MetaError) -> Self {
        Self::Meta(err)
    }
}

impl From<DeliveryError> for SignetError {
    fn from(err: DeliveryError) -> Self {
        Self::Delivery(err)
    }
}

/// A specialized `Result` for kernel operations.
pub type Result<T> = std::result::Result<T, SignetError>;
