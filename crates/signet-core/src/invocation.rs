//! Invoker adapters and blocking-delivery completion primitives.
//!
//! The [`invoker0`]–[`invoker3`] family adapts a typed method on a concrete
//! object type into the uniform [`MethodInvoker`] call site the meta-object
//! system stores: `(receiver, argument list) → result`. Each adapter checks
//! the arity, downcasts the receiver to the declaring type, extracts every
//! argument through [`FromValue`] and packages the return through
//! [`IntoValue`]. On any mismatch the slot is not called and the error
//! names what was expected and what arrived.
//!
//! The completion pair carries a blocking emission's result back across
//! threads: the receiver's loop signals the [`CompletionHandle`] when the
//! slot has run, and the emitting thread blocks on the matching
//! [`CompletionWaiter`]. Dropping an unsignaled handle reports
//! [`DeliveryError::ReceiverDestroyed`], so a sender blocked on a receiver
//! that is destroyed mid-flight always unblocks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::meta::{MetaError, MetaResult, MethodInvoker};
use crate::object::{object_cast, Object};
use crate::value::{FromValue, IntoValue, Value};

fn check_arity(expected: usize, args: &[Value]) -> MetaResult<()> {
    if args.len() != expected {
        return Err(MetaError::ArityMismatch {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn cast_receiver<T: Object>(obj: &dyn Object) -> MetaResult<&T> {
    object_cast::<T>(obj).ok_or(MetaError::ReceiverMismatch {
        expected: std::any::type_name::<T>(),
    })
}

fn extract<A: FromValue>(args: &[Value], index: usize) -> MetaResult<A> {
    A::from_value(&args[index]).ok_or(MetaError::ArgumentMismatch {
        index,
        expected: std::any::type_name::<A>(),
        got: args[index].type_name(),
    })
}

/// Adapt a nullary method into a [`MethodInvoker`].
pub fn invoker0<T, R, F>(f: F) -> MethodInvoker
where
    T: Object,
    R: IntoValue + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
{
    Arc::new(move |obj: &dyn Object, args: &[Value]| {
        check_arity(0, args)?;
        let receiver = cast_receiver::<T>(obj)?;
        Ok(f(receiver).into_value())
    })
}

/// Adapt a one-argument method into a [`MethodInvoker`].
pub fn invoker1<T, A1, R, F>(f: F) -> MethodInvoker
where
    T: Object,
    A1: FromValue + 'static,
    R: IntoValue + 'static,
    F: Fn(&T, A1) -> R + Send + Sync + 'static,
{
    Arc::new(move |obj: &dyn Object, args: &[Value]| {
        check_arity(1, args)?;
        let receiver = cast_receiver::<T>(obj)?;
        let a1 = extract::<A1>(args, 0)?;
        Ok(f(receiver, a1).into_value())
    })
}

/// Adapt a two-argument method into a [`MethodInvoker`].
pub fn invoker2<T, A1, A2, R, F>(f: F) -> MethodInvoker
where
    T: Object,
    A1: FromValue + 'static,
    A2: FromValue + 'static,
    R: IntoValue + 'static,
    F: Fn(&T, A1, A2) -> R + Send + Sync + 'static,
{
    Arc::new(move |obj: &dyn Object, args: &[Value]| {
        check_arity(2, args)?;
        let receiver = cast_receiver::<T>(obj)?;
        let a1 = extract::<A1>(args, 0)?;
        let a2 = extract::<A2>(args, 1)?;
        Ok(f(receiver, a1, a2).into_value())
    })
}

/// Adapt a three-argument method into a [`MethodInvoker`].
pub fn invoker3<T, A1, A2, A3, R, F>(f: F) -> MethodInvoker
where
    T: Object,
    A1: FromValue + 'static,
    A2: FromValue + 'static,
    A3: FromValue + 'static,
    R: IntoValue + 'static,
    F: Fn(&T, A1, A2, A3) -> R + Send + Sync + 'static,
{
    Arc::new(move |obj: &dyn Object, args: &[Value]| {
        check_arity(3, args)?;
        let receiver = cast_receiver::<T>(obj)?;
        let a1 = extract::<A1>(args, 0)?;
        let a2 = extract::<A2>(args, 1)?;
        let a3 = extract::<A3>(args, 2)?;
        Ok(f(receiver, a1, a2, a3).into_value())
    })
}

/// How a queued or blocking delivery failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The slot ran and reported an invocation error.
    Invoke(MetaError),
    /// The receiver was destroyed before the slot could run.
    ReceiverDestroyed,
    /// No application/event loop was available to carry the event.
    NoEventLoop,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invoke(err) => write!(f, "slot invocation failed: {err}"),
            Self::ReceiverDestroyed => write!(f, "receiver destroyed before delivery"),
            Self::NoEventLoop => write!(f, "no event loop available for delivery"),
        }
    }
}

impl std::error::Error for DeliveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invoke(err) => Some(err),
            _ => None,
        }
    }
}

struct CompletionState {
    result: Mutex<Option<Result<Value, DeliveryError>>>,
    condvar: Condvar,
}

/// The receiver-side half of a blocking delivery.
///
/// Signal exactly once with the slot's result. Dropping an unsignaled
/// handle signals [`DeliveryError::ReceiverDestroyed`].
pub struct CompletionHandle {
    state: Option<Arc<CompletionState>>,
}

impl CompletionHandle {
    /// Deliver the slot's result and release the waiting thread.
    pub fn signal(mut self, result: Result<Value, DeliveryError>) {
        self.signal_inner(result);
    }

    fn signal_inner(&mut self, result: Result<Value, DeliveryError>) {
        if let Some(state) = self.state.take() {
            *state.result.lock() = Some(result);
            state.condvar.notify_all();
        }
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        self.signal_inner(Err(DeliveryError::ReceiverDestroyed));
    }
}

impl fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("signaled", &self.state.is_none())
            .finish()
    }
}

/// The sender-side half of a blocking delivery.
pub struct CompletionWaiter {
    state: Arc<CompletionState>,
}

impl CompletionWaiter {
    /// Block until the slot has run (or the receiver died), returning the
    /// slot's result.
    ///
    /// Calling this from the thread that must run the slot would deadlock;
    /// blocking connections degrade to direct delivery in that case.
    pub fn wait(self) -> Result<Value, DeliveryError> {
        let mut result = self.state.result.lock();
        while result.is_none() {
            self.state.condvar.wait(&mut result);
        }
        result.take().expect("completion signaled")
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `None` when the timeout elapsed without a signal.
    pub fn wait_timeout(self, timeout: Duration) -> Option<Result<Value, DeliveryError>> {
        let mut result = self.state.result.lock();
        if result.is_none() {
            self.state.condvar.wait_for(&mut result, timeout);
        }
        result.take()
    }
}

/// Create a connected handle/waiter pair for one blocking delivery.
pub fn completion_pair() -> (CompletionHandle, CompletionWaiter) {
    let state = Arc::new(CompletionState {
        result: Mutex::new(None),
        condvar: Condvar::new(),
    });
    (
        CompletionHandle {
            state: Some(state.clone()),
        },
        CompletionWaiter { state },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaObject;
    use crate::object::{base_meta, track, ObjectBase, ObjectId};
    use crate::property::Property;
    use std::sync::OnceLock;

    struct Calc {
        base: ObjectBase,
        total: Property<i64>,
    }

    impl Calc {
        fn new() -> Arc<Self> {
            track(Self {
                base: ObjectBase::new::<Self>(),
                total: Property::new(0),
            })
        }

        fn meta() -> &'static MetaObject {
            static META: OnceLock<MetaObject> = OnceLock::new();
            META.get_or_init(|| MetaObject::builder("Calc").parent(base_meta()).build())
        }
    }

    impl Object for Calc {
        fn object_id(&self) -> ObjectId {
            self.base.id()
        }

        fn meta_object(&self) -> &'static MetaObject {
            Self::meta()
        }
    }

    #[test]
    fn test_invoker_arity_checked() {
        let calc = Calc::new();
        let inv = invoker1(|c: &Calc, v: i64| c.total.set_silent(v));

        let err = (*inv)(&*calc, &[]).unwrap_err();
        assert_eq!(err, MetaError::ArityMismatch { expected: 1, got: 0 });
        assert_eq!(calc.total.get(), 0);
    }

    #[test]
    fn test_invoker_argument_mismatch() {
        let calc = Calc::new();
        let inv = invoker1(|c: &Calc, v: i64| c.total.set_silent(v));

        let err = (*inv)(&*calc, &[Value::from("seven")]).unwrap_err();
        assert!(matches!(err, MetaError::ArgumentMismatch { index: 0, .. }));
        assert_eq!(calc.total.get(), 0);
    }

    #[test]
    fn test_invoker_invokes_and_returns() {
        let calc = Calc::new();
        calc.total.set_silent(21);
        let inv = invoker0(|c: &Calc| c.total.get() * 2);

        assert_eq!((*inv)(&*calc, &[]).unwrap(), Value::from(42i64));
    }

    #[test]
    fn test_invoker_void_returns_null() {
        let calc = Calc::new();
        let inv = invoker1(|c: &Calc, v: i64| c.total.set_silent(v));

        let result = (*inv)(&*calc, &[Value::from(5i64)]).unwrap();
        assert!(result.is_null());
        assert_eq!(calc.total.get(), 5);
    }

    #[test]
    fn test_invoker_two_and_three_args() {
        let calc = Calc::new();
        let inv2 = invoker2(|_: &Calc, a: i64, b: i64| a + b);
        let inv3 = invoker3(|_: &Calc, a: i64, b: i64, c: i64| a + b + c);

        assert_eq!(
            (*inv2)(&*calc, &[Value::from(1i64), Value::from(2i64)]).unwrap(),
            Value::from(3i64)
        );
        assert_eq!(
            (*inv3)(
                &*calc,
                &[Value::from(1i64), Value::from(2i64), Value::from(3i64)]
            )
            .unwrap(),
            Value::from(6i64)
        );
    }

    #[test]
    fn test_completion_signal_releases_waiter() {
        let (handle, waiter) = completion_pair();

        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            handle.signal(Ok(Value::from(1)));
        });

        assert_eq!(waiter.wait(), Ok(Value::from(1)));
        thread.join().unwrap();
    }

    #[test]
    fn test_completion_drop_reports_destroyed() {
        let (handle, waiter) = completion_pair();
        drop(handle);
        assert_eq!(waiter.wait(), Err(DeliveryError::ReceiverDestroyed));
    }

    #[test]
    fn test_completion_timeout() {
        let (_handle, waiter) = completion_pair();
        assert!(waiter.wait_timeout(Duration::from_millis(10)).is_none());
    }
}
