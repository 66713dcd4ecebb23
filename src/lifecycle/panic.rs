//! Panics that are caught and handled
//!
//! The panic hook installed by [`OsSignals`](super::OsSignals) runs before
//! unwinding starts, so it cannot see whether something up the stack will
//! catch the panic. Code that catches panics polls its work inside
//! [`handled`], and the hook skips panics raised while such a scope is active
//! on the panicking thread.

use futures::FutureExt;
use std::any::Any;
use std::cell::Cell;
use std::future::{Future, poll_fn};
use std::panic::AssertUnwindSafe;
use std::pin::pin;

thread_local! {
    static HANDLED_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct HandledScope;

impl HandledScope {
    fn enter() -> Self {
        HANDLED_DEPTH.with(|depth| depth.set(depth.get() + 1));
        HandledScope
    }
}

impl Drop for HandledScope {
    fn drop(&mut self) {
        HANDLED_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Whether the current thread is polling inside a [`handled`] scope
pub(crate) fn is_handled() -> bool {
    HANDLED_DEPTH.with(|depth| depth.get() > 0)
}

/// Poll `future` with its panics marked as handled by the caller
///
/// The caller must actually catch the panic, e.g. through `catch_unwind`.
pub(crate) async fn handled<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    poll_fn(|cx| {
        let _scope = HandledScope::enter();
        future.as_mut().poll(cx)
    })
    .await
}

/// Run `future`, turning a panic into its message
pub(crate) async fn catch_panic<F: Future>(future: F) -> std::result::Result<F::Output, String> {
    AssertUnwindSafe(handled(future))
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(payload.as_ref()))
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
