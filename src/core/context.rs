//! Purpose: Caller-supplied execution context for content and frame calls.
//! Exports: `Context`, `CancelToken`, `CallScope`.
//! Role: Carries the parent span, cancellation, and deadline into every I/O call;
//! `CallScope` makes the active context visible to wrapped layers for one call.
//! Invariants: A scope pops exactly once, on drop, whatever path the call takes.
//! Invariants: Only the outermost scope on a thread enters the context's span.
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::Span;
use tracing::span::EnteredSpan;

use crate::core::error::{Error, ErrorKind};

thread_local! {
    static ACTIVE: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct Context {
    span: Span,
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context parented to whatever span is current on this thread.
    pub fn new() -> Self {
        Self {
            span: Span::current(),
            cancel: CancelToken::new(),
            deadline: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails with `Cancelled` once the token fires or the deadline passes.
    pub fn check(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::new(ErrorKind::Cancelled).with_message("context cancelled"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::new(ErrorKind::Cancelled).with_message("deadline exceeded"));
            }
        }
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard publishing a context for the duration of one call.
///
/// Wrapped layers call [`CallScope::current`] to pick up the caller's context
/// instead of storing it in the layer itself.
#[must_use = "the scope ends when the guard is dropped"]
pub struct CallScope {
    _entered: Option<EnteredSpan>,
}

impl CallScope {
    pub fn enter(cx: &Context) -> Self {
        let outermost = ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            active.push(cx.clone());
            active.len() == 1
        });
        let entered = outermost.then(|| cx.span.clone().entered());
        Self { _entered: entered }
    }

    pub fn current() -> Option<Context> {
        ACTIVE.with(|active| active.borrow().last().cloned())
    }

    pub fn depth() -> usize {
        ACTIVE.with(|active| active.borrow().len())
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            active.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{CallScope, CancelToken, Context};
    use crate::core::error::ErrorKind;
    use std::time::{Duration, Instant};

    #[test]
    fn fresh_context_passes_check() {
        assert!(Context::new().check().is_ok());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let cx = Context::new().with_cancel_token(token.clone());
        let copy = cx.clone();
        token.cancel();
        let err = copy.check().expect_err("cancelled");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(cx.cancel_token().is_cancelled());
    }

    #[test]
    fn expired_deadline_fails_check() {
        let cx = Context::new().with_deadline(Instant::now() - Duration::from_millis(1));
        let err = cx.check().expect_err("deadline");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.message(), Some("deadline exceeded"));

        let cx = Context::new().with_timeout(Duration::from_secs(60));
        assert!(cx.check().is_ok());
    }

    #[test]
    fn scopes_nest_and_unwind() {
        assert_eq!(CallScope::depth(), 0);
        assert!(CallScope::current().is_none());

        let outer_token = CancelToken::new();
        let outer = Context::new().with_cancel_token(outer_token.clone());
        {
            let _outer = CallScope::enter(&outer);
            assert_eq!(CallScope::depth(), 1);
            {
                let _inner = CallScope::enter(&Context::new());
                assert_eq!(CallScope::depth(), 2);
            }
            let seen = CallScope::current().expect("outer visible");
            outer_token.cancel();
            assert!(seen.cancel_token().is_cancelled());
        }
        assert_eq!(CallScope::depth(), 0);
    }

    #[test]
    fn scope_pops_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _scope = CallScope::enter(&Context::new());
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(CallScope::depth(), 0);
    }
}
