//! Dispatch observation hooks
//!
//! A [`Middleware`] sees every action passing through [`Store::dispatch`]:
//! `before` runs ahead of routing, then exactly one of `after` (the action
//! was reduced on some selector) or `failed` (routing or reduction failed).
//!
//! Dispatch takes `&self` and may run on many threads at once, so middleware
//! that records anything needs its own interior mutability.
//!
//! [`Store::dispatch`]: crate::Store::dispatch

use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::error::StoreError;

pub trait Middleware: Send + Sync {
    /// Called before the action is routed.
    fn before(&self, action: &Action);

    /// Called after the owning slice reduced the action.
    fn after(&self, action: &Action, selector: &str, state_changed: bool);

    /// Called when dispatch returns an error.
    fn failed(&self, _action: &Action, _error: &StoreError) {}
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn before(&self, action: &Action) {
        (**self).before(action);
    }

    fn after(&self, action: &Action, selector: &str, state_changed: bool) {
        (**self).after(action, selector, state_changed);
    }

    fn failed(&self, action: &Action, error: &StoreError) {
        (**self).failed(action, error);
    }
}

impl<M: Middleware + ?Sized> Middleware for Box<M> {
    fn before(&self, action: &Action) {
        (**self).before(action);
    }

    fn after(&self, action: &Action, selector: &str, state_changed: bool) {
        (**self).after(action, selector, state_changed);
    }

    fn failed(&self, action: &Action, error: &StoreError) {
        (**self).failed(action, error);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl Middleware for NoopMiddleware {
    fn before(&self, _action: &Action) {}
    fn after(&self, _action: &Action, _selector: &str, _state_changed: bool) {}
}

/// Runs several middleware in sequence.
///
/// `before` runs in insertion order; `after` and `failed` run in reverse so
/// the hooks nest.
#[derive(Default)]
pub struct ComposedMiddleware {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl ComposedMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Builder-style [`add`](Self::add).
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.add(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl fmt::Debug for ComposedMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl Middleware for ComposedMiddleware {
    fn before(&self, action: &Action) {
        for middleware in &self.middlewares {
            middleware.before(action);
        }
    }

    fn after(&self, action: &Action, selector: &str, state_changed: bool) {
        for middleware in self.middlewares.iter().rev() {
            middleware.after(action, selector, state_changed);
        }
    }

    fn failed(&self, action: &Action, error: &StoreError) {
        for middleware in self.middlewares.iter().rev() {
            middleware.failed(action, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        tag: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recording {
        fn before(&self, action: &Action) {
            self.calls
                .lock()
                .push(format!("{}:before:{}", self.tag, action.name()));
        }

        fn after(&self, action: &Action, selector: &str, state_changed: bool) {
            self.calls.lock().push(format!(
                "{}:after:{}:{}:{}",
                self.tag,
                action.name(),
                selector,
                state_changed
            ));
        }

        fn failed(&self, action: &Action, _error: &StoreError) {
            self.calls
                .lock()
                .push(format!("{}:failed:{}", self.tag, action.name()));
        }
    }

    #[test]
    fn test_composed_middleware_nests() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let composed = ComposedMiddleware::new()
            .with(Recording {
                tag: "outer",
                calls: Arc::clone(&calls),
            })
            .with(Recording {
                tag: "inner",
                calls: Arc::clone(&calls),
            });
        let action = Action::new("increment");

        composed.before(&action);
        composed.after(&action, "counter", true);

        assert_eq!(
            *calls.lock(),
            vec![
                "outer:before:increment",
                "inner:before:increment",
                "inner:after:increment:counter:true",
                "outer:after:increment:counter:true",
            ]
        );
    }

    #[test]
    fn test_failed_defaults_to_noop() {
        let action = Action::new("increment");
        NoopMiddleware.failed(&action, &StoreError::EmptySelector);
    }

    #[test]
    fn test_shared_middleware_forwards() {
        let recording = Arc::new(Recording {
            tag: "shared",
            calls: Arc::new(Mutex::new(Vec::new())),
        });
        let action = Action::new("reset");

        let erased: Box<dyn Middleware> = Box::new(Arc::clone(&recording));
        erased.failed(&action, &StoreError::EmptySelector);

        assert_eq!(*recording.calls.lock(), vec!["shared:failed:reset"]);
    }
}
