//! Handlers and the materialized reducer
//!
//! A handler is a pure state transform bound to one action. Two shapes are
//! accepted, enforced by the type system through [`Handler`]:
//!
//! ```ignore
//! fn reset(state: i32) -> i32 { 0 }                         // state only
//! fn increment(state: i32, payload: i32) -> i32 { state + payload } // state + payload
//! ```
//!
//! Binding a two-input handler fixes the action's payload type to the second
//! input's type.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::action::{Action, ActionId, ActionSet};
use crate::error::{StoreError, StoreResult};

type HandlerFn<S> = dyn Fn(S, &Action) -> StoreResult<S> + Send + Sync;

/// Number of inputs a bound handler declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// `Fn(S) -> S`: any pending payload is discarded.
    StateOnly,
    /// `Fn(S, P) -> S`: the pending payload is consumed.
    WithPayload,
}

/// Marker for `Fn(S) -> S` handlers.
pub struct StateOnly;

/// Marker for `Fn(S, P) -> S` handlers.
pub struct WithPayload<P>(PhantomData<fn() -> P>);

/// A handler erased to `(state, action) -> state`.
pub struct BoundHandler<S> {
    arity: Arity,
    call: Arc<HandlerFn<S>>,
}

impl<S> BoundHandler<S> {
    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn call(&self, state: S, action: &Action) -> StoreResult<S> {
        (self.call)(state, action)
    }
}

impl<S> Clone for BoundHandler<S> {
    fn clone(&self) -> Self {
        Self {
            arity: self.arity,
            call: Arc::clone(&self.call),
        }
    }
}

impl<S> fmt::Debug for BoundHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Functions usable as reducer logic for state `S`.
///
/// `Marker` only disambiguates the two blanket impls and is inferred.
pub trait Handler<S, Marker>: Send + Sync + 'static {
    /// Erase the handler, fixing the action's payload type where needed.
    fn bind(self, action: &Action) -> StoreResult<BoundHandler<S>>;
}

impl<S, F> Handler<S, StateOnly> for F
where
    S: 'static,
    F: Fn(S) -> S + Send + Sync + 'static,
{
    fn bind(self, _action: &Action) -> StoreResult<BoundHandler<S>> {
        let call: Arc<HandlerFn<S>> = Arc::new(move |state: S, action: &Action| -> StoreResult<S> {
            action.discard_payload();
            Ok(self(state))
        });
        Ok(BoundHandler {
            arity: Arity::StateOnly,
            call,
        })
    }
}

impl<S, P, F> Handler<S, WithPayload<P>> for F
where
    S: 'static,
    P: Any + Send + Default,
    F: Fn(S, P) -> S + Send + Sync + 'static,
{
    fn bind(self, action: &Action) -> StoreResult<BoundHandler<S>> {
        action.fix_payload_type::<P>()?;
        let call: Arc<HandlerFn<S>> = Arc::new(move |state: S, action: &Action| -> StoreResult<S> {
            let payload = action.take_payload::<P>()?;
            Ok(self(state, payload))
        });
        Ok(BoundHandler {
            arity: Arity::WithPayload,
            call,
        })
    }
}

/// Reducer for one state slice: a dispatch table keyed by action identity.
pub struct Reducer<S> {
    actions: ActionSet,
    handlers: Arc<HashMap<ActionId, BoundHandler<S>>>,
}

impl<S> Reducer<S> {
    pub(crate) fn new(actions: ActionSet, handlers: HashMap<ActionId, BoundHandler<S>>) -> Self {
        Self {
            actions,
            handlers: Arc::new(handlers),
        }
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Compute the next state for `action`.
    ///
    /// Fails with [`StoreError::UnreachableAction`] if no handler is bound
    /// to the action's identity.
    pub fn reduce(&self, state: S, action: &Action) -> StoreResult<S> {
        let handler = self
            .handlers
            .get(&action.id())
            .ok_or_else(|| StoreError::UnreachableAction {
                action: action.name().to_string(),
            })?;
        handler.call(state, action)
    }

    pub fn arity_of(&self, action: &Action) -> Option<Arity> {
        self.handlers.get(&action.id()).map(BoundHandler::arity)
    }
}

impl<S> Clone for Reducer<S> {
    fn clone(&self) -> Self {
        Self {
            actions: self.actions.clone(),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<S> fmt::Debug for Reducer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer")
            .field("actions", &self.actions)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
