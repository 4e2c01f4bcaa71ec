//! Binding handlers to actions and producing a [`BusinessUnit`]
//!
//! The builder accumulates one handler per action of its [`ActionSet`] and
//! refuses to produce a unit until every action is covered.
//!
//! ```ignore
//! use state_dispatch::prelude::*;
//!
//! #[derive(ActionSet)]
//! struct CounterActions {
//!     increment: Action,
//!     decrement: Action,
//! }
//!
//! struct DecrementLogic;
//!
//! #[action_logic(state = i32)]
//! impl DecrementLogic {
//!     pub fn decrement(&self, state: i32, payload: i32) -> i32 {
//!         state - payload
//!     }
//! }
//!
//! let actions = CounterActions::new();
//! let unit = BusinessUnitBuilder::from_descriptor(0, &actions)?
//!     .on(&actions.increment, |state: i32, payload: i32| state + payload)?
//!     .logic(DecrementLogic)?
//!     .selector("counter")?
//!     .build()?;
//! ```

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::action::{Action, ActionId, ActionSet, ActionSetDescriptor};
use crate::error::{check_selector, StoreError, StoreResult};
use crate::reducer::{BoundHandler, Handler, Reducer};
use crate::state::State;

type Binder<S> = Box<dyn FnOnce(&Action) -> StoreResult<BoundHandler<S>> + Send>;

/// One named handler exposed by a logic object.
pub struct LogicEntry<S> {
    name: &'static str,
    binder: Binder<S>,
}

impl<S: 'static> LogicEntry<S> {
    pub fn new<H, M>(name: &'static str, handler: H) -> Self
    where
        H: Handler<S, M>,
    {
        Self {
            name,
            binder: Box::new(move |action: &Action| handler.bind(action)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn bind(self, action: &Action) -> StoreResult<BoundHandler<S>> {
        (self.binder)(action)
    }
}

impl<S> fmt::Debug for LogicEntry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// An object whose methods implement actions, matched by name.
///
/// Implement with `#[action_logic(state = T)]` on an inherent impl block:
/// every `pub fn name(&self, state: T) -> T` or
/// `pub fn name(&self, state: T, payload: P) -> T` becomes an entry.
pub trait ActionLogic<S>: Send + Sync + 'static {
    fn entries(self: Arc<Self>) -> Vec<LogicEntry<S>>;
}

/// Validated, immutable bundle of initial state, actions, reducer and selector.
#[derive(Clone)]
pub struct BusinessUnit<S> {
    initial_state: S,
    actions: ActionSet,
    reducer: Reducer<S>,
    selector: String,
}

impl<S> BusinessUnit<S> {
    pub fn initial_state(&self) -> &S {
        &self.initial_state
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    pub fn reducer(&self) -> &Reducer<S> {
        &self.reducer
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub(crate) fn into_parts(self) -> (S, ActionSet, Reducer<S>, String) {
        (self.initial_state, self.actions, self.reducer, self.selector)
    }
}

impl<S: fmt::Debug> fmt::Debug for BusinessUnit<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusinessUnit")
            .field("selector", &self.selector)
            .field("initial_state", &self.initial_state)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`BusinessUnit`].
pub struct BusinessUnitBuilder<S: State> {
    initial_state: S,
    actions: ActionSet,
    selector: Option<String>,
    handlers: HashMap<ActionId, BoundHandler<S>>,
}

impl<S: State> BusinessUnitBuilder<S> {
    pub fn new(initial_state: S, actions: ActionSet) -> Self {
        Self {
            initial_state,
            actions,
            selector: None,
            handlers: HashMap::new(),
        }
    }

    /// Start from a descriptor struct (see `#[derive(ActionSet)]`).
    pub fn from_descriptor<D>(initial_state: S, descriptor: &D) -> StoreResult<Self>
    where
        D: ActionSetDescriptor + ?Sized,
    {
        Ok(Self::new(initial_state, descriptor.action_set()?))
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Set the store key for this unit. Fails with `EmptySelector` on `""`.
    pub fn selector(mut self, selector: impl Into<String>) -> StoreResult<Self> {
        let selector = selector.into();
        check_selector(&selector)?;
        self.selector = Some(selector);
        Ok(self)
    }

    /// Bind `handler` to `action`.
    ///
    /// Fails with `NotOwned` for an action outside this builder's set,
    /// `DuplicateBinding` for an action already bound, and `Contract` when
    /// the action's payload type is already fixed to a different type.
    pub fn on<H, M>(mut self, action: &Action, handler: H) -> StoreResult<Self>
    where
        H: Handler<S, M>,
    {
        self.ensure_bindable(action)?;
        let bound = handler.bind(action)?;
        tracing::debug!(action = %action.name(), arity = ?bound.arity(), "handler bound");
        self.handlers.insert(action.id(), bound);
        Ok(self)
    }

    /// Bind every entry of a logic object to the action of the same name.
    ///
    /// Entries without a matching action are skipped with a warning, so
    /// logic objects may carry methods for actions this set does not
    /// declare. Entries targeting an action that already has a handler are
    /// skipped as well. A logic object of the state's own type is rejected.
    pub fn logic<L: ActionLogic<S>>(self, logic: L) -> StoreResult<Self> {
        self.logic_arc(Arc::new(logic))
    }

    /// Like [`logic`](Self::logic), for an already shared object.
    pub fn logic_arc<L: ActionLogic<S>>(mut self, logic: Arc<L>) -> StoreResult<Self> {
        if TypeId::of::<L>() == TypeId::of::<S>() {
            return Err(StoreError::contract(format!(
                "the logic of the actions cannot be provided by the state type `{}`",
                type_name::<S>()
            )));
        }

        for entry in logic.entries() {
            let Some(action) = self.actions.get(entry.name()).cloned() else {
                tracing::warn!(
                    method = entry.name(),
                    logic = type_name::<L>(),
                    actions = ?self.actions.names().collect::<Vec<_>>(),
                    "logic method has no associated action"
                );
                continue;
            };
            if self.handlers.contains_key(&action.id()) {
                tracing::warn!(
                    method = entry.name(),
                    logic = type_name::<L>(),
                    "action already has a handler, logic method skipped"
                );
                continue;
            }
            let bound = entry.bind(&action)?;
            tracing::debug!(action = %action.name(), arity = ?bound.arity(), "logic method bound");
            self.handlers.insert(action.id(), bound);
        }
        Ok(self)
    }

    /// Actions still lacking a handler, in declaration order.
    pub fn unbound(&self) -> Vec<&Action> {
        self.actions
            .actions()
            .iter()
            .filter(|action| !self.handlers.contains_key(&action.id()))
            .collect()
    }

    /// Validate exhaustiveness and produce the unit.
    ///
    /// Fails with `UnboundActions` naming every action without a handler.
    /// Without an explicit selector, one is derived from the state type and
    /// the action set's identity.
    pub fn build(self) -> StoreResult<BusinessUnit<S>> {
        let unbound: Vec<String> = self
            .unbound()
            .into_iter()
            .map(|action| action.name().to_string())
            .collect();
        if !unbound.is_empty() {
            return Err(StoreError::UnboundActions { actions: unbound });
        }

        let selector = self
            .selector
            .unwrap_or_else(|| format!("{}#{}", type_name::<S>(), self.actions.id()));

        Ok(BusinessUnit {
            initial_state: self.initial_state,
            reducer: Reducer::new(self.actions.clone(), self.handlers),
            actions: self.actions,
            selector,
        })
    }

    fn ensure_bindable(&self, action: &Action) -> StoreResult<()> {
        if !self.actions.contains(action) {
            return Err(StoreError::NotOwned {
                action: action.name().to_string(),
            });
        }
        if self.handlers.contains_key(&action.id()) {
            return Err(StoreError::DuplicateBinding {
                action: action.name().to_string(),
            });
        }
        Ok(())
    }
}

impl<S: State> fmt::Debug for BusinessUnitBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusinessUnitBuilder")
            .field("initial_state", &self.initial_state)
            .field("actions", &self.actions)
            .field("selector", &self.selector)
            .field("bound", &self.handlers.len())
            .finish()
    }
}
