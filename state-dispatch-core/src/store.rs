//! Multi-slice store: routing, aggregation and subscriptions
//!
//! A [`Store`] owns one [`StateManager`] per selector. Each registered
//! [`BusinessUnit`] contributes a slice; dispatching an action finds the one
//! slice whose action set contains it and reduces that slice only.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use state_dispatch::prelude::*;
//!
//! #[derive(ActionSet)]
//! struct CounterActions {
//!     increment: Action,
//! }
//!
//! let actions = CounterActions::new();
//! let unit = BusinessUnitBuilder::from_descriptor(0, &actions)?
//!     .on(&actions.increment, |state: i32, by: i32| state + by)?
//!     .selector("counter")?
//!     .build()?;
//!
//! let store = Store::new(unit)?;
//! store.subscribe_to("counter", Arc::new(|n: i32| println!("counter: {n}")))?;
//!
//! store.dispatch(actions.increment.with(1)?)?;
//! assert_eq!(store.get_state_of::<i32>("counter")?, 1);
//! ```

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::action::{Action, ActionSet};
use crate::builder::BusinessUnit;
use crate::error::{check_selector, StoreError, StoreResult};
use crate::middleware::{Middleware, NoopMiddleware};
use crate::reducer::Reducer;
use crate::state::{GlobalListener, GlobalListeners, Listener, State, StateManager, SubscriptionId};

// ============================================================================
// Snapshots
// ============================================================================

trait AnyState: Any + Send + Sync + fmt::Debug {
    fn clone_box(&self) -> Box<dyn AnyState>;
    fn eq_dyn(&self, other: &dyn AnyState) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<S: State> AnyState for S {
    fn clone_box(&self) -> Box<dyn AnyState> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn AnyState) -> bool {
        other.as_any().downcast_ref::<S>() == Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<S>()
    }
}

/// Copy of one slice's state with its concrete type erased.
pub struct SliceState(Box<dyn AnyState>);

impl SliceState {
    fn of<S: State>(state: S) -> Self {
        Self(Box::new(state))
    }

    pub fn downcast_ref<S: State>(&self) -> Option<&S> {
        self.0.as_any().downcast_ref::<S>()
    }

    pub fn is<S: State>(&self) -> bool {
        self.0.as_any().is::<S>()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }
}

impl Clone for SliceState {
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl PartialEq for SliceState {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_dyn(other.0.as_ref())
    }
}

impl fmt::Debug for SliceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Aggregate snapshot of every slice, keyed by selector.
///
/// Always a mapping, even when the store holds a single slice.
#[derive(Clone, Default, PartialEq)]
pub struct GlobalState {
    slices: BTreeMap<String, SliceState>,
}

impl GlobalState {
    /// Typed view of one slice; `None` if absent or of another type.
    pub fn get<S: State>(&self, selector: &str) -> Option<&S> {
        self.slices.get(selector)?.downcast_ref()
    }

    pub fn slice(&self, selector: &str) -> Option<&SliceState> {
        self.slices.get(selector)
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.slices.contains_key(selector)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SliceState)> {
        self.slices.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

impl fmt::Debug for GlobalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.slices.iter()).finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// A live state manager with its state type erased.
trait Slice: Send + Sync {
    fn snapshot(&self) -> SliceState;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
    fn state_type(&self) -> &'static str;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<S: State> Slice for StateManager<S> {
    fn snapshot(&self) -> SliceState {
        SliceState::of(self.get_state())
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        StateManager::unsubscribe(self, id)
    }

    fn state_type(&self) -> &'static str {
        type_name::<S>()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A routable slice: the action set it owns and how to reduce into it.
trait Route: Send + Sync {
    fn actions(&self) -> &ActionSet;
    fn dispatch(&self, action: &Action) -> StoreResult<bool>;
}

struct Binding<S: State> {
    reducer: Reducer<S>,
    manager: Arc<StateManager<S>>,
}

impl<S: State> Route for Binding<S> {
    fn actions(&self) -> &ActionSet {
        self.reducer.actions()
    }

    fn dispatch(&self, action: &Action) -> StoreResult<bool> {
        self.manager
            .apply(|state| self.reducer.reduce(state, action))
    }
}

#[derive(Default)]
struct Registry {
    /// Selectors currently eligible for dispatch.
    routes: BTreeMap<String, Arc<dyn Route>>,
    /// Every manager ever registered, including ones whose route was removed.
    slices: BTreeMap<String, Arc<dyn Slice>>,
}

impl Registry {
    fn route_for(&self, action: &Action) -> Option<(String, Arc<dyn Route>)> {
        self.routes
            .iter()
            .find(|(_, route)| route.actions().contains(action))
            .map(|(selector, route)| (selector.clone(), Arc::clone(route)))
    }

    fn slice(&self, selector: &str) -> StoreResult<&Arc<dyn Slice>> {
        check_selector(selector)?;
        self.slices
            .get(selector)
            .ok_or_else(|| StoreError::UnknownSelector {
                selector: selector.to_string(),
            })
    }

    fn manager<S: State>(&self, selector: &str) -> StoreResult<Arc<StateManager<S>>> {
        let slice = self.slice(selector)?;
        let state_type = slice.state_type();
        Arc::clone(slice)
            .into_any()
            .downcast::<StateManager<S>>()
            .map_err(|_| {
                StoreError::contract(format!(
                    "selector `{selector}` holds state of type `{state_type}`, not `{}`",
                    type_name::<S>()
                ))
            })
    }
}

// ============================================================================
// Store
// ============================================================================

/// Registry of state slices, routing each dispatched action to its owner.
///
/// `Store` is `Send + Sync`; share it behind an `Arc` between threads.
/// Dispatches to different selectors never block each other.
pub struct Store {
    registry: RwLock<Registry>,
    global: GlobalListeners,
    middleware: Box<dyn Middleware>,
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Store with a single slice.
    pub fn new<S: State>(unit: BusinessUnit<S>) -> StoreResult<Self> {
        Self::builder().unit(unit)?.build()
    }

    fn empty(middleware: Box<dyn Middleware>) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            global: GlobalListeners::default(),
            middleware,
        }
    }

    /// Register a unit.
    ///
    /// Fails with `MultipleReducer` when the selector is already routed or
    /// any of the unit's actions is already routed to another selector. If the
    /// selector was removed earlier, its retained state resumes in place of
    /// the unit's initial state; a retained state of another type is a
    /// `Contract` error.
    pub fn add_reducer<S: State>(&self, unit: BusinessUnit<S>) -> StoreResult<()> {
        let (initial_state, actions, reducer, selector) = unit.into_parts();
        let mut registry = self.registry.write();

        if registry.routes.contains_key(&selector) {
            return Err(StoreError::multiple_reducer(format!(
                "the selector `{selector}` is already registered"
            )));
        }
        for (existing, route) in &registry.routes {
            let routed = route.actions();
            if routed.same_set(&actions) {
                return Err(StoreError::multiple_reducer(format!(
                    "the action set is already handled by the reducer of `{existing}`"
                )));
            }
            // Distinct sets built around the same action handles
            if let Some(shared) = routed.actions().iter().find(|a| actions.contains(a)) {
                return Err(StoreError::multiple_reducer(format!(
                    "the action `{}` is already handled by the reducer of `{existing}`",
                    shared.name()
                )));
            }
        }

        let manager = if registry.slices.contains_key(&selector) {
            let manager = registry.manager::<S>(&selector)?;
            tracing::debug!(selector = %selector, "reducer re-attached to retained state");
            manager
        } else {
            let manager = Arc::new(StateManager::with_global(
                selector.clone(),
                initial_state,
                Arc::clone(&self.global),
            )?);
            let slice: Arc<dyn Slice> = manager.clone();
            registry.slices.insert(selector.clone(), slice);
            manager
        };

        tracing::debug!(
            selector = %selector,
            state_type = type_name::<S>(),
            actions = ?actions.names().collect::<Vec<_>>(),
            "reducer added"
        );
        registry
            .routes
            .insert(selector, Arc::new(Binding { reducer, manager }));
        Ok(())
    }

    /// Stop routing actions to `selector`.
    ///
    /// The slice's state and subscribers are retained: reads and
    /// subscriptions keep working, and re-adding a unit under the same
    /// selector resumes from the retained value.
    pub fn remove_reducer(&self, selector: &str) -> StoreResult<()> {
        check_selector(selector)?;
        let removed = self.registry.write().routes.remove(selector);
        if removed.is_none() {
            return Err(StoreError::UnknownSelector {
                selector: selector.to_string(),
            });
        }
        tracing::debug!(selector = %selector, "reducer removed");
        Ok(())
    }

    /// Reduce `action` on the slice that owns it and notify subscribers.
    ///
    /// Returns whether the state changed. Fails with `NoReducerForAction`
    /// when no registered slice owns the action; the pending payload is then
    /// discarded.
    pub fn dispatch(&self, action: &Action) -> StoreResult<bool> {
        self.middleware.before(action);

        let route = self.registry.read().route_for(action);
        let Some((selector, route)) = route else {
            action.discard_payload();
            tracing::debug!(action = %action.name(), "no reducer handles action");
            let err = StoreError::NoReducerForAction {
                action: action.name().to_string(),
            };
            self.middleware.failed(action, &err);
            return Err(err);
        };

        match route.dispatch(action) {
            Ok(changed) => {
                self.middleware.after(action, &selector, changed);
                Ok(changed)
            }
            Err(err) => {
                self.middleware.failed(action, &err);
                Err(err)
            }
        }
    }

    /// Snapshot of every slice, including retained ones.
    pub fn get_state(&self) -> GlobalState {
        let registry = self.registry.read();
        GlobalState {
            slices: registry
                .slices
                .iter()
                .map(|(selector, slice)| (selector.clone(), slice.snapshot()))
                .collect(),
        }
    }

    /// Copy of one slice's state.
    ///
    /// Fails with `EmptySelector`, `UnknownSelector`, or `Contract` when `S`
    /// is not the slice's state type.
    pub fn get_state_of<S: State>(&self, selector: &str) -> StoreResult<S> {
        let manager = self.registry.read().manager::<S>(selector)?;
        Ok(manager.get_state())
    }

    /// Type-erased copy of one slice's state.
    pub fn snapshot_of(&self, selector: &str) -> StoreResult<SliceState> {
        Ok(self.registry.read().slice(selector)?.snapshot())
    }

    /// Be told after any slice changes. The same `Arc` subscribed twice
    /// yields the same handle and a single notification per change.
    pub fn subscribe(&self, listener: GlobalListener) -> SubscriptionId {
        self.global.lock().subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.global.lock().unsubscribe(id)
    }

    /// Receive a copy of `selector`'s state after each change.
    pub fn subscribe_to<S, F>(&self, selector: &str, listener: Arc<F>) -> StoreResult<SubscriptionId>
    where
        S: State,
        F: Fn(S) + Send + Sync + 'static,
    {
        let manager = self.registry.read().manager::<S>(selector)?;
        let listener: Listener<S> = listener;
        Ok(manager.subscribe(listener))
    }

    /// Returns whether `id` was subscribed to `selector`.
    pub fn unsubscribe_from(&self, selector: &str, id: SubscriptionId) -> StoreResult<bool> {
        let slice = Arc::clone(self.registry.read().slice(selector)?);
        Ok(slice.unsubscribe(id))
    }

    /// Selectors currently routed, in order.
    pub fn selectors(&self) -> Vec<String> {
        self.registry.read().routes.keys().cloned().collect()
    }

    pub fn contains_selector(&self, selector: &str) -> bool {
        self.registry.read().routes.contains_key(selector)
    }

    pub fn global_subscriber_count(&self) -> usize {
        self.global.lock().len()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Store")
            .field("routes", &registry.routes.keys().collect::<Vec<_>>())
            .field("slices", &registry.slices.keys().collect::<Vec<_>>())
            .field("global_subscribers", &self.global.lock().len())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Store`] with at least one unit.
pub struct StoreBuilder {
    store: Store,
    units: usize,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self {
            store: Store::empty(Box::new(NoopMiddleware)),
            units: 0,
        }
    }
}

impl StoreBuilder {
    /// Register a unit, checking selector and action-set uniqueness.
    pub fn unit<S: State>(mut self, unit: BusinessUnit<S>) -> StoreResult<Self> {
        self.store.add_reducer(unit)?;
        self.units += 1;
        Ok(self)
    }

    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.store.middleware = Box::new(middleware);
        self
    }

    /// Fails with `Construction` if no unit was registered.
    pub fn build(self) -> StoreResult<Store> {
        if self.units == 0 {
            return Err(StoreError::construction(
                "a store needs at least one business unit",
            ));
        }
        Ok(self.store)
    }
}

impl fmt::Debug for StoreBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSetDescriptor;
    use crate::builder::BusinessUnitBuilder;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CounterActions {
        increment: Action,
        touch: Action,
    }

    impl CounterActions {
        fn new() -> Self {
            Self {
                increment: Action::new("increment"),
                touch: Action::new("touch"),
            }
        }
    }

    impl ActionSetDescriptor for CounterActions {
        fn actions(&self) -> Vec<Action> {
            vec![self.increment.clone(), self.touch.clone()]
        }
    }

    fn counter_unit(selector: &str, initial: i32, actions: &CounterActions) -> BusinessUnit<i32> {
        BusinessUnitBuilder::from_descriptor(initial, actions)
            .unwrap()
            .on(&actions.increment, |state: i32, by: i32| state + by)
            .unwrap()
            .on(&actions.touch, |state: i32| state)
            .unwrap()
            .selector(selector)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_dispatch_single_slice() {
        let actions = CounterActions::new();
        let store = Store::new(counter_unit("counter", 0, &actions)).unwrap();

        assert!(store.dispatch(actions.increment.with(1).unwrap()).unwrap());
        assert_eq!(store.get_state_of::<i32>("counter").unwrap(), 1);
        assert_eq!(store.get_state().get::<i32>("counter"), Some(&1));
    }

    #[test]
    fn test_empty_store_rejected() {
        let err = Store::builder().build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn test_duplicate_selector_rejected() {
        let (a, b) = (CounterActions::new(), CounterActions::new());
        let err = Store::builder()
            .unit(counter_unit("counter", 0, &a))
            .unwrap()
            .unit(counter_unit("counter", 0, &b))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MultipleReducer);
    }

    #[test]
    fn test_shared_action_set_rejected() {
        let actions = CounterActions::new();
        let unit = counter_unit("a", 0, &actions);
        let twin = BusinessUnitBuilder::new(5, unit.actions().clone())
            .on(&actions.increment, |state: i32, by: i32| state - by)
            .unwrap()
            .on(&actions.touch, |state: i32| state)
            .unwrap()
            .selector("b")
            .unwrap()
            .build()
            .unwrap();

        let store = Store::new(unit).unwrap();
        let err = store.add_reducer(twin).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MultipleReducer);
        assert_eq!(store.selectors(), vec!["a".to_string()]);
    }

    #[test]
    fn test_unmatched_dispatch_discards_payload() {
        let actions = CounterActions::new();
        let stray = CounterActions::new();
        let _ = counter_unit("other", 0, &stray);
        let store = Store::new(counter_unit("counter", 0, &actions)).unwrap();

        stray.increment.with(3).unwrap();
        let err = store.dispatch(&stray.increment).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoReducerForAction);
        assert!(err.is_recoverable());
        assert!(!stray.increment.has_payload());
    }

    #[test]
    fn test_units_from_one_descriptor_rejected() {
        let actions = CounterActions::new();
        let store = Store::new(counter_unit("a", 0, &actions)).unwrap();

        let err = store
            .add_reducer(counter_unit("b", 0, &actions))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MultipleReducer);
        assert!(err.to_string().contains("increment"));
        assert_eq!(store.selectors(), vec!["a".to_string()]);

        store.dispatch(actions.increment.with(1).unwrap()).unwrap();
        assert_eq!(store.get_state_of::<i32>("a").unwrap(), 1);
        assert!(!store.get_state().contains("b"));
    }

    #[test]
    fn test_builder_rejects_units_sharing_an_action() {
        let actions = CounterActions::new();
        let result = Store::builder()
            .unit(counter_unit("a", 0, &actions))
            .unwrap()
            .unit(counter_unit("b", 0, &actions));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::MultipleReducer);
    }

    #[test]
    fn test_remove_reducer_retains_state() {
        let actions = CounterActions::new();
        let store = Store::new(counter_unit("counter", 4, &actions)).unwrap();

        store.remove_reducer("counter").unwrap();
        assert!(!store.contains_selector("counter"));

        let err = store.dispatch(&actions.increment).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoReducerForAction);
        assert_eq!(store.get_state_of::<i32>("counter").unwrap(), 4);

        let err = store.remove_reducer("counter").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSelector);
    }

    #[test]
    fn test_readd_resumes_retained_state() {
        let first = CounterActions::new();
        let store = Store::new(counter_unit("counter", 0, &first)).unwrap();
        store.dispatch(first.increment.with(7).unwrap()).unwrap();
        store.remove_reducer("counter").unwrap();

        let second = CounterActions::new();
        store.add_reducer(counter_unit("counter", 100, &second)).unwrap();
        store.dispatch(second.increment.with(1).unwrap()).unwrap();

        assert_eq!(store.get_state_of::<i32>("counter").unwrap(), 8);
    }

    #[test]
    fn test_readd_with_other_state_type_rejected() {
        let actions = CounterActions::new();
        let store = Store::new(counter_unit("counter", 0, &actions)).unwrap();
        store.remove_reducer("counter").unwrap();

        let rename = Action::new("rename");
        let unit = BusinessUnitBuilder::new(String::new(), ActionSet::new([rename.clone()]).unwrap())
            .on(&rename, |_: String, name: String| name)
            .unwrap()
            .selector("counter")
            .unwrap()
            .build()
            .unwrap();

        let err = store.add_reducer(unit).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
    }

    #[test]
    fn test_selector_scoped_errors() {
        let actions = CounterActions::new();
        let store = Store::new(counter_unit("counter", 0, &actions)).unwrap();

        assert_eq!(
            store.get_state_of::<i32>("").unwrap_err().kind(),
            ErrorKind::EmptySelector
        );
        assert_eq!(
            store.get_state_of::<i32>("missing").unwrap_err().kind(),
            ErrorKind::UnknownSelector
        );
        assert_eq!(
            store.get_state_of::<String>("counter").unwrap_err().kind(),
            ErrorKind::Contract
        );
        assert_eq!(
            store
                .subscribe_to("missing", Arc::new(|_: i32| {}))
                .unwrap_err()
                .kind(),
            ErrorKind::UnknownSelector
        );
        assert_eq!(
            store.remove_reducer("").unwrap_err().kind(),
            ErrorKind::EmptySelector
        );
    }

    #[test]
    fn test_unchanged_state_skips_listeners() {
        let actions = CounterActions::new();
        let store = Store::new(counter_unit("counter", 0, &actions)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let slice_calls = Arc::clone(&calls);
        store
            .subscribe_to("counter", Arc::new(move |_: i32| {
                slice_calls.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        let global_calls = Arc::clone(&calls);
        store.subscribe(Arc::new(move || {
            global_calls.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!store.dispatch(&actions.touch).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_global_listener_can_read_store() {
        let actions = CounterActions::new();
        let store = Arc::new(Store::new(counter_unit("counter", 0, &actions)).unwrap());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let reader = Arc::downgrade(&store);
        let sink = Arc::clone(&seen);
        store.subscribe(Arc::new(move || {
            if let Some(store) = reader.upgrade() {
                sink.lock().push(store.get_state_of::<i32>("counter").unwrap());
            }
        }));

        store.dispatch(actions.increment.with(2).unwrap()).unwrap();
        store.dispatch(actions.increment.with(3).unwrap()).unwrap();

        assert_eq!(*seen.lock(), vec![2, 5]);
    }

    #[test]
    fn test_unsubscribe_from() {
        let actions = CounterActions::new();
        let store = Store::new(counter_unit("counter", 0, &actions)).unwrap();
        let id = store.subscribe_to("counter", Arc::new(|_: i32| {})).unwrap();

        assert!(store.unsubscribe_from("counter", id).unwrap());
        assert!(!store.unsubscribe_from("counter", id).unwrap());
    }

    #[test]
    fn test_global_state_debug_is_a_map() {
        let (a, b) = (CounterActions::new(), CounterActions::new());
        let store = Store::builder()
            .unit(counter_unit("b", 10, &b))
            .unwrap()
            .unit(counter_unit("a", 0, &a))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(format!("{:?}", store.get_state()), r#"{"a": 0, "b": 10}"#);
        assert_eq!(store.snapshot_of("b").unwrap().type_name(), "i32");
    }
}
