//! Actions and action sets
//!
//! An [`Action`] is a named command token compared by identity, not by name:
//! two action sets may each own an action called `increment` and they are
//! routed independently. Cloning an `Action` clones the handle, so a clone
//! still refers to the same action.
//!
//! An action optionally carries a one-shot payload. The payload type is fixed
//! the first time a two-input handler is bound to the action; from then on
//! [`Action::with`] only accepts values of that type, and
//! [`Action::take_payload`] hands the pending value out exactly once.
//!
//! # Example
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
//! let actions = CounterActions::new();
//! let set = actions.action_set()?;
//! assert!(set.contains(&actions.increment));
//! assert_eq!(set.get("decrement"), Some(&actions.decrement));
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_ACTION_SET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u64);

impl ActionId {
    fn next() -> Self {
        Self(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-unique identity of an [`ActionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionSetId(u64);

impl ActionSetId {
    fn next() -> Self {
        Self(NEXT_ACTION_SET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct PayloadType {
    id: TypeId,
    name: &'static str,
}

impl PayloadType {
    fn of<P: Any>() -> Self {
        Self {
            id: TypeId::of::<P>(),
            name: type_name::<P>(),
        }
    }
}

struct ActionInner {
    id: ActionId,
    name: String,
    payload_type: OnceLock<PayloadType>,
    pending: Mutex<Option<Box<dyn Any + Send>>>,
}

/// A named command token, optionally carrying a one-shot payload.
#[derive(Clone)]
pub struct Action {
    inner: Arc<ActionInner>,
}

impl Action {
    /// Create a fresh action. Each call yields a distinct identity, even for equal names.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ActionInner {
                id: ActionId::next(),
                name: name.into(),
                payload_type: OnceLock::new(),
                pending: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> ActionId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name of the fixed payload type, if a payload handler has been bound.
    pub fn payload_type(&self) -> Option<&'static str> {
        self.inner.payload_type.get().map(|t| t.name)
    }

    /// Whether a payload is pending (set by `with`, not yet taken).
    pub fn has_payload(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    /// Attach a payload for the next dispatch.
    ///
    /// Fails with [`StoreError::Contract`] if no payload type has been fixed
    /// by a handler binding, or if `P` is not that type. A second call before
    /// the payload is taken replaces the pending value.
    pub fn with<P: Any + Send>(&self, payload: P) -> StoreResult<&Self> {
        let Some(expected) = self.inner.payload_type.get() else {
            return Err(StoreError::contract(format!(
                "no payload can be assigned to action `{}`",
                self.name()
            )));
        };
        if expected.id != TypeId::of::<P>() {
            return Err(StoreError::contract(format!(
                "the payload of action `{}` must be of type `{}`, got `{}`",
                self.name(),
                expected.name,
                type_name::<P>()
            )));
        }
        *self.inner.pending.lock() = Some(Box::new(payload));
        Ok(self)
    }

    /// Consume the pending payload.
    ///
    /// Returns `P::default()` when nothing is pending, including on an action
    /// whose payload type was never fixed. A second call right after a
    /// successful take therefore yields the default again. Fails with
    /// [`StoreError::Contract`] only when `P` differs from the fixed type.
    pub fn take_payload<P: Any + Default>(&self) -> StoreResult<P> {
        match self.inner.payload_type.get() {
            Some(expected) if expected.id == TypeId::of::<P>() => {}
            Some(expected) => {
                return Err(StoreError::contract(format!(
                    "the payload of action `{}` is of type `{}`, not `{}`",
                    self.name(),
                    expected.name,
                    type_name::<P>()
                )));
            }
            // Nothing can be pending before a payload type is fixed
            None => return Ok(P::default()),
        }

        let pending = self.inner.pending.lock().take();
        match pending {
            Some(boxed) => boxed.downcast::<P>().map(|p| *p).map_err(|_| {
                StoreError::contract(format!(
                    "pending payload of action `{}` has an unexpected type",
                    self.name()
                ))
            }),
            None => Ok(P::default()),
        }
    }

    /// Drop any pending payload without reading it.
    pub fn discard_payload(&self) {
        self.inner.pending.lock().take();
    }

    /// Fix the payload type. Idempotent for the same type; a different type
    /// is a contract violation since the type is immutable once set.
    pub(crate) fn fix_payload_type<P: Any>(&self) -> StoreResult<()> {
        let requested = PayloadType::of::<P>();
        let fixed = self.inner.payload_type.get_or_init(|| requested);
        if fixed.id != requested.id {
            return Err(StoreError::contract(format!(
                "action `{}` already takes a payload of type `{}`, cannot rebind it to `{}`",
                self.name(),
                fixed.name,
                requested.name
            )));
        }
        Ok(())
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.inner.id.0)
            .field("name", &self.inner.name)
            .field("payload_type", &self.payload_type())
            .finish()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

/// A struct whose fields declare actions.
///
/// Use `#[derive(ActionSet)]` from `state-dispatch-macros` to implement it:
/// every field of type [`Action`] becomes one slot, named after the field.
pub trait ActionSetDescriptor {
    /// All action slots, in declaration order.
    fn actions(&self) -> Vec<Action>;

    /// Build the immutable [`ActionSet`] for these slots.
    fn action_set(&self) -> StoreResult<ActionSet> {
        ActionSet::from_descriptor(self)
    }
}

struct ActionSetInner {
    id: ActionSetId,
    actions: Vec<Action>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<ActionId, usize>,
}

/// Immutable, non-empty group of uniquely named actions.
///
/// Cloning shares the same set; [`ActionSet::id`] identifies it.
#[derive(Clone)]
pub struct ActionSet {
    inner: Arc<ActionSetInner>,
}

impl ActionSet {
    /// Build a set from explicit actions.
    ///
    /// Fails with [`StoreError::Construction`] when `actions` is empty,
    /// when two actions share a name, or when an action appears twice.
    pub fn new(actions: impl IntoIterator<Item = Action>) -> StoreResult<Self> {
        let actions: Vec<Action> = actions.into_iter().collect();
        if actions.is_empty() {
            return Err(StoreError::construction(
                "there isn't any action in the action set",
            ));
        }

        let mut by_name = HashMap::with_capacity(actions.len());
        let mut by_id = HashMap::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            if action.name().is_empty() {
                return Err(StoreError::construction(format!(
                    "action #{index} in the action set has an empty name"
                )));
            }
            if by_id.insert(action.id(), index).is_some() {
                return Err(StoreError::construction(format!(
                    "action `{}` appears more than once in the action set",
                    action.name()
                )));
            }
            if by_name.insert(action.name().to_string(), index).is_some() {
                return Err(StoreError::construction(format!(
                    "duplicate action name `{}` in the action set",
                    action.name()
                )));
            }
        }

        Ok(Self {
            inner: Arc::new(ActionSetInner {
                id: ActionSetId::next(),
                actions,
                by_name,
                by_id,
            }),
        })
    }

    /// Discover actions from a descriptor struct.
    pub fn from_descriptor<D: ActionSetDescriptor + ?Sized>(descriptor: &D) -> StoreResult<Self> {
        Self::new(descriptor.actions())
    }

    pub fn id(&self) -> ActionSetId {
        self.inner.id
    }

    pub fn actions(&self) -> &[Action] {
        &self.inner.actions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.actions.iter().map(|a| a.name())
    }

    pub fn len(&self) -> usize {
        self.inner.actions.len()
    }

    /// Always `false` for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.inner.actions.is_empty()
    }

    /// Identity containment: an equally named action from another set is not contained.
    pub fn contains(&self, action: &Action) -> bool {
        self.inner.by_id.contains_key(&action.id())
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.inner.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.inner
            .by_name
            .get(name)
            .map(|&index| &self.inner.actions[index])
    }

    pub fn name_of(&self, action: &Action) -> Option<&str> {
        self.inner
            .by_id
            .get(&action.id())
            .map(|&index| self.inner.actions[index].name())
    }

    /// Whether both handles refer to the same set.
    pub fn same_set(&self, other: &ActionSet) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSet")
            .field("id", &self.inner.id.0)
            .field("actions", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct CounterActions {
        increment: Action,
        decrement: Action,
    }

    impl ActionSetDescriptor for CounterActions {
        fn actions(&self) -> Vec<Action> {
            vec![self.increment.clone(), self.decrement.clone()]
        }
    }

    fn counter_actions() -> CounterActions {
        CounterActions {
            increment: Action::new("increment"),
            decrement: Action::new("decrement"),
        }
    }

    #[test]
    fn test_action_identity_not_name() {
        let a = Action::new("increment");
        let b = Action::new("increment");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_with_requires_fixed_payload_type() {
        let action = Action::new("increment");
        let err = action.with(5_i32).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
        assert!(!action.has_payload());
    }

    #[test]
    fn test_with_rejects_wrong_payload_type() {
        let action = Action::new("increment");
        action.fix_payload_type::<i32>().unwrap();

        let err = action.with("five").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
        assert!(err.to_string().contains("i32"));
    }

    #[test]
    fn test_take_payload_consumes() {
        let action = Action::new("increment");
        action.fix_payload_type::<i32>().unwrap();

        action.with(5_i32).unwrap();
        assert!(action.has_payload());
        assert_eq!(action.take_payload::<i32>().unwrap(), 5);
        assert!(!action.has_payload());
        assert_eq!(action.take_payload::<i32>().unwrap(), 0);
    }

    #[test]
    fn test_take_payload_without_payload_type_is_default() {
        let action = Action::new("reset");
        assert_eq!(action.take_payload::<i32>().unwrap(), 0);
        assert_eq!(action.take_payload::<String>().unwrap(), "");
        // Reading does not fix the type
        assert!(action.payload_type().is_none());
    }

    #[test]
    fn test_take_payload_wrong_type() {
        let action = Action::new("rename");
        action.fix_payload_type::<String>().unwrap();
        action.with("next".to_string()).unwrap();

        let err = action.take_payload::<i32>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
        // The pending payload survives a mistyped read.
        assert_eq!(action.take_payload::<String>().unwrap(), "next");
    }

    #[test]
    fn test_fix_payload_type_is_immutable() {
        let action = Action::new("increment");
        action.fix_payload_type::<i32>().unwrap();
        action.fix_payload_type::<i32>().unwrap();

        let err = action.fix_payload_type::<u8>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
        assert_eq!(action.payload_type(), Some("i32"));
    }

    #[test]
    fn test_discard_payload() {
        let action = Action::new("increment");
        action.fix_payload_type::<i32>().unwrap();
        action.with(3_i32).unwrap();
        action.discard_payload();
        assert!(!action.has_payload());
    }

    #[test]
    fn test_action_set_lookups() {
        let actions = counter_actions();
        let set = actions.action_set().unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.contains(&actions.increment));
        assert!(set.contains_name("decrement"));
        assert_eq!(set.get("increment"), Some(&actions.increment));
        assert_eq!(set.name_of(&actions.decrement), Some("decrement"));
        assert_eq!(set.names().collect::<Vec<_>>(), ["increment", "decrement"]);
    }

    #[test]
    fn test_action_set_contains_by_identity() {
        let first = counter_actions();
        let second = counter_actions();
        let set = first.action_set().unwrap();

        assert!(!set.contains(&second.increment));
        assert!(set.contains_name(second.increment.name()));
    }

    #[test]
    fn test_action_set_rejects_empty() {
        let err = ActionSet::new(Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn test_action_set_rejects_duplicate_names() {
        let err = ActionSet::new([Action::new("reset"), Action::new("reset")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
        assert!(err.to_string().contains("reset"));
    }

    #[test]
    fn test_action_set_rejects_repeated_action() {
        let reset = Action::new("reset");
        let err = ActionSet::new([reset.clone(), reset]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn test_action_set_identity() {
        let actions = counter_actions();
        let a = actions.action_set().unwrap();
        let b = actions.action_set().unwrap();

        assert!(a.same_set(&a.clone()));
        assert!(!a.same_set(&b));
        assert_ne!(a.id(), b.id());
    }
}
