//! Per-slice state ownership and change notification
//!
//! A [`StateManager`] owns the live value of one selector. Reads hand out
//! clones, so a caller can never reach the stored value through a returned
//! handle. Writes, subscriptions and unsubscriptions are serialized through
//! one lock per slice; slices never contend with each other.
//!
//! Listeners run synchronously on the writing thread while the slice lock is
//! held. They may read state (of any slice) freely, but must not dispatch to,
//! write to, or (un)subscribe on the slice that is notifying them: that would
//! wait on the lock they are called under.

use std::any::type_name;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{check_selector, StoreResult};

/// Values that can live in a state slice.
///
/// `Clone` provides the defensive copy handed to readers and listeners;
/// `PartialEq` suppresses notifications for unchanged writes. Types built on
/// shared handles (`Arc<Mutex<_>>`, ...) opt out of copy isolation by
/// construction.
pub trait State: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> State for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Per-selector listener: receives a fresh copy of the new state.
pub type Listener<S> = Arc<dyn Fn(S) + Send + Sync>;

/// Store-wide listener: told that some slice changed.
pub type GlobalListener = Arc<dyn Fn() + Send + Sync>;

/// Ordered listener list keyed by the listener's allocation.
pub(crate) struct Listeners<F: ?Sized> {
    entries: Vec<(SubscriptionId, Arc<F>)>,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> Listeners<F> {
    /// Registering the same `Arc` twice returns the existing handle.
    pub(crate) fn subscribe(&mut self, listener: Arc<F>) -> SubscriptionId {
        let key = Arc::as_ptr(&listener).cast::<()>();
        if let Some((id, _)) = self
            .entries
            .iter()
            .find(|(_, existing)| Arc::as_ptr(existing).cast::<()>() == key)
        {
            return *id;
        }
        let id = SubscriptionId::next();
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<F>> {
        self.entries.iter().map(|(_, listener)| listener)
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<F>> {
        self.iter().cloned().collect()
    }
}

/// Listener list shared by every slice of one store.
pub(crate) type GlobalListeners = Arc<Mutex<Listeners<dyn Fn() + Send + Sync>>>;

/// Owner of one selector's live state and its listeners.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use state_dispatch_core::StateManager;
///
/// let manager = StateManager::new("counter", 0).unwrap();
/// let id = manager.subscribe(Arc::new(|n: i32| println!("counter is now {n}")));
///
/// assert!(manager.set_state(1));
/// assert!(!manager.set_state(1)); // unchanged: no notification
/// assert!(manager.unsubscribe(id));
/// assert_eq!(manager.get_state(), 1);
/// ```
pub struct StateManager<S: State> {
    selector: String,
    state: RwLock<S>,
    /// Serialization token for writes and (un)subscriptions.
    listeners: Mutex<Listeners<dyn Fn(S) + Send + Sync>>,
    global: GlobalListeners,
}

impl<S: State> StateManager<S> {
    /// Create a standalone manager. Fails with `EmptySelector` on `""`.
    pub fn new(selector: impl Into<String>, initial: S) -> StoreResult<Self> {
        Self::with_global(selector, initial, GlobalListeners::default())
    }

    pub(crate) fn with_global(
        selector: impl Into<String>,
        initial: S,
        global: GlobalListeners,
    ) -> StoreResult<Self> {
        let selector = selector.into();
        check_selector(&selector)?;
        Ok(Self {
            selector,
            state: RwLock::new(initial),
            listeners: Mutex::new(Listeners::default()),
            global,
        })
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Copy of the current state.
    pub fn get_state(&self) -> S {
        self.state.read().clone()
    }

    /// Replace the state and notify, unless `new_state` equals the current value.
    ///
    /// Returns whether the state changed.
    pub fn set_state(&self, new_state: S) -> bool {
        let listeners = self.listeners.lock();
        self.commit(&listeners, new_state)
    }

    /// Read, transform and commit under the slice lock.
    ///
    /// No other write can interleave between the read and the commit. If
    /// `update` fails the state is left untouched and nobody is notified.
    pub fn apply<F>(&self, update: F) -> StoreResult<bool>
    where
        F: FnOnce(S) -> StoreResult<S>,
    {
        let listeners = self.listeners.lock();
        let next = update(self.get_state())?;
        Ok(self.commit(&listeners, next))
    }

    /// Register a listener. Re-subscribing the same `Arc` is a no-op that
    /// returns the original handle.
    pub fn subscribe(&self, listener: Listener<S>) -> SubscriptionId {
        self.listeners.lock().subscribe(listener)
    }

    /// Remove a listener. Unknown handles are ignored and return `false`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn commit(&self, listeners: &Listeners<dyn Fn(S) + Send + Sync>, next: S) -> bool {
        {
            let mut current = self.state.write();
            if *current == next {
                tracing::trace!(selector = %self.selector, "state unchanged, notification suppressed");
                return false;
            }
            *current = next;
        }

        tracing::trace!(
            selector = %self.selector,
            subscribers = listeners.len(),
            "state committed"
        );

        for listener in listeners.iter() {
            listener(self.get_state());
        }

        let global = self.global.lock().snapshot();
        for listener in global {
            listener();
        }
        true
    }
}

impl<S: State> Debug for StateManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateManager")
            .field("selector", &self.selector)
            .field("state_type", &type_name::<S>())
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}
