//! Test utilities for state-dispatch stores
//!
//! - [`NotificationRecorder`]: listeners that record every notification
//!   into a channel, for asserting what subscribers saw
//! - [`assert_error_kind!`](crate::assert_error_kind): assert a result failed
//!   with a given [`ErrorKind`](crate::ErrorKind)
//!
//! # Example
//!
//! ```ignore
//! use state_dispatch::testing::NotificationRecorder;
//!
//! let mut seen = NotificationRecorder::<i32>::new();
//! store.subscribe_to("counter", seen.listener())?;
//!
//! store.dispatch(actions.increment.with(2)?)?;
//! store.dispatch(actions.increment.with(3)?)?;
//!
//! assert_eq!(seen.drain(), vec![2, 5]);
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

/// Records notifications delivered to the listeners it hands out.
///
/// Each call to [`listener`](Self::listener) builds a new listener; clone
/// the returned `Arc` to subscribe the same listener twice.
pub struct NotificationRecorder<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T: Send + 'static> NotificationRecorder<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A per-selector listener recording each state it receives.
    pub fn listener(&self) -> Arc<impl Fn(T) + Send + Sync + 'static> {
        let tx = self.tx.clone();
        Arc::new(move |value: T| {
            let _ = tx.send(value);
        })
    }

    /// Record a value directly, as a listener would.
    pub fn record(&self, value: T) {
        let _ = self.tx.send(value);
    }

    /// Drain every recorded notification, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Ok(value) = self.rx.try_recv() {
            values.push(value);
        }
        values
    }

    /// Drain and count recorded notifications.
    pub fn count(&mut self) -> usize {
        self.drain().len()
    }
}

impl NotificationRecorder<()> {
    /// A store-wide listener recording one `()` per notification.
    pub fn global_listener(&self) -> Arc<impl Fn() + Send + Sync + 'static> {
        let tx = self.tx.clone();
        Arc::new(move || {
            let _ = tx.send(());
        })
    }
}

impl<T: Send + 'static> Default for NotificationRecorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that a result failed with the given [`ErrorKind`](crate::ErrorKind).
///
/// # Example
///
/// ```ignore
/// use state_dispatch::assert_error_kind;
///
/// assert_error_kind!(store.remove_reducer(""), EmptySelector);
/// assert_error_kind!(store.dispatch(&stray), NoReducerForAction);
/// ```
#[macro_export]
macro_rules! assert_error_kind {
    ($result:expr, $kind:ident) => {
        match $result {
            Ok(_) => panic!(
                "Expected `{}` error, but the call succeeded",
                stringify!($kind)
            ),
            Err(err) => assert_eq!(
                $crate::StoreError::kind(&err),
                $crate::ErrorKind::$kind,
                "unexpected error: {}",
                err
            ),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::state::StateManager;

    #[test]
    fn test_recorder_sees_each_change() {
        let mut recorder = NotificationRecorder::<i32>::new();
        let manager = StateManager::new("counter", 0).unwrap();
        manager.subscribe(recorder.listener());

        manager.set_state(1);
        manager.set_state(1);
        manager.set_state(2);

        assert_eq!(recorder.drain(), vec![1, 2]);
        assert!(recorder.drain().is_empty());
    }

    #[test]
    fn test_same_listener_subscribes_once() {
        let mut recorder = NotificationRecorder::<i32>::new();
        let manager = StateManager::new("counter", 0).unwrap();
        let listener = recorder.listener();

        let first = manager.subscribe(listener.clone());
        let second = manager.subscribe(listener);
        assert_eq!(first, second);

        manager.set_state(5);
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_record_directly() {
        let mut recorder = NotificationRecorder::<&str>::default();
        recorder.record("a");
        recorder.record("b");
        assert_eq!(recorder.drain(), vec!["a", "b"]);
    }

    #[test]
    fn test_assert_error_kind() {
        let result: Result<(), StoreError> = Err(StoreError::EmptySelector);
        crate::assert_error_kind!(result, EmptySelector);
    }

    #[test]
    #[should_panic(expected = "but the call succeeded")]
    fn test_assert_error_kind_panics_on_ok() {
        let result: Result<(), StoreError> = Ok(());
        crate::assert_error_kind!(result, EmptySelector);
    }
}
