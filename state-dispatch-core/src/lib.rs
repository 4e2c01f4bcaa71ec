//! Core types for state-dispatch
//!
//! A single-process, multi-slice state container: typed actions are
//! dispatched into independent state slices, each slice mutated by exactly
//! one reducer, with subscribers notified synchronously after every change.
//!
//! # Core Concepts
//!
//! - **Action**: a named command token, compared by identity, optionally
//!   carrying a one-shot payload
//! - **ActionSet**: the immutable group of actions one slice owns
//! - **BusinessUnitBuilder**: binds one handler per action and refuses to
//!   build until every action is covered
//! - **StateManager**: owns one slice's live value and its subscribers
//! - **Store**: routes each action to the slice that owns it
//!
//! # Basic Example
//!
//! ```
//! use std::sync::Arc;
//! use state_dispatch_core::{Action, ActionSet, BusinessUnitBuilder, Store};
//!
//! let increment = Action::new("increment");
//! let reset = Action::new("reset");
//! let actions = ActionSet::new([increment.clone(), reset.clone()]).unwrap();
//!
//! let unit = BusinessUnitBuilder::new(0, actions)
//!     .on(&increment, |state: i32, by: i32| state + by)
//!     .unwrap()
//!     .on(&reset, |_: i32| 0)
//!     .unwrap()
//!     .selector("counter")
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let store = Store::new(unit).unwrap();
//! store.subscribe_to("counter", Arc::new(|n: i32| println!("counter: {n}"))).unwrap();
//!
//! store.dispatch(increment.with(5).unwrap()).unwrap();
//! assert_eq!(store.get_state_of::<i32>("counter").unwrap(), 5);
//!
//! store.dispatch(&reset).unwrap();
//! assert_eq!(store.get_state().get::<i32>("counter"), Some(&0));
//! ```
//!
//! # Threading
//!
//! `Store` is `Send + Sync`. Each slice serializes its own writes and
//! subscription changes; dispatches to different slices never contend.
//! Subscribers run synchronously on the dispatching thread, so keep them
//! short or hand work off to a channel.

pub mod action;
pub mod builder;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod reducer;
pub mod state;
pub mod store;
pub mod testing;

pub use action::{Action, ActionId, ActionSet, ActionSetDescriptor, ActionSetId};
pub use builder::{ActionLogic, BusinessUnit, BusinessUnitBuilder, LogicEntry};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use reducer::{Arity, BoundHandler, Handler, Reducer, StateOnly, WithPayload};
pub use state::{GlobalListener, Listener, State, StateManager, SubscriptionId};
pub use store::{GlobalState, SliceState, Store, StoreBuilder};

// Middleware exports
pub use logger::{
    glob_match, ActionLog, ActionLogConfig, ActionLogEntry, ActionLoggerConfig,
    ActionLoggerMiddleware, DispatchOutcome,
};
pub use middleware::{ComposedMiddleware, Middleware, NoopMiddleware};

// Testing exports
pub use testing::NotificationRecorder;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, ActionSet, ActionSetDescriptor};
    pub use crate::builder::{ActionLogic, BusinessUnit, BusinessUnitBuilder, LogicEntry};
    pub use crate::error::{ErrorKind, StoreError, StoreResult};
    pub use crate::middleware::{ComposedMiddleware, Middleware, NoopMiddleware};
    pub use crate::logger::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
    pub use crate::state::{State, StateManager, SubscriptionId};
    pub use crate::store::{GlobalState, Store};
}
