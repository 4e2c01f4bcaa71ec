//! state-dispatch: a sliced, thread-safe state store
//!
//! Typed actions are dispatched into independent state slices. Each slice is
//! reduced by exactly one set of handlers, and subscribers hear about every
//! change synchronously.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use state_dispatch::prelude::*;
//!
//! #[derive(ActionSet)]
//! struct CounterActions {
//!     increment: Action,
//!     reset: Action,
//! }
//!
//! struct CounterLogic;
//!
//! #[action_logic(state = i32)]
//! impl CounterLogic {
//!     pub fn increment(&self, state: i32, by: i32) -> i32 {
//!         state + by
//!     }
//!
//!     pub fn reset(&self, _state: i32) -> i32 {
//!         0
//!     }
//! }
//!
//! let actions = CounterActions::new();
//! let unit = BusinessUnitBuilder::from_descriptor(0, &actions)?
//!     .logic(CounterLogic)?
//!     .selector("counter")?
//!     .build()?;
//!
//! let store = Store::new(unit)?;
//! store.subscribe(Arc::new(|| println!("something changed")));
//! store.dispatch(actions.increment.with(3)?)?;
//! ```

// Re-export everything from core
pub use state_dispatch_core::*;

// Re-export macros
pub use state_dispatch_macros::{action_logic, ActionSet};

/// Prelude for convenient imports
pub mod prelude {
    pub use state_dispatch_core::prelude::*;

    // Macros
    pub use state_dispatch_macros::{action_logic, ActionSet};
}
