//! Error taxonomy for builder, state manager and store misuse
//!
//! Every failure is a returned [`StoreError`]. All kinds except
//! [`ErrorKind::NoReducerForAction`] are programmer-contract violations: fix
//! the call site rather than retrying. Dispatching an action nobody handles is
//! an ordinary runtime condition (e.g. after [`Store::remove_reducer`]) and is
//! meant to be matched and handled.
//!
//! ```ignore
//! match store.dispatch(&actions.increment) {
//!     Err(e) if e.kind() == ErrorKind::NoReducerForAction => tracing::info!("{e}"),
//!     other => other?,
//! };
//! ```
//!
//! [`Store::remove_reducer`]: crate::Store::remove_reducer

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Fieldless discriminant of a [`StoreError`], for filtering by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Construction,
    Contract,
    DuplicateBinding,
    NotOwned,
    UnboundActions,
    UnreachableAction,
    NoReducerForAction,
    UnknownSelector,
    EmptySelector,
    MultipleReducer,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Malformed descriptor, empty action set or empty store.
    #[error("construction error: {0}")]
    Construction(String),

    /// Handler shape or payload type mismatch.
    #[error("contract violation: {0}")]
    Contract(String),

    #[error("action `{action}` already has a bound handler")]
    DuplicateBinding { action: String },

    #[error("action `{action}` does not belong to this action set")]
    NotOwned { action: String },

    /// Exhaustiveness failure; lists every action without a handler.
    #[error("no logic defined for actions: {}", .actions.join(", "))]
    UnboundActions { actions: Vec<String> },

    #[error("action `{action}` is not located in the reducer")]
    UnreachableAction { action: String },

    #[error("there is no reducer that handles action `{action}`")]
    NoReducerForAction { action: String },

    #[error("there is no state with the selector `{selector}`")]
    UnknownSelector { selector: String },

    #[error("the selector can not be an empty string")]
    EmptySelector,

    /// Duplicate selector, or an action already routed, at registration.
    #[error("multiple reducers: {0}")]
    MultipleReducer(String),
}

impl StoreError {
    pub fn construction(msg: impl Into<String>) -> Self {
        StoreError::Construction(msg.into())
    }

    pub fn contract(msg: impl Into<String>) -> Self {
        StoreError::Contract(msg.into())
    }

    pub fn multiple_reducer(msg: impl Into<String>) -> Self {
        StoreError::MultipleReducer(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Construction(_) => ErrorKind::Construction,
            StoreError::Contract(_) => ErrorKind::Contract,
            StoreError::DuplicateBinding { .. } => ErrorKind::DuplicateBinding,
            StoreError::NotOwned { .. } => ErrorKind::NotOwned,
            StoreError::UnboundActions { .. } => ErrorKind::UnboundActions,
            StoreError::UnreachableAction { .. } => ErrorKind::UnreachableAction,
            StoreError::NoReducerForAction { .. } => ErrorKind::NoReducerForAction,
            StoreError::UnknownSelector { .. } => ErrorKind::UnknownSelector,
            StoreError::EmptySelector => ErrorKind::EmptySelector,
            StoreError::MultipleReducer(_) => ErrorKind::MultipleReducer,
        }
    }

    /// Whether the error is an expected runtime condition rather than misuse.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::NoReducerForAction
    }
}

/// Validate a selector string, rejecting the empty string.
pub(crate) fn check_selector(selector: &str) -> StoreResult<()> {
    if selector.is_empty() {
        return Err(StoreError::EmptySelector);
    }
    Ok(())
}
