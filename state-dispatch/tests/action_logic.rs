//! Tests for #[action_logic] and logic-object binding

use std::sync::Arc;

use state_dispatch::prelude::*;
use state_dispatch::{assert_error_kind, Arity, LogicEntry};

#[derive(Debug, Clone, Default, PartialEq)]
struct Todos {
    items: Vec<String>,
    done: usize,
}

#[derive(ActionSet)]
struct TodoActions {
    add: Action,
    complete: Action,
    clear: Action,
}

struct TodoLogic {
    max_items: usize,
}

#[action_logic(state = Todos)]
impl TodoLogic {
    pub fn add(&self, mut state: Todos, item: String) -> Todos {
        if state.items.len() < self.max_items {
            state.items.push(item);
        }
        state
    }

    pub fn complete(&self, mut state: Todos) -> Todos {
        state.done += 1;
        state
    }

    #[action(name = "clear")]
    pub fn wipe(&self, _state: Todos) -> Todos {
        Todos::default()
    }

    /// Not an entry: private.
    fn helper(&self, state: Todos) -> Todos {
        state
    }

    /// Not an entry: wrong return type.
    pub fn count(&self, state: Todos) -> usize {
        self.helper(state).items.len()
    }

    /// Entry with no matching action; skipped with a warning at bind time.
    pub fn archive(&self, state: Todos) -> Todos {
        state
    }
}

#[test]
fn test_generated_entries() {
    let logic = Arc::new(TodoLogic { max_items: 2 });
    let names: Vec<_> = logic.entries().iter().map(LogicEntry::name).collect();
    assert_eq!(names, ["add", "complete", "clear", "archive"]);
}

#[test]
fn test_logic_object_builds_exhaustive_unit() {
    let actions = TodoActions::new();
    let unit = BusinessUnitBuilder::from_descriptor(Todos::default(), &actions)
        .unwrap()
        .logic(TodoLogic { max_items: 2 })
        .unwrap()
        .selector("todos")
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(unit.reducer().arity_of(&actions.add), Some(Arity::WithPayload));
    assert_eq!(unit.reducer().arity_of(&actions.clear), Some(Arity::StateOnly));
    assert_eq!(actions.add.payload_type(), Some("alloc::string::String"));

    let store = Store::new(unit).unwrap();
    for item in ["write", "test", "ship"] {
        store.dispatch(actions.add.with(item.to_string()).unwrap()).unwrap();
    }
    store.dispatch(&actions.complete).unwrap();

    let todos = store.get_state_of::<Todos>("todos").unwrap();
    assert_eq!(todos.items, ["write", "test"]);
    assert_eq!(todos.done, 1);

    store.dispatch(&actions.clear).unwrap();
    assert_eq!(store.get_state_of::<Todos>("todos").unwrap(), Todos::default());
}

#[test]
fn test_logic_and_explicit_handlers_combine() {
    let actions = TodoActions::new();
    let unit = BusinessUnitBuilder::from_descriptor(Todos::default(), &actions)
        .unwrap()
        .on(&actions.complete, |mut state: Todos| {
            state.done += 10;
            state
        })
        .unwrap()
        .logic(TodoLogic { max_items: 5 })
        .unwrap()
        .build()
        .unwrap();

    let store = Store::new(unit).unwrap();
    store.dispatch(&actions.complete).unwrap();

    let selector = store.selectors().remove(0);
    assert_eq!(store.get_state_of::<Todos>(&selector).unwrap().done, 10);
}

#[test]
fn test_missing_logic_reports_every_unbound_action() {
    #[derive(ActionSet)]
    struct MoreActions {
        add: Action,
        rename: Action,
        archive_all: Action,
    }

    let actions = MoreActions::new();
    let err = BusinessUnitBuilder::from_descriptor(Todos::default(), &actions)
        .unwrap()
        .logic(TodoLogic { max_items: 5 })
        .unwrap()
        .build()
        .unwrap_err();

    assert_eq!(err.to_string(), "no logic defined for actions: rename, archive_all");
}

#[test]
fn test_payload_type_conflict_between_logic_and_action() {
    #[derive(ActionSet)]
    struct Conflicting {
        add: Action,
    }

    let actions = Conflicting::new();
    // Fix `add` to a numeric payload first, through another builder
    BusinessUnitBuilder::from_descriptor(0_u32, &actions)
        .unwrap()
        .on(&actions.add, |state: u32, by: u32| state + by)
        .unwrap();

    assert_error_kind!(
        BusinessUnitBuilder::from_descriptor(Todos::default(), &actions)
            .unwrap()
            .logic(TodoLogic { max_items: 1 }),
        Contract
    );
}

#[derive(Debug, Clone, PartialEq)]
struct Gauge(i64);

#[action_logic(state = Gauge)]
impl Gauge {
    pub fn bump(&self, state: Gauge) -> Gauge {
        Gauge(state.0 + self.0)
    }
}

#[test]
fn test_state_type_cannot_provide_its_own_logic() {
    #[derive(ActionSet)]
    struct GaugeActions {
        bump: Action,
    }

    let actions = GaugeActions::new();
    assert_error_kind!(
        BusinessUnitBuilder::from_descriptor(Gauge(0), &actions)
            .unwrap()
            .logic(Gauge(1)),
        Contract
    );
}
