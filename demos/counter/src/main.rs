//! Counter - Minimal state-dispatch walkthrough
//!
//! Three counter slices share one store:
//! - Actions: `increment` and `decrement`, one fresh set per counter
//! - Logic: a plain function for increment, a logic object for decrement
//! - Store: routes each action to the counter that owns it
//! - Subscribers: store-wide and per-counter
//!
//! Run with `RUST_LOG=state_dispatch_core=debug` to see every dispatch traced.

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use state_dispatch::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "counter")]
#[command(about = "Walk through a store holding three counters")]
struct Args {
    /// Only record actions matching these globs (comma-separated)
    #[arg(long)]
    log_include: Option<String>,

    /// Never record actions matching these globs (comma-separated)
    #[arg(long)]
    log_exclude: Option<String>,

    /// How many dispatches the action log keeps
    #[arg(long, default_value_t = 32)]
    log_capacity: usize,
}

// ============================================================================
// Actions - What can happen to a counter
// ============================================================================

#[derive(ActionSet)]
struct CounterActions {
    increment: Action,
    decrement: Action,
}

// ============================================================================
// Logic - How a counter changes
// ============================================================================

fn increment(state: i32, by: i32) -> i32 {
    state + by
}

struct DecrementLogic;

#[action_logic(state = i32)]
impl DecrementLogic {
    pub fn decrement(&self, state: i32, by: i32) -> i32 {
        state - by
    }
}

fn counter(
    initial: i32,
    selector: &str,
    actions: &CounterActions,
) -> StoreResult<BusinessUnit<i32>> {
    BusinessUnitBuilder::from_descriptor(initial, actions)?
        .on(&actions.increment, increment)?
        .logic(DecrementLogic)?
        .selector(selector)?
        .build()
}

fn print_state(store: &Store) {
    println!("state: {:?}", store.get_state());
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("counter=info".parse()?)
                .add_directive("state_dispatch_core=info".parse()?),
        )
        .init();

    let logger = Arc::new(ActionLoggerMiddleware::with_log(ActionLogConfig::new(
        args.log_capacity,
        ActionLoggerConfig::new(args.log_include.as_deref(), args.log_exclude.as_deref()),
    )));

    // One counter, one store
    let first = CounterActions::new();
    let store = Store::builder()
        .unit(counter(0, "counter", &first)?)?
        .middleware(Arc::clone(&logger))
        .build()?;

    print_state(&store);
    store.dispatch(first.increment.with(1)?)?;
    print_state(&store);

    // Store-wide subscriber, for a single dispatch
    let watcher = store.subscribe(Arc::new(|| println!("  (global) something changed")));
    store.dispatch(first.decrement.with(1)?)?;
    store.unsubscribe(watcher);

    // Two more counters
    let second = CounterActions::new();
    let third = CounterActions::new();
    store.add_reducer(counter(10, "counter2", &second)?)?;
    store.add_reducer(counter(100, "counter3", &third)?)?;
    print_state(&store);

    for actions in [&first, &second, &third] {
        store.dispatch(actions.increment.with(1)?)?;
    }
    print_state(&store);

    // counter3 stops routing but keeps its last value
    store.remove_reducer("counter3")?;
    if let Err(e) = store.dispatch(third.increment.with(1)?) {
        tracing::warn!(error = %e, recoverable = e.is_recoverable(), "dispatch to counter3 failed");
    }
    print_state(&store);

    for selector in ["counter", "counter2", "counter3"] {
        println!("{selector} = {}", store.get_state_of::<i32>(selector)?);
    }

    // Per-counter subscribers
    let on_counter = store.subscribe_to(
        "counter",
        Arc::new(|value: i32| println!("  (counter) now {value}")),
    )?;
    store.dispatch(first.decrement.with(1)?)?;
    store.dispatch(second.decrement.with(11)?)?;

    store.subscribe_to(
        "counter2",
        Arc::new(|value: i32| println!("  (counter2) now {value}")),
    )?;
    store.dispatch(first.increment.with(1)?)?;
    store.dispatch(second.increment.with(1)?)?;

    store.unsubscribe_from("counter", on_counter)?;
    store.dispatch(first.increment.with(5)?)?;
    store.dispatch(second.increment.with(5)?)?;
    println!("counter = {}", store.get_state_of::<i32>("counter")?);
    print_state(&store);

    println!();
    println!("recent dispatches:");
    for entry in logger.recent(args.log_capacity) {
        match (entry.selector(), entry.error()) {
            (Some(selector), _) => println!(
                "  #{} {} -> {} (changed: {})",
                entry.sequence,
                entry.name,
                selector,
                entry.state_changed().unwrap_or(false)
            ),
            (None, Some(kind)) => {
                println!("  #{} {} failed: {:?}", entry.sequence, entry.name, kind)
            }
            (None, None) => println!("  #{} {}", entry.sequence, entry.name),
        }
    }

    Ok(())
}
