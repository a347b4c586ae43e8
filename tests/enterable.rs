use std::sync::Arc;

use weft::adapters::EchoAdapter;
use weft::document::{Executable, ParsingConfig};
use weft::engine::{AdapterCatalog, AdapterRegistry, ExecutionContext};
use weft::error::EnterError;
use weft::util::SharedBuffer;

fn setup() -> (Arc<EchoAdapter>, AdapterRegistry) {
    let adapter = Arc::new(EchoAdapter::new());
    let catalog = AdapterCatalog::new();
    catalog.register_arc(adapter.clone());
    (adapter, catalog.snapshot())
}

const GREETER: &str = "Welcome!<% def greet Hello\ndef bye Goodbye%>";

#[test]
fn make_enterable_runs_once_and_registers_entry_points() {
    let (_adapter, registry) = setup();
    let config = ParsingConfig::new("echo");
    let executable = Executable::compile("greeter", GREETER, &config, &registry).unwrap();

    let buffer = SharedBuffer::new();
    let context = Arc::new(ExecutionContext::new(buffer.clone(), std::io::sink()));
    assert!(executable
        .make_enterable("session", context.clone())
        .unwrap());

    // The full document ran once: entry points exist as its side effect.
    assert_eq!(buffer.contents(), "Welcome!");
    assert!(context.is_immutable());
    assert!(context.is_enterable());

    let result = executable.enter("session", "greet", &[]).unwrap();
    assert_eq!(result, serde_json::json!("Hello"));

    let result = executable
        .enter("session", "greet", &[serde_json::json!("Ada"), serde_json::json!(3)])
        .unwrap();
    assert_eq!(result, serde_json::json!("Hello Ada 3"));

    let result = executable.enter("session", "bye", &[]).unwrap();
    assert_eq!(result, serde_json::json!("Goodbye"));
}

#[test]
fn each_key_admits_at_most_one_context() {
    let (_adapter, registry) = setup();
    let config = ParsingConfig::new("echo");
    let executable = Executable::compile("greeter", GREETER, &config, &registry).unwrap();

    let first = Arc::new(ExecutionContext::discarding());
    let second = Arc::new(ExecutionContext::discarding());

    assert!(executable.make_enterable("k", first.clone()).unwrap());
    assert!(!executable.make_enterable("k", second.clone()).unwrap());

    // The losing context was not consumed.
    assert!(!second.is_immutable());
    assert!(!second.is_enterable());
    // A different key still works.
    assert!(executable.make_enterable("other", second).unwrap());
}

#[test]
fn entering_unknown_key_or_entry_point_fails_cleanly() {
    let (_adapter, registry) = setup();
    let config = ParsingConfig::new("echo");
    let executable = Executable::compile("greeter", GREETER, &config, &registry).unwrap();

    assert!(matches!(
        executable.enter("nobody", "greet", &[]),
        Err(EnterError::NoContext(_))
    ));

    let context = Arc::new(ExecutionContext::discarding());
    executable.make_enterable("k", context).unwrap();
    assert!(matches!(
        executable.enter("k", "missing", &[]),
        Err(EnterError::NoSuchEntryPoint { .. })
    ));
}

#[test]
fn frozen_context_can_be_executed_without_mutation() {
    let (_adapter, registry) = setup();
    let config = ParsingConfig::new("echo");
    let executable =
        Executable::compile("doc", "<% emit once%>", &config, &registry).unwrap();

    let buffer = SharedBuffer::new();
    let context = Arc::new(ExecutionContext::new(buffer.clone(), std::io::sink()));
    executable.make_enterable("k", context.clone()).unwrap();
    let touched_before = context.adapters_touched().len();

    // Re-executing a frozen context reuses its state as-is: output still
    // flows, but no service or adapter bookkeeping changes.
    executable.execute(&context).unwrap();
    assert_eq!(buffer.contents(), "onceonce");
    assert_eq!(context.adapters_touched().len(), touched_before);
    assert!(context.service("document").is_none());
}

#[test]
fn release_invokes_each_touched_adapter_once_and_is_idempotent() {
    let (adapter, registry) = setup();
    let config = ParsingConfig::new("echo");
    let executable = Executable::compile("greeter", GREETER, &config, &registry).unwrap();

    let first = Arc::new(ExecutionContext::discarding());
    let second = Arc::new(ExecutionContext::discarding());
    executable.make_enterable("a", first).unwrap();
    executable.make_enterable("b", second).unwrap();
    assert_eq!(adapter.release_count(), 0);

    executable.release();
    // One hook call per context that touched the adapter.
    assert_eq!(adapter.release_count(), 2);

    executable.release();
    assert_eq!(adapter.release_count(), 2);

    // Released keys are gone.
    assert!(matches!(
        executable.enter("a", "greet", &[]),
        Err(EnterError::NoContext(_))
    ));
}

#[test]
fn entering_a_context_that_never_ran_a_program_fails() {
    let (_adapter, registry) = setup();
    let config = ParsingConfig::new("echo");
    // Pure literal: execution touches no adapter.
    let executable = Executable::compile("doc", "just text", &config, &registry).unwrap();

    let context = Arc::new(ExecutionContext::discarding());
    executable.make_enterable("k", context).unwrap();
    assert!(matches!(
        executable.enter("k", "greet", &[]),
        Err(EnterError::NoActiveAdapter)
    ));
}
