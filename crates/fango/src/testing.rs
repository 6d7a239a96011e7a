//! Models and helpers shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use fango_store::InMemoryConnector;
use fango_types::Document;
use serde_json::{json, Value};

use crate::error::OdmResult;
use crate::field::{FieldArgs, FieldSet};
use crate::model::Model;
use crate::object::Object;
use crate::registry::ConnectionRegistry;

thread_local! {
    /// Invocations of `Counter` field functions on this test thread.
    pub(crate) static COUNTER_CALLS: AtomicUsize = const { AtomicUsize::new(0) };
}

/// Fresh registry over its own in-memory backend.
pub(crate) fn registry() -> ConnectionRegistry {
    ConnectionRegistry::new(Arc::new(InMemoryConnector::new())).with_actor("tester")
}

pub(crate) fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub(crate) struct Task;

fn task_data(_: &Object<Task>, _: &FieldArgs) -> OdmResult<Value> {
    Ok(json!({}))
}

fn task_summary(task: &Object<Task>, _: &FieldArgs) -> OdmResult<Value> {
    let keys = task.get("Data")?.as_object().map_or(0, |data| data.len());
    Ok(json!(format!("summary: {keys} keys")))
}

impl Model for Task {
    const TYPE_NAME: &'static str = "Task";

    fn fields() -> &'static FieldSet<Self> {
        static FIELDS: OnceLock<FieldSet<Task>> = OnceLock::new();
        FIELDS.get_or_init(|| {
            FieldSet::builder()
                .field("Data", task_data)
                .field("Summary", task_summary)
                .build()
        })
    }
}

pub(crate) struct Counter;

const COUNTER_BASE: i64 = 10;

fn bump() {
    COUNTER_CALLS.with(|calls| calls.fetch_add(1, Ordering::SeqCst));
}

fn counter_ticks(_: &Object<Counter>, _: &FieldArgs) -> OdmResult<Value> {
    bump();
    Ok(json!(7))
}

fn counter_doubled(counter: &Object<Counter>, _: &FieldArgs) -> OdmResult<Value> {
    bump();
    let ticks = counter.get("Ticks")?.as_i64().unwrap_or(0);
    Ok(json!(ticks * 2))
}

fn counter_scaled(_: &Object<Counter>, args: &FieldArgs) -> OdmResult<Value> {
    bump();
    if args.keyword("fail") == Some(&Value::Bool(true)) {
        return Err(anyhow::anyhow!("scaling refused").into());
    }
    let factor = args
        .positional()
        .first()
        .or_else(|| args.keyword("factor"))
        .and_then(Value::as_i64)
        .unwrap_or(1);
    let offset = args.keyword("offset").and_then(Value::as_i64).unwrap_or(0);
    Ok(json!(COUNTER_BASE * factor + offset))
}

impl Model for Counter {
    const TYPE_NAME: &'static str = "Counter";

    fn fields() -> &'static FieldSet<Self> {
        static FIELDS: OnceLock<FieldSet<Counter>> = OnceLock::new();
        FIELDS.get_or_init(|| {
            FieldSet::builder()
                .field("Ticks", counter_ticks)
                .field("Scaled", counter_scaled)
                .computed("Doubled", counter_doubled)
                .build()
        })
    }
}

#[test]
fn field_sets_enumerate_base_fields_first() {
    let names: Vec<_> = Task::fields().names().collect();
    assert_eq!(names, ["Name", "Id", "Data", "Summary"]);
    let names: Vec<_> = Counter::fields().names().collect();
    assert_eq!(names, ["Name", "Id", "Ticks", "Scaled"]);
    assert!(Counter::fields().contains("Scaled"));
    assert!(Counter::fields().contains("Doubled"));
    assert!(!Counter::fields().get("Doubled").unwrap().is_stored());
    assert!(!Counter::fields().contains("Data"));
}
