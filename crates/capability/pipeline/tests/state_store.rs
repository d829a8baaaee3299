use bridge_pipeline::{PipelineError, StateChange, StateObserver, StateStore};
use domain::{DeviceState, SemanticKey, StateValue};
use std::sync::{Arc, Mutex};

struct Recorder {
    seen: Arc<Mutex<Vec<(SemanticKey, StateValue, Option<StateValue>)>>>,
}

impl StateObserver for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_change(&mut self, change: &StateChange, state: &DeviceState) -> Result<(), PipelineError> {
        // 观察者看到的状态已包含本次变化
        assert_eq!(state.get(change.key), Some(&change.value));
        self.seen.lock().expect("lock").push((
            change.key,
            change.value.clone(),
            change.previous.clone(),
        ));
        Ok(())
    }
}

struct Failing;

impl StateObserver for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn on_change(&mut self, _change: &StateChange, _state: &DeviceState) -> Result<(), PipelineError> {
        Err(PipelineError::Observer {
            name: "failing".to_string(),
            reason: "sink down".to_string(),
        })
    }
}

#[test]
fn emits_only_when_value_differs() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut store = StateStore::new().with_observer(Box::new(Recorder { seen: seen.clone() }));

    assert!(store.apply(SemanticKey::Vlt, StateValue::Number(30.0)));
    assert!(!store.apply(SemanticKey::Vlt, StateValue::Number(30.0)));
    assert!(!store.apply(SemanticKey::Vlt, StateValue::Number(30.0)));
    assert!(store.apply(SemanticKey::Vlt, StateValue::Number(31.0)));
    assert!(store.apply(SemanticKey::Mode, StateValue::text("heating")));

    let seen = seen.lock().expect("lock").clone();
    assert_eq!(
        seen,
        vec![
            (SemanticKey::Vlt, StateValue::Number(30.0), None),
            (
                SemanticKey::Vlt,
                StateValue::Number(31.0),
                Some(StateValue::Number(30.0))
            ),
            (SemanticKey::Mode, StateValue::text("heating"), None),
        ]
    );
    assert_eq!(store.state().len(), 2);
}

#[test]
fn value_kind_is_part_of_equality() {
    let mut store = StateStore::new();
    assert!(store.apply(SemanticKey::TargetTempWw, StateValue::Integer(48)));
    assert!(store.apply(SemanticKey::TargetTempWw, StateValue::text("48")));
    assert!(!store.apply(SemanticKey::TargetTempWw, StateValue::text("48")));
}

#[test]
fn integral_float_equals_integer() {
    let mut store = StateStore::new();
    // 设备对同一读数时而回 30，时而回 30.0
    let as_integer = bridge_protocol::value_from_json(&serde_json::json!(30));
    let as_float = bridge_protocol::value_from_json(&serde_json::json!(30.0));
    assert_eq!(as_integer, StateValue::Integer(30));
    assert_eq!(as_float, StateValue::Number(30.0));

    assert!(store.apply(SemanticKey::OutdoorTemp, as_integer.clone()));
    assert!(!store.apply(SemanticKey::OutdoorTemp, as_float));
    assert!(!store.apply(SemanticKey::OutdoorTemp, as_integer));
    assert!(store.apply(SemanticKey::OutdoorTemp, StateValue::Number(30.5)));
    assert!(store.apply(SemanticKey::OutdoorTemp, StateValue::text("30.5")));
}

#[test]
fn failing_observer_does_not_block_others() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut store = StateStore::new()
        .with_observer(Box::new(Failing))
        .with_observer(Box::new(Recorder { seen: seen.clone() }));

    assert!(store.apply(SemanticKey::Error, StateValue::Integer(0)));
    assert_eq!(seen.lock().expect("lock").len(), 1);
}

#[tokio::test]
async fn subscribers_and_readers_see_changes() {
    let mut store = StateStore::new();
    let mut changes = store.subscribe();
    let reader = store.reader();

    store.apply(SemanticKey::PowerHeating, StateValue::text("on"));
    store.apply(SemanticKey::PowerHeating, StateValue::text("on"));
    store.apply(SemanticKey::Mode, StateValue::text("cooling"));

    let first = changes.recv().await.expect("first change");
    assert_eq!(first.key, SemanticKey::PowerHeating);
    let second = changes.recv().await.expect("second change");
    assert_eq!(second.key, SemanticKey::Mode);
    assert!(changes.try_recv().is_err());

    assert_eq!(reader.mode_int(), 2);
    assert_eq!(
        reader.get(SemanticKey::PowerHeating),
        Some(StateValue::text("on"))
    );
    assert_eq!(reader.snapshot(), store.state().clone());
}
