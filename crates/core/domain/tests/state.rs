use domain::{DeviceState, SemanticKey, StateValue};

#[test]
fn semantic_key_round_trips_through_name() {
    for key in SemanticKey::ALL {
        let parsed: SemanticKey = key.as_str().parse().expect("parse");
        assert_eq!(parsed, key);
    }
    assert!("Nope".parse::<SemanticKey>().is_err());
}

#[test]
fn state_serializes_with_external_key_names() {
    let mut state = DeviceState::new();
    state.insert(SemanticKey::Vlt, StateValue::Number(31.5));
    state.insert(SemanticKey::PowerHeating, StateValue::text("on"));
    let json = serde_json::to_value(&state).expect("json");
    assert_eq!(json["VLT"], serde_json::json!(31.5));
    assert_eq!(json["Power_Heating"], serde_json::json!("on"));
}

#[test]
fn mode_int_requires_power_on() {
    let mut state = DeviceState::new();
    state.insert(SemanticKey::Mode, StateValue::text("cooling"));
    assert_eq!(state.mode_int(), 0);
    state.insert(SemanticKey::PowerHeating, StateValue::text("on"));
    assert_eq!(state.mode_int(), 2);
    state.insert(SemanticKey::Mode, StateValue::text("auto"));
    assert_eq!(state.mode_int(), 3);
    state.insert(SemanticKey::PowerHeating, StateValue::text("standby"));
    assert_eq!(state.mode_int(), 0);
}

#[test]
fn value_display_matches_wire_rendering() {
    assert_eq!(StateValue::Integer(30).to_string(), "30");
    assert_eq!(StateValue::Number(21.5).to_string(), "21.5");
    assert_eq!(StateValue::text("standby").to_string(), "standby");
    assert_eq!(StateValue::text(" 12.5 ").as_f64(), Some(12.5));
    assert_eq!(StateValue::Bool(true).as_f64(), None);
}

#[test]
fn numeric_values_compare_across_kinds() {
    assert_eq!(StateValue::Integer(30), StateValue::Number(30.0));
    assert_eq!(StateValue::Number(30.0), StateValue::Integer(30));
    assert_ne!(StateValue::Integer(30), StateValue::Number(30.5));
    assert_ne!(StateValue::Integer(1), StateValue::Bool(true));
    assert_ne!(StateValue::Integer(30), StateValue::text("30"));
}
