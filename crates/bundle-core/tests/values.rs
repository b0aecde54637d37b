use bundle_core::{BundlePhase, BundleStatus, ParamValue};
use serde_json::json;

#[test]
fn json_scalars_and_lists_decode() {
    let spec = json!({
        "name": "orders",
        "replicas": 3,
        "ratio": 0.5,
        "enabled": true,
        "zones": ["a", "b"],
    });
    let map = ParamValue::map_from_json(spec.as_object().unwrap());
    assert_eq!(map["name"], ParamValue::from("orders"));
    assert_eq!(map["replicas"], ParamValue::Int(3));
    assert_eq!(map["ratio"], ParamValue::Float(0.5));
    assert_eq!(map["enabled"], ParamValue::Bool(true));
    assert_eq!(
        map["zones"],
        ParamValue::List(vec![ParamValue::from("a"), ParamValue::from("b")])
    );
}

#[test]
fn null_and_nested_objects_are_kept_opaque() {
    let spec = json!({"a": null, "labels": {"team": "x"}, "b": [1, {"x": 1}]});
    let map = ParamValue::map_from_json(spec.as_object().unwrap());
    assert_eq!(map["a"], ParamValue::Opaque(json!(null)));
    assert_eq!(map["a"].type_name(), "null");
    assert_eq!(map["labels"].type_name(), "object");
    assert_eq!(map["labels"].coerce_string(), None);
    assert_eq!(
        map["b"],
        ParamValue::List(vec![ParamValue::Int(1), ParamValue::Opaque(json!({"x": 1}))])
    );

    // Written back unchanged.
    assert_eq!(serde_json::to_value(&map).unwrap(), spec);
}

#[test]
fn coercion_to_string() {
    assert_eq!(ParamValue::Int(42).coerce_string().as_deref(), Some("42"));
    assert_eq!(ParamValue::Bool(false).coerce_string().as_deref(), Some("false"));
    assert_eq!(ParamValue::Float(9.5).coerce_string().as_deref(), Some("9.5"));
    assert_eq!(ParamValue::List(vec![]).coerce_string(), None);
}

#[test]
fn single_values_decode_from_json() {
    assert_eq!(ParamValue::from_json(&json!("9.6")), ParamValue::from("9.6"));
    assert_eq!(ParamValue::from_json(&json!(u64::MAX)), ParamValue::Float(u64::MAX as f64));
    assert_eq!(ParamValue::from_json(&json!({})).to_string(), "{}");
}

#[test]
fn status_uses_resource_field_names() {
    let status = BundleStatus {
        phase: BundlePhase::Creating,
        message: String::new(),
        parameters_hash: "abc".into(),
        instance_id: None,
    };
    let value = serde_json::to_value(&status).unwrap();
    assert_eq!(
        value,
        json!({"phase": "creating", "message": "", "parameters": "abc"})
    );
}

#[test]
fn empty_status_means_init() {
    let status: BundleStatus = serde_json::from_value(json!({})).unwrap();
    assert_eq!(status.phase, BundlePhase::Init);

    let status: BundleStatus = serde_json::from_value(json!({"phase": ""})).unwrap();
    assert_eq!(status.phase, BundlePhase::Init);
    assert!(status.accepts_defaults());
}
