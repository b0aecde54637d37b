use bundle_core::{BundleSpec, ParamValue, ParameterMap, Plan};
use bundle_operator::{apply_defaults, check_parameters, validate, ParameterFailure};

const POSTGRESQL_APB: &str = include_str!("../../../demos/postgresql-apb.yml");

const TYPED: &str = r#"
name: typed
plans:
  - name: default
    parameters:
      - name: replicas
        type: int
        default: 1
      - name: ratio
        type: number
      - name: tls
        type: boolean
      - name: hosts
        type: array
      - name: tier
        type: enum
        enum: [small, 2, large]
      - name: label
        maxlength: 5
      - name: anything
        type: mystery
"#;

fn dev_plan() -> Plan {
    let spec = BundleSpec::from_yaml(POSTGRESQL_APB).unwrap();
    spec.require_plan("dev").unwrap().clone()
}

fn typed_plan() -> Plan {
    let spec = BundleSpec::from_yaml(TYPED).unwrap();
    spec.require_plan("default").unwrap().clone()
}

fn params(entries: &[(&str, ParamValue)]) -> ParameterMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn validate_checks_declared_types() {
    let plan = typed_plan();
    let replicas = plan.parameter("replicas").unwrap();
    assert!(validate(replicas, &ParamValue::Int(3)).is_ok());
    assert_eq!(
        validate(replicas, &ParamValue::from("3")).unwrap_err(),
        "expected int, got string"
    );

    let ratio = plan.parameter("ratio").unwrap();
    assert!(validate(ratio, &ParamValue::Float(0.5)).is_ok());
    assert!(validate(ratio, &ParamValue::Int(1)).is_ok());

    let tls = plan.parameter("tls").unwrap();
    assert!(validate(tls, &ParamValue::Bool(true)).is_ok());
    assert!(validate(tls, &ParamValue::from("true")).is_err());

    let hosts = plan.parameter("hosts").unwrap();
    assert!(validate(hosts, &ParamValue::List(vec!["a".into()])).is_ok());
    assert!(validate(hosts, &ParamValue::from("a")).is_err());

    let anything = plan.parameter("anything").unwrap();
    assert!(validate(anything, &ParamValue::List(vec![])).is_ok());
}

#[test]
fn enum_membership_compares_string_forms() {
    let plan = typed_plan();
    let tier = plan.parameter("tier").unwrap();
    assert!(validate(tier, &ParamValue::from("small")).is_ok());
    assert!(validate(tier, &ParamValue::Int(2)).is_ok());
    assert!(validate(tier, &ParamValue::from("2")).is_ok());

    let err = validate(tier, &ParamValue::from("medium")).unwrap_err();
    assert!(err.starts_with("value \"medium\" is not one of"), "{err}");
}

#[test]
fn max_length_counts_characters() {
    let plan = typed_plan();
    let label = plan.parameter("label").unwrap();
    assert!(validate(label, &ParamValue::from("héllo")).is_ok());
    assert_eq!(
        validate(label, &ParamValue::from("toolong")).unwrap_err(),
        "is 7 characters long, limit is 5"
    );
}

#[test]
fn pattern_must_match_whole_value() {
    let plan = dev_plan();
    let database = plan.parameter("postgresql_database").unwrap();
    assert!(validate(database, &ParamValue::from("orders_db")).is_ok());

    let err = validate(database, &ParamValue::from("orders-db")).unwrap_err();
    assert_eq!(err, "does not match pattern ^[a-zA-Z_][a-zA-Z0-9_]*$");
}

#[test]
fn defaults_fill_every_missing_parameter() {
    let plan = dev_plan();
    let defaulted = apply_defaults(&plan, &ParameterMap::new());

    assert!(defaulted.changed);
    assert_eq!(defaulted.params.len(), 3);
    assert_eq!(defaulted.params["postgresql_database"], ParamValue::from("admin"));
    assert_eq!(defaulted.params["postgresql_user"], ParamValue::from("admin"));
    assert_eq!(defaulted.params["postgresql_version"], ParamValue::from("9.6"));
    assert!(!defaulted.params.contains_key("postgresql_password"));
    assert_eq!(
        defaulted.failure,
        Some(ParameterFailure::new(
            "postgresql_password",
            "missing required value"
        ))
    );
}

#[test]
fn declared_values_are_not_overwritten() {
    let plan = dev_plan();
    let declared = params(&[
        ("postgresql_database", "orders".into()),
        ("postgresql_user", "app".into()),
        ("postgresql_password", "s3cret".into()),
        ("postgresql_version", "9.5".into()),
    ]);
    let defaulted = apply_defaults(&plan, &declared);

    assert!(!defaulted.changed);
    assert!(defaulted.failure.is_none());
    assert_eq!(defaulted.params, declared);
}

#[test]
fn first_failure_in_plan_order_is_reported() {
    let plan = dev_plan();
    let declared = params(&[
        ("postgresql_database", "bad-name".into()),
        ("postgresql_user", "app".into()),
        ("postgresql_version", "8.0".into()),
    ]);

    let defaulted = apply_defaults(&plan, &declared);
    let failure = defaulted.failure.unwrap();
    assert_eq!(failure.name, "postgresql_database");
    assert_eq!(
        failure.to_string(),
        "parameter postgresql_database does not match pattern ^[a-zA-Z_][a-zA-Z0-9_]*$"
    );

    let checked = check_parameters(&plan, &declared).unwrap_err();
    assert_eq!(checked, failure);
}

#[test]
fn check_parameters_does_not_default() {
    let plan = dev_plan();
    let declared = params(&[("postgresql_password", "s3cret".into())]);
    let failure = check_parameters(&plan, &declared).unwrap_err();
    assert_eq!(failure.to_string(), "parameter postgresql_database missing required value");
}

#[test]
fn optional_parameter_without_default_is_left_out() {
    let plan = typed_plan();
    let defaulted = apply_defaults(&plan, &ParameterMap::new());
    assert!(defaulted.changed);
    assert!(defaulted.failure.is_none());
    assert_eq!(defaulted.params.len(), 1);
    assert_eq!(defaulted.params["replicas"], ParamValue::Int(1));
}
