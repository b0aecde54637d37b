use std::sync::Arc;

use bundle_core::{BundleSpec, CoreError, GroupVersionKind};
use bundle_operator::Registry;

const POSTGRESQL_APB: &str = include_str!("../../../demos/postgresql-apb.yml");

fn postgresql() -> GroupVersionKind {
    GroupVersionKind::new("apps.example.com", "v1alpha1", "PostgreSQL")
}

fn spec() -> Arc<BundleSpec> {
    Arc::new(BundleSpec::from_yaml(POSTGRESQL_APB).unwrap())
}

#[test]
fn bindings_are_found_by_group_version_kind() {
    assert!(Registry::builder().build().is_empty());

    let redis = GroupVersionKind::new("apps.example.com", "v1alpha1", "Redis");
    let registry = Registry::builder()
        .bind(&postgresql(), spec(), "dev")
        .unwrap()
        .bind(&redis, spec(), "prod")
        .unwrap()
        .build();
    assert_eq!(registry.len(), 2);
    assert!(!registry.is_empty());

    assert_eq!(registry.lookup(&postgresql()).unwrap().plan.name, "dev");
    assert_eq!(registry.lookup(&redis).unwrap().plan.name, "prod");

    let other_version = GroupVersionKind::new("apps.example.com", "v1", "PostgreSQL");
    assert!(registry.lookup(&other_version).is_none());
}

#[test]
fn rebinding_a_kind_replaces_it() {
    let registry = Registry::builder()
        .bind(&postgresql(), spec(), "dev")
        .unwrap()
        .bind(&postgresql(), spec(), "prod")
        .unwrap()
        .build();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.lookup(&postgresql()).unwrap().plan.name, "prod");
}

#[test]
fn unknown_plan_is_rejected() {
    let err = Registry::builder()
        .bind(&postgresql(), spec(), "staging")
        .unwrap_err();
    assert!(matches!(err, CoreError::PlanNotFound { ref plan, .. } if plan == "staging"), "{err}");
}

#[test]
fn defaults_must_pass_their_own_checks() {
    let yaml = r#"
name: broken
plans:
  - name: p
    parameters:
      - name: slug
        type: string
        pattern: "[a-z]+"
        default: "1x"
"#;
    let spec = Arc::new(BundleSpec::from_yaml(yaml).unwrap());
    match Registry::builder().bind(&postgresql(), spec, "p").unwrap_err() {
        CoreError::InvalidDefault {
            plan, parameter, ..
        } => {
            assert_eq!(plan, "p");
            assert_eq!(parameter, "slug");
        }
        other => panic!("expected InvalidDefault, got {other:?}"),
    }
}
