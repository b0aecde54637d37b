use std::collections::HashMap;
use std::sync::Arc;

use bundle_core::{BundleSpec, CoreError, GroupVersionKind, Plan};

use crate::validate::validate;

/// The bundle spec and selected plan that apply to one resource type.
#[derive(Debug, Clone)]
pub struct Binding {
    pub spec: Arc<BundleSpec>,
    pub plan: Plan,
}

impl Binding {
    /// Select `plan_name` from `spec` and check its defaults against their
    /// own descriptors.
    pub fn new(spec: Arc<BundleSpec>, plan_name: &str) -> Result<Self, CoreError> {
        let plan = spec.require_plan(plan_name)?.clone();
        for p in &plan.parameters {
            if let Some(default) = &p.default {
                validate(p, default).map_err(|reason| CoreError::InvalidDefault {
                    plan: plan.name.clone(),
                    parameter: p.name.clone(),
                    reason,
                })?;
            }
        }
        Ok(Self { spec, plan })
    }
}

/// Resource types this operator reconciles, keyed by `<group>/<version>:<kind>`.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    bindings: HashMap<String, Arc<Binding>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<&Arc<Binding>> {
        self.bindings.get(&gvk.key())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    bindings: HashMap<String, Arc<Binding>>,
}

impl RegistryBuilder {
    pub fn bind(
        mut self,
        gvk: &GroupVersionKind,
        spec: Arc<BundleSpec>,
        plan_name: &str,
    ) -> Result<Self, CoreError> {
        let binding = Binding::new(spec, plan_name)?;
        tracing::info!(
            key = %gvk.key(),
            bundle = %binding.spec.name,
            plan = %binding.plan.name,
            "registered bundle binding"
        );
        self.bindings.insert(gvk.key(), Arc::new(binding));
        Ok(self)
    }

    pub fn build(self) -> Registry {
        Registry {
            bindings: self.bindings,
        }
    }
}
