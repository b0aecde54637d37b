use bundle_core::{ParameterMap, Plan};

use crate::error::ParameterFailure;
use crate::validate::validate;

pub const MISSING_REQUIRED: &str = "missing required value";

/// Result of running the defaulting engine over a declared map.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaulted {
    pub params: ParameterMap,
    /// Whether any default was filled in.
    pub changed: bool,
    /// First missing or invalid parameter in plan order, if any.
    pub failure: Option<ParameterFailure>,
}

/// Fill plan defaults into `declared` and check every descriptor.
///
/// Every default is applied even after a failure, so a defaulting write
/// carries the full set; only the first failure in plan order is reported.
pub fn apply_defaults(plan: &Plan, declared: &ParameterMap) -> Defaulted {
    let mut params = declared.clone();
    let mut changed = false;
    let mut failure = None;

    for p in &plan.parameters {
        let outcome = match params.get(&p.name) {
            None => match &p.default {
                Some(default) => {
                    params.insert(p.name.clone(), default.clone());
                    changed = true;
                    Ok(())
                }
                None if p.required => Err(ParameterFailure::new(&p.name, MISSING_REQUIRED)),
                None => Ok(()),
            },
            Some(value) => {
                validate(p, value).map_err(|reason| ParameterFailure::new(&p.name, reason))
            }
        };
        if let Err(f) = outcome {
            failure.get_or_insert(f);
        }
    }

    Defaulted {
        params,
        changed,
        failure,
    }
}

/// The same scan as [`apply_defaults`] without filling anything in.
pub fn check_parameters(plan: &Plan, params: &ParameterMap) -> Result<(), ParameterFailure> {
    for p in &plan.parameters {
        match params.get(&p.name) {
            None if p.required => return Err(ParameterFailure::new(&p.name, MISSING_REQUIRED)),
            None => {}
            Some(value) => {
                validate(p, value).map_err(|reason| ParameterFailure::new(&p.name, reason))?
            }
        }
    }
    Ok(())
}
