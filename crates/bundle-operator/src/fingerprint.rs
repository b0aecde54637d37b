use bundle_core::{ParamValue, ParameterMap};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::error::HashError;

/// Content fingerprint of a parameter map: SHA-256 over canonical JSON,
/// lower-case hex.
///
/// Keys are emitted in sorted order at every level, so two maps with the
/// same entries always hash the same regardless of how they were built.
pub fn fingerprint(params: &ParameterMap) -> Result<String, HashError> {
    let canonical = canonical_json(params)?;
    let bytes = serde_json::to_vec(&canonical).map_err(|e| HashError {
        parameter: String::new(),
        reason: e.to_string(),
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn canonical_json(params: &ParameterMap) -> Result<Value, HashError> {
    let mut object = Map::new();
    // BTreeMap iteration is already sorted; insertion keeps that order
    // whether or not serde_json preserves insertion order.
    for (name, value) in params {
        object.insert(name.clone(), canonical_value(name, value)?);
    }
    Ok(Value::Object(object))
}

fn canonical_value(name: &str, value: &ParamValue) -> Result<Value, HashError> {
    Ok(match value {
        ParamValue::Bool(b) => Value::Bool(*b),
        ParamValue::Int(i) => Value::Number((*i).into()),
        ParamValue::Float(f) => Value::Number(Number::from_f64(*f).ok_or_else(|| HashError {
            parameter: name.to_string(),
            reason: format!("non-finite number {f}"),
        })?),
        ParamValue::String(s) => Value::String(s.clone()),
        ParamValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| canonical_value(name, item))
                .collect::<Result<_, _>>()?,
        ),
        ParamValue::Opaque(_) => {
            return Err(HashError {
                parameter: name.to_string(),
                reason: format!("unsupported {} value", value.type_name()),
            });
        }
    })
}
