use bundle_core::{ParamType, ParamValue, ParameterDescriptor};

/// Check one declared value against its descriptor.
///
/// Returns the reason on rejection; the reason is phrased to follow the
/// parameter name in a status message ("parameter x <reason>").
pub fn validate(descriptor: &ParameterDescriptor, value: &ParamValue) -> Result<(), String> {
    check_type(descriptor.param_type, value)?;

    let needs_string = descriptor.enum_values.is_some()
        || descriptor.max_length.is_some()
        || descriptor.pattern.is_some();
    if !needs_string {
        return Ok(());
    }
    let Some(text) = value.coerce_string() else {
        return Err(format!(
            "must be a scalar value, got {}",
            value.type_name()
        ));
    };

    if let Some(allowed) = &descriptor.enum_values {
        let member = allowed
            .iter()
            .filter_map(ParamValue::coerce_string)
            .any(|candidate| candidate == text);
        if !member {
            let choices: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            return Err(format!(
                "value {text:?} is not one of [{}]",
                choices.join(", ")
            ));
        }
    }

    if let Some(max) = descriptor.max_length {
        let len = text.chars().count();
        if len > max {
            return Err(format!("is {len} characters long, limit is {max}"));
        }
    }

    if let Some(pattern) = &descriptor.pattern {
        if !pattern.is_full_match(&text) {
            return Err(format!("does not match pattern {}", pattern.as_str()));
        }
    }

    Ok(())
}

fn check_type(expected: ParamType, value: &ParamValue) -> Result<(), String> {
    let ok = match expected {
        ParamType::String => matches!(value, ParamValue::String(_)),
        ParamType::Int => matches!(value, ParamValue::Int(_)),
        ParamType::Number => matches!(value, ParamValue::Int(_) | ParamValue::Float(_)),
        ParamType::Bool => matches!(value, ParamValue::Bool(_)),
        ParamType::Array => matches!(value, ParamValue::List(_)),
        ParamType::Enum => !matches!(value, ParamValue::List(_) | ParamValue::Opaque(_)),
        ParamType::Unknown => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!(
            "expected {}, got {}",
            type_label(expected),
            value.type_name()
        ))
    }
}

fn type_label(t: ParamType) -> &'static str {
    match t {
        ParamType::String => "string",
        ParamType::Int => "int",
        ParamType::Number => "number",
        ParamType::Bool => "bool",
        ParamType::Array => "list",
        ParamType::Enum => "enum value",
        ParamType::Unknown => "any",
    }
}
