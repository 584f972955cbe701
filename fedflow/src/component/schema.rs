// Parameter schemas
// Each component kind declares the parameters it understands; values are
// checked by name and shape when they are attached to a descriptor, not at
// run time.

use serde_json::Value;
use thiserror::Error;

use crate::component::ComponentKind;

/// Shape a parameter value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    Str,
    Object,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "string",
            ParamKind::Object => "object",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Bool => value.is_boolean(),
            ParamKind::Int => value.is_i64() || value.is_u64(),
            // An integer literal is a valid float parameter.
            ParamKind::Float => value.is_number(),
            ParamKind::Str => value.is_string(),
            ParamKind::Object => value.is_object(),
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn new(name: &'static str, kind: ParamKind) -> Self {
        Self { name, kind }
    }
}

/// Errors raised while attaching parameters to a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("unknown parameter '{name}' for component kind '{kind}'")]
    UnknownParameter { kind: ComponentKind, name: String },

    #[error("parameter '{name}' expects {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Validate one parameter against a kind's declared schema.
pub fn validate(
    kind: ComponentKind,
    specs: &[ParamSpec],
    name: &str,
    value: &Value,
) -> Result<(), ParamError> {
    let spec = specs
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| ParamError::UnknownParameter {
            kind,
            name: name.to_string(),
        })?;

    if !spec.kind.accepts(value) {
        return Err(ParamError::TypeMismatch {
            name: name.to_string(),
            expected: spec.kind.as_str(),
            found: value_kind(value),
        });
    }

    Ok(())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::new("max_iter", ParamKind::Int),
        ParamSpec::new("learning_rate", ParamKind::Float),
        ParamSpec::new("init_param", ParamKind::Object),
    ];

    #[test]
    fn accepts_declared_parameters() {
        let kind = ComponentKind::HeteroLearner;
        assert!(validate(kind, SPECS, "max_iter", &json!(20)).is_ok());
        assert!(validate(kind, SPECS, "learning_rate", &json!(0.01)).is_ok());
        // Integer literal where a float is declared.
        assert!(validate(kind, SPECS, "learning_rate", &json!(1)).is_ok());
        assert!(validate(kind, SPECS, "init_param", &json!({"init_method": "zeros"})).is_ok());
    }

    #[test]
    fn rejects_unknown_parameter() {
        let err = validate(ComponentKind::HeteroLearner, SPECS, "learning_rte", &json!(0.01))
            .unwrap_err();
        assert!(matches!(err, ParamError::UnknownParameter { name, .. } if name == "learning_rte"));
    }

    #[test]
    fn rejects_wrong_shape() {
        let err =
            validate(ComponentKind::HeteroLearner, SPECS, "max_iter", &json!("twenty")).unwrap_err();
        assert_eq!(
            err,
            ParamError::TypeMismatch {
                name: "max_iter".to_string(),
                expected: "int",
                found: "string",
            }
        );
    }
}
