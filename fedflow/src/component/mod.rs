// Component model
// A descriptor declares one algorithmic step: its kind, its parameters and
// the per-role overrides. Port signatures and parameter schemas are fixed
// per kind; see catalog.rs.

pub mod catalog;
pub mod schema;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::party::Role;
use schema::{ParamError, ParamSpec};

pub use catalog::{data_transform, evaluation, hetero_learner, intersection, reader};

/// Built-in component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Data source; resolves a named table per party.
    Reader,
    /// Feature/label extraction; produces a fitted transform model.
    DataTransform,
    /// Private set intersection across guest and host datasets.
    Intersection,
    /// Joint model training across all roles.
    HeteroLearner,
    /// Initiator-side metric computation.
    Evaluation,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Reader => "reader",
            ComponentKind::DataTransform => "data_transform",
            ComponentKind::Intersection => "intersection",
            ComponentKind::HeteroLearner => "hetero_learner",
            ComponentKind::Evaluation => "evaluation",
        }
    }

    /// Declared input ports.
    pub fn inputs(&self) -> &'static [InputSlot] {
        catalog::inputs(*self)
    }

    /// Declared output ports.
    pub fn outputs(&self) -> &'static [OutputSlot] {
        catalog::outputs(*self)
    }

    /// Declared parameter schema.
    pub fn params(&self) -> &'static [ParamSpec] {
        catalog::params(*self)
    }

    /// Roles that execute a stage of this kind.
    pub fn participating_roles(&self) -> &'static [Role] {
        catalog::participating_roles(*self)
    }

    /// Whether the stage runs only on the initiating party.
    pub fn is_initiator_only(&self) -> bool {
        matches!(self, ComponentKind::Evaluation)
    }

    pub fn input_slot(&self, port: &str) -> Option<&'static InputSlot> {
        self.inputs().iter().find(|s| s.name == port)
    }

    pub fn output_slot(&self, port: &str) -> Option<&'static OutputSlot> {
        self.outputs().iter().find(|s| s.name == port)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload carried over a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Tabular / record stream handle.
    Data,
    /// Learned artifact.
    Model,
}

/// A declared input attachment point.
#[derive(Debug, Clone, Copy)]
pub struct InputSlot {
    pub name: &'static str,
    pub ty: PortType,
    /// Required slots must be fed by exactly one link; optional slots by at
    /// most one.
    pub required: bool,
}

/// A declared output attachment point.
#[derive(Debug, Clone, Copy)]
pub struct OutputSlot {
    pub name: &'static str,
    pub ty: PortType,
}

/// Parameter map attached to a descriptor. Ordered so that compiled plans
/// and serialized forms are reproducible.
pub type ParamMap = BTreeMap<String, Value>;

/// A named algorithmic step with its parameters.
///
/// Names must be unique within a pipeline; once a descriptor is added to a
/// graph it is never mutated again.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentDescriptor {
    pub name: String,
    pub kind: ComponentKind,
    /// Parameters shared by every role.
    pub params: ParamMap,
    /// Per-role overrides, applied over `params`.
    pub role_params: BTreeMap<Role, ParamMap>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: ParamMap::new(),
            role_params: BTreeMap::new(),
        }
    }

    /// Attach a parameter seen by every role. Validated against the kind's
    /// schema; the descriptor is returned unchanged on error.
    pub fn with_param(mut self, name: &str, value: Value) -> Result<Self, ParamError> {
        schema::validate(self.kind, self.kind.params(), name, &value)?;
        self.params.insert(name.to_string(), value);
        Ok(self)
    }

    /// Attach a parameter override for one role.
    pub fn with_role_param(
        mut self,
        role: Role,
        name: &str,
        value: Value,
    ) -> Result<Self, ParamError> {
        schema::validate(self.kind, self.kind.params(), name, &value)?;
        self.role_params
            .entry(role)
            .or_default()
            .insert(name.to_string(), value);
        Ok(self)
    }

    /// Resolved parameter bundle for one role: defaults with the role's
    /// overrides applied on top.
    pub fn params_for(&self, role: Role) -> ParamMap {
        let mut merged = self.params.clone();
        if let Some(overrides) = self.role_params.get(&role) {
            for (name, value) in overrides {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_overrides_shadow_defaults() {
        let desc = data_transform("data_transform_0")
            .with_param("with_label", json!(true))
            .unwrap()
            .with_param("output_format", json!("dense"))
            .unwrap()
            .with_role_param(Role::Host, "with_label", json!(false))
            .unwrap();

        let guest = desc.params_for(Role::Guest);
        assert_eq!(guest.get("with_label"), Some(&json!(true)));
        assert_eq!(guest.get("output_format"), Some(&json!("dense")));

        let host = desc.params_for(Role::Host);
        assert_eq!(host.get("with_label"), Some(&json!(false)));
        assert_eq!(host.get("output_format"), Some(&json!("dense")));
    }

    #[test]
    fn unknown_parameter_is_rejected_at_build_time() {
        let err = reader("reader_0")
            .with_param("tabel", json!({"name": "t", "namespace": "ns"}))
            .unwrap_err();
        assert!(matches!(err, ParamError::UnknownParameter { name, .. } if name == "tabel"));
    }

    #[test]
    fn port_lookup() {
        let learner = ComponentKind::HeteroLearner;
        assert!(learner.input_slot("train_data").is_some());
        assert!(learner.input_slot("train_data").unwrap().required);
        assert!(!learner.input_slot("validate_data").unwrap().required);
        assert!(learner.input_slot("data").is_none());
        assert_eq!(learner.output_slot("model").unwrap().ty, PortType::Model);
    }
}
