// Built-in component catalog
// Port signatures, parameter schemas and role participation per kind, plus
// descriptor constructors. The algorithms behind these kinds are opaque to
// the core; only their orchestration contract is declared here.

use crate::component::schema::{ParamKind, ParamSpec};
use crate::component::{ComponentDescriptor, ComponentKind, InputSlot, OutputSlot, PortType};
use crate::party::Role;

const NO_INPUTS: &[InputSlot] = &[];
const NO_OUTPUTS: &[OutputSlot] = &[];

const DATA_IN: &[InputSlot] = &[InputSlot {
    name: "data",
    ty: PortType::Data,
    required: true,
}];

const DATA_OUT: &[OutputSlot] = &[OutputSlot {
    name: "data",
    ty: PortType::Data,
}];

const DATA_AND_MODEL_OUT: &[OutputSlot] = &[
    OutputSlot {
        name: "data",
        ty: PortType::Data,
    },
    OutputSlot {
        name: "model",
        ty: PortType::Model,
    },
];

const LEARNER_IN: &[InputSlot] = &[
    InputSlot {
        name: "train_data",
        ty: PortType::Data,
        required: true,
    },
    InputSlot {
        name: "validate_data",
        ty: PortType::Data,
        required: false,
    },
];

pub(crate) fn inputs(kind: ComponentKind) -> &'static [InputSlot] {
    match kind {
        ComponentKind::Reader => NO_INPUTS,
        ComponentKind::DataTransform => DATA_IN,
        ComponentKind::Intersection => DATA_IN,
        ComponentKind::HeteroLearner => LEARNER_IN,
        ComponentKind::Evaluation => DATA_IN,
    }
}

pub(crate) fn outputs(kind: ComponentKind) -> &'static [OutputSlot] {
    match kind {
        ComponentKind::Reader => DATA_OUT,
        ComponentKind::DataTransform => DATA_AND_MODEL_OUT,
        ComponentKind::Intersection => DATA_OUT,
        ComponentKind::HeteroLearner => DATA_AND_MODEL_OUT,
        ComponentKind::Evaluation => NO_OUTPUTS,
    }
}

const READER_PARAMS: &[ParamSpec] = &[ParamSpec::new("table", ParamKind::Object)];

const DATA_TRANSFORM_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("with_label", ParamKind::Bool),
    ParamSpec::new("label_name", ParamKind::Str),
    ParamSpec::new("label_type", ParamKind::Str),
    ParamSpec::new("output_format", ParamKind::Str),
    ParamSpec::new("missing_fill", ParamKind::Bool),
];

const INTERSECTION_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("intersect_method", ParamKind::Str),
    ParamSpec::new("sync_intersect_ids", ParamKind::Bool),
    ParamSpec::new("only_output_key", ParamKind::Bool),
];

const HETERO_LEARNER_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("early_stop", ParamKind::Str),
    ParamSpec::new("max_iter", ParamKind::Int),
    ParamSpec::new("alpha", ParamKind::Float),
    ParamSpec::new("batch_size", ParamKind::Int),
    ParamSpec::new("learning_rate", ParamKind::Float),
    ParamSpec::new("penalty", ParamKind::Str),
    ParamSpec::new("optimizer", ParamKind::Str),
    ParamSpec::new("tol", ParamKind::Float),
    ParamSpec::new("init_param", ParamKind::Object),
    ParamSpec::new("encrypted_mode_calculator_param", ParamKind::Object),
];

const EVALUATION_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("eval_type", ParamKind::Str),
    ParamSpec::new("pos_label", ParamKind::Int),
];

pub(crate) fn params(kind: ComponentKind) -> &'static [ParamSpec] {
    match kind {
        ComponentKind::Reader => READER_PARAMS,
        ComponentKind::DataTransform => DATA_TRANSFORM_PARAMS,
        ComponentKind::Intersection => INTERSECTION_PARAMS,
        ComponentKind::HeteroLearner => HETERO_LEARNER_PARAMS,
        ComponentKind::Evaluation => EVALUATION_PARAMS,
    }
}

const DATA_ROLES: &[Role] = &[Role::Guest, Role::Host];
const ALL_ROLES: &[Role] = &[Role::Guest, Role::Host, Role::Arbiter];
const INITIATOR_SIDE: &[Role] = &[Role::Guest];

pub(crate) fn participating_roles(kind: ComponentKind) -> &'static [Role] {
    match kind {
        // Per-party stages: each data-holding party runs independently.
        ComponentKind::Reader | ComponentKind::DataTransform => DATA_ROLES,
        // Joint stages: every present role takes part and the stage blocks
        // until all of them complete.
        ComponentKind::Intersection => DATA_ROLES,
        ComponentKind::HeteroLearner => ALL_ROLES,
        ComponentKind::Evaluation => INITIATOR_SIDE,
    }
}

/// Data source component.
pub fn reader(name: impl Into<String>) -> ComponentDescriptor {
    ComponentDescriptor::new(name, ComponentKind::Reader)
}

/// Feature/label extraction component.
pub fn data_transform(name: impl Into<String>) -> ComponentDescriptor {
    ComponentDescriptor::new(name, ComponentKind::DataTransform)
}

/// Entity alignment component.
pub fn intersection(name: impl Into<String>) -> ComponentDescriptor {
    ComponentDescriptor::new(name, ComponentKind::Intersection)
}

/// Cross-role training component.
pub fn hetero_learner(name: impl Into<String>) -> ComponentDescriptor {
    ComponentDescriptor::new(name, ComponentKind::HeteroLearner)
}

/// Initiator-side metric component.
pub fn evaluation(name: impl Into<String>) -> ComponentDescriptor {
    ComponentDescriptor::new(name, ComponentKind::Evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_declares_a_signature() {
        for kind in [
            ComponentKind::Reader,
            ComponentKind::DataTransform,
            ComponentKind::Intersection,
            ComponentKind::HeteroLearner,
            ComponentKind::Evaluation,
        ] {
            // A kind without outputs must at least consume something.
            assert!(
                !outputs(kind).is_empty() || !inputs(kind).is_empty(),
                "{kind} has neither inputs nor outputs"
            );
            assert!(!participating_roles(kind).is_empty());
        }
    }

    #[test]
    fn reader_is_a_source() {
        assert!(inputs(ComponentKind::Reader).is_empty());
        assert_eq!(outputs(ComponentKind::Reader).len(), 1);
    }
}
