// Pipeline graph builder
// Accumulates component descriptors and typed links as they are added.
// Construction errors are raised synchronously and leave the graph
// untouched; validation of the whole graph happens at compile time.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::component::{ComponentDescriptor, ComponentKind};
use crate::execution::context::RunContext;
use crate::execution::events::ProgressSender;
use crate::graph::compile::CompiledPlan;
use crate::graph::link::{Data, Link, PortRef};
use crate::party::{PartyId, Role, RoleTable};

/// Errors raised while assembling a pipeline graph. All of them are
/// recoverable by correcting the offending call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphConstructionError {
    #[error("{what} is already set and may not be changed")]
    AlreadyInitialized { what: &'static str },

    #[error("{what} must be set before any component is added")]
    InitializedAfterAdd { what: &'static str },

    #[error("role set must contain at least one party")]
    EmptyRoleSet,

    #[error("component '{component}' already exists in the pipeline")]
    DuplicateName { component: String },

    #[error("component '{component}' links to unknown source '{source_port}'")]
    DanglingLink { component: String, source_port: PortRef },

    #[error("component '{component}' has no input port '{port}'")]
    UnknownInputPort { component: String, port: String },

    #[error("component '{component}' carries parameters for role '{role}' outside the pipeline's role set")]
    RoleMismatch { component: String, role: Role },

    #[error("deployed subgraph has no entry port '{port}'")]
    UnknownEntryPort { port: PortRef },
}

/// Handle returned when a component is added. Carries the component's
/// identity and gives typed access to its ports.
#[derive(Debug, Clone)]
pub struct ComponentHandle {
    name: String,
    kind: ComponentKind,
}

impl ComponentHandle {
    pub(crate) fn new(name: String, kind: ComponentKind) -> Self {
        Self { name, kind }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Reference to one of this component's output ports. Existence of the
    /// port is checked when the reference is linked into a graph.
    pub fn output(&self, port: impl Into<String>) -> PortRef {
        PortRef::new(self.name.clone(), port)
    }
}

/// A multi-party pipeline graph under construction.
///
/// Created empty, mutated by [`Pipeline::add_component`], frozen by
/// [`Pipeline::compile`], executed by [`Pipeline::fit`] /
/// [`Pipeline::predict`]. The value owns all run bookkeeping, so neither
/// fit nor predict is concurrently re-entrant on one instance.
#[derive(Debug, Default)]
pub struct Pipeline {
    pub(crate) initiator: Option<(Role, PartyId)>,
    pub(crate) roles: Option<RoleTable>,
    pub(crate) components: Vec<ComponentDescriptor>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) links: Vec<Link>,
    /// Fitted model reports carried by deployed components; non-empty only
    /// for predict graphs.
    pub(crate) frozen: BTreeMap<String, Value>,
    pub(crate) plan: Option<CompiledPlan>,
    pub(crate) run: Option<RunContext>,
    pub(crate) progress: Option<ProgressSender>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the initiating role and party. Write-once; must precede any
    /// `add_component`.
    pub fn set_initiator(
        &mut self,
        role: Role,
        party: PartyId,
    ) -> Result<&mut Self, GraphConstructionError> {
        if self.initiator.is_some() {
            return Err(GraphConstructionError::AlreadyInitialized { what: "initiator" });
        }
        if !self.components.is_empty() {
            return Err(GraphConstructionError::InitializedAfterAdd { what: "initiator" });
        }
        self.initiator = Some((role, party));
        Ok(self)
    }

    /// Bind the full role/party table. Write-once; must precede any
    /// `add_component`.
    pub fn set_roles(&mut self, roles: RoleTable) -> Result<&mut Self, GraphConstructionError> {
        if self.roles.is_some() {
            return Err(GraphConstructionError::AlreadyInitialized { what: "role set" });
        }
        if !self.components.is_empty() {
            return Err(GraphConstructionError::InitializedAfterAdd { what: "role set" });
        }
        if roles.is_empty() {
            return Err(GraphConstructionError::EmptyRoleSet);
        }
        self.roles = Some(roles);
        Ok(self)
    }

    /// Stream execution progress events to the given sender.
    pub fn with_progress(&mut self, tx: ProgressSender) -> &mut Self {
        self.progress = Some(tx);
        self
    }

    /// Append a descriptor and its incoming links.
    ///
    /// Links may only reference components that are already part of the
    /// graph; forward references are rejected. On any error the graph is
    /// left exactly as it was.
    pub fn add_component(
        &mut self,
        descriptor: ComponentDescriptor,
        data: Data,
    ) -> Result<ComponentHandle, GraphConstructionError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(GraphConstructionError::DuplicateName {
                component: descriptor.name,
            });
        }

        let mut links = Vec::with_capacity(data.entries().len());
        for (port, source) in data.entries() {
            if descriptor.kind.input_slot(port).is_none() {
                return Err(GraphConstructionError::UnknownInputPort {
                    component: descriptor.name.clone(),
                    port: port.clone(),
                });
            }
            let valid_source = self
                .index
                .get(&source.component)
                .map(|&i| self.components[i].kind.output_slot(&source.port).is_some())
                .unwrap_or(false);
            if !valid_source {
                return Err(GraphConstructionError::DanglingLink {
                    component: descriptor.name.clone(),
                    source_port: source.clone(),
                });
            }
            links.push(Link {
                from: source.clone(),
                to: PortRef::new(descriptor.name.clone(), port.clone()),
            });
        }

        if let Some(roles) = &self.roles {
            for role in descriptor.role_params.keys() {
                if !roles.contains(*role) {
                    return Err(GraphConstructionError::RoleMismatch {
                        component: descriptor.name.clone(),
                        role: *role,
                    });
                }
            }
        }

        let handle = ComponentHandle::new(descriptor.name.clone(), descriptor.kind);
        self.index
            .insert(descriptor.name.clone(), self.components.len());
        self.components.push(descriptor);
        self.links.extend(links);
        // Any mutation invalidates the compiled plan and run bookkeeping.
        self.plan = None;
        self.run = None;
        Ok(handle)
    }

    pub fn component(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.index.get(name).map(|&i| &self.components[i])
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.name.as_str())
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn initiator(&self) -> Option<(Role, PartyId)> {
        self.initiator
    }

    pub fn roles(&self) -> Option<&RoleTable> {
        self.roles.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{data_transform, evaluation, hetero_learner, intersection, reader};
    use serde_json::json;

    fn roles() -> RoleTable {
        RoleTable {
            guest: vec![PartyId(9999)],
            host: vec![PartyId(10000)],
            arbiter: vec![PartyId(10000)],
        }
    }

    fn initialized() -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline
            .set_initiator(Role::Guest, PartyId(9999))
            .unwrap()
            .set_roles(roles())
            .unwrap();
        pipeline
    }

    #[test]
    fn initiator_and_roles_are_write_once() {
        let mut pipeline = initialized();

        let err = pipeline
            .set_initiator(Role::Guest, PartyId(9999))
            .unwrap_err();
        assert_eq!(
            err,
            GraphConstructionError::AlreadyInitialized { what: "initiator" }
        );

        let err = pipeline.set_roles(roles()).unwrap_err();
        assert_eq!(
            err,
            GraphConstructionError::AlreadyInitialized { what: "role set" }
        );
    }

    #[test]
    fn roles_must_precede_components() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component(reader("reader_0"), Data::new()).unwrap();

        let err = pipeline.set_roles(roles()).unwrap_err();
        assert_eq!(
            err,
            GraphConstructionError::InitializedAfterAdd { what: "role set" }
        );
        let err = pipeline
            .set_initiator(Role::Guest, PartyId(9999))
            .unwrap_err();
        assert_eq!(
            err,
            GraphConstructionError::InitializedAfterAdd { what: "initiator" }
        );
    }

    #[test]
    fn empty_role_set_is_rejected() {
        let mut pipeline = Pipeline::new();
        let err = pipeline.set_roles(RoleTable::default()).unwrap_err();
        assert_eq!(err, GraphConstructionError::EmptyRoleSet);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut pipeline = initialized();
        pipeline.add_component(reader("reader_0"), Data::new()).unwrap();

        let err = pipeline
            .add_component(reader("reader_0"), Data::new())
            .unwrap_err();
        assert!(matches!(
            err,
            GraphConstructionError::DuplicateName { component } if component == "reader_0"
        ));
    }

    #[test]
    fn forward_reference_fails_and_leaves_graph_unchanged() {
        let mut pipeline = initialized();
        pipeline.add_component(reader("reader_0"), Data::new()).unwrap();

        // intersection_0 has not been added yet.
        let err = pipeline
            .add_component(
                data_transform("data_transform_0"),
                Data::data(PortRef::new("intersection_0", "data")),
            )
            .unwrap_err();
        assert!(matches!(err, GraphConstructionError::DanglingLink { .. }));

        // No partial mutation.
        assert_eq!(pipeline.components.len(), 1);
        assert!(pipeline.links.is_empty());
        assert!(pipeline.component("data_transform_0").is_none());
    }

    #[test]
    fn unknown_source_port_is_dangling() {
        let mut pipeline = initialized();
        let reader_0 = pipeline.add_component(reader("reader_0"), Data::new()).unwrap();

        let err = pipeline
            .add_component(
                data_transform("data_transform_0"),
                Data::data(reader_0.output("model")),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GraphConstructionError::DanglingLink { source_port, .. } if source_port.port == "model"
        ));
    }

    #[test]
    fn unknown_input_port_is_rejected() {
        let mut pipeline = initialized();
        let reader_0 = pipeline.add_component(reader("reader_0"), Data::new()).unwrap();

        let err = pipeline
            .add_component(
                evaluation("evaluation_0"),
                Data::new().with("scores", reader_0.output("data")),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GraphConstructionError::UnknownInputPort { port, .. } if port == "scores"
        ));
    }

    #[test]
    fn role_override_outside_role_set_is_rejected() {
        let mut pipeline = Pipeline::new();
        pipeline
            .set_initiator(Role::Guest, PartyId(9999))
            .unwrap()
            .set_roles(RoleTable {
                guest: vec![PartyId(9999)],
                host: vec![PartyId(10000)],
                arbiter: Vec::new(),
            })
            .unwrap();

        let learner = hetero_learner("hetero_learner_0")
            .with_role_param(Role::Arbiter, "max_iter", json!(5))
            .unwrap();
        let err = pipeline.add_component(learner, Data::new()).unwrap_err();
        assert!(matches!(
            err,
            GraphConstructionError::RoleMismatch { role: Role::Arbiter, .. }
        ));
    }

    #[test]
    fn handles_expose_ports() {
        let mut pipeline = initialized();
        let reader_0 = pipeline.add_component(reader("reader_0"), Data::new()).unwrap();
        let intersection_0 = pipeline
            .add_component(
                intersection("intersection_0"),
                Data::data(reader_0.output("data")),
            )
            .unwrap();

        assert_eq!(intersection_0.name(), "intersection_0");
        assert_eq!(
            intersection_0.output("data"),
            PortRef::new("intersection_0", "data")
        );
        assert_eq!(pipeline.links().len(), 1);
    }
}
