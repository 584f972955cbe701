// Deploy selector
// Freezes a named subset of a fitted graph, together with the model
// artifacts it produced, into an immutable subgraph that a new pipeline can
// embed for repeated inference.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::component::ComponentDescriptor;
use crate::graph::builder::{ComponentHandle, GraphConstructionError, Pipeline};
use crate::graph::link::{Link, PortRef};
use crate::party::{PartyId, Role, RoleTable};

/// Errors raised while deploying or embedding a subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    #[error("pipeline must be fitted before components can be deployed")]
    NotFitted,

    #[error("component '{component}' is not part of this pipeline")]
    UnknownComponent { component: String },

    #[error("component '{component}' requires upstream '{upstream}' which is not part of the fitted graph")]
    MissingDependency { component: String, upstream: String },
}

/// A frozen selection of fitted components and their artifacts.
///
/// Immutable once produced. Embedding it into a new graph with
/// [`Pipeline::add_deployed`] wires its entry ports to fresh data sources.
#[derive(Debug, Clone, Serialize)]
pub struct DeployedSubgraph {
    pub(crate) initiator: (Role, PartyId),
    pub(crate) roles: RoleTable,
    /// Named components plus their auto-included upstreams, named ones
    /// first in selection order.
    pub(crate) components: Vec<ComponentDescriptor>,
    /// Links fully contained in the selection.
    pub(crate) links: Vec<Link>,
    /// Input ports whose upstream was left behind (data sources); these
    /// must be fed by the embedding graph.
    pub(crate) entry_ports: Vec<PortRef>,
    /// Fitted model reports by component.
    pub(crate) models: BTreeMap<String, Value>,
}

impl DeployedSubgraph {
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn entry_ports(&self) -> &[PortRef] {
        &self.entry_ports
    }

    /// Entry port of a deployed component, if the selection left it open.
    pub fn entry(&self, component: &str, port: &str) -> Option<PortRef> {
        self.entry_ports
            .iter()
            .find(|p| p.component == component && p.port == port)
            .cloned()
    }

    pub fn model(&self, component: &str) -> Option<&Value> {
        self.models.get(component)
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }
}

/// Mapping from a deployed subgraph's entry ports to output ports of the
/// embedding graph.
#[derive(Debug, Clone, Default)]
pub struct PredictInput {
    entries: Vec<(PortRef, PortRef)>,
}

impl PredictInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `entry` (an open input port of the subgraph) from `source` (an
    /// output port of the embedding graph).
    pub fn map(mut self, entry: PortRef, source: PortRef) -> Self {
        self.entries.push((entry, source));
        self
    }
}

impl Pipeline {
    /// Freeze the named components and their fitted artifacts.
    ///
    /// Upstream dependencies of the named set are included automatically;
    /// data sources (readers) are left behind and their downstream input
    /// ports become the subgraph's entry ports.
    pub fn deploy_component(
        &self,
        selection: &[&ComponentHandle],
    ) -> Result<DeployedSubgraph, DeployError> {
        if !self.is_fitted() {
            return Err(DeployError::NotFitted);
        }
        // is_fitted implies a successful compile and run.
        let run = self.run.as_ref().ok_or(DeployError::NotFitted)?;
        let plan = self.plan.as_ref().ok_or(DeployError::NotFitted)?;

        let mut named = Vec::new();
        for handle in selection {
            if !self.index.contains_key(handle.name()) {
                return Err(DeployError::UnknownComponent {
                    component: handle.name().to_string(),
                });
            }
            named.push(handle.name().to_string());
        }

        // Transitive upstream closure, skipping data sources.
        let mut included: HashSet<String> = named.iter().cloned().collect();
        let mut worklist: Vec<String> = named.clone();
        while let Some(component) = worklist.pop() {
            for link in &self.links {
                if link.to.component != component {
                    continue;
                }
                let upstream = &link.from.component;
                let descriptor = self.component(upstream).ok_or_else(|| {
                    DeployError::MissingDependency {
                        component: component.clone(),
                        upstream: upstream.clone(),
                    }
                })?;
                if descriptor.kind == crate::component::ComponentKind::Reader {
                    continue;
                }
                if included.insert(upstream.clone()) {
                    worklist.push(upstream.clone());
                }
            }
        }

        // Named components first, in selection order; auto-included
        // upstreams follow in stage order.
        let mut ordered = named.clone();
        for component in plan.order() {
            if included.contains(component) && !ordered.iter().any(|n| n == component) {
                ordered.push(component.to_string());
            }
        }

        let components: Vec<ComponentDescriptor> = ordered
            .iter()
            .filter_map(|name| self.component(name).cloned())
            .collect();

        let links: Vec<Link> = self
            .links
            .iter()
            .filter(|l| included.contains(&l.from.component) && included.contains(&l.to.component))
            .cloned()
            .collect();

        let mut entry_ports = Vec::new();
        for name in &ordered {
            for link in &self.links {
                if link.to.component == *name && !included.contains(&link.from.component) {
                    entry_ports.push(link.to.clone());
                }
            }
        }

        let mut models = BTreeMap::new();
        for name in &ordered {
            if let Some(model) = run.record(name).and_then(|r| r.model_param()) {
                models.insert(name.clone(), model.clone());
            }
        }

        Ok(DeployedSubgraph {
            initiator: self.initiator.ok_or(DeployError::NotFitted)?,
            roles: self.roles.clone().ok_or(DeployError::NotFitted)?,
            components,
            links,
            entry_ports,
            models,
        })
    }

    /// Embed a deployed subgraph into this graph, feeding its entry ports
    /// from `predict_input`. Roles and initiator are inherited from the
    /// subgraph.
    pub fn add_deployed(
        &mut self,
        subgraph: &DeployedSubgraph,
        predict_input: PredictInput,
    ) -> Result<(), GraphConstructionError> {
        match &self.roles {
            None => {}
            Some(roles) if *roles == subgraph.roles => {}
            Some(_) => {
                return Err(GraphConstructionError::AlreadyInitialized { what: "role set" })
            }
        }
        match self.initiator {
            None => {}
            Some(initiator) if initiator == subgraph.initiator => {}
            Some(_) => {
                return Err(GraphConstructionError::AlreadyInitialized { what: "initiator" })
            }
        }

        for descriptor in &subgraph.components {
            if self.index.contains_key(&descriptor.name) {
                return Err(GraphConstructionError::DuplicateName {
                    component: descriptor.name.clone(),
                });
            }
        }

        let mut mapped_links = Vec::new();
        for (entry, source) in &predict_input.entries {
            if !subgraph.entry_ports.contains(entry) {
                return Err(GraphConstructionError::UnknownEntryPort {
                    port: entry.clone(),
                });
            }
            let valid_source = self
                .index
                .get(&source.component)
                .map(|&i| self.components[i].kind.output_slot(&source.port).is_some())
                .unwrap_or(false);
            if !valid_source {
                return Err(GraphConstructionError::DanglingLink {
                    component: entry.component.clone(),
                    source_port: source.clone(),
                });
            }
            mapped_links.push(Link {
                from: source.clone(),
                to: entry.clone(),
            });
        }

        self.roles = Some(subgraph.roles.clone());
        self.initiator = Some(subgraph.initiator);
        for descriptor in &subgraph.components {
            self.index
                .insert(descriptor.name.clone(), self.components.len());
            self.components.push(descriptor.clone());
        }
        self.links.extend(subgraph.links.iter().cloned());
        self.links.extend(mapped_links);
        for (component, model) in &subgraph.models {
            self.frozen.insert(component.clone(), model.clone());
        }
        self.plan = None;
        self.run = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{
        data_transform, evaluation, hetero_learner, intersection, reader,
    };
    use crate::config::{Backend, WorkMode};
    use crate::execution::runner::{
        ComponentRunner, LocalRunner, RunMode, RunnerError, TaskOutput, TaskSpec,
    };
    use crate::graph::link::Data;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn roles() -> RoleTable {
        RoleTable {
            guest: vec![PartyId(9999)],
            host: vec![PartyId(10000)],
            arbiter: vec![PartyId(10000)],
        }
    }

    struct Handles {
        data_transform_0: ComponentHandle,
        learner_0: ComponentHandle,
    }

    fn reference_pipeline() -> (Pipeline, Handles) {
        let mut pipeline = Pipeline::new();
        pipeline
            .set_initiator(Role::Guest, PartyId(9999))
            .unwrap()
            .set_roles(roles())
            .unwrap();

        let reader_0 = pipeline
            .add_component(
                reader("reader_0")
                    .with_role_param(
                        Role::Guest,
                        "table",
                        json!({"name": "train_guest", "namespace": "experiment"}),
                    )
                    .unwrap()
                    .with_role_param(
                        Role::Host,
                        "table",
                        json!({"name": "train_host", "namespace": "experiment"}),
                    )
                    .unwrap(),
                Data::new(),
            )
            .unwrap();
        let data_transform_0 = pipeline
            .add_component(
                data_transform("data_transform_0")
                    .with_role_param(Role::Guest, "with_label", json!(true))
                    .unwrap()
                    .with_role_param(Role::Host, "with_label", json!(false))
                    .unwrap(),
                Data::data(reader_0.output("data")),
            )
            .unwrap();
        let intersection_0 = pipeline
            .add_component(
                intersection("intersection_0"),
                Data::data(data_transform_0.output("data")),
            )
            .unwrap();
        let learner_0 = pipeline
            .add_component(
                hetero_learner("learner_0")
                    .with_param("max_iter", json!(20))
                    .unwrap(),
                Data::train_data(intersection_0.output("data")),
            )
            .unwrap();
        pipeline
            .add_component(
                evaluation("evaluation_0"),
                Data::data(learner_0.output("data")),
            )
            .unwrap();

        (
            pipeline,
            Handles {
                data_transform_0,
                learner_0,
            },
        )
    }

    async fn fitted() -> (Pipeline, Handles) {
        let (mut pipeline, handles) = reference_pipeline();
        pipeline.compile().unwrap();
        pipeline
            .fit(&LocalRunner::new(), Backend(0), WorkMode(0))
            .await
            .unwrap();
        (pipeline, handles)
    }

    #[tokio::test]
    async fn deploy_before_fit_is_rejected() {
        let (pipeline, handles) = reference_pipeline();
        let err = pipeline
            .deploy_component(&[&handles.data_transform_0, &handles.learner_0])
            .unwrap_err();
        assert_eq!(err, DeployError::NotFitted);
    }

    #[tokio::test]
    async fn deploy_includes_upstreams_and_leaves_readers_behind() {
        let (pipeline, handles) = fitted().await;
        let subgraph = pipeline
            .deploy_component(&[&handles.data_transform_0, &handles.learner_0])
            .unwrap();

        // Named order first, then the auto-included intersection.
        assert_eq!(
            subgraph.component_names(),
            vec!["data_transform_0", "learner_0", "intersection_0"]
        );
        // The reader's downstream port is the single entry.
        assert_eq!(
            subgraph.entry_ports(),
            &[PortRef::new("data_transform_0", "data")]
        );
        // Fitted artifacts rode along.
        assert!(subgraph.model("learner_0").is_some());
        assert!(subgraph.model("data_transform_0").is_some());
        assert!(subgraph.model("intersection_0").is_none());
    }

    #[tokio::test]
    async fn foreign_handle_is_rejected() {
        let (pipeline, _) = fitted().await;
        let foreign = ComponentHandle::new(
            "other".to_string(),
            crate::component::ComponentKind::Reader,
        );
        let err = pipeline.deploy_component(&[&foreign]).unwrap_err();
        assert!(matches!(err, DeployError::UnknownComponent { component } if component == "other"));
    }

    /// Records run modes per component; scoring must never see `Fit` for a
    /// deployed learner.
    struct ModeRecorder {
        seen: Mutex<Vec<(String, RunMode, bool)>>,
        inner: LocalRunner,
    }

    #[async_trait]
    impl ComponentRunner for ModeRecorder {
        async fn run_task(&self, spec: TaskSpec) -> Result<TaskOutput, RunnerError> {
            self.seen
                .lock()
                .unwrap()
                .push((spec.component.clone(), spec.mode, spec.model.is_some()));
            self.inner.run_task(spec).await
        }
    }

    #[tokio::test]
    async fn predict_scores_with_frozen_artifacts() {
        let (pipeline, handles) = fitted().await;
        let subgraph = pipeline
            .deploy_component(&[&handles.data_transform_0, &handles.learner_0])
            .unwrap();

        let mut predict_pipeline = Pipeline::new();
        let reader_1 = predict_pipeline
            .add_component(
                reader("reader_1")
                    .with_role_param(
                        Role::Guest,
                        "table",
                        json!({"name": "score_guest", "namespace": "experiment"}),
                    )
                    .unwrap()
                    .with_role_param(
                        Role::Host,
                        "table",
                        json!({"name": "score_host", "namespace": "experiment"}),
                    )
                    .unwrap(),
                Data::new(),
            )
            .unwrap();
        predict_pipeline
            .add_deployed(
                &subgraph,
                PredictInput::new().map(
                    subgraph.entry("data_transform_0", "data").unwrap(),
                    reader_1.output("data"),
                ),
            )
            .unwrap();

        let runner = ModeRecorder {
            seen: Mutex::new(Vec::new()),
            inner: LocalRunner::new(),
        };
        predict_pipeline
            .predict(&runner, Backend(0), WorkMode(0))
            .await
            .unwrap();

        let seen = runner.seen.lock().unwrap();
        // The training path never runs during predict.
        assert!(seen.iter().all(|(_, mode, _)| *mode == RunMode::Predict));
        // Deployed components carry their frozen model; the fresh reader
        // does not.
        assert!(seen
            .iter()
            .filter(|(c, ..)| c == "learner_0" || c == "data_transform_0")
            .all(|(_, _, has_model)| *has_model));
        assert!(seen
            .iter()
            .filter(|(c, ..)| c == "reader_1")
            .all(|(_, _, has_model)| !*has_model));

        // Inference results, not model parameters.
        let learner = predict_pipeline.get_component("learner_0").unwrap();
        assert!(learner.model_param().is_none());
        assert!(learner.output(PartyId(9999), "data").is_some());
    }

    #[tokio::test]
    async fn predict_requires_a_deployed_component() {
        let (mut pipeline, _) = fitted().await;
        let err = pipeline
            .predict(&LocalRunner::new(), Backend(0), WorkMode(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Execution(crate::ExecutionError::NothingDeployed)
        ));
    }

    #[tokio::test]
    async fn unmapped_entry_port_fails_compilation() {
        let (pipeline, handles) = fitted().await;
        let subgraph = pipeline
            .deploy_component(&[&handles.data_transform_0, &handles.learner_0])
            .unwrap();

        let mut predict_pipeline = Pipeline::new();
        predict_pipeline
            .add_component(reader("reader_1"), Data::new())
            .unwrap();
        predict_pipeline
            .add_deployed(&subgraph, PredictInput::new())
            .unwrap();

        let err = predict_pipeline.compile().unwrap_err();
        assert!(matches!(
            err,
            crate::GraphValidationError::PortCardinality { found: 0, .. }
        ));
    }

    #[tokio::test]
    async fn bogus_entry_port_is_rejected() {
        let (pipeline, handles) = fitted().await;
        let subgraph = pipeline.deploy_component(&[&handles.learner_0]).unwrap();

        let mut predict_pipeline = Pipeline::new();
        let reader_1 = predict_pipeline
            .add_component(reader("reader_1"), Data::new())
            .unwrap();
        let err = predict_pipeline
            .add_deployed(
                &subgraph,
                PredictInput::new().map(
                    PortRef::new("evaluation_0", "data"),
                    reader_1.output("data"),
                ),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GraphConstructionError::UnknownEntryPort { .. }
        ));
    }

    #[tokio::test]
    async fn conflicting_roles_are_rejected() {
        let (pipeline, handles) = fitted().await;
        let subgraph = pipeline.deploy_component(&[&handles.learner_0]).unwrap();

        let mut predict_pipeline = Pipeline::new();
        predict_pipeline
            .set_roles(RoleTable {
                guest: vec![PartyId(1)],
                host: vec![],
                arbiter: vec![],
            })
            .unwrap();
        let err = predict_pipeline
            .add_deployed(&subgraph, PredictInput::new())
            .unwrap_err();
        assert_eq!(
            err,
            GraphConstructionError::AlreadyInitialized { what: "role set" }
        );
    }
}
