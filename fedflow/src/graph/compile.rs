// Compiler
// Validates the accumulated graph and produces an executable plan: a
// deterministic, topologically ordered stage list annotated with per-role
// parameter bundles. Compilation is synchronous and purely local; it is
// rebuilt from scratch after any graph mutation.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::component::{ComponentKind, ParamMap};
use crate::graph::builder::Pipeline;
use crate::graph::link::PortRef;
use crate::party::Role;

/// Errors detected while validating a whole graph. Never silently
/// repaired; the first violation found is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphValidationError {
    #[error("pipeline has no role set")]
    MissingRoles,

    #[error("pipeline has no initiator")]
    MissingInitiator,

    #[error("initiator role '{role}' is not part of the pipeline's role set")]
    InitiatorOutsideRoles { role: Role },

    #[error("circular dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("input port '{port}' of component '{component}' expects {expected} link(s), found {found}")]
    PortCardinality {
        component: String,
        port: String,
        expected: &'static str,
        found: usize,
    },

    #[error("link {from} -> {to} connects ports of different types")]
    PortTypeMismatch { from: PortRef, to: PortRef },

    #[error("link targets unknown port '{port}' of component '{component}'")]
    UnknownPort { component: String, port: String },

    #[error("component '{component}' carries parameters for role '{role}' outside the pipeline's role set")]
    RoleIncomplete { component: String, role: Role },
}

/// One stage of a compiled plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStage {
    pub component: String,
    pub kind: ComponentKind,
    /// Resolved parameter bundle per participating role.
    pub params: BTreeMap<Role, ParamMap>,
    /// Upstream links feeding this stage, in declaration order.
    pub inputs: Vec<StageInput>,
}

/// A resolved incoming edge of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageInput {
    pub port: String,
    pub source: PortRef,
}

/// Topologically ordered execution plan. Compiling the same unmodified
/// graph twice yields an equal plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPlan {
    pub stages: Vec<PlanStage>,
}

impl CompiledPlan {
    pub fn stage(&self, component: &str) -> Option<&PlanStage> {
        self.stages.iter().find(|s| s.component == component)
    }

    pub fn order(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.component.as_str()).collect()
    }
}

impl Pipeline {
    /// Validate the graph and produce the execution plan.
    ///
    /// Checks run in a fixed order: cycle detection, port cardinality and
    /// type agreement, role completeness. The resulting stage order is
    /// computed with a stable Kahn's algorithm breaking ties by insertion
    /// order, so repeated compiles of an unchanged graph are identical.
    pub fn compile(&mut self) -> Result<&CompiledPlan, GraphValidationError> {
        let roles = self.roles.clone().ok_or(GraphValidationError::MissingRoles)?;
        let (init_role, _) = self.initiator.ok_or(GraphValidationError::MissingInitiator)?;
        if !roles.contains(init_role) {
            return Err(GraphValidationError::InitiatorOutsideRoles { role: init_role });
        }

        let adjacency = self.adjacency();
        self.detect_cycles(&adjacency)?;
        self.check_ports()?;
        self.check_role_completeness(&roles)?;

        let order = self.topological_order(&adjacency);
        let mut stages = Vec::with_capacity(order.len());
        for idx in order {
            let descriptor = &self.components[idx];
            let mut params = BTreeMap::new();
            for role in descriptor.kind.participating_roles() {
                if roles.contains(*role) {
                    params.insert(*role, descriptor.params_for(*role));
                }
            }
            let inputs = self
                .links
                .iter()
                .filter(|l| l.to.component == descriptor.name)
                .map(|l| StageInput {
                    port: l.to.port.clone(),
                    source: l.from.clone(),
                })
                .collect();
            stages.push(PlanStage {
                component: descriptor.name.clone(),
                kind: descriptor.kind,
                params,
                inputs,
            });
        }

        Ok(self.plan.insert(CompiledPlan { stages }))
    }

    /// Last compiled plan, if the graph has not been mutated since.
    pub fn plan(&self) -> Option<&CompiledPlan> {
        self.plan.as_ref()
    }

    /// Outgoing edges per component index, in link insertion order.
    fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.components.len()];
        for link in &self.links {
            if let (Some(&from), Some(&to)) = (
                self.index.get(&link.from.component),
                self.index.get(&link.to.component),
            ) {
                adjacency[from].push(to);
            }
        }
        adjacency
    }

    /// DFS cycle detection with path reporting. The builder rejects forward
    /// references, so cycles cannot normally be constructed; this guards
    /// graphs assembled through other paths.
    fn detect_cycles(&self, adjacency: &[Vec<usize>]) -> Result<(), GraphValidationError> {
        let n = self.components.len();
        let mut visited = vec![false; n];
        let mut on_stack = vec![false; n];

        for start in 0..n {
            if !visited[start] {
                if let Some(cycle) = self.dfs_cycle(start, adjacency, &mut visited, &mut on_stack) {
                    return Err(GraphValidationError::CyclicDependency {
                        path: cycle
                            .into_iter()
                            .map(|i| self.components[i].name.clone())
                            .collect(),
                    });
                }
            }
        }
        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: usize,
        adjacency: &[Vec<usize>],
        visited: &mut [bool],
        on_stack: &mut [bool],
    ) -> Option<Vec<usize>> {
        visited[node] = true;
        on_stack[node] = true;

        for &next in &adjacency[node] {
            if !visited[next] {
                if let Some(mut cycle) = self.dfs_cycle(next, adjacency, visited, on_stack) {
                    cycle.insert(0, node);
                    return Some(cycle);
                }
            } else if on_stack[next] {
                return Some(vec![node, next]);
            }
        }

        on_stack[node] = false;
        None
    }

    /// Every input port must be fed by exactly the cardinality its slot
    /// declares, and linked ports must agree on their payload type.
    fn check_ports(&self) -> Result<(), GraphValidationError> {
        for link in &self.links {
            let from_slot = self
                .component(&link.from.component)
                .and_then(|c| c.kind.output_slot(&link.from.port))
                .ok_or_else(|| GraphValidationError::UnknownPort {
                    component: link.from.component.clone(),
                    port: link.from.port.clone(),
                })?;
            let to_slot = self
                .component(&link.to.component)
                .and_then(|c| c.kind.input_slot(&link.to.port))
                .ok_or_else(|| GraphValidationError::UnknownPort {
                    component: link.to.component.clone(),
                    port: link.to.port.clone(),
                })?;
            if from_slot.ty != to_slot.ty {
                return Err(GraphValidationError::PortTypeMismatch {
                    from: link.from.clone(),
                    to: link.to.clone(),
                });
            }
        }

        for descriptor in &self.components {
            for slot in descriptor.kind.inputs() {
                let found = self
                    .links
                    .iter()
                    .filter(|l| l.to.component == descriptor.name && l.to.port == slot.name)
                    .count();
                let satisfied = if slot.required { found == 1 } else { found <= 1 };
                if !satisfied {
                    return Err(GraphValidationError::PortCardinality {
                        component: descriptor.name.clone(),
                        port: slot.name.to_string(),
                        expected: if slot.required { "exactly 1" } else { "at most 1" },
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_role_completeness(
        &self,
        roles: &crate::party::RoleTable,
    ) -> Result<(), GraphValidationError> {
        for descriptor in &self.components {
            for role in descriptor.role_params.keys() {
                if !roles.contains(*role) {
                    return Err(GraphValidationError::RoleIncomplete {
                        component: descriptor.name.clone(),
                        role: *role,
                    });
                }
            }
        }
        Ok(())
    }

    /// Stable Kahn's algorithm over insertion indices. Assumes the graph is
    /// acyclic (checked beforehand).
    fn topological_order(&self, adjacency: &[Vec<usize>]) -> Vec<usize> {
        let n = self.components.len();
        let mut in_degree = vec![0usize; n];
        for targets in adjacency {
            for &to in targets {
                in_degree[to] += 1;
            }
        }

        let mut queue: std::collections::VecDeque<usize> =
            (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &next in &adjacency[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        order
    }
}
