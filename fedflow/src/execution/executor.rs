// Plan executor
// Drives a compiled plan stage by stage in topological order. Each stage is
// invoked once per participating party and acts as a barrier: no stage
// starts before every upstream stage has completed on every party. A single
// failed party share aborts the whole run.

use std::time::Instant;
use thiserror::Error;

use crate::config::{Backend, WorkMode};
use crate::execution::context::{ComponentRecord, RunContext};
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::runner::{ComponentRunner, RunMode, RunnerError, TaskSpec};
use crate::graph::builder::Pipeline;
use crate::graph::compile::CompiledPlan;
use crate::party::{PartyId, Role, RoleTable};

/// Errors raised while executing a plan.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("pipeline must be compiled before it can run")]
    NotCompiled,

    #[error("a graph containing deployed components must be run with predict")]
    RequiresPredict,

    #[error("predict requires at least one deployed component")]
    NothingDeployed,

    #[error("component '{component}' failed on {role} party {party}: {source}")]
    Stage {
        component: String,
        role: Role,
        party: PartyId,
        #[source]
        source: RunnerError,
    },
}

/// Executes one compiled plan against a runner.
pub(crate) struct PlanExecutor<'a> {
    pub plan: &'a CompiledPlan,
    pub roles: &'a RoleTable,
    pub initiator: (Role, PartyId),
    pub frozen: &'a std::collections::BTreeMap<String, serde_json::Value>,
    pub progress: Option<ProgressSender>,
}

impl<'a> PlanExecutor<'a> {
    pub async fn run(
        self,
        runner: &dyn ComponentRunner,
        backend: Backend,
        work_mode: WorkMode,
        mode: RunMode,
    ) -> Result<RunContext, ExecutionError> {
        let run_start = Instant::now();
        let mut ctx = RunContext::new(mode);

        self.progress
            .send_event(ExecutionEvent::pipeline_started(mode, self.plan.stages.len()));

        for (index, stage) in self.plan.stages.iter().enumerate() {
            let stage_start = Instant::now();
            let parties = self.participants(stage.kind);

            self.progress.send_event(ExecutionEvent::stage_started(
                &stage.component,
                stage.kind,
                index,
                parties.len(),
            ));

            let mut record = ComponentRecord::new(stage.component.clone(), stage.kind);

            // Every party share completes before the stage is considered
            // done; downstream stages only ever observe finished stages.
            for (role, party) in parties {
                let task_start = Instant::now();
                self.progress.send_event(ExecutionEvent::TaskStarted {
                    component: stage.component.clone(),
                    role,
                    party,
                });

                let mut inputs = std::collections::BTreeMap::new();
                for input in &stage.inputs {
                    if let Some(value) =
                        ctx.party_output(&input.source.component, party, &input.source.port)
                    {
                        inputs.insert(input.port.clone(), value.clone());
                    }
                }

                let spec = TaskSpec {
                    component: stage.component.clone(),
                    kind: stage.kind,
                    role,
                    party,
                    params: stage.params.get(&role).cloned().unwrap_or_default(),
                    inputs,
                    mode,
                    model: self.frozen.get(&stage.component).cloned(),
                    backend,
                    work_mode,
                };

                match runner.run_task(spec).await {
                    Ok(output) => {
                        record.outputs.insert(party, output.ports);
                        if record.model_param.is_none() {
                            record.model_param = output.model_param;
                        }
                        if record.summary.is_null() && !output.summary.is_null() {
                            record.summary = output.summary;
                        }
                        self.progress.send_event(ExecutionEvent::TaskCompleted {
                            component: stage.component.clone(),
                            role,
                            party,
                            duration: task_start.elapsed(),
                        });
                    }
                    Err(source) => {
                        self.progress.send_event(ExecutionEvent::StageFailed {
                            component: stage.component.clone(),
                            role,
                            party,
                            message: source.to_string(),
                        });
                        self.progress.send_event(ExecutionEvent::pipeline_completed(
                            mode,
                            false,
                            run_start.elapsed(),
                        ));
                        return Err(ExecutionError::Stage {
                            component: stage.component.clone(),
                            role,
                            party,
                            source,
                        });
                    }
                }
            }

            record.duration = stage_start.elapsed();
            ctx.insert(record);

            self.progress.send_event(ExecutionEvent::stage_completed(
                &stage.component,
                index,
                stage_start.elapsed(),
            ));
        }

        self.progress.send_event(ExecutionEvent::pipeline_completed(
            mode,
            true,
            run_start.elapsed(),
        ));
        Ok(ctx)
    }

    /// (role, party) pairs taking part in a stage of the given kind, in
    /// canonical role order.
    fn participants(&self, kind: crate::component::ComponentKind) -> Vec<(Role, PartyId)> {
        if kind.is_initiator_only() {
            return vec![self.initiator];
        }
        self.roles
            .members()
            .into_iter()
            .filter(|(role, _)| kind.participating_roles().contains(role))
            .collect()
    }
}

impl Pipeline {
    /// Run every stage in train mode, retaining artifacts, summaries and
    /// model-parameter reports.
    ///
    /// Requires a prior successful [`Pipeline::compile`]. On failure no
    /// partial run state is kept; a retry re-executes from scratch.
    pub async fn fit(
        &mut self,
        runner: &dyn ComponentRunner,
        backend: Backend,
        work_mode: WorkMode,
    ) -> Result<(), ExecutionError> {
        if !self.frozen.is_empty() {
            return Err(ExecutionError::RequiresPredict);
        }
        self.run = None;
        let ctx = self.execute(runner, backend, work_mode, RunMode::Fit).await?;
        self.run = Some(ctx);
        Ok(())
    }

    /// Compile and run this graph in predict mode: deployed components
    /// score with their frozen artifacts instead of retraining.
    pub async fn predict(
        &mut self,
        runner: &dyn ComponentRunner,
        backend: Backend,
        work_mode: WorkMode,
    ) -> Result<(), crate::Error> {
        if self.frozen.is_empty() {
            return Err(ExecutionError::NothingDeployed.into());
        }
        self.compile()?;
        self.run = None;
        let ctx = self
            .execute(runner, backend, work_mode, RunMode::Predict)
            .await?;
        self.run = Some(ctx);
        Ok(())
    }

    async fn execute(
        &self,
        runner: &dyn ComponentRunner,
        backend: Backend,
        work_mode: WorkMode,
        mode: RunMode,
    ) -> Result<RunContext, ExecutionError> {
        let plan = self.plan.as_ref().ok_or(ExecutionError::NotCompiled)?;
        let roles = self.roles.as_ref().ok_or(ExecutionError::NotCompiled)?;
        let initiator = self.initiator.ok_or(ExecutionError::NotCompiled)?;
        let executor = PlanExecutor {
            plan,
            roles,
            initiator,
            frozen: &self.frozen,
            progress: self.progress.clone(),
        };
        executor.run(runner, backend, work_mode, mode).await
    }

    /// Run record of a component from the most recent fit/predict.
    pub fn get_component(&self, name: &str) -> Option<&ComponentRecord> {
        self.run.as_ref().and_then(|run| run.record(name))
    }

    /// Whether a fit run completed successfully on this pipeline.
    pub fn is_fitted(&self) -> bool {
        self.run
            .as_ref()
            .map(|run| run.mode() == RunMode::Fit)
            .unwrap_or(false)
    }
}
