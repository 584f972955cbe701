// Component runners
// The executor hands fully resolved task specifications to a runner; the
// runner is the opaque execution substrate. `LocalRunner` is an in-process
// implementation of the built-in catalog with deterministic synthetic
// outputs, used by tests and the CLI.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::component::{ComponentKind, ParamMap};
use crate::config::{Backend, WorkMode};
use crate::party::{PartyId, Role};

/// Whether a run trains components or scores with frozen artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Fit,
    Predict,
}

/// One party's share of one stage, fully resolved by the executor.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub component: String,
    pub kind: ComponentKind,
    pub role: Role,
    pub party: PartyId,
    /// Defaults merged with this role's overrides.
    pub params: ParamMap,
    /// Upstream values per input port for this party. A port may be absent
    /// when the upstream stage produced nothing for this party.
    pub inputs: BTreeMap<String, Value>,
    pub mode: RunMode,
    /// Frozen model artifact for deployed components in predict runs.
    pub model: Option<Value>,
    /// Opaque execution-target selectors, passed through unmodified.
    pub backend: Backend,
    pub work_mode: WorkMode,
}

impl TaskSpec {
    fn input(&self, port: &str) -> Result<&Value, RunnerError> {
        self.inputs.get(port).ok_or_else(|| RunnerError::MissingInput {
            port: port.to_string(),
        })
    }

    fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

/// What one party produced for one stage.
#[derive(Debug, Clone, Default)]
pub struct TaskOutput {
    /// Values per output port, consumed by downstream stages of this party.
    pub ports: BTreeMap<String, Value>,
    /// Model-parameter report, if this stage fits one.
    pub model_param: Option<Value>,
    /// Human-readable summary.
    pub summary: Value,
}

/// Errors surfaced by a runner. The core wraps them with stage context and
/// never retries.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("missing required input '{port}'")]
    MissingInput { port: String },

    #[error("missing required parameter '{name}'")]
    MissingParameter { name: String },

    #[error("no model artifact available for scoring")]
    MissingModel,

    #[error("task failed: {0}")]
    Failed(String),
}

/// Execution substrate for pipeline stages.
#[async_trait]
pub trait ComponentRunner: Send + Sync {
    async fn run_task(&self, spec: TaskSpec) -> Result<TaskOutput, RunnerError>;
}

/// In-process runner for the built-in catalog.
///
/// Outputs are synthetic but deterministic: the same spec always yields the
/// same value, which is what the compiler's reproducibility guarantees are
/// tested against.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ComponentRunner for LocalRunner {
    async fn run_task(&self, spec: TaskSpec) -> Result<TaskOutput, RunnerError> {
        match spec.kind {
            ComponentKind::Reader => run_reader(&spec),
            ComponentKind::DataTransform => run_data_transform(&spec),
            ComponentKind::Intersection => run_intersection(&spec),
            ComponentKind::HeteroLearner => run_hetero_learner(&spec),
            ComponentKind::Evaluation => run_evaluation(&spec),
        }
    }
}

/// Stable pseudo row count derived from a table name.
fn row_count(seed: &str) -> u64 {
    500 + seed.bytes().map(u64::from).sum::<u64>() % 500
}

fn rows_of(data: &Value) -> u64 {
    data.get("rows").and_then(Value::as_u64).unwrap_or(0)
}

fn run_reader(spec: &TaskSpec) -> Result<TaskOutput, RunnerError> {
    let table = spec
        .param("table")
        .cloned()
        .ok_or_else(|| RunnerError::MissingParameter {
            name: "table".to_string(),
        })?;
    let name = table
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let data = json!({
        "table": table,
        "party": spec.party.0,
        "rows": row_count(&name),
    });
    let mut ports = BTreeMap::new();
    ports.insert("data".to_string(), data);
    Ok(TaskOutput {
        ports,
        model_param: None,
        summary: json!({ "table_name": name }),
    })
}

fn run_data_transform(spec: &TaskSpec) -> Result<TaskOutput, RunnerError> {
    let input = spec.input("data")?.clone();
    let with_label = spec
        .param("with_label")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let model = match (spec.mode, &spec.model) {
        (RunMode::Predict, Some(frozen)) => frozen.clone(),
        _ => json!({
            "kind": "data_transform",
            "with_label": with_label,
            "output_format": spec.param("output_format").cloned().unwrap_or(json!("dense")),
        }),
    };

    let mut data = input;
    if let Some(map) = data.as_object_mut() {
        map.insert("transformed".to_string(), json!(true));
        map.insert("with_label".to_string(), json!(with_label));
    }

    let mut ports = BTreeMap::new();
    ports.insert("data".to_string(), data);
    ports.insert("model".to_string(), model.clone());
    Ok(TaskOutput {
        ports,
        model_param: (spec.mode == RunMode::Fit).then_some(model),
        summary: json!({ "with_label": with_label }),
    })
}

fn run_intersection(spec: &TaskSpec) -> Result<TaskOutput, RunnerError> {
    let input = spec.input("data")?.clone();
    let rows = rows_of(&input);
    let intersect_count = rows * 8 / 10;

    let mut data = input;
    if let Some(map) = data.as_object_mut() {
        map.insert("intersected".to_string(), json!(true));
        map.insert("rows".to_string(), json!(intersect_count));
    }

    let mut ports = BTreeMap::new();
    ports.insert("data".to_string(), data);
    Ok(TaskOutput {
        ports,
        model_param: None,
        summary: json!({
            "intersect_count": intersect_count,
            "intersect_rate": 0.8,
        }),
    })
}

fn run_hetero_learner(spec: &TaskSpec) -> Result<TaskOutput, RunnerError> {
    // The arbiter coordinates without holding data.
    if spec.role == Role::Arbiter {
        return Ok(TaskOutput {
            ports: BTreeMap::new(),
            model_param: None,
            summary: json!({ "role": "arbiter", "converged": true }),
        });
    }

    let input = spec.input("train_data")?.clone();
    let rows = rows_of(&input);
    let max_iter = spec.param("max_iter").and_then(Value::as_i64).unwrap_or(100);
    let learning_rate = spec
        .param("learning_rate")
        .and_then(Value::as_f64)
        .unwrap_or(0.15);

    let model = match spec.mode {
        RunMode::Fit => json!({
            "iters": max_iter,
            "is_converged": true,
            "learning_rate": learning_rate,
            "intercept": 0.13,
            "loss": 0.0521,
        }),
        RunMode::Predict => spec.model.clone().ok_or(RunnerError::MissingModel)?,
    };

    let scores = json!({
        "scored": true,
        "rows": rows,
        "party": spec.party.0,
        "model_iters": model.get("iters").cloned().unwrap_or(Value::Null),
    });

    let mut ports = BTreeMap::new();
    ports.insert("data".to_string(), scores);
    ports.insert("model".to_string(), model.clone());
    Ok(TaskOutput {
        ports,
        model_param: (spec.mode == RunMode::Fit).then_some(model),
        summary: json!({ "best_iteration": max_iter, "loss": 0.0521 }),
    })
}

fn run_evaluation(spec: &TaskSpec) -> Result<TaskOutput, RunnerError> {
    let input = spec.input("data")?;
    let eval_type = spec
        .param("eval_type")
        .and_then(Value::as_str)
        .unwrap_or("regression")
        .to_string();

    Ok(TaskOutput {
        ports: BTreeMap::new(),
        model_param: None,
        summary: json!({
            "eval_type": eval_type,
            "rows": rows_of(input),
            "metrics": { "rmse": 1.2714, "mae": 0.8133 },
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: ComponentKind, role: Role) -> TaskSpec {
        TaskSpec {
            component: format!("{kind}_0"),
            kind,
            role,
            party: PartyId(9999),
            params: ParamMap::new(),
            inputs: BTreeMap::new(),
            mode: RunMode::Fit,
            model: None,
            backend: Backend(0),
            work_mode: WorkMode(0),
        }
    }

    #[tokio::test]
    async fn reader_requires_a_table() {
        let err = LocalRunner::new()
            .run_task(spec(ComponentKind::Reader, Role::Guest))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::MissingParameter { name } if name == "table"));
    }

    #[tokio::test]
    async fn reader_output_is_deterministic() {
        let mut task = spec(ComponentKind::Reader, Role::Guest);
        task.params.insert(
            "table".to_string(),
            json!({"name": "train_guest", "namespace": "experiment"}),
        );

        let first = LocalRunner::new().run_task(task.clone()).await.unwrap();
        let second = LocalRunner::new().run_task(task).await.unwrap();
        assert_eq!(first.ports, second.ports);
        assert!(first.ports["data"].get("rows").unwrap().as_u64().unwrap() >= 500);
    }

    #[tokio::test]
    async fn learner_fits_and_scores() {
        let mut fit = spec(ComponentKind::HeteroLearner, Role::Guest);
        fit.params.insert("max_iter".to_string(), json!(20));
        fit.inputs
            .insert("train_data".to_string(), json!({"rows": 640}));

        let fitted = LocalRunner::new().run_task(fit.clone()).await.unwrap();
        let model = fitted.model_param.expect("fit must produce a model");
        assert_eq!(model.get("iters"), Some(&json!(20)));

        let mut predict = fit;
        predict.mode = RunMode::Predict;
        predict.model = Some(model);
        let scored = LocalRunner::new().run_task(predict).await.unwrap();
        assert!(scored.model_param.is_none());
        assert_eq!(scored.ports["data"].get("model_iters"), Some(&json!(20)));
    }

    #[tokio::test]
    async fn learner_scoring_without_model_fails() {
        let mut predict = spec(ComponentKind::HeteroLearner, Role::Guest);
        predict.mode = RunMode::Predict;
        predict
            .inputs
            .insert("train_data".to_string(), json!({"rows": 640}));

        let err = LocalRunner::new().run_task(predict).await.unwrap_err();
        assert!(matches!(err, RunnerError::MissingModel));
    }

    #[tokio::test]
    async fn arbiter_share_has_no_data() {
        let out = LocalRunner::new()
            .run_task(spec(ComponentKind::HeteroLearner, Role::Arbiter))
            .await
            .unwrap();
        assert!(out.ports.is_empty());
        assert_eq!(out.summary.get("role"), Some(&json!("arbiter")));
    }
}
