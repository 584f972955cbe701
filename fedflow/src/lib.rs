// fedflow
// Multi-party pipeline orchestration: declare components and typed links
// with a fluent builder, compile the graph into a deterministic stage plan,
// fit it across guest/host/arbiter parties, then deploy a trained subset
// and score fresh data with it.

pub mod component;
pub mod config;
pub mod deploy;
pub mod error;
pub mod execution;
pub mod graph;
pub mod party;

// Re-export commonly used types
pub use error::{Error, Result};

// Re-export party types
pub use party::{PartyId, Role, RoleTable};

// Re-export component types
pub use component::{
    data_transform, evaluation, hetero_learner, intersection, reader, ComponentDescriptor,
    ComponentKind, ParamMap, PortType,
};
pub use component::schema::{ParamError, ParamKind, ParamSpec};

// Re-export graph types
pub use graph::{
    ComponentHandle, CompiledPlan, Data, GraphConstructionError, GraphValidationError, Link,
    Pipeline, PlanStage, PortRef, StageInput,
};

// Re-export execution types
pub use execution::{
    progress_channel, progress_stream, ComponentRecord, ComponentRunner, EventSender,
    ExecutionError, ExecutionEvent, LocalRunner, ProgressReceiver, ProgressSender, RunContext,
    RunMode, RunnerError, TaskOutput, TaskSpec,
};

// Re-export deploy types
pub use deploy::{DeployError, DeployedSubgraph, PredictInput};

// Re-export configuration types
pub use config::{Backend, Config, ConfigError, WorkMode};
