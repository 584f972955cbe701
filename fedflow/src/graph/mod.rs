// Graph module
// Builder, typed links and the compiler that turns an accumulated graph
// into an executable plan.

pub mod builder;
pub mod compile;
pub mod link;

pub use builder::{ComponentHandle, GraphConstructionError, Pipeline};
pub use compile::{CompiledPlan, GraphValidationError, PlanStage, StageInput};
pub use link::{Data, Link, PortRef};
