// Execution module
// Runner interface, run bookkeeping, progress events and the plan executor.

pub mod context;
pub mod events;
pub mod executor;
pub mod runner;

pub use context::{ComponentRecord, RunContext};
pub use events::{
    progress_channel, progress_stream, EventSender, ExecutionEvent, ProgressReceiver,
    ProgressSender,
};
pub use executor::ExecutionError;
pub use runner::{ComponentRunner, LocalRunner, RunMode, RunnerError, TaskOutput, TaskSpec};
