pub mod engine;
pub mod history;
pub mod loop_control;
pub mod prompt;
pub mod state;

pub use engine::{StepObserver, TaskLoop};
pub use state::{StepRecord, TaskResult, TaskState};
