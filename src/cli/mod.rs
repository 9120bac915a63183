//! Command-line workflow layer between `main` and the library
pub mod orchestration;

pub use orchestration::{run_bump_workflow, BumpWorkflowArgs, Bumper, Stage, WorkflowResult};
