// Run pipeline: spawns each job step as a child process, in order, under
// one wall-clock deadline.

mod pipeline;
mod process;

pub use pipeline::PipelineRunner;
pub use process::{run_step, ResolvedStep};
