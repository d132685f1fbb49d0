// Scheduler: computes due jobs and feeds a single run queue

mod engine;

pub use engine::{Dispatcher, Engine, EngineConfig, RunRequest, RunnerEngine};
