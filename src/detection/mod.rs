pub mod guard;
pub mod merge;
pub mod multi_step;
pub mod orchestrator;
pub mod passes;
pub mod scheduler;
