// Autonomous mode: leads → ranked queue → sequential batch run.

pub mod leads;
pub mod orchestrator;
pub mod progress;
pub mod queue;
pub mod signals;
