pub mod orchestrator;
pub mod registry;
