pub mod agent;
pub mod assembly;
pub mod dispatch;
pub mod history;
pub mod orchestrator;
pub mod stdio;
pub mod tooling;
