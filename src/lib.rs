//! Agent orchestration engine: a model/tool action loop per agent, concurrent
//! dispatch of independent actions, and write-behind conversation history.

mod application;
pub mod config;
mod domain;
mod infrastructure;

pub use application::{agent, assembly, dispatch, history, orchestrator, stdio, tooling};
pub use domain::types;
pub use infrastructure::model;
