//! Pipewright Runtime
//!
//! This crate executes validated pipelines. It owns the pieces that make a
//! run correct under concurrency:
//!
//! - [`resolve_inputs`] renders `{{ memory.key }}` and `{{ node.key }}`
//!   templates against the run's memory and the [`OutputTable`].
//! - [`Node`] is the uniform contract every step kind implements. Built-in
//!   kinds are selected by [`pipewright_config::NodeKind`] at a single
//!   dispatch point; callers can register their own implementations.
//! - [`Scheduler`] walks the graph, tracking each edge as pending, active,
//!   or skipped, and runs one task per ready node. The first failure cancels
//!   the run and every in-flight task is drained before it is reported.

mod config;
mod error;
mod node;
mod nodes;
mod outputs;
mod readiness;
mod scheduler;
mod template;

pub use config::RuntimeConfig;
pub use error::{NodeError, RuntimeError};
pub use node::{BRANCH_KEY, EngineHandle, Node, NodeContext, Outputs};
pub use nodes::build_node;
pub use outputs::OutputTable;
pub use readiness::NodeState;
pub use scheduler::{RunResult, Scheduler, SchedulerBuilder};
pub use template::{TemplateError, resolve_inputs, resolve_value};
