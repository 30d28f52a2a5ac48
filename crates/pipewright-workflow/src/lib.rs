//! Pipewright Workflow
//!
//! This crate turns a [`pipewright_config::PipelineDef`] into a validated
//! [`Pipeline`]: node ids are unique, every edge references a known node, and
//! the edge set is acyclic. The [`Graph`] it carries is the structure the
//! scheduler walks, with conditional handles kept on each edge.

mod error;
mod graph;
mod pipeline;

pub use error::GraphError;
pub use graph::{EdgeId, Graph, GraphEdge};
pub use pipeline::Pipeline;
