//! Pipewright Config
//!
//! This crate contains the serializable pipeline definition types. These
//! types describe a pipeline before it is validated into a graph by
//! `pipewright-workflow` and executed by `pipewright-runtime`.
//!
//! Definitions can be loaded from:
//! - JSON files (`.json`)
//! - YAML files (any other extension)
//! - In-memory values, as used for iteration sub-pipelines

mod edge;
mod error;
mod kind;
mod node;
mod pipeline;

pub use edge::EdgeDef;
pub use error::ConfigError;
pub use kind::NodeKind;
pub use node::NodeDef;
pub use pipeline::{MemoryDef, PipelineDef, load_pipeline};
