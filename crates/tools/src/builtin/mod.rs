//! Builtin tools registered by the agent at construction.

mod read_file;
mod vector;

pub use read_file::ReadFileTool;
pub use vector::{VectorSearchTool, VectorUpsertTool};
