//! Named, schema-described tools with uniform dispatch.
//!
//! Tools never raise: execution returns `Result<String, String>` and the
//! `Err` string is fed back to the model as tool-result error content.

mod guard;
mod registry;
mod vector;

pub mod builtin;

pub use guard::guard_path;
pub use registry::{Tool, ToolContext, ToolRegistry};
pub use vector::{EmbeddingService, InMemoryVectorStore, VectorHit, VectorStore};
