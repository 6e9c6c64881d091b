//! LLM provider adapters.
//!
//! Two wire families are supported — the OpenAI chat-completions
//! contract and the Anthropic messages contract — sharing one SSE line
//! reader.  Dispatch is by family, not per-model: any gateway speaking
//! a family's format reuses its adapter.

mod anthropic;
mod collect;
mod openai_compat;
mod registry;
mod sse;
mod traits;
mod util;

pub use anthropic::AnthropicProvider;
pub use collect::{collect_stream, ChatOutcome, ChunkSink};
pub use openai_compat::OpenAiCompatProvider;
pub use registry::ProviderRegistry;
pub use traits::{ChatRequest, LlmProvider};
