//! The bounded reason-act agent loop.
//!
//! An agent owns its conversation context, tool registry, and provider
//! handle.  `run` alternates LLM calls and tool executions until the
//! model stops requesting tools or the iteration bound is reached.
//! Tool failures are captured into the conversation so the model can
//! recover; only transport errors and shutdown propagate out.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use cq_domain::config::Config;
use cq_domain::error::{Error, Result};
use cq_domain::message::{Context, Message};
use cq_domain::observe::{ObserverEvent, ObserverMetric};
use cq_domain::shutdown::ShutdownFlag;
use cq_observer::Observer;
use cq_providers::{collect_stream, ChatRequest, ChunkSink, LlmProvider};
use cq_sessions::SessionStore;
use cq_tools::builtin::{ReadFileTool, VectorSearchTool, VectorUpsertTool};
use cq_tools::{EmbeddingService, ToolContext, ToolRegistry, VectorStore};

/// Upper bound on reason-act iterations per run.
pub const MAX_ITERATIONS: usize = 8;

const SYSTEM_PROMPT: &str = "You are colloquy, a conversational assistant. \
    Answer directly and concisely. Use the available tools when a question \
    needs external data, then answer from their results.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Construction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Optional collaborators wired at construction.
#[derive(Default)]
pub struct AgentOptions {
    /// Receives every streamed text fragment on the worker running the
    /// agent.  Must be fast and must not take locks the task handler
    /// holds.
    pub chunk_sink: Option<ChunkSink>,
    /// Shared shutdown flag; checked at iteration boundaries.
    pub shutdown: Option<ShutdownFlag>,
    /// Session storage for history loading and write-through.
    pub store: Option<Arc<SessionStore>>,
    pub embedder: Option<Arc<dyn EmbeddingService>>,
    pub vectors: Option<Arc<dyn VectorStore>>,
}

/// The reason-act state machine plus its owned context and registry.
pub struct Agent {
    session_id: String,
    rag_enabled: bool,
    context: Context,
    tools: ToolRegistry,
    tool_ctx: ToolContext,
    observer: Arc<dyn Observer>,
    provider: Arc<dyn LlmProvider>,
    model: String,
    chunk_sink: Option<ChunkSink>,
    /// Last streamed fragment, for final-answer display in UIs that do
    /// not render the stream.
    last_chunk: Arc<Mutex<String>>,
    shutdown: Option<ShutdownFlag>,
    store: Option<Arc<SessionStore>>,
}

impl Agent {
    /// Build an agent: register tools, wire the tool context, and load
    /// prior session messages when configured to.
    pub fn new(
        config: Arc<Config>,
        session_id: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        observer: Arc<dyn Observer>,
        opts: AgentOptions,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let rag_enabled = !config.agents.disable_rag;

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(ReadFileTool));
        if rag_enabled {
            tools.register(Arc::new(VectorUpsertTool));
            tools.register(Arc::new(VectorSearchTool));
        }

        let mut tool_ctx = ToolContext::new(config.clone());
        if let (Some(embedder), Some(vectors)) = (opts.embedder, opts.vectors) {
            tool_ctx = tool_ctx.with_rag(embedder, vectors);
        }

        let mut context = Context::new();
        if config.agents.load_chat_history {
            if let Some(store) = &opts.store {
                let history = store.load(&session_id, config.agents.max_chat_history)?;
                context = Context::from(history);
            }
        }

        // Wrap the caller's sink so the agent remembers the last fragment.
        let last_chunk = Arc::new(Mutex::new(String::new()));
        let chunk_sink = opts.chunk_sink.map(|user_sink| {
            let last = last_chunk.clone();
            let sink: ChunkSink = Arc::new(move |chunk: &str| {
                *last.lock() = chunk.to_owned();
                user_sink(chunk);
            });
            sink
        });

        Ok(Self {
            session_id,
            rag_enabled,
            context,
            tools,
            tool_ctx,
            observer,
            provider,
            model: model.into(),
            chunk_sink,
            last_chunk,
            shutdown: opts.shutdown,
            store: opts.store,
        })
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Register an additional tool.  Re-registering a name replaces the
    /// prior entry.
    pub fn register_tool(&mut self, tool: Arc<dyn cq_tools::Tool>) {
        self.tools.register(tool);
    }

    /// Last streamed text fragment.
    pub fn last_chunk(&self) -> String {
        self.last_chunk.lock().clone()
    }

    /// Prepend the fixed system prompt unless one is already present.
    /// Idempotent.
    pub fn ensure_system_prompt(&mut self) {
        self.context.ensure_system_prompt(SYSTEM_PROMPT);
    }

    fn check_shutdown(&self) -> Result<()> {
        if self
            .shutdown
            .as_ref()
            .is_some_and(|flag| flag.is_triggered())
        {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // The reason-act loop
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run one user turn to completion.  Returns the final answer text
    /// (the last assistant message's content).
    pub async fn run(&mut self, user_text: &str) -> Result<String> {
        self.ensure_system_prompt();
        self.context.push(Message::user(user_text));

        let run_start = Instant::now();
        self.observer.record_event(&ObserverEvent::AgentStart {
            provider: self.provider.provider_id().to_owned(),
            model: self.model.clone(),
        });

        let mut total_tokens: u64 = 0;
        let mut saw_usage = false;

        let run_result = self.reason_act(&mut total_tokens, &mut saw_usage).await;

        self.observer.record_event(&ObserverEvent::AgentEnd {
            duration_ms: run_start.elapsed().as_millis() as u64,
            tokens_used: saw_usage.then_some(total_tokens),
        });
        if saw_usage {
            self.observer
                .record_metric(ObserverMetric::TokensUsed, total_tokens as f64);
        }

        run_result?;

        self.write_through();
        self.observer.record_event(&ObserverEvent::TurnComplete);

        Ok(self
            .context
            .last_assistant()
            .and_then(|m| m.content.clone())
            .unwrap_or_default())
    }

    async fn reason_act(&mut self, total_tokens: &mut u64, saw_usage: &mut bool) -> Result<()> {
        for _iteration in 0..MAX_ITERATIONS {
            self.check_shutdown()?;

            let request = ChatRequest {
                messages: self.context.messages().to_vec(),
                tools: self.tools.definitions(),
                model: Some(self.model.clone()),
                max_tokens: None,
            };

            self.observer.record_event(&ObserverEvent::LlmRequest {
                provider: self.provider.provider_id().to_owned(),
                model: self.model.clone(),
                message_count: request.messages.len(),
            });

            let llm_start = Instant::now();
            let outcome = match self.stream_chat(&request).await {
                Ok(outcome) => {
                    self.observer.record_event(&ObserverEvent::LlmResponse {
                        provider: self.provider.provider_id().to_owned(),
                        model: self.model.clone(),
                        duration_ms: llm_start.elapsed().as_millis() as u64,
                        success: true,
                        error: None,
                    });
                    self.observer.record_metric(
                        ObserverMetric::RequestLatencyMs,
                        llm_start.elapsed().as_millis() as f64,
                    );
                    outcome
                }
                Err(e) => {
                    self.observer.record_event(&ObserverEvent::LlmResponse {
                        provider: self.provider.provider_id().to_owned(),
                        model: self.model.clone(),
                        duration_ms: llm_start.elapsed().as_millis() as u64,
                        success: false,
                        error: Some(e.to_string()),
                    });
                    // A transport error is worth one line to the user;
                    // Interrupted is reported by the caller instead.
                    if e.is_transport() {
                        if let Some(sink) = &self.chunk_sink {
                            sink(&format!("[error] {e}"));
                        }
                    }
                    return Err(e);
                }
            };

            if let Some(usage) = &outcome.usage {
                *total_tokens += usage.total_tokens as u64;
                *saw_usage = true;
            }

            // Shutdown during the stream: drop the partial turn so no
            // assistant message from it reaches the context.
            self.check_shutdown()?;

            // Ownership of the aggregated text and tool calls moves
            // into the context here.
            let tool_calls = outcome.tool_calls;
            self.context
                .push(Message::assistant_with_tools(outcome.text, tool_calls.clone()));

            if tool_calls.is_empty() {
                return Ok(());
            }

            for call in &tool_calls {
                self.observer.record_event(&ObserverEvent::ToolCallStart {
                    tool: call.name.clone(),
                });

                let tool_start = Instant::now();
                let (content, success) = match self.tools.get(&call.name) {
                    None => (format!("Error: Tool {} not found", call.name), false),
                    Some(tool) => match tool.execute(&self.tool_ctx, &call.arguments).await {
                        Ok(output) => (output, true),
                        Err(error_text) => (error_text, false),
                    },
                };

                self.context.push(Message::tool_result(&call.id, content));
                self.observer.record_event(&ObserverEvent::ToolCall {
                    tool: call.name.clone(),
                    duration_ms: tool_start.elapsed().as_millis() as u64,
                    success,
                });
            }
        }

        // Bound reached: the last assistant content is the final answer.
        tracing::warn!(
            session_id = %self.session_id,
            max_iterations = MAX_ITERATIONS,
            "agent loop hit the iteration bound without converging"
        );
        Ok(())
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<cq_providers::ChatOutcome> {
        let stream = self.provider.chat_stream(request).await?;
        collect_stream(
            self.provider.provider_id(),
            stream,
            self.chunk_sink.as_ref(),
        )
        .await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Persistence and indexing
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn write_through(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.session_id, self.context.messages()) {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "session write-through failed"
                );
            }
        }
    }

    /// Index the latest user/assistant exchange into the vector store
    /// via the registry's upsert tool.  No-op when RAG is disabled or
    /// the conversation is too short; failures are logged, not raised.
    pub async fn index_conversation(&self) {
        if !self.rag_enabled || self.context.non_system_len() < 2 {
            return;
        }
        let (Some(user), Some(assistant)) =
            (self.context.last_user(), self.context.last_assistant())
        else {
            return;
        };

        let text = format!(
            "user: {}\nassistant: {}",
            user.content.as_deref().unwrap_or(""),
            assistant.content.as_deref().unwrap_or(""),
        );
        let arguments = serde_json::json!({
            "id": format!("{}-{}", self.session_id, self.context.len()),
            "text": text,
        })
        .to_string();

        let Some(upsert) = self.tools.get("vector_upsert") else {
            return;
        };
        if let Err(e) = upsert.execute(&self.tool_ctx, &arguments).await {
            tracing::warn!(session_id = %self.session_id, error = %e, "conversation indexing failed");
        }
    }
}
