//! Interactive console channel.
//!
//! The console is a thin channel adapter over the execution core: each
//! line of input becomes a task on the event loop, a worker runs the
//! agent, and streamed chunks print to stdout as they arrive.

use std::io::Write;
use std::sync::Arc;

use rustyline::error::ReadlineError;
use tokio::sync::Notify;

use cq_domain::config::Config;
use cq_domain::error::{Error, Result};
use cq_domain::observe::{Direction, ObserverEvent, ObserverMetric};
use cq_domain::shutdown::ShutdownFlag;
use cq_observer::Observer;
use cq_providers::{ChunkSink, ProviderRegistry};
use cq_runtime::{Agent, AgentOptions, EventLoop, Task, TaskHandler};
use cq_sessions::SessionStore;

const CHANNEL: &str = "console";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Runs one agent turn per dequeued task.
struct ConsoleTaskHandler {
    config: Arc<Config>,
    providers: Arc<ProviderRegistry>,
    observer: Arc<dyn Observer>,
    store: Arc<SessionStore>,
    shutdown: ShutdownFlag,
    session_id: String,
    /// Signals the prompt loop that the turn finished.
    turn_done: Arc<Notify>,
}

#[async_trait::async_trait]
impl TaskHandler for ConsoleTaskHandler {
    async fn handle(&self, task: Task) -> Result<()> {
        // Whatever happens below, release the prompt.
        let _release = ReleaseOnDrop(&self.turn_done);

        let user_text = String::from_utf8_lossy(&task.payload).into_owned();
        self.observer.record_event(&ObserverEvent::ChannelMessage {
            channel: CHANNEL.into(),
            direction: Direction::Inbound,
        });
        // The console drives exactly one session at a time.
        self.observer
            .record_metric(ObserverMetric::ActiveSessions, 1.0);

        let (provider, model) = self
            .providers
            .for_model_spec(&self.config.agents.model)?;

        let sink: ChunkSink = Arc::new(|chunk: &str| {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        });

        let mut agent = Agent::new(
            self.config.clone(),
            self.session_id.clone(),
            provider,
            model,
            self.observer.clone(),
            AgentOptions {
                chunk_sink: Some(sink),
                shutdown: Some(self.shutdown.clone()),
                store: Some(self.store.clone()),
                embedder: None,
                vectors: None,
            },
        )?;

        match agent.run(&user_text).await {
            Ok(_answer) => {
                println!();
                agent.index_conversation().await;
                self.observer.record_event(&ObserverEvent::ChannelMessage {
                    channel: CHANNEL.into(),
                    direction: Direction::Outbound,
                });
            }
            Err(Error::Interrupted) => {
                println!("\n[cancelled]");
            }
            Err(e) => {
                println!("\n[error] something went wrong talking to the model");
                tracing::error!(error = %e, "agent run failed");
            }
        }
        Ok(())
    }
}

struct ReleaseOnDrop<'a>(&'a Notify);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry points
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn wire_runtime(
    config: Arc<Config>,
    observer: Arc<dyn Observer>,
    session_id: &str,
) -> anyhow::Result<(EventLoop, Arc<Notify>)> {
    let shutdown = ShutdownFlag::new();
    let event_loop = EventLoop::new(shutdown.clone());

    let providers = Arc::new(ProviderRegistry::from_config(&config)?);
    let store = Arc::new(SessionStore::new(&config.sessions.dir)?);
    let turn_done = Arc::new(Notify::new());

    let handler = Arc::new(ConsoleTaskHandler {
        config,
        providers,
        observer,
        store,
        shutdown,
        session_id: session_id.to_owned(),
        turn_done: turn_done.clone(),
    });
    event_loop.set_task_handler(handler)?;

    Ok((event_loop, turn_done))
}

/// One-shot: run a single turn through the core and exit.
pub async fn run_once(config: Arc<Config>, observer: Arc<dyn Observer>, text: &str) -> anyhow::Result<()> {
    let (event_loop, turn_done) = wire_runtime(config, observer.clone(), "oneshot")?;

    let runner = event_loop.clone();
    let loop_task = tokio::spawn(async move { runner.run().await });

    event_loop.submit_task("run-1", text.as_bytes(), CHANNEL);
    turn_done.notified().await;

    event_loop.request_shutdown();
    loop_task.await?;
    observer.flush();
    Ok(())
}

/// Interactive loop: read lines, submit tasks, stream replies.
pub async fn chat(config: Arc<Config>, observer: Arc<dyn Observer>) -> anyhow::Result<()> {
    let session_id = format!("console-{}", epoch_session_id());
    let (event_loop, turn_done) = wire_runtime(config, observer.clone(), &session_id)?;

    let runner = event_loop.clone();
    let loop_task = tokio::spawn(async move { runner.run().await });

    // Ctrl-C only sets the flag; teardown happens on the main path.
    let ctrlc_loop = event_loop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc_loop.request_shutdown();
        }
    });

    let mut editor = rustyline::DefaultEditor::new()?;
    let mut turn: u64 = 0;
    loop {
        if event_loop.shutdown_flag().is_triggered() {
            break;
        }

        // readline blocks; hand the editor to a blocking thread and
        // take it back with the result.
        let (returned, result) = tokio::task::spawn_blocking(move || {
            let mut editor = editor;
            let result = editor.readline("you> ");
            (editor, result)
        })
        .await?;
        editor = returned;

        match result {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if text == "/quit" || text == "/exit" {
                    break;
                }
                let _ = editor.add_history_entry(text);

                turn += 1;
                event_loop.submit_task(&format!("console-{turn}"), text.as_bytes(), CHANNEL);
                turn_done.notified().await;
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    event_loop.request_shutdown();
    loop_task.await?;
    observer.flush();
    println!("bye");
    Ok(())
}

/// Session ids only need uniqueness per console launch.
fn epoch_session_id() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
