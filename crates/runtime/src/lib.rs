//! The colloquy execution core: the event loop with its worker pool,
//! and the bounded reason-act agent loop.

mod agent;
mod event_loop;

pub use agent::{Agent, AgentOptions, MAX_ITERATIONS};
pub use event_loop::{
    Event, EventHandler, EventKind, EventLoop, Task, TaskHandler, WORKER_COUNT,
};
