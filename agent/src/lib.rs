//! Agent Turn Engine crate: the core of a conversational agent (spec.md §1).
//!
//! Five collaborating components, each its own module:
//! [`selector`] (tool shortlisting), [`history`] (provider-turn preparation),
//! [`pipeline`] (tool execution), [`stream`] (LLM stream processing), and
//! [`engine`] (the turn state machine tying the rest together). [`session`],
//! [`types`], [`traits`], and [`events`] hold the shared data model and the
//! external-collaborator contracts those components operate on.

pub mod engine;
pub mod events;
pub mod history;
pub mod pipeline;
pub mod selector;
pub mod session;
pub mod stream;
pub mod traits;
pub mod types;

pub use engine::{run_turn, EngineDeps};
pub use events::{AgentEvent, EventSink, RecordingEventSink, ToolResultEvent};
pub use session::SessionState;
pub use traits::{LlmTransport, ToolExecutor, WorkflowHandler, WorkflowOutcome};
pub use types::{InteractionStatus, Message, ToolCallRequest, ToolDefinition, UserContext};
