//! Turn orchestration
//!
//! The explicit state machine coordinating routing, retrieval, generation,
//! and tool execution for one user turn.

pub mod engine;
pub mod state;

pub use engine::{
    Orchestrator, OrchestratorConfig, TurnReport, ABORTED_MESSAGE, BEST_EFFORT_PREFIX,
    NO_KNOWLEDGE_MESSAGE,
};
pub use state::TurnState;
