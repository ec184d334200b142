//! Turn state machine
//!
//! Explicit finite-state machine for one user turn. Each state is a
//! tagged union carrying its own payload; the engine consumes a state and
//! produces the next one, so there is no hidden mutable context between
//! steps. Edges:
//!
//! ```text
//! Route → Retrieve | Done | Aborted
//! Retrieve → Generate | Done | Aborted
//! Generate → Done | ToolExecute | Aborted
//! ToolExecute → Generate | Aborted
//! ```
//!
//! `Done` and `Aborted` are terminal.

use crate::errors::{EngineError, Result};
use crate::retrieval::RetrievedChunk;
use crate::types::{CategorySlug, ToolOutcome, ToolRequest};

/// One state of a turn, with the payload produced by the previous step
#[derive(Debug, Clone)]
pub enum TurnState {
    /// Classify the query into a category
    Route,

    /// Fetch context for the routed category
    Retrieve { category: CategorySlug },

    /// Ask the model for an answer or tool requests
    Generate {
        category: Option<CategorySlug>,
        chunks: Vec<RetrievedChunk>,
        /// Completed tool exchanges from earlier iterations of this turn
        exchanges: Vec<(ToolRequest, ToolOutcome)>,
    },

    /// Run the requested tools, then generate again
    ToolExecute {
        category: Option<CategorySlug>,
        chunks: Vec<RetrievedChunk>,
        exchanges: Vec<(ToolRequest, ToolOutcome)>,
        requests: Vec<ToolRequest>,
    },

    /// Final answer produced (terminal)
    Done {
        answer: String,
        cited_chunk_ids: Vec<String>,
        category: Option<CategorySlug>,
        tools_invoked: Vec<String>,
    },

    /// Budget or timeout tripped (terminal)
    Aborted { reason: String },
}

impl TurnState {
    /// State name for logs and transition errors
    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Route => "ROUTE",
            TurnState::Retrieve { .. } => "RETRIEVE",
            TurnState::Generate { .. } => "GENERATE",
            TurnState::ToolExecute { .. } => "TOOL_EXECUTE",
            TurnState::Done { .. } => "DONE",
            TurnState::Aborted { .. } => "ABORTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done { .. } | TurnState::Aborted { .. })
    }

    /// Validate an edge of the machine.
    ///
    /// The engine calls this before adopting a successor state, making an
    /// illegal hand-off a typed error instead of silent drift.
    pub fn check_transition(&self, next: &TurnState) -> Result<()> {
        use TurnState::*;

        let ok = matches!(
            (self, next),
            (Route, Retrieve { .. })
                | (Route, Done { .. })
                | (Route, Aborted { .. })
                | (Retrieve { .. }, Generate { .. })
                | (Retrieve { .. }, Done { .. })
                | (Retrieve { .. }, Aborted { .. })
                | (Generate { .. }, Done { .. })
                | (Generate { .. }, ToolExecute { .. })
                | (Generate { .. }, Aborted { .. })
                | (ToolExecute { .. }, Generate { .. })
                | (ToolExecute { .. }, Aborted { .. })
        );

        if ok {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: self.name().to_string(),
                to: next.name().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate() -> TurnState {
        TurnState::Generate {
            category: None,
            chunks: Vec::new(),
            exchanges: Vec::new(),
        }
    }

    fn done() -> TurnState {
        TurnState::Done {
            answer: "ok".to_string(),
            cited_chunk_ids: Vec::new(),
            category: None,
            tools_invoked: Vec::new(),
        }
    }

    fn tool_execute() -> TurnState {
        TurnState::ToolExecute {
            category: None,
            chunks: Vec::new(),
            exchanges: Vec::new(),
            requests: Vec::new(),
        }
    }

    #[test]
    fn test_happy_path_edges() {
        let retrieve = TurnState::Retrieve {
            category: CategorySlug::parse("hr").unwrap(),
        };

        assert!(TurnState::Route.check_transition(&retrieve).is_ok());
        assert!(retrieve.check_transition(&generate()).is_ok());
        assert!(generate().check_transition(&done()).is_ok());
        assert!(generate().check_transition(&tool_execute()).is_ok());
        assert!(tool_execute().check_transition(&generate()).is_ok());
    }

    #[test]
    fn test_route_short_circuits_to_done() {
        assert!(TurnState::Route.check_transition(&done()).is_ok());
    }

    #[test]
    fn test_invalid_edges_rejected() {
        assert!(TurnState::Route.check_transition(&generate()).is_err());
        assert!(done().check_transition(&generate()).is_err());
        assert!(tool_execute().check_transition(&done()).is_err());
        assert!(TurnState::Aborted {
            reason: "t".to_string()
        }
        .check_transition(&TurnState::Route)
        .is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(done().is_terminal());
        assert!(TurnState::Aborted {
            reason: "timeout".to_string()
        }
        .is_terminal());
        assert!(!TurnState::Route.is_terminal());
        assert!(!generate().is_terminal());
    }
}
