//! Tool executor
//!
//! Validates inputs against the declared schema before dispatch, and
//! enforces the side-effect guard: within one orchestrator iteration a
//! side-effecting tool runs at most once — a repeated request (for example
//! after an LLM retry) is answered from the recorded outcome instead of
//! re-invoking the tool.

use std::collections::HashMap;
use std::time::Instant;

use crate::errors::{EngineError, Result};
use crate::tools::registry::ToolRegistry;
use crate::types::{ToolOutcome, ToolRequest};

/// Tool executor with per-iteration result memory
pub struct ToolExecutor {
    registry: ToolRegistry,

    /// Outcomes of side-effecting calls already run this iteration,
    /// keyed by (tool name, canonical args).
    executed: HashMap<(String, String), ToolOutcome>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            executed: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Forget recorded side-effecting outcomes. Called by the orchestrator
    /// when a new iteration begins.
    pub fn begin_iteration(&mut self) {
        self.executed.clear();
    }

    /// Execute one tool request.
    ///
    /// Unknown tool names and schema violations are surfaced as typed
    /// errors to the caller; they are programming/model errors, not tool
    /// failures, so no `ToolOutcome` is fabricated for them.
    pub async fn execute(&mut self, request: &ToolRequest) -> Result<ToolOutcome> {
        let tool = self
            .registry
            .get(&request.tool)
            .ok_or_else(|| EngineError::UnknownTool(request.tool.clone()))?;

        let schema = tool.schema();

        schema
            .validate(&request.args)
            .map_err(|reason| EngineError::ToolInput {
                tool: request.tool.clone(),
                reason,
            })?;

        let key = (request.tool.clone(), request.args.to_string());
        if schema.side_effecting {
            if let Some(previous) = self.executed.get(&key) {
                tracing::debug!(tool = %request.tool, "reusing recorded side-effecting outcome");
                return Ok(previous.clone());
            }
        }

        let started = Instant::now();
        let outcome = tool.invoke(&request.args).await;
        tracing::debug!(
            tool = %request.tool,
            ok = outcome.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "tool executed"
        );

        if schema.side_effecting {
            self.executed.insert(key, outcome.clone());
        }

        Ok(outcome)
    }
}
