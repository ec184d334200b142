//! Support ticket creation tool
//!
//! Side-effecting: every successful invocation registers a new ticket, so
//! the executor's per-iteration guard is what keeps an LLM retry from
//! double-filing.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::tools::registry::Tool;
use crate::tools::types::ToolSchema;
use crate::types::ToolOutcome;

/// Validated input record
#[derive(Debug, Deserialize)]
struct TicketArgs {
    summary: String,
    #[serde(default)]
    priority: Option<String>,
}

/// A filed ticket
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: String,
    pub number: u64,
    pub summary: String,
    pub priority: String,
}

/// Ticket creation tool (side-effecting)
#[derive(Debug, Default)]
pub struct CreateTicket {
    counter: AtomicU64,
    filed: Mutex<Vec<Ticket>>,
}

impl CreateTicket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets filed through this instance (audit/test access)
    pub fn filed(&self) -> Vec<Ticket> {
        self.filed
            .lock()
            .map(|filed| filed.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Tool for CreateTicket {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "create_ticket",
            "File a support ticket on behalf of the user",
            json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "One-line description of the issue"
                    },
                    "priority": {
                        "type": "string",
                        "description": "low, normal, or high",
                        "enum": ["low", "normal", "high"]
                    }
                },
                "required": ["summary"]
            }),
            true,
        )
    }

    async fn invoke(&self, args: &serde_json::Value) -> ToolOutcome {
        let parsed: TicketArgs = match serde_json::from_value(args.clone()) {
            Ok(parsed) => parsed,
            Err(e) => return ToolOutcome::err("create_ticket", e.to_string(), 0),
        };

        if parsed.summary.trim().is_empty() {
            return ToolOutcome::err("create_ticket", "summary must not be empty", 0);
        }

        let priority = parsed.priority.unwrap_or_else(|| "normal".to_string());
        if !matches!(priority.as_str(), "low" | "normal" | "high") {
            return ToolOutcome::err(
                "create_ticket",
                format!("invalid priority: {}", priority),
                0,
            );
        }

        let number = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let ticket = Ticket {
            id: Uuid::new_v4().to_string(),
            number,
            summary: parsed.summary.trim().to_string(),
            priority: priority.clone(),
        };

        match self.filed.lock() {
            Ok(mut filed) => filed.push(ticket.clone()),
            Err(e) => {
                tracing::error!(error = %e, "ticket log lock poisoned");
                return ToolOutcome::err("create_ticket", "ticket log unavailable", 0);
            }
        }

        tracing::info!(ticket = %ticket.id, number, "ticket filed");

        ToolOutcome::ok(
            "create_ticket",
            json!({
                "ticket_id": ticket.id,
                "number": number,
                "summary": ticket.summary,
                "priority": priority,
            }),
            0,
        )
    }
}
