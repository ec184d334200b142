//! Tool registry
//!
//! Statically typed handlers keyed by name. Dispatch stays dynamic (the
//! model picks tools by string name) while each handler body is ordinary
//! typed Rust behind the [`Tool`] trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::tools::implementations::{CreateTicket, CurrencyConverter, HolidayLookup};
use crate::tools::types::ToolSchema;
use crate::types::ToolOutcome;

/// A callable capability the model may invoke mid-generation
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declaration: name, description, input schema, idempotency class
    fn schema(&self) -> ToolSchema;

    /// Run the tool against already-validated arguments
    async fn invoke(&self, args: &serde_json::Value) -> ToolOutcome;
}

/// Registry of available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry with the built-in tool set
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(CurrencyConverter::new()));
        registry.register(Arc::new(HolidayLookup::new()));
        registry.register(Arc::new(CreateTicket::new()));
        registry
    }

    /// Register a tool under its declared name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All declarations, sorted by name for stable prompt rendering
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
