//! Tool registry and execution
//!
//! A fixed set of callable capabilities with typed inputs and an
//! idempotency classification, dispatched by name on behalf of the model.

pub mod executor;
pub mod implementations;
pub mod registry;
pub mod types;

pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use types::ToolSchema;
