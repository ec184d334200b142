//! Core data model shared across the pipeline

pub mod document;
pub mod message;

pub use document::{CategorySlug, Chunk, Document, OwnerProfile};
pub use message::{Message, MessageMeta, Role, Session, ToolOutcome, ToolRequest};
