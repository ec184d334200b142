//! Durable state: documents and conversations
//!
//! Two stores with deliberately separate lifecycles: the document store
//! holds uploaded knowledge (survives everything except explicit delete),
//! the conversation store holds per-session message logs (cleared by
//! reset) plus long-lived owner profiles (never cleared by reset).

pub mod conversations;
pub mod documents;

pub use conversations::ConversationStore;
pub use documents::DocumentStore;
