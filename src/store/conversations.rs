//! Conversation store
//!
//! Append-only message log per session, kept apart from the long-lived
//! owner profile. Reset clears the message list of one session and
//! nothing else: documents, categories, and profiles are out of reach by
//! construction.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::errors::{EngineError, Result};
use crate::types::{Message, OwnerProfile, Session};

/// Conversation store with optional JSON-file persistence
pub struct ConversationStore {
    sessions: RwLock<HashMap<String, Session>>,
    profiles: RwLock<HashMap<String, OwnerProfile>>,
    storage_dir: Option<PathBuf>,
}

impl ConversationStore {
    /// In-memory store (tests, embedded use)
    pub fn in_memory() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            storage_dir: None,
        }
    }

    /// Store backed by a directory of JSON session files
    pub fn with_storage(storage_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&storage_dir)?;

        let mut sessions = HashMap::new();
        for entry in fs::read_dir(&storage_dir)? {
            let path = entry?.path();
            let is_session = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("session_") && n.ends_with(".json"))
                .unwrap_or(false);
            if !is_session {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(EngineError::from)
                .and_then(|json| serde_json::from_str::<Session>(&json).map_err(EngineError::from))
            {
                Ok(session) => {
                    sessions.insert(session.id.clone(), session);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session file");
                }
            }
        }

        Ok(Self {
            sessions: RwLock::new(sessions),
            profiles: RwLock::new(HashMap::new()),
            storage_dir: Some(storage_dir),
        })
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        if let Some(dir) = &self.storage_dir {
            let path = dir.join(format!("session_{}.json", session.id));
            let json = serde_json::to_string_pretty(session)?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    /// Fetch a session, creating it (and the owner profile) on first use
    pub async fn get_or_create_session(&self, session_id: &str, owner_id: &str) -> Session {
        self.ensure_profile(owner_id).await;

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id, owner_id))
            .clone()
    }

    /// Append one message to a session's log
    pub async fn append(&self, session_id: &str, message: Message) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| EngineError::NotFound(format!("session {}", session_id)))?;

        session.messages.push(message);
        session.updated_at = chrono::Utc::now();
        self.save_session(session)
    }

    /// All messages of a session, in append order
    pub async fn messages(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Clear a session's message list. Returns the number of messages
    /// removed. Touches nothing but the one session's messages.
    pub async fn reset(&self, session_id: &str) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| EngineError::NotFound(format!("session {}", session_id)))?;

        let removed = session.messages.len();
        session.messages.clear();
        session.updated_at = chrono::Utc::now();
        self.save_session(session)?;

        tracing::info!(session = session_id, removed, "session reset");
        Ok(removed)
    }

    /// Fetch an owner profile, creating it on first use
    pub async fn ensure_profile(&self, owner_id: &str) -> OwnerProfile {
        let mut profiles = self.profiles.write().await;
        profiles
            .entry(owner_id.to_string())
            .or_insert_with(|| OwnerProfile::new(owner_id))
            .clone()
    }

    pub async fn profile(&self, owner_id: &str) -> Option<OwnerProfile> {
        self.profiles.read().await.get(owner_id).cloned()
    }

    /// Set a profile display name (profile data survives session resets)
    pub async fn set_display_name(&self, owner_id: &str, name: impl Into<String>) {
        let mut profiles = self.profiles.write().await;
        profiles
            .entry(owner_id.to_string())
            .or_insert_with(|| OwnerProfile::new(owner_id))
            .display_name = Some(name.into());
    }
}
