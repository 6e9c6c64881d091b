//! Write-through session store.
//!
//! Each session persists as `<session_id>.json` under the configured
//! directory: a top-level array of `{role, content, tool_call_id?,
//! tool_calls?}` records — the serde form of `Vec<Message>`.

use std::path::{Path, PathBuf};

use cq_domain::error::{Error, Result};
use cq_domain::message::Message;

pub struct SessionStore {
    base_dir: PathBuf,
}

impl SessionStore {
    /// Open (and create if needed) the session directory.
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{session_id}.json"))
    }

    /// Load the most recent `max` messages for a session.
    ///
    /// A missing file is an empty history.  A malformed file is logged
    /// and treated as empty rather than failing agent construction.
    pub fn load(&self, session_id: &str, max: usize) -> Result<Vec<Message>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut messages: Vec<Message> = match serde_json::from_str(&raw) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(
                    session_id,
                    error = %e,
                    "malformed session file, starting with empty history"
                );
                return Ok(Vec::new());
            }
        };

        if messages.len() > max {
            messages.drain(..messages.len() - max);
        }
        Ok(messages)
    }

    /// Persist the full message sequence for a session.
    pub fn save(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        let path = self.path_for(session_id);
        let json = serde_json::to_string_pretty(messages)
            .map_err(|e| Error::Other(format!("serializing session: {e}")))?;
        std::fs::write(&path, json).map_err(Error::Io)?;

        tracing::debug!(session_id, messages = messages.len(), "session written");
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use cq_domain::message::ToolCall;

    fn sample() -> Vec<Message> {
        vec![
            Message::user("2+3?"),
            Message::assistant_with_tools(
                None,
                vec![ToolCall {
                    id: "t1".into(),
                    name: "add".into(),
                    arguments: r#"{"a":2,"b":3}"#.into(),
                }],
            ),
            Message::tool_result("t1", "5"),
            Message::assistant("result 5"),
        ]
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        store.save("s1", &sample()).unwrap();
        let loaded = store.load("s1", 100).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn load_missing_session_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(store.load("ghost", 10).unwrap().is_empty());
    }

    #[test]
    fn load_caps_to_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let messages: Vec<Message> =
            (0..6).map(|i| Message::user(format!("msg {i}"))).collect();
        store.save("s1", &messages).unwrap();

        let loaded = store.load("s1", 2).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content.as_deref(), Some("msg 4"));
        assert_eq!(loaded[1].content.as_deref(), Some("msg 5"));
    }

    #[test]
    fn malformed_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        assert!(store.load("bad", 10).unwrap().is_empty());
    }

    #[test]
    fn save_overwrites_prior_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        store.save("s1", &[Message::user("old")]).unwrap();
        store.save("s1", &sample()).unwrap();
        assert_eq!(store.load("s1", 100).unwrap(), sample());
    }
}
