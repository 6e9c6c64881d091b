use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session persistence configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory holding one `<session_id>.json` document per session.
    #[serde(default = "d_dir")]
    pub dir: PathBuf,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { dir: d_dir() }
    }
}

fn d_dir() -> PathBuf {
    PathBuf::from("sessions")
}
