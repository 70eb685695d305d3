use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named shell command persisted across sessions.
///
/// `name` is the natural key (unique, case-sensitive); `id` is assigned by the
/// store on insert and never reused within a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCommand {
    pub id: i64,
    pub name: String,
    pub command_line: String,
    pub note: String,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

impl SavedCommand {
    /// Short human-readable age, e.g. "3d ago".
    pub fn age(&self, now: DateTime<Utc>) -> String {
        let secs = (now - self.created_at).num_seconds().max(0);
        match secs {
            0..60 => "just now".to_string(),
            60..3600 => format!("{}m ago", secs / 60),
            3600..86_400 => format!("{}h ago", secs / 3600),
            _ => format!("{}d ago", secs / 86_400),
        }
    }
}

/// Fields the user supplies when creating a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCommand {
    pub name: String,
    pub command_line: String,
    pub note: String,
}

impl NewCommand {
    pub fn new(name: &str, command_line: &str, note: &str) -> Self {
        NewCommand {
            name: name.to_string(),
            command_line: command_line.to_string(),
            note: note.to_string(),
        }
    }
}
