use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events emitted by a session while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A reasoning/tool round finished.
    TurnEnd,
    /// A tool started executing.
    ToolCallStart {
        id: String,
        name: String,
        args: Value,
    },
    /// A tool finished.
    ToolCallEnd { id: String, is_error: bool },
}
