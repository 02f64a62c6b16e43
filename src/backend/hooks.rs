//! Interception points a session engine calls around tool execution.

use super::ContentBlock;

/// Verdict for a pending tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAdmission {
    Allow,
    /// The call must not run; `reason` is returned to the model instead.
    Block { reason: String },
}

impl ToolAdmission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Hooks installed into a session.
///
/// Engines call these synchronously from their own dispatch loop.
pub trait ToolHooks: Send + Sync {
    /// A new turn began. `turn_index` is 0-based.
    fn on_turn_start(&self, turn_index: u32);

    /// Whether `tool_name` may run now.
    fn admit_tool_call(&self, tool_name: &str) -> ToolAdmission;

    /// Rewrite a tool result before the model sees it.
    fn annotate_tool_result(&self, content: Vec<ContentBlock>) -> Vec<ContentBlock>;
}
