//! Tool descriptors handed to the session engine.
//!
//! The finder is read-only. It gets a shell for search commands (`rg`, `fd`,
//! `ls`) and a ranged file reader. The engine owns execution and sandboxing;
//! this module only describes the tools.

use serde::Serialize;
use serde_json::{json, Value};

/// Name of the shell search tool.
pub const BASH_TOOL: &str = "bash";
/// Name of the ranged file reader.
pub const READ_TOOL: &str = "read";

/// A tool the engine should expose to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's parameters.
    pub parameters: Value,
}

/// The finder's tool set.
pub fn read_only_tools() -> Vec<ToolSpec> {
    vec![bash_tool(), read_tool()]
}

fn bash_tool() -> ToolSpec {
    ToolSpec {
        name: BASH_TOOL.to_string(),
        description: "Run a read-only search command in the workspace (rg, fd, ls). \
                      Commands must not modify files or repository state."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command line to run, e.g. `rg -n \"fn main\" src`"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Optional: timeout in seconds"
                }
            },
            "required": ["command"]
        }),
    }
}

fn read_tool() -> ToolSpec {
    ToolSpec {
        name: READ_TOOL.to_string(),
        description: "Read a file, optionally a line range, for line-level citations.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace or absolute"
                },
                "offset": {
                    "type": "integer",
                    "description": "Optional: first line to read (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Optional: number of lines to read"
                }
            },
            "required": ["path"]
        }),
    }
}
