//! Budget module - turn limits for the finder subagent.
//!
//! # Key Concepts
//! - Turn: one round of the subagent's reasoning/tool loop
//! - TurnBudget: gates tool calls so the final turn is reserved for the answer

mod turns;

pub use turns::{TurnBudget, DEFAULT_MAX_TURNS};
