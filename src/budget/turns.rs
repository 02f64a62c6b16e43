//! Turn budget enforcement.
//!
//! The budget is wired into a session as its tool hooks. It tracks the
//! 0-based turn index reported by the engine and:
//! - blocks every tool call once the final turn is reached
//! - appends a `[turn budget]` status line to every tool result

use std::sync::atomic::{AtomicU32, Ordering};

use crate::backend::{ContentBlock, ToolAdmission, ToolHooks};

/// Turn cap used when none is configured.
pub const DEFAULT_MAX_TURNS: u32 = 6;

/// Gate on tool execution based on the current turn.
///
/// # Invariants
/// - `max_turns >= 1`
/// - A tool call on turn index `max_turns - 1` or later is always blocked
#[derive(Debug)]
pub struct TurnBudget {
    max_turns: u32,
    turn_index: AtomicU32,
}

impl TurnBudget {
    /// Create a budget. A cap of 0 is raised to 1.
    pub fn new(max_turns: u32) -> Self {
        Self {
            max_turns: max_turns.max(1),
            turn_index: AtomicU32::new(0),
        }
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn turn_index(&self) -> u32 {
        self.turn_index.load(Ordering::SeqCst)
    }

    /// Record the engine's turn boundary.
    pub fn set_turn_index(&self, turn_index: u32) {
        self.turn_index.store(turn_index, Ordering::SeqCst);
    }

    /// 1-based turn number, clamped to the cap.
    fn human_turn(&self, turn_index: u32) -> u32 {
        turn_index.saturating_add(1).min(self.max_turns)
    }

    pub fn is_final_turn(&self) -> bool {
        self.turn_index() >= self.max_turns - 1
    }

    /// Decide whether a tool call may run on the current turn.
    pub fn admit(&self) -> ToolAdmission {
        let turn_index = self.turn_index();
        if turn_index < self.max_turns - 1 {
            return ToolAdmission::Allow;
        }

        ToolAdmission::Block {
            reason: format!(
                "Tool use is disabled on the final turn (turn {}/{}). \
                 Provide your final answer now without calling tools.",
                self.human_turn(turn_index),
                self.max_turns
            ),
        }
    }

    /// Status line appended to tool results.
    pub fn status_line(&self) -> String {
        let turn_index = self.turn_index();
        let remaining = self.max_turns.saturating_sub(turn_index.saturating_add(1));
        format!(
            "[turn budget] turn {}/{}; remaining after this turn: {}",
            self.human_turn(turn_index),
            self.max_turns,
            remaining
        )
    }
}

impl Default for TurnBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ToolHooks for TurnBudget {
    fn on_turn_start(&self, turn_index: u32) {
        self.set_turn_index(turn_index);
    }

    fn admit_tool_call(&self, tool_name: &str) -> ToolAdmission {
        let admission = self.admit();
        if let ToolAdmission::Block { .. } = admission {
            tracing::debug!(
                tool = tool_name,
                turn_index = self.turn_index(),
                max_turns = self.max_turns,
                "Blocked tool call on final turn"
            );
        }
        admission
    }

    fn annotate_tool_result(&self, mut content: Vec<ContentBlock>) -> Vec<ContentBlock> {
        content.push(ContentBlock::text(format!("\n\n{}", self.status_line())));
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_turn_is_always_blocked() {
        for max_turns in 1..=12 {
            let budget = TurnBudget::new(max_turns);
            for turn_index in 0..max_turns + 2 {
                budget.set_turn_index(turn_index);
                let blocked = !budget.admit().is_allowed();
                assert_eq!(
                    blocked,
                    turn_index >= max_turns - 1,
                    "max_turns={} turn_index={}",
                    max_turns,
                    turn_index
                );
            }
        }
    }

    #[test]
    fn single_turn_budget_blocks_from_the_start() {
        let budget = TurnBudget::new(1);
        assert!(budget.is_final_turn());
        match budget.admit() {
            ToolAdmission::Block { reason } => {
                assert!(reason.contains("turn 1/1"));
                assert!(reason.contains("final answer"));
            }
            ToolAdmission::Allow => panic!("expected the only turn to be tool-free"),
        }
    }

    #[test]
    fn block_message_names_turn_and_cap() {
        let budget = TurnBudget::new(6);
        budget.on_turn_start(5);
        match budget.admit_tool_call("bash") {
            ToolAdmission::Block { reason } => assert!(reason.contains("(turn 6/6)")),
            ToolAdmission::Allow => panic!("expected block"),
        }

        budget.on_turn_start(9);
        match budget.admit() {
            ToolAdmission::Block { reason } => assert!(reason.contains("(turn 6/6)")),
            ToolAdmission::Allow => panic!("expected block"),
        }
    }

    #[test]
    fn annotation_reports_remaining_turns() {
        let budget = TurnBudget::new(6);
        budget.on_turn_start(1);
        let annotated = budget.annotate_tool_result(vec![ContentBlock::text("src/lib.rs")]);

        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0], ContentBlock::text("src/lib.rs"));
        assert_eq!(
            annotated[1],
            ContentBlock::text("\n\n[turn budget] turn 2/6; remaining after this turn: 4")
        );
    }

    #[test]
    fn annotation_never_goes_negative() {
        let budget = TurnBudget::new(3);
        budget.on_turn_start(7);
        assert_eq!(
            budget.status_line(),
            "[turn budget] turn 3/3; remaining after this turn: 0"
        );
    }

    #[test]
    fn zero_cap_is_raised_to_one() {
        assert_eq!(TurnBudget::new(0).max_turns(), 1);
        assert_eq!(TurnBudget::default().max_turns(), DEFAULT_MAX_TURNS);
    }
}
