//! # Workspace Finder
//!
//! Turn-budgeted, read-only search subagent for coding workspaces.
//!
//! This library provides:
//! - A finder orchestrator that runs one search session under a hard turn cap
//! - Model selection from an ordered override list with a once-only fallback
//! - A cooldown registry that keeps failing models out of rotation for a while
//! - Cooperative cancellation across every live session of an invocation
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │             Finder               │
//!        │  (selection, retries, abort)     │
//!        └───────┬──────────────────┬───────┘
//!                │                  │
//!                ▼                  ▼
//!      ┌──────────────────┐  ┌──────────────────┐
//!      │  SessionEngine   │  │  Unavailability  │
//!      │  (+ TurnBudget)  │  │  Registry        │
//!      └──────────────────┘  └──────────────────┘
//! ```
//!
//! ## Invocation Flow
//! 1. Validate the query and open a run record
//! 2. Pick the next usable model from the selection plan
//! 3. Start a session with the turn budget installed as tool hooks
//! 4. Stream turn and tool events into the run record
//! 5. On failure, cool the model down and try the next candidate
//! 6. Return the final text and structured details
//!
//! ## Modules
//! - `agents`: orchestrator, model selection, run state, status projection
//! - `backend`: session engine and model registry contracts
//! - `budget`: per-session turn budget
//! - `provider_health`: model cooldown registry

pub mod agents;
pub mod backend;
pub mod budget;
pub mod config;
pub mod prompts;
pub mod provider_health;
pub mod tools;
pub mod util;

pub use agents::{Finder, FinderOutcome, FinderRequest, FinderUpdate, ModelCandidate};
pub use config::Config;
pub use provider_health::UnavailabilityRegistry;
