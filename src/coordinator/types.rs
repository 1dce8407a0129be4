// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine state types.
//!
//! # State Transitions
//!
//! ```text
//!          start()
//! Idle ─────────────→ Watching
//!  ↑                     │
//!  │                     │ shutdown()
//!  │  (drained or        ↓
//!  └── drain timeout) ShuttingDown
//! ```
//!
//! - **Idle**: constructed, or fully shut down. Restartable.
//! - **Watching**: accepting change events and dispatching batches.
//! - **ShuttingDown**: cancellation fired, waiting for in-flight batches to seal.

/// State of the verification engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not accepting events.
    ///
    /// Call [`start()`](super::VerificationEngine::start) to begin.
    Idle,

    /// Dispatching one batch per accepted change event.
    Watching,

    /// Cancellation fired; in-flight batches are sealing.
    ShuttingDown,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "Idle"),
            EngineState::Watching => write!(f, "Watching"),
            EngineState::ShuttingDown => write!(f, "ShuttingDown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_state_display() {
        assert_eq!(EngineState::Idle.to_string(), "Idle");
        assert_eq!(EngineState::Watching.to_string(), "Watching");
        assert_eq!(EngineState::ShuttingDown.to_string(), "ShuttingDown");
    }

    #[test]
    fn test_engine_state_equality() {
        assert_eq!(EngineState::Idle, EngineState::Idle);
        assert_ne!(EngineState::Idle, EngineState::Watching);
    }
}
