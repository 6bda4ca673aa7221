// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Provider state types.
//!
//! # State Transitions
//!
//! ```text
//!                 run()
//! Created ──────────────────→ Configuring
//!                                  │   │
//!          (link valid, databases  │   │ (bad link, resolution or
//!           opened, host listening)│   │  assembly error)
//!                                  ↓   ↓
//!                            Running   Failed
//!                                  │
//!      (shutdown signal or request │
//!       channel closed)            ↓
//!                           ShuttingDown ──→ Stopped
//! ```
//!
//! A shutdown signal that arrives while waiting for the first link moves
//! straight from `Configuring` to `Stopped`.

/// State of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Created but not started.
    Created,

    /// Waiting for a link definition, then assembling databases.
    Configuring,

    /// Serving actor requests.
    Running,

    /// Draining in-flight requests and closing databases.
    ShuttingDown,

    /// Shut down cleanly.
    Stopped,

    /// Startup failed. Check logs for the cause.
    Failed,
}

impl std::fmt::Display for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderState::Created => write!(f, "Created"),
            ProviderState::Configuring => write!(f, "Configuring"),
            ProviderState::Running => write!(f, "Running"),
            ProviderState::ShuttingDown => write!(f, "ShuttingDown"),
            ProviderState::Stopped => write!(f, "Stopped"),
            ProviderState::Failed => write!(f, "Failed"),
        }
    }
}

impl ProviderState {
    /// True once the provider can no longer serve requests.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProviderState::Stopped | ProviderState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_state_display() {
        assert_eq!(ProviderState::Created.to_string(), "Created");
        assert_eq!(ProviderState::Configuring.to_string(), "Configuring");
        assert_eq!(ProviderState::Running.to_string(), "Running");
        assert_eq!(ProviderState::ShuttingDown.to_string(), "ShuttingDown");
        assert_eq!(ProviderState::Stopped.to_string(), "Stopped");
        assert_eq!(ProviderState::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(ProviderState::Stopped.is_terminal());
        assert!(ProviderState::Failed.is_terminal());
        assert!(!ProviderState::Running.is_terminal());
        assert!(!ProviderState::Created.is_terminal());
    }
}
