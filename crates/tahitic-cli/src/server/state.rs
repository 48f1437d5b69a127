//! Server lifecycle states and the tracker enforcing their order.

use std::collections::VecDeque;
use std::sync::Mutex;

use jiff::Timestamp;
use serde::Serialize;
use tokio::sync::watch;

use super::TRACING_TARGET_STARTUP;

/// Number of transitions kept by [`StateTracker::history`].
const HISTORY_CAPACITY: usize = 16;

/// Stage of the server lifecycle.
///
/// Stages only move forward. Every stage before [`ServerState::Stopping`] may
/// jump straight to it on a fatal error.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(strum::Display, strum::AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    #[default]
    Starting,
    Connecting,
    Migrating,
    Verifying,
    Listening,
    Stopping,
    Stopped,
}

impl ServerState {
    /// Returns whether `next` may follow this state.
    pub const fn can_transition_to(self, next: ServerState) -> bool {
        use ServerState::*;

        matches!(
            (self, next),
            (Starting, Connecting)
                | (Connecting, Migrating)
                | (Migrating, Verifying)
                | (Verifying, Listening)
                | (Starting | Connecting | Migrating | Verifying | Listening, Stopping)
                | (Stopping, Stopped)
        )
    }
}

/// A transition that the lifecycle order forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid server state transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ServerState,
    pub to: ServerState,
}

/// A recorded state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub from: ServerState,
    pub to: ServerState,
    pub at: Timestamp,
}

/// Holds the current [`ServerState`] and publishes its changes.
#[derive(Debug)]
pub struct StateTracker {
    sender: watch::Sender<ServerState>,
    history: Mutex<VecDeque<StateTransition>>,
}

impl StateTracker {
    /// Creates a tracker in [`ServerState::Starting`].
    pub fn new() -> Self {
        Self {
            sender: watch::Sender::new(ServerState::Starting),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    /// Returns the current state.
    #[inline]
    pub fn current(&self) -> ServerState {
        *self.sender.borrow()
    }

    /// Subscribes to state changes.
    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.sender.subscribe()
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] and leaves the state untouched when the
    /// lifecycle order forbids the move.
    pub fn transition(&self, next: ServerState) -> Result<(), InvalidTransition> {
        let mut from = ServerState::Starting;
        let changed = self.sender.send_if_modified(|state| {
            from = *state;
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });

        if !changed {
            tracing::warn!(
                target: TRACING_TARGET_STARTUP,
                from = %from,
                to = %next,
                "Rejected server state transition"
            );
            return Err(InvalidTransition { from, to: next });
        }

        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            from = %from,
            to = %next,
            "Server state changed"
        );

        let mut history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(StateTransition {
            from,
            to: next,
            at: Timestamp::now(),
        });

        Ok(())
    }

    /// Renders the visited states, oldest first, as `a -> b -> c`.
    pub fn path(&self) -> String {
        let history = self.history();
        let mut states = Vec::with_capacity(history.len() + 1);
        if let Some(first) = history.first() {
            states.push(first.from.as_ref());
        }
        states.extend(history.iter().map(|transition| transition.to.as_ref()));
        states.join(" -> ")
    }

    /// Returns the most recent transitions, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .copied()
            .collect()
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORWARD: [ServerState; 7] = [
        ServerState::Starting,
        ServerState::Connecting,
        ServerState::Migrating,
        ServerState::Verifying,
        ServerState::Listening,
        ServerState::Stopping,
        ServerState::Stopped,
    ];

    #[test]
    fn happy_path_is_accepted() -> anyhow::Result<()> {
        let tracker = StateTracker::new();
        for next in &FORWARD[1..] {
            tracker.transition(*next)?;
        }

        assert_eq!(tracker.current(), ServerState::Stopped);
        assert!(!tracker.current().can_transition_to(ServerState::Stopping));
        assert_eq!(tracker.history().len(), 6);
        Ok(())
    }

    #[test]
    fn every_stage_before_stopping_can_fail() {
        for state in &FORWARD[..5] {
            assert!(state.can_transition_to(ServerState::Stopping), "{state}");
        }
        assert!(!ServerState::Stopping.can_transition_to(ServerState::Stopping));
        assert!(!ServerState::Stopped.can_transition_to(ServerState::Stopping));
    }

    #[test]
    fn backwards_and_skipping_are_rejected() -> anyhow::Result<()> {
        let tracker = StateTracker::new();
        tracker.transition(ServerState::Connecting)?;

        let error = tracker.transition(ServerState::Listening).unwrap_err();
        assert_eq!(error.from, ServerState::Connecting);
        assert_eq!(error.to, ServerState::Listening);

        assert!(tracker.transition(ServerState::Starting).is_err());
        assert_eq!(tracker.current(), ServerState::Connecting);
        assert_eq!(tracker.history().len(), 1);
        Ok(())
    }

    #[test]
    fn path_lists_visited_states() -> anyhow::Result<()> {
        let tracker = StateTracker::new();
        assert_eq!(tracker.path(), "");

        tracker.transition(ServerState::Connecting)?;
        tracker.transition(ServerState::Stopping)?;
        assert_eq!(tracker.path(), "starting -> connecting -> stopping");
        Ok(())
    }

    #[test]
    fn stopped_is_entered_once() -> anyhow::Result<()> {
        let tracker = StateTracker::new();
        tracker.transition(ServerState::Stopping)?;
        tracker.transition(ServerState::Stopped)?;
        assert!(tracker.transition(ServerState::Stopped).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn subscribers_observe_changes() -> anyhow::Result<()> {
        let tracker = StateTracker::new();
        let mut receiver = tracker.subscribe();

        tracker.transition(ServerState::Connecting)?;
        receiver.changed().await?;
        assert_eq!(*receiver.borrow_and_update(), ServerState::Connecting);

        // Rejected transitions are not published.
        let _ = tracker.transition(ServerState::Stopped);
        assert!(!receiver.has_changed()?);
        Ok(())
    }
}
