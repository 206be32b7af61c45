//! Poll-session state machine.
//!
//! Pure transition functions for the session lifecycle, kept free of timers
//! and channels so every path is table-testable. The scheduler owns the
//! side effects and only interprets the returned [`Effect`].
//!
//! Visibility events alone never create or end a session: `Hidden`/`Visible`
//! only move between `Active` and `Paused`, and `Paused` exists only for a
//! session that was `Active`. Teardown (`Stopped`) is legal from any state.

/// Lifecycle states of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No interval armed.
    Idle,
    /// Interval armed, surface visible.
    Active,
    /// Interval cleared because the surface is hidden.
    Paused,
}

/// Events driving the session machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    /// Session activated with a non-zero interval.
    Started,
    /// Session teardown (stop, unmount, dependency change).
    Stopped,
    /// Visibility signal reported hidden.
    Hidden,
    /// Visibility signal reported visible.
    Visible,
}

/// Side effect the scheduler must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to do.
    None,
    /// Arm the periodic interval.
    ArmInterval,
    /// Clear the interval without refreshing.
    Disarm,
    /// Run one immediate refresh, then arm the interval.
    RefreshAndArm,
}

/// Advance the machine by one event.
pub fn step(state: PollState, event: PollEvent) -> (PollState, Effect) {
    use PollEvent::{Hidden, Started, Stopped, Visible};
    use PollState::{Active, Idle, Paused};

    match (state, event) {
        (Idle, Started) => (Active, Effect::ArmInterval),
        (Active, Hidden) => (Paused, Effect::Disarm),
        (Paused, Visible) => (Active, Effect::RefreshAndArm),
        (_, Stopped) => (Idle, Effect::Disarm),
        // Hidden/Visible while Idle, repeated visibility reports, and
        // redundant Started events change nothing.
        (state, _) => (state, Effect::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_arms_interval() {
        assert_eq!(step(PollState::Idle, PollEvent::Started), (PollState::Active, Effect::ArmInterval));
    }

    #[test]
    fn hiding_pauses_without_refresh() {
        assert_eq!(step(PollState::Active, PollEvent::Hidden), (PollState::Paused, Effect::Disarm));
    }

    #[test]
    fn regaining_visibility_refreshes_then_rearms() {
        assert_eq!(
            step(PollState::Paused, PollEvent::Visible),
            (PollState::Active, Effect::RefreshAndArm)
        );
    }

    #[test]
    fn stop_is_legal_from_every_state() {
        for state in [PollState::Idle, PollState::Active, PollState::Paused] {
            assert_eq!(step(state, PollEvent::Stopped), (PollState::Idle, Effect::Disarm));
        }
    }

    #[test]
    fn visibility_never_touches_idle() {
        assert_eq!(step(PollState::Idle, PollEvent::Hidden), (PollState::Idle, Effect::None));
        assert_eq!(step(PollState::Idle, PollEvent::Visible), (PollState::Idle, Effect::None));
    }

    #[test]
    fn redundant_reports_are_ignored() {
        assert_eq!(step(PollState::Active, PollEvent::Visible), (PollState::Active, Effect::None));
        assert_eq!(step(PollState::Paused, PollEvent::Hidden), (PollState::Paused, Effect::None));
        assert_eq!(step(PollState::Active, PollEvent::Started), (PollState::Active, Effect::None));
    }
}
