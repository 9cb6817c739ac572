//! Scope lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// The lifecycle state of a connection scope.
///
/// States only ever advance: `Active → Terminating → Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum State {
    /// The scope may execute work and, if transactional, commit or roll back.
    Active = 0,
    /// The scope is closing; no new work may start.
    Terminating = 1,
    /// The connection has been released. Nothing further is permitted.
    Terminated = 2,
}

impl State {
    pub const fn as_str(self) -> &'static str {
        match self {
            State::Active => "ACTIVE",
            State::Terminating => "TERMINATING",
            State::Terminated => "TERMINATED",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => State::Active,
            1 => State::Terminating,
            _ => State::Terminated,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically readable state, so monitoring code on other threads always
/// observes the latest transition.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        StateCell(AtomicU8::new(State::Active as u8))
    }

    pub(crate) fn get(&self) -> State {
        State::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Advance to `next`. Never moves backwards; returns the previous state.
    pub(crate) fn advance(&self, next: State) -> State {
        let prev = self.0.fetch_max(next as u8, Ordering::SeqCst);
        State::from_u8(prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_starts_active() {
        assert_eq!(StateCell::new().get(), State::Active);
    }

    #[test]
    fn state_is_monotonic() {
        let cell = StateCell::new();
        assert_eq!(cell.advance(State::Terminated), State::Active);
        assert_eq!(cell.advance(State::Terminating), State::Terminated);
        assert_eq!(cell.get(), State::Terminated);
        assert_eq!(cell.advance(State::Active), State::Terminated);
        assert_eq!(cell.get(), State::Terminated);
    }

    #[test]
    fn state_display() {
        assert_eq!(State::Terminating.to_string(), "TERMINATING");
    }
}
