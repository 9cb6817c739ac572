//! Transaction mode of a transactional scope.

use serde::{Deserialize, Serialize};

/// Whether a transactional scope may write.
///
/// Fixed when the scope is opened. Prefer this over a bare `bool` at call
/// sites for readability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Reads only; `rollback` is a no-op.
    ReadOnly,
    /// Reads and writes.
    #[default]
    ReadWrite,
}

impl Mode {
    pub const fn is_read_only(self) -> bool {
        matches!(self, Mode::ReadOnly)
    }
}

impl From<bool> for Mode {
    fn from(read_only: bool) -> Self {
        if read_only {
            Mode::ReadOnly
        } else {
            Mode::ReadWrite
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_bool() {
        assert_eq!(Mode::from(true), Mode::ReadOnly);
        assert_eq!(Mode::from(false), Mode::ReadWrite);
        assert!(Mode::ReadOnly.is_read_only());
        assert!(!Mode::default().is_read_only());
    }
}
