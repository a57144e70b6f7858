//! Container lifecycle as a monotonic chain.
//!
//! ```text
//!   Uninitialized --construct--> Active --destruct--> Destroyed
//! ```
//!
//! Transitions only move right. Joining two observations of the same
//! container yields the later state, so stale information can never revive a
//! destroyed container.

use serde::Serialize;

use crate::fault::StackFault;

/// Lifecycle state of a container.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum Lifecycle {
    /// Declared but never constructed.
    #[default]
    Uninitialized = 0,
    /// Constructed and owning a buffer.
    Active = 1,
    /// Buffer released.
    Destroyed = 2,
}

impl Lifecycle {
    /// The later of two states.
    #[must_use]
    pub const fn join(self, other: Self) -> Self {
        if (self as u8) >= (other as u8) {
            self
        } else {
            other
        }
    }

    /// Move to `next` if it is strictly later. Returns `None` for a backward
    /// or idempotent transition.
    #[must_use]
    pub const fn advance(self, next: Self) -> Option<Self> {
        if (next as u8) > (self as u8) {
            Some(next)
        } else {
            None
        }
    }

    /// Returns true if operations may touch the buffer.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Fault for using a container in this state, if any.
    pub const fn check(self) -> Result<(), StackFault> {
        match self {
            Self::Uninitialized => Err(StackFault::UseBeforeConstruction),
            Self::Active => Ok(()),
            Self::Destroyed => Err(StackFault::UseAfterDestruction),
        }
    }

    /// Upper-case identifier used in dumps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "NOT_CONSTRUCTED",
            Self::Active => "CONSTRUCTED",
            Self::Destroyed => "DESTRUCTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_transitions() {
        assert_eq!(
            Lifecycle::Uninitialized.advance(Lifecycle::Active),
            Some(Lifecycle::Active)
        );
        assert_eq!(
            Lifecycle::Active.advance(Lifecycle::Destroyed),
            Some(Lifecycle::Destroyed)
        );
        assert_eq!(Lifecycle::Destroyed.advance(Lifecycle::Active), None);
        assert_eq!(Lifecycle::Active.advance(Lifecycle::Active), None);
    }

    #[test]
    fn join_is_commutative_and_monotonic() {
        let all = [
            Lifecycle::Uninitialized,
            Lifecycle::Active,
            Lifecycle::Destroyed,
        ];
        for a in all {
            for b in all {
                assert_eq!(a.join(b), b.join(a));
                assert!(a.join(b) >= a);
            }
        }
    }

    #[test]
    fn check_maps_to_lifecycle_faults() {
        assert_eq!(
            Lifecycle::Uninitialized.check(),
            Err(StackFault::UseBeforeConstruction)
        );
        assert_eq!(Lifecycle::Active.check(), Ok(()));
        assert_eq!(
            Lifecycle::Destroyed.check(),
            Err(StackFault::UseAfterDestruction)
        );
    }
}
