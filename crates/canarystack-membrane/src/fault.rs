//! Sticky fault status.
//!
//! A container carries exactly one [`FaultStatus`]. It moves from clear to a
//! single [`StackFault`] and never back: the first fault wins and later
//! faults are ignored. Only a freshly constructed container starts clear.

use serde::Serialize;
use thiserror::Error;

/// Fault taxonomy. Codes are stable and start at 1; 0 is "no error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[repr(u8)]
pub enum StackFault {
    /// `pop` on an empty container.
    #[error("pop from empty stack")]
    PopFromEmpty = 1,
    /// `top` on an empty container.
    #[error("top from empty stack")]
    TopFromEmpty = 2,
    /// The initial allocation was refused.
    #[error("stack construction failed")]
    ConstructionFailed = 3,
    /// A grow or shrink allocation was refused.
    #[error("stack reallocation failed")]
    ReallocationFailed = 4,
    /// Operation on a container that was never constructed.
    #[error("stack used before construction")]
    UseBeforeConstruction = 5,
    /// Operation on a container that was already destructed.
    #[error("stack used after destruction")]
    UseAfterDestruction = 6,
    /// An integrity layer observed a violated invariant.
    #[error("stack memory corruption detected")]
    CorruptionDetected = 7,
}

impl StackFault {
    /// Every fault, in code order.
    pub const ALL: [Self; 7] = [
        Self::PopFromEmpty,
        Self::TopFromEmpty,
        Self::ConstructionFailed,
        Self::ReallocationFailed,
        Self::UseBeforeConstruction,
        Self::UseAfterDestruction,
        Self::CorruptionDetected,
    ];

    /// Stable numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Upper-case identifier used in dumps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PopFromEmpty => "POP_FROM_EMPTY",
            Self::TopFromEmpty => "TOP_FROM_EMPTY",
            Self::ConstructionFailed => "CONSTRUCTION_FAILED",
            Self::ReallocationFailed => "REALLOCATION_FAILED",
            Self::UseBeforeConstruction => "USE_BEFORE_CONSTRUCTION",
            Self::UseAfterDestruction => "USE_AFTER_DESTRUCTION",
            Self::CorruptionDetected => "MEMORY_CORRUPTION",
        }
    }

    /// Returns true for resource exhaustion, the only recoverable class:
    /// prior contents stay intact.
    #[must_use]
    pub const fn is_allocation_failure(self) -> bool {
        matches!(self, Self::ConstructionFailed | Self::ReallocationFailed)
    }
}

/// One-way latch holding the first fault observed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaultStatus {
    fault: Option<StackFault>,
}

impl FaultStatus {
    /// A clear status.
    #[must_use]
    pub const fn clear() -> Self {
        Self { fault: None }
    }

    /// Latch `fault` unless one is already held. Returns the held fault,
    /// which is the earlier one when the latch was already set.
    pub fn latch(&mut self, fault: StackFault) -> StackFault {
        *self.fault.get_or_insert(fault)
    }

    /// The latched fault, if any.
    #[must_use]
    pub const fn get(&self) -> Option<StackFault> {
        self.fault
    }

    /// Returns true if a fault is latched.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.fault.is_some()
    }

    /// `Err` with the latched fault, `Ok` when clear.
    pub fn check(&self) -> Result<(), StackFault> {
        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Numeric code, 0 when clear.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self.fault {
            Some(fault) => fault.code(),
            None => 0,
        }
    }

    /// Dump text: `NO_ERROR` or `ERROR <code>: <NAME>`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.fault {
            None => "NO_ERROR".to_string(),
            Some(fault) => format!("ERROR {}: {}", fault.code(), fault.name()),
        }
    }
}
