//! Fault-injection oracle.
//!
//! Each case drives a fresh stack into one misuse or memory corruption and
//! states which fault the stack must latch at a given diagnostic level.
//! Misuse faults are caught at every level; corruption is caught only by
//! the layers the level enables.

use canarystack_core::{DiagnosticLevel, MINIMUM_CAPACITY, Stack, StackConfig, StackFault};
use canarystack_membrane::{BufferLayout, SLOT_SIZE};
use serde::{Deserialize, Serialize};

/// Condition a case triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InjectedFault {
    /// `pop` on an empty stack.
    EmptyPop,
    /// `top` on an empty stack.
    EmptyTop,
    /// `destruct` twice.
    DoubleDestruct,
    /// `push` after `destruct`.
    UseAfterDestruct,
    /// `push` on a declared but never constructed stack.
    UseBeforeConstruct,
    /// Write over the word just past the last slot.
    Overrun,
    /// Write a number into an unused slot.
    StrayWrite,
    /// Flip one bit of a live element.
    BitFlip,
    /// Clobber the guard words of the stack itself.
    StructOverrun,
    /// Push NaN, the poison value, as data.
    PoisonValue,
    /// Grow past an allocation limit sized for the initial buffer.
    AllocLimit,
}

impl InjectedFault {
    /// Every condition, in catalogue order.
    pub const ALL: [Self; 11] = [
        Self::EmptyPop,
        Self::EmptyTop,
        Self::DoubleDestruct,
        Self::UseAfterDestruct,
        Self::UseBeforeConstruct,
        Self::Overrun,
        Self::StrayWrite,
        Self::BitFlip,
        Self::StructOverrun,
        Self::PoisonValue,
        Self::AllocLimit,
    ];

    /// Kebab-case identifier, as accepted on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EmptyPop => "empty-pop",
            Self::EmptyTop => "empty-top",
            Self::DoubleDestruct => "double-destruct",
            Self::UseAfterDestruct => "use-after-destruct",
            Self::UseBeforeConstruct => "use-before-construct",
            Self::Overrun => "overrun",
            Self::StrayWrite => "stray-write",
            Self::BitFlip => "bit-flip",
            Self::StructOverrun => "struct-overrun",
            Self::PoisonValue => "poison-value",
            Self::AllocLimit => "alloc-limit",
        }
    }

    /// Fault the stack must latch at `level`, `None` when the level has no
    /// layer that can see the condition.
    #[must_use]
    pub const fn expected(self, level: DiagnosticLevel) -> Option<StackFault> {
        match self {
            Self::EmptyPop => Some(StackFault::PopFromEmpty),
            Self::EmptyTop => Some(StackFault::TopFromEmpty),
            Self::DoubleDestruct | Self::UseAfterDestruct => {
                Some(StackFault::UseAfterDestruction)
            }
            Self::UseBeforeConstruct => Some(StackFault::UseBeforeConstruction),
            Self::AllocLimit => Some(StackFault::ReallocationFailed),
            Self::StrayWrite | Self::PoisonValue if level.poison_enabled() => {
                Some(StackFault::CorruptionDetected)
            }
            Self::Overrun | Self::StructOverrun if level.guards_enabled() => {
                Some(StackFault::CorruptionDetected)
            }
            Self::BitFlip if level.checksum_enabled() => Some(StackFault::CorruptionDetected),
            _ => None,
        }
    }
}

impl std::fmt::Display for InjectedFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Elements pushed before a corruption is injected.
const SEED_VALUES: [f64; 3] = [1.5, -2.25, 3.0];

/// Drive a fresh stack named after `fault` into the condition and return
/// it, with whatever fault it latched.
#[must_use]
pub fn inject(fault: InjectedFault, config: StackConfig) -> Stack {
    let config = match fault {
        InjectedFault::AllocLimit => {
            let capacity = config.default_capacity.max(MINIMUM_CAPACITY);
            match BufferLayout::new(capacity, config.level).total_bytes() {
                Some(bytes) => config.with_allocation_limit(bytes),
                None => config,
            }
        }
        _ => config,
    };

    let mut stack = Stack::declare(Some(fault.name()), config);
    if fault == InjectedFault::UseBeforeConstruct {
        let _ = stack.push(SEED_VALUES[0]);
        return stack;
    }
    if stack.construct(None).is_err() {
        return stack;
    }
    if !matches!(fault, InjectedFault::EmptyPop | InjectedFault::EmptyTop) {
        for value in SEED_VALUES {
            if stack.push(value).is_err() {
                return stack;
            }
        }
    }

    match fault {
        InjectedFault::EmptyPop => {
            let _ = stack.pop();
        }
        InjectedFault::EmptyTop => {
            let _ = stack.top();
        }
        InjectedFault::DoubleDestruct => {
            let _ = stack.destruct();
            let _ = stack.destruct();
        }
        InjectedFault::UseAfterDestruct => {
            let _ = stack.destruct();
            let _ = stack.push(0.0);
        }
        InjectedFault::UseBeforeConstruct => {}
        InjectedFault::Overrun => {
            if let Some(footer) = stack.buffer().map(|b| b.layout().footer()) {
                stack.inject_raw(|raw| raw[footer].fill(0));
            }
            let _ = stack.validate();
        }
        InjectedFault::StrayWrite => {
            // The write must land in an unused slot, not past the region.
            while stack.size() >= stack.capacity() {
                if stack.push(SEED_VALUES[0]).is_err() {
                    return stack;
                }
            }
            let free = stack.size();
            if let Some(slots) = stack.buffer().map(|b| b.layout().slots()) {
                let start = slots.start + free * SLOT_SIZE;
                stack.inject_raw(|raw| raw[start..start + SLOT_SIZE].fill(0));
            }
            let _ = stack.validate();
        }
        InjectedFault::BitFlip => {
            if let Some(slots) = stack.buffer().map(|b| b.layout().slots()) {
                stack.inject_raw(|raw| raw[slots.start] ^= 0x01);
            }
            let _ = stack.validate();
        }
        InjectedFault::StructOverrun => {
            stack.inject_struct_guards(0, 0);
            let _ = stack.validate();
        }
        InjectedFault::PoisonValue => {
            let _ = stack.push(f64::NAN);
        }
        InjectedFault::AllocLimit => {
            let mut value = 0.0;
            while stack.push(value).is_ok() {
                value += 1.0;
            }
        }
    }
    stack
}

/// One oracle case: a condition at a level and its expected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaultOracleCase {
    pub fault: InjectedFault,
    pub level: DiagnosticLevel,
    pub expected: Option<StackFault>,
}

impl FaultOracleCase {
    /// Case for `fault` at `level`.
    #[must_use]
    pub const fn new(fault: InjectedFault, level: DiagnosticLevel) -> Self {
        Self {
            fault,
            level,
            expected: fault.expected(level),
        }
    }

    /// Identifier such as `bit-flip@level3`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}@{}", self.fault, self.level)
    }

    /// Run the case on a fresh stack; returns the fault actually latched.
    #[must_use]
    pub fn observe(&self) -> Option<StackFault> {
        inject(self.fault, StackConfig::with_level(self.level)).fault()
    }
}

/// Collection of oracle cases.
#[derive(Debug, Default)]
pub struct FaultOracleSuite {
    cases: Vec<FaultOracleCase>,
}

impl FaultOracleSuite {
    /// Create a new empty suite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every condition at `level`.
    #[must_use]
    pub fn for_level(level: DiagnosticLevel) -> Self {
        let mut suite = Self::new();
        for fault in InjectedFault::ALL {
            suite.add(FaultOracleCase::new(fault, level));
        }
        suite
    }

    /// Add a test case.
    pub fn add(&mut self, case: FaultOracleCase) {
        self.cases.push(case);
    }

    /// Get all cases.
    #[must_use]
    pub fn cases(&self) -> &[FaultOracleCase] {
        &self.cases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: [DiagnosticLevel; 4] = [
        DiagnosticLevel::None,
        DiagnosticLevel::Level1,
        DiagnosticLevel::Level2,
        DiagnosticLevel::Level3,
    ];

    #[test]
    fn misuse_is_caught_at_every_level() {
        for level in LEVELS {
            for fault in [
                InjectedFault::EmptyPop,
                InjectedFault::EmptyTop,
                InjectedFault::DoubleDestruct,
                InjectedFault::UseAfterDestruct,
                InjectedFault::UseBeforeConstruct,
                InjectedFault::AllocLimit,
            ] {
                assert!(fault.expected(level).is_some(), "{fault}@{level}");
            }
        }
    }

    #[test]
    fn corruption_needs_matching_layer() {
        let corrupt = Some(StackFault::CorruptionDetected);
        let stray = InjectedFault::StrayWrite;
        assert_eq!(stray.expected(DiagnosticLevel::None), None);
        assert_eq!(stray.expected(DiagnosticLevel::Level1), corrupt);
        assert_eq!(InjectedFault::Overrun.expected(DiagnosticLevel::Level1), None);
        assert_eq!(InjectedFault::Overrun.expected(DiagnosticLevel::Level2), corrupt);
        assert_eq!(InjectedFault::BitFlip.expected(DiagnosticLevel::Level2), None);
        assert_eq!(InjectedFault::BitFlip.expected(DiagnosticLevel::Level3), corrupt);
    }

    #[test]
    fn every_case_matches_its_oracle() {
        for level in LEVELS {
            for case in FaultOracleSuite::for_level(level).cases() {
                assert_eq!(case.observe(), case.expected, "{}", case.id());
            }
        }
    }

    #[test]
    fn minimum_capacity_matches_oracle() {
        for level in LEVELS {
            let config = StackConfig::with_level(level).with_default_capacity(MINIMUM_CAPACITY);
            for fault in InjectedFault::ALL {
                let stack = inject(fault, config);
                assert_eq!(stack.fault(), fault.expected(level), "{fault}@{level}");
            }
        }
    }

    #[test]
    fn stray_write_lands_in_free_slot_when_full() {
        for level in [DiagnosticLevel::Level2, DiagnosticLevel::Level3] {
            let config = StackConfig::with_level(level).with_default_capacity(MINIMUM_CAPACITY);
            let stack = inject(InjectedFault::StrayWrite, config);
            let free = stack.size();
            assert!(free < stack.capacity());
            assert_eq!(
                stack.violation(),
                Some(canarystack_core::Violation::UnpoisonedFreeSlot { index: free }),
                "level {level}"
            );
        }
    }

    #[test]
    fn alloc_limit_keeps_contents() {
        let stack = inject(
            InjectedFault::AllocLimit,
            StackConfig::with_level(DiagnosticLevel::Level3),
        );
        assert_eq!(stack.fault(), Some(StackFault::ReallocationFailed));
        assert_eq!(stack.size(), stack.capacity());
        assert_eq!(stack.buffer().and_then(|b| b.slot(0)), Some(1.5));
        assert_eq!(stack.inspect(), Ok(()));
    }

    #[test]
    fn names_round_trip_through_clap() {
        use clap::ValueEnum;
        for fault in InjectedFault::ALL {
            assert_eq!(InjectedFault::from_str(fault.name(), false), Ok(fault));
        }
    }
}
