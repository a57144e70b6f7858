//! Diagnostic dump of a stack's internal state.
//!
//! [`StackSnapshot::capture`] reads everything a dump shows without touching
//! the stack's fault status. [`report`] renders a snapshot into a
//! [`LogSink`], green when healthy and red when faulted, and closes the sink
//! afterwards if the stack is faulted: a faulted stack is treated as the end
//! of the run.

use canarystack_membrane::guard::{BUFFER_GUARD_LEFT, BUFFER_GUARD_RIGHT};
use canarystack_membrane::layer::ChecksumLayer;
use canarystack_membrane::poison::{self, PoisonFault};
use canarystack_membrane::{
    DiagnosticLevel, GuardPair, GuardSide, LayerKind, Lifecycle, StackFault, Violation,
};
use serde::Serialize;

use crate::log_sink::{LogColor, LogSink};
use crate::stack::Stack;

/// Observed and expected guard words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuardReading {
    pub left: u32,
    pub right: u32,
    pub expected_left: u32,
    pub expected_right: u32,
}

impl GuardReading {
    fn new(left: u32, right: u32, expected: GuardPair) -> Self {
        Self {
            left,
            right,
            expected_left: expected.left,
            expected_right: expected.right,
        }
    }

    /// Returns true when both words match.
    #[must_use]
    pub const fn intact(&self) -> bool {
        self.left == self.expected_left && self.right == self.expected_right
    }
}

/// Stored and recomputed checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecksumReading {
    pub stored: u64,
    pub computed: u64,
}

/// A slot that breaks the poison rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoisonNote {
    /// Live slot holding poison.
    UnexpectedPoison,
    /// Unused slot not holding poison.
    MissingPoison,
}

/// One numeric slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlotReport {
    pub index: usize,
    pub value: f64,
    pub live: bool,
    pub note: Option<PoisonNote>,
}

/// State only readable while a buffer exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotBody {
    pub size: usize,
    pub capacity: usize,
    pub buffer_address: usize,
    pub struct_guards: Option<GuardReading>,
    pub buffer_guards: Option<GuardReading>,
    pub checksum: Option<ChecksumReading>,
    pub slots: Vec<SlotReport>,
}

/// Everything a dump shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackSnapshot {
    pub name: Option<String>,
    pub address: usize,
    pub level: DiagnosticLevel,
    pub lifecycle: Lifecycle,
    pub fault: Option<StackFault>,
    pub fault_text: String,
    pub violation: Option<Violation>,
    pub body: Option<SnapshotBody>,
}

impl StackSnapshot {
    /// Read the stack's state. Inactive stacks get no body so nothing
    /// released or unallocated is read.
    #[must_use]
    pub fn capture(stack: &Stack) -> Self {
        let body = (stack.lifecycle().is_active() && stack.buffer().is_some())
            .then(|| capture_body(stack));
        Self {
            name: stack.name().map(str::to_string),
            address: stack.address(),
            level: stack.level(),
            lifecycle: stack.lifecycle(),
            fault: stack.fault(),
            fault_text: stack.status().describe(),
            violation: stack.violation(),
            body,
        }
    }

    /// Returns true when no fault is latched.
    #[must_use]
    pub const fn healthy(&self) -> bool {
        self.fault.is_none()
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render as the plain-text dump, one string per line.
    #[must_use]
    pub fn lines(&self) -> Vec<(String, LogColor)> {
        let status = if self.healthy() {
            LogColor::Green
        } else {
            LogColor::Red
        };
        let mut out = Vec::new();
        out.push((
            format!(
                "Stack ({}) [{:#x}] \"{}\"",
                self.fault_text,
                self.address,
                self.name.as_deref().unwrap_or("")
            ),
            status,
        ));

        let Some(body) = &self.body else {
            out.push((
                format!("    lifecycle    = {}", self.lifecycle.name()),
                status,
            ));
            return out;
        };

        out.push(("{".to_string(), status));
        out.push((format!("    level        = {}", self.level), LogColor::Blue));
        if let Some(violation) = &self.violation {
            out.push((format!("    violation    = {violation}"), LogColor::Red));
        }
        out.push((format!("    size         = {}", body.size), LogColor::Blue));
        out.push((format!("    capacity     = {}", body.capacity), LogColor::Blue));
        if let Some(guards) = &body.struct_guards {
            out.push(guard_line("structGuards", guards));
        }
        if let Some(guards) = &body.buffer_guards {
            out.push(guard_line("arrayGuards ", guards));
        }
        if let Some(checksum) = &body.checksum {
            let color = if checksum.stored == checksum.computed {
                LogColor::Blue
            } else {
                LogColor::Red
            };
            out.push((
                format!(
                    "    checksum     = {:#018x} (computed {:#018x})",
                    checksum.stored, checksum.computed
                ),
                color,
            ));
        }
        out.push((
            format!("    dynamicArray [{:#x}]", body.buffer_address),
            LogColor::Blue,
        ));
        out.push(("    {".to_string(), LogColor::Blue));
        for slot in &body.slots {
            out.push(slot_line(slot));
        }
        out.push(("    }".to_string(), LogColor::Blue));
        out.push(("}".to_string(), status));
        out
    }
}

fn capture_body(stack: &Stack) -> SnapshotBody {
    let level = stack.level();
    let size = stack.size();
    let buffer = stack.buffer();

    let guarded = stack.layers().contains(LayerKind::Guard);
    let struct_guards = guarded.then(|| {
        let (left, right) = stack.struct_guards();
        GuardReading::new(left, right, GuardPair::STRUCT)
    });
    let buffer_guards = buffer.filter(|_| guarded).map(|buffer| {
        GuardReading::new(
            buffer.guard(GuardSide::Left).unwrap_or(!BUFFER_GUARD_LEFT),
            buffer.guard(GuardSide::Right).unwrap_or(!BUFFER_GUARD_RIGHT),
            GuardPair::BUFFER,
        )
    });
    let checksum = buffer.and_then(|buffer| {
        buffer.stored_checksum().map(|stored| ChecksumReading {
            stored,
            computed: ChecksumLayer::compute(buffer, size),
        })
    });

    let slots = buffer
        .map(|buffer| {
            (0..buffer.capacity())
                .map(|index| {
                    let value = buffer.slot(index).unwrap_or(poison::POISON);
                    let note = if level.poison_enabled() {
                        poison::classify(index, value, size).map(|fault| match fault {
                            PoisonFault::PoisonedLive { .. } => PoisonNote::UnexpectedPoison,
                            PoisonFault::UnpoisonedFree { .. } => PoisonNote::MissingPoison,
                        })
                    } else {
                        None
                    };
                    SlotReport {
                        index,
                        value,
                        live: index < size,
                        note,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    SnapshotBody {
        size,
        capacity: stack.capacity(),
        buffer_address: buffer.map_or(0, |buffer| buffer.slots_address()),
        struct_guards,
        buffer_guards,
        checksum,
        slots,
    }
}

fn guard_line(label: &str, guards: &GuardReading) -> (String, LogColor) {
    let color = if guards.intact() {
        LogColor::Blue
    } else {
        LogColor::Red
    };
    (
        format!(
            "    {label} = {:#010X} / {:#010X} (expected {:#010X} / {:#010X})",
            guards.left, guards.right, guards.expected_left, guards.expected_right
        ),
        color,
    )
}

fn slot_line(slot: &SlotReport) -> (String, LogColor) {
    let marker = if slot.live { '*' } else { ' ' };
    let value = if poison::is_poison(slot.value) {
        "NAN (POISON)".to_string()
    } else {
        format!("{}", slot.value)
    };
    match slot.note {
        Some(PoisonNote::UnexpectedPoison) => (
            format!("       {marker}[{}] = {value} <- live slot poisoned", slot.index),
            LogColor::Red,
        ),
        Some(PoisonNote::MissingPoison) => (
            format!("       {marker}[{}] = {value} <- free slot not poisoned", slot.index),
            LogColor::Pink,
        ),
        None if slot.live => (
            format!("       {marker}[{}] = {value}", slot.index),
            LogColor::Black,
        ),
        None => (
            format!("       {marker}[{}] = {value}", slot.index),
            LogColor::Gray,
        ),
    }
}

/// Dump `stack` into `sink`, opening it if needed. When the stack is
/// faulted the sink is closed afterwards. Returns the rendered snapshot.
pub fn report(stack: &Stack, sink: &mut dyn LogSink) -> StackSnapshot {
    if !sink.is_open() {
        sink.open();
    }

    let snapshot = StackSnapshot::capture(stack);
    let block = if snapshot.healthy() {
        LogColor::Green
    } else {
        LogColor::Red
    };
    sink.begin_block(block);
    for (line, color) in snapshot.lines() {
        sink.write_styled(&line, color);
        sink.write_styled("\n", color);
    }
    sink.end_block();

    if !snapshot.healthy() {
        sink.close();
    }
    snapshot
}
