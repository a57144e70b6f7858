//! Integrity membrane for canarystack.
//!
//! This crate holds everything a container needs to notice that its memory
//! was touched behind its back:
//! - **Configuration** (`config`): diagnostic level selection
//! - **Fault status** (`fault`): sticky one-way fault latch
//! - **Lifecycle** (`lifecycle`): monotonic Uninitialized -> Active -> Destroyed
//! - **Guarded buffer** (`buffer`): owned allocation with explicit guard and checksum ranges
//! - **Guard words** (`guard`): fixed canaries around a block
//! - **Poison fill** (`poison`): NaN sentinel over unused slots
//! - **Rolling checksum** (`checksum`): rotate-and-XOR digest of the numeric region
//! - **Layers** (`layer`): the three checks as composable strategy objects
//! - **Metrics** (`metrics`): atomic counters for observability

#![forbid(unsafe_code)]

pub mod buffer;
pub mod checksum;
pub mod config;
pub mod fault;
pub mod guard;
pub mod layer;
pub mod lifecycle;
pub mod metrics;
pub mod poison;

pub use buffer::{AllocError, BufferLayout, GuardedBuffer, SLOT_SIZE};
pub use config::{
    DEFAULT_CAPACITY, DiagnosticLevel, MINIMUM_CAPACITY, StackConfig, diagnostic_level,
};
pub use fault::{FaultStatus, StackFault};
pub use guard::{GuardPair, GuardSide, GuardTarget};
pub use layer::{IntegrityLayer, LayerKind, LayerSet, Violation};
pub use lifecycle::Lifecycle;
pub use metrics::{IntegrityMetrics, MetricsSnapshot, global_metrics};
pub use poison::{POISON, is_poison};
