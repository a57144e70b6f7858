//! Diagnostic level configuration.
//!
//! The level is chosen in three steps, later steps overriding earlier ones:
//! - the build default, selected by the `level1`/`level2`/`level3` cargo
//!   features (highest wins, `none` when no feature is enabled),
//! - the `CANARYSTACK_LEVEL` environment variable, read once per process,
//! - an explicit [`StackConfig`] handed to the container.
//!
//! Levels are strictly additive:
//! - `none`: fast-fail only. Latched faults and lifecycle are still honoured.
//! - `level1`: poison fill over unused capacity plus bookkeeping assertions.
//! - `level2`: level1 plus guard words around the buffer and the container.
//! - `level3`: level2 plus the rolling checksum over the numeric region.

use std::sync::OnceLock;

use serde::Serialize;

/// Slot count used when construction does not name a capacity.
pub const DEFAULT_CAPACITY: usize = 10;

/// Capacity floor. Construction rounds up to it, shrinking never goes below.
pub const MINIMUM_CAPACITY: usize = 3;

/// Environment variable consulted by [`diagnostic_level`].
pub const LEVEL_ENV_VAR: &str = "CANARYSTACK_LEVEL";

/// Which integrity layers are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// No integrity layers.
    None,
    /// Poison fill plus basic assertions.
    Level1,
    /// Level1 plus guard words.
    Level2,
    /// Level2 plus rolling checksum.
    Level3,
}

impl DiagnosticLevel {
    /// Level selected by cargo features.
    #[must_use]
    pub const fn build_default() -> Self {
        if cfg!(feature = "level3") {
            Self::Level3
        } else if cfg!(feature = "level2") {
            Self::Level2
        } else if cfg!(feature = "level1") {
            Self::Level1
        } else {
            Self::None
        }
    }

    /// Parse from string (case-insensitive). Unknown names fall back to the
    /// build default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" | "0" | "release" => Self::None,
            "level1" | "lvl1" | "1" | "poison" => Self::Level1,
            "level2" | "lvl2" | "2" | "guards" | "canaries" => Self::Level2,
            "level3" | "lvl3" | "3" | "full" | "debug" | "hash" => Self::Level3,
            _ => Self::build_default(),
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Level1 => "level1",
            Self::Level2 => "level2",
            Self::Level3 => "level3",
        }
    }

    /// Returns true if full validation runs around every operation.
    #[must_use]
    pub const fn validation_enabled(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns true if unused slots are poisoned.
    #[must_use]
    pub const fn poison_enabled(self) -> bool {
        matches!(self, Self::Level1 | Self::Level2 | Self::Level3)
    }

    /// Returns true if guard words surround the buffer and the container.
    #[must_use]
    pub const fn guards_enabled(self) -> bool {
        matches!(self, Self::Level2 | Self::Level3)
    }

    /// Returns true if the rolling checksum is maintained.
    #[must_use]
    pub const fn checksum_enabled(self) -> bool {
        matches!(self, Self::Level3)
    }
}

impl Default for DiagnosticLevel {
    fn default() -> Self {
        Self::build_default()
    }
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static GLOBAL_LEVEL: OnceLock<DiagnosticLevel> = OnceLock::new();

/// Get the process diagnostic level (reads env var on first call, caches thereafter).
#[must_use]
pub fn diagnostic_level() -> DiagnosticLevel {
    *GLOBAL_LEVEL.get_or_init(|| {
        std::env::var(LEVEL_ENV_VAR)
            .map(|v| DiagnosticLevel::from_str_loose(&v))
            .unwrap_or_default()
    })
}

/// Per-container configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StackConfig {
    /// Active integrity layers.
    pub level: DiagnosticLevel,
    /// Capacity used by default construction.
    pub default_capacity: usize,
    /// Upper bound in bytes for a single buffer allocation. Requests above it
    /// fail exactly like an allocator refusal.
    pub allocation_limit: Option<usize>,
}

impl StackConfig {
    /// Configuration at the given level with default capacity and no limit.
    #[must_use]
    pub const fn with_level(level: DiagnosticLevel) -> Self {
        Self {
            level,
            default_capacity: DEFAULT_CAPACITY,
            allocation_limit: None,
        }
    }

    /// Set the allocation limit.
    #[must_use]
    pub const fn with_allocation_limit(mut self, bytes: usize) -> Self {
        self.allocation_limit = Some(bytes);
        self
    }

    /// Set the default capacity.
    #[must_use]
    pub const fn with_default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity;
        self
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::with_level(diagnostic_level())
    }
}
