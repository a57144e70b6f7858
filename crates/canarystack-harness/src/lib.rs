//! Harness tooling for canarystack.
//!
//! This crate provides:
//! - Demo driver: the push/clear walkthrough rendered into an HTML log
//! - Fault oracle: trigger one misuse or corruption, check the latched code
//! - Verification: oracle cases plus deterministic operation sequences
//! - Structured logging: JSONL events with SHA-256 artifact fingerprints
//! - Report generation: human-readable + machine-readable run reports

#![forbid(unsafe_code)]

pub mod demo;
pub mod fault_oracle;
pub mod report;
pub mod structured_log;
pub mod verify;

pub use fault_oracle::{FaultOracleSuite, InjectedFault};
pub use report::RunReport;
pub use verify::{VerificationResult, VerificationSummary};
