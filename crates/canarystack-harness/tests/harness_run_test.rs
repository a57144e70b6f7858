//! Integration test: full harness runs across diagnostic levels.
//!
//! Run: cargo test -p canarystack-harness --test harness_run_test

use std::path::PathBuf;

use canarystack_core::{DiagnosticLevel, HtmlLog, StackConfig, StackFault};
use canarystack_harness::RunReport;
use canarystack_harness::demo::{DEFAULT_PUSHES, run_demo};
use canarystack_harness::fault_oracle::{FaultOracleCase, InjectedFault};
use canarystack_harness::structured_log::{
    ArtifactIndex, LogEmitter, sha256_hex, validate_log_file,
};
use canarystack_harness::verify::run_verification;

const LEVELS: [DiagnosticLevel; 4] = [
    DiagnosticLevel::None,
    DiagnosticLevel::Level1,
    DiagnosticLevel::Level2,
    DiagnosticLevel::Level3,
];

fn temp_path(tag: &str, ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "canarystack-harness-{tag}-{}.{ext}",
        std::process::id()
    ))
}

#[test]
fn verification_passes_at_every_level() {
    for level in LEVELS {
        let summary = run_verification(level, 0x5EED, 400);
        let failures: Vec<_> = summary.results.iter().filter(|r| !r.passed).collect();
        assert!(failures.is_empty(), "level {level}: {failures:#?}");
        assert_eq!(summary.total, InjectedFault::ALL.len() + 2);
    }
}

#[test]
fn detection_widens_with_level() {
    let detected = |level: DiagnosticLevel| {
        InjectedFault::ALL
            .iter()
            .map(|&fault| FaultOracleCase::new(fault, level).observe())
            .filter(|&observed| observed == Some(StackFault::CorruptionDetected))
            .count()
    };
    let counts: Vec<usize> = LEVELS.iter().map(|&level| detected(level)).collect();
    assert_eq!(counts, vec![0, 2, 4, 5]);
}

#[test]
fn demo_writes_valid_artifacts() {
    let html = temp_path("demo", "html");
    let jsonl = temp_path("demo", "jsonl");

    let mut sink = HtmlLog::to_file(&html);
    let mut emitter = LogEmitter::to_file(&jsonl, "it").unwrap();
    let run = run_demo(
        StackConfig::with_level(DiagnosticLevel::Level3),
        DEFAULT_PUSHES,
        &mut sink,
        &mut emitter,
    )
    .unwrap();
    drop(emitter);
    assert!(run.completed());

    let document = std::fs::read_to_string(&html).unwrap();
    assert!(document.starts_with("<!DOCTYPE html>"));
    assert!(document.contains("capacity     = 18"));
    assert!(document.contains("capacity     = 13"));

    let (lines, errors) = validate_log_file(&jsonl).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert!(lines >= 6);

    let mut index = ArtifactIndex::new("it");
    index.add_file(&html, "html_log").unwrap();
    assert_eq!(index.artifacts[0].sha256, sha256_hex(document.as_bytes()));

    let _ = std::fs::remove_file(&html);
    let _ = std::fs::remove_file(&jsonl);
}

#[test]
fn report_renders_summary() {
    let summary = run_verification(DiagnosticLevel::Level1, 3, 100);
    let report = RunReport::new("level1", 3, summary);
    let md = report.to_markdown();
    assert!(md.contains("| bit-flip@level1 | oracle | PASS | NO_ERROR |"));
    assert!(md.contains("| stray-write@level1 | oracle | PASS | MEMORY_CORRUPTION |"));
    assert!(md.contains("growth@level1"));
}
