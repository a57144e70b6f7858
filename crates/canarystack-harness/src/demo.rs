//! Demo driver: push a run of values, dump, clear, dump again.
//!
//! Each stack operation becomes one JSONL event and each dump one block in
//! the HTML log. A fault ends the walkthrough early; the faulted dump closes
//! the log on its own.

use canarystack_core::{LogSink, Stack, StackConfig, StackFault, StackSnapshot, report};
use serde::Serialize;

use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

/// Name given to the demo stack.
pub const DEMO_STACK_NAME: &str = "demo";

/// Pushes performed by default.
pub const DEFAULT_PUSHES: usize = 13;

/// What a demo run produced.
#[derive(Debug, Clone, Serialize)]
pub struct DemoRun {
    /// Dumps in the order they were written.
    pub snapshots: Vec<StackSnapshot>,
    /// Fault that stopped the walkthrough, if any.
    pub fault: Option<StackFault>,
}

impl DemoRun {
    /// Returns true when the walkthrough finished without a fault.
    #[must_use]
    pub const fn completed(&self) -> bool {
        self.fault.is_none()
    }
}

/// `i / 10` for the `i`-th push.
#[must_use]
pub fn demo_value(i: usize) -> f64 {
    i as f64 / 10.0
}

fn event(stack: &Stack, operation: &str, result: Result<(), StackFault>) -> LogEntry {
    let (level, outcome) = match result {
        Ok(()) => (LogLevel::Debug, Outcome::Pass),
        Err(_) => (LogLevel::Error, Outcome::Fail),
    };
    LogEntry::new("", level, "stack_op")
        .with_operation(operation)
        .with_stack(stack)
        .with_outcome(outcome)
}

/// Run the walkthrough with `pushes` pushes, dumping into `sink` and logging
/// events to `emitter`. Only I/O on the event stream is an error; stack
/// faults are part of the result.
pub fn run_demo(
    config: StackConfig,
    pushes: usize,
    sink: &mut dyn LogSink,
    emitter: &mut LogEmitter,
) -> std::io::Result<DemoRun> {
    emitter.emit_entry(
        LogEntry::new("", LogLevel::Info, "demo_start")
            .with_diagnostics(config.level)
            .with_details(serde_json::json!({ "pushes": pushes })),
    )?;
    if !sink.is_open() {
        sink.open();
    }

    let mut stack = Stack::declare(Some(DEMO_STACK_NAME), config);
    let mut snapshots = Vec::new();

    let constructed = stack.construct(None);
    emitter.emit_entry(event(&stack, "construct", constructed))?;

    if constructed.is_ok() {
        for i in 0..pushes {
            let pushed = stack.push(demo_value(i));
            if pushed.is_err() {
                emitter.emit_entry(
                    event(&stack, "push", pushed)
                        .with_details(serde_json::json!({ "index": i })),
                )?;
                break;
            }
        }
        emitter.emit_entry(event(&stack, "push_run", stack.status().check()))?;
    }
    snapshots.push(report(&stack, sink));

    if stack.fault().is_none() {
        let cleared = stack.clear();
        emitter.emit_entry(event(&stack, "clear", cleared))?;
        snapshots.push(report(&stack, sink));
    }
    if stack.fault().is_none() {
        let destructed = stack.destruct();
        emitter.emit_entry(event(&stack, "destruct", destructed))?;
    }

    if sink.is_open() {
        sink.close();
    }
    let fault = stack.fault();
    let mut end = LogEntry::new("", LogLevel::Info, "demo_end").with_diagnostics(config.level);
    end = match fault {
        Some(fault) => end.with_fault(fault).with_outcome(Outcome::Fail),
        None => end.with_outcome(Outcome::Pass),
    };
    emitter.emit_entry(end)?;
    emitter.flush()?;

    Ok(DemoRun { snapshots, fault })
}

#[cfg(test)]
mod tests {
    use super::*;
    use canarystack_core::{DiagnosticLevel, HtmlLog};

    #[test]
    fn default_walkthrough() {
        let mut log = HtmlLog::in_memory();
        let mut emitter = LogEmitter::discard("demo-test");
        let run = run_demo(
            StackConfig::with_level(DiagnosticLevel::Level3),
            DEFAULT_PUSHES,
            &mut log,
            &mut emitter,
        )
        .unwrap();

        assert!(run.completed());
        assert_eq!(run.snapshots.len(), 2);
        let pushed = run.snapshots[0].body.as_ref().unwrap();
        assert_eq!((pushed.size, pushed.capacity), (13, 18));
        assert_eq!(pushed.slots[12].value, demo_value(12));
        let cleared = run.snapshots[1].body.as_ref().unwrap();
        assert_eq!((cleared.size, cleared.capacity), (0, 13));

        assert!(!log.is_open());
        let html = log.contents().unwrap();
        assert_eq!(html.matches("<pre style=\"color:green;\">").count(), 2);
        assert!(html.contains("&quot;demo&quot;"));
        assert!(html.ends_with("</html>"));
        assert!(emitter.emitted() >= 6);
    }

    #[test]
    fn allocation_limit_stops_early() {
        let config = StackConfig::with_level(DiagnosticLevel::Level1).with_allocation_limit(80);
        let mut log = HtmlLog::in_memory();
        let mut emitter = LogEmitter::discard("demo-test");
        let run = run_demo(config, DEFAULT_PUSHES, &mut log, &mut emitter).unwrap();

        assert_eq!(run.fault, Some(StackFault::ReallocationFailed));
        assert_eq!(run.snapshots.len(), 1);
        let html = log.contents().unwrap();
        assert!(html.contains("REALLOCATION_FAILED"));
        assert!(html.contains("<pre style=\"color:red;\">"));
    }

    #[test]
    fn zero_pushes() {
        let mut log = HtmlLog::in_memory();
        let mut emitter = LogEmitter::discard("demo-test");
        let run = run_demo(
            StackConfig::with_level(DiagnosticLevel::None),
            0,
            &mut log,
            &mut emitter,
        )
        .unwrap();
        assert!(run.completed());
        assert_eq!(run.snapshots[0].body.as_ref().unwrap().size, 0);
    }
}
