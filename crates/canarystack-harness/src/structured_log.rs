//! Structured logging for harness runs.
//!
//! Provides:
//! - [`LogEntry`]: JSONL record with required fields plus stack context.
//! - [`ArtifactIndex`]: links a run to the files it produced, with SHA-256.
//! - [`LogEmitter`]: writes JSONL lines to a file or any writer.
//! - [`validate_log_line`] / [`validate_log_file`]: schema checks.

use std::io::Write;
use std::path::Path;

use canarystack_core::{DiagnosticLevel, Stack, StackFault};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
}

const LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
const OUTCOMES: [&str; 3] = ["pass", "fail", "skip"];
const DIAGNOSTICS: [&str; 4] = ["none", "level1", "level2", "level3"];

/// Structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Diagnostic level of the stack involved (`none|level1|level2|level3`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    /// Container operation (`push`, `pop`, `clear`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Fault identifier as printed in dumps (`POP_FROM_EMPTY`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_code: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_refs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            run_id: None,
            diagnostics: None,
            operation: None,
            fault: None,
            fault_code: None,
            size: None,
            capacity: None,
            outcome: None,
            artifact_refs: None,
            details: None,
        }
    }

    /// Set the run ID.
    #[must_use]
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set the diagnostic level.
    #[must_use]
    pub fn with_diagnostics(mut self, level: DiagnosticLevel) -> Self {
        self.diagnostics = Some(level.as_str().to_string());
        self
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the fault name and code.
    #[must_use]
    pub fn with_fault(mut self, fault: StackFault) -> Self {
        self.fault = Some(fault.name().to_string());
        self.fault_code = Some(fault.code());
        self
    }

    /// Copy level, size, capacity and latched fault from `stack`.
    #[must_use]
    pub fn with_stack(mut self, stack: &Stack) -> Self {
        self = self.with_diagnostics(stack.level());
        self.size = Some(stack.size());
        self.capacity = Some(stack.capacity());
        match stack.fault() {
            Some(fault) => self.with_fault(fault),
            None => self,
        }
    }

    /// Set the outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Add artifact references.
    #[must_use]
    pub fn with_artifacts(mut self, refs: Vec<String>) -> Self {
        self.artifact_refs = Some(refs);
        self
    }

    /// Set free-form details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Artifact index
// ---------------------------------------------------------------------------

/// A single artifact entry in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Files produced by one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            generated_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Add an entry whose digest is already known.
    pub fn add(
        &mut self,
        path: impl Into<String>,
        kind: impl Into<String>,
        sha256: impl Into<String>,
    ) -> &mut Self {
        self.artifacts.push(ArtifactEntry {
            path: path.into(),
            kind: kind.into(),
            sha256: sha256.into(),
            size_bytes: None,
        });
        self
    }

    /// Read `path`, fingerprint it, and add it.
    pub fn add_file(&mut self, path: &Path, kind: impl Into<String>) -> std::io::Result<&mut Self> {
        let data = std::fs::read(path)?;
        self.artifacts.push(ArtifactEntry {
            path: path.display().to_string(),
            kind: kind.into(),
            sha256: sha256_hex(&data),
            size_bytes: u64::try_from(data.len()).ok(),
        });
        Ok(self)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Lower-case hex SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes JSONL log entries with sequential trace IDs.
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    run_id: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::to_writer(Box::new(std::io::BufWriter::new(file)), run_id))
    }

    /// Create an emitter over any writer.
    #[must_use]
    pub fn to_writer(writer: Box<dyn Write>, run_id: &str) -> Self {
        Self {
            writer,
            seq: 0,
            run_id: run_id.to_string(),
        }
    }

    /// Create an emitter that drops every line.
    #[must_use]
    pub fn discard(run_id: &str) -> Self {
        Self::to_writer(Box::new(std::io::sink()), run_id)
    }

    /// Lines written so far.
    #[must_use]
    pub const fn emitted(&self) -> u64 {
        self.seq
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("canarystack::{}::{:03}", self.run_id, self.seq)
    }

    /// Emit a bare entry with an auto-generated trace ID.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(trace_id, level, event).with_run(&self.run_id);
        self.write_line(&entry)?;
        Ok(entry)
    }

    /// Emit a populated entry, filling in trace and run IDs when empty.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        } else {
            self.seq += 1;
        }
        if entry.run_id.is_none() {
            entry.run_id = Some(self.run_id.clone());
        }
        self.write_line(&entry)
    }

    fn write_line(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl std::fmt::Debug for LogEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEmitter")
            .field("seq", &self.seq)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: field '{field}': {message}")]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl LogValidationError {
    fn new(line_number: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            line_number,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a single JSONL line against the schema.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            errors.push(LogValidationError::new(
                line_number,
                "<json>",
                format!("invalid JSON: {e}"),
            ));
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        errors.push(LogValidationError::new(
            line_number,
            "<root>",
            "expected JSON object",
        ));
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            errors.push(LogValidationError::new(
                line_number,
                field,
                "required field missing",
            ));
        }
    }

    let enums: [(&str, &[&str]); 3] = [
        ("level", &LEVELS),
        ("outcome", &OUTCOMES),
        ("diagnostics", &DIAGNOSTICS),
    ];
    for (field, allowed) in enums {
        if let Some(v) = obj.get(field).and_then(|v| v.as_str())
            && !allowed.contains(&v)
        {
            errors.push(LogValidationError::new(
                line_number,
                field,
                format!("invalid {field}: '{v}'"),
            ));
        }
    }

    // Fault name and code must agree with each other.
    let fault = obj.get("fault").and_then(|v| v.as_str());
    let code = obj.get("fault_code").and_then(serde_json::Value::as_u64);
    match (fault, code) {
        (None, None) => {}
        (Some(name), Some(code)) => {
            let known = StackFault::ALL
                .iter()
                .find(|f| f.name() == name)
                .map(|f| u64::from(f.code()));
            match known {
                None => errors.push(LogValidationError::new(
                    line_number,
                    "fault",
                    format!("unknown fault: '{name}'"),
                )),
                Some(expected) if expected != code => errors.push(LogValidationError::new(
                    line_number,
                    "fault_code",
                    format!("code {code} does not match {name} ({expected})"),
                )),
                Some(_) => {}
            }
        }
        _ => errors.push(LogValidationError::new(
            line_number,
            "fault",
            "fault and fault_code must appear together",
        )),
    }

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && !trace_id.contains("::")
    {
        errors.push(LogValidationError::new(
            line_number,
            "trace_id",
            format!("trace_id should follow canarystack::<run_id>::<seq>, got: '{trace_id}'"),
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value::<LogEntry>(value).map_err(|e| {
        vec![LogValidationError::new(
            line_number,
            "<deserialization>",
            format!("failed to deserialize: {e}"),
        )]
    })
}

/// Validate an entire JSONL file. Returns the non-empty line count and
/// every error found.
pub fn validate_log_file(path: &Path) -> std::io::Result<(usize, Vec<LogValidationError>)> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = secs / 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    )
}

/// Gregorian date for a day count since 1970-01-01.
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canarystack_core::StackConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn entry_serializes_required_fields_only() {
        let entry = LogEntry::new("canarystack::run-1::001", LogLevel::Info, "demo_start");
        let parsed: serde_json::Value = serde_json::from_str(&entry.to_jsonl().unwrap()).unwrap();
        assert!(parsed["timestamp"].is_string());
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "demo_start");
        assert!(parsed.get("fault").is_none());
        assert!(parsed.get("size").is_none());
    }

    #[test]
    fn entry_carries_stack_context() {
        let mut stack =
            Stack::new(StackConfig::with_level(DiagnosticLevel::Level2)).unwrap();
        stack.pop().unwrap_err();
        let entry = LogEntry::new("canarystack::r::001", LogLevel::Error, "fault")
            .with_operation("pop")
            .with_stack(&stack)
            .with_outcome(Outcome::Fail);
        let parsed: serde_json::Value = serde_json::from_str(&entry.to_jsonl().unwrap()).unwrap();
        assert_eq!(parsed["diagnostics"], "level2");
        assert_eq!(parsed["fault"], "POP_FROM_EMPTY");
        assert_eq!(parsed["fault_code"], 1);
        assert_eq!(parsed["size"], 0);
        assert_eq!(parsed["capacity"], 10);
        assert!(validate_log_line(&entry.to_jsonl().unwrap(), 1).is_ok());
    }

    #[test]
    fn emitter_numbers_trace_ids() {
        let buf = SharedBuf::default();
        let mut emitter = LogEmitter::to_writer(Box::new(buf.clone()), "t");
        emitter.emit(LogLevel::Info, "a").unwrap();
        emitter
            .emit_entry(LogEntry::new("", LogLevel::Debug, "b"))
            .unwrap();
        assert_eq!(emitter.emitted(), 2);

        let text = String::from_utf8(buf.0.borrow().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second = validate_log_line(lines[1], 2).unwrap();
        assert_eq!(second.trace_id, "canarystack::t::002");
        assert_eq!(second.run_id.as_deref(), Some("t"));
    }

    #[test]
    fn invalid_lines_are_reported() {
        let missing = r#"{"timestamp":"x","level":"info","event":"e"}"#;
        let errors = validate_log_line(missing, 3).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "trace_id"));
        assert_eq!(errors[0].line_number, 3);

        let bad_level = r#"{"timestamp":"x","trace_id":"a::b::c","level":"loud","event":"e"}"#;
        assert!(validate_log_line(bad_level, 1).is_err());

        let mismatched = r#"{"timestamp":"x","trace_id":"a::b::c","level":"info","event":"e","fault":"POP_FROM_EMPTY","fault_code":7}"#;
        let errors = validate_log_line(mismatched, 1).unwrap_err();
        assert_eq!(errors[0].field, "fault_code");

        assert!(validate_log_line("not json", 1).is_err());
        assert!(validate_log_line("[1]", 1).is_err());
    }

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn artifact_index_fingerprints_files() {
        let path = std::env::temp_dir().join(format!(
            "canarystack-artifact-{}.txt",
            std::process::id()
        ));
        std::fs::write(&path, b"abc").unwrap();
        let mut index = ArtifactIndex::new("run");
        index.add_file(&path, "html_log").unwrap();
        assert_eq!(index.artifacts[0].size_bytes, Some(3));
        assert!(index.artifacts[0].sha256.starts_with("ba7816bf"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn utc_formatting() {
        assert_eq!(format_utc(0, 0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_utc(951_782_400, 5), "2000-02-29T00:00:00.005Z");
        assert_eq!(format_utc(1_700_000_000, 123), "2023-11-14T22:13:20.123Z");
    }
}
