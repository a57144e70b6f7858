//! CLI entrypoint for the canarystack harness.

use std::path::{Path, PathBuf};

use canarystack_core::{
    DEFAULT_LOG_PATH, DiagnosticLevel, HtmlLog, LogSink, StackConfig, StackSnapshot,
    diagnostic_level, global_html_log, report,
};
use canarystack_harness::RunReport;
use canarystack_harness::demo::{DEFAULT_PUSHES, run_demo};
use canarystack_harness::fault_oracle::{InjectedFault, inject};
use canarystack_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome,
};
use canarystack_harness::verify::run_verification;
use clap::{Parser, Subcommand};

/// Integrity-checked stack tooling.
#[derive(Debug, Parser)]
#[command(name = "canarystack-harness")]
#[command(about = "Demo, fault injection and verification for canarystack")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Push a run of values, dump, clear, dump again.
    Demo {
        /// Diagnostic level (`none|level1|level2|level3`); defaults to
        /// `CANARYSTACK_LEVEL` or the build default.
        #[arg(long)]
        level: Option<String>,
        /// Number of pushes.
        #[arg(long, default_value_t = DEFAULT_PUSHES)]
        pushes: usize,
        /// HTML log path; the process-wide `log.html` when omitted.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Optional JSONL event log path.
        #[arg(long)]
        jsonl: Option<PathBuf>,
    },
    /// Trigger one misuse or corruption and dump the result.
    Inject {
        /// Condition to trigger.
        #[arg(long, value_enum)]
        fault: InjectedFault,
        /// Diagnostic level.
        #[arg(long)]
        level: Option<String>,
        /// HTML log path.
        #[arg(long, default_value = "log.html")]
        log: PathBuf,
    },
    /// Run the fault oracle, the growth walkthrough and a random sequence.
    Verify {
        /// Diagnostic level.
        #[arg(long)]
        level: Option<String>,
        /// Sequence seed (decimal or 0x...).
        #[arg(long, default_value = "0x5EED")]
        seed: String,
        /// Sequence length.
        #[arg(long, default_value_t = 2_000)]
        steps: u32,
        /// Output report path (markdown; JSON written next to it).
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Demo {
            level,
            pushes,
            log,
            jsonl,
        } => {
            let level = resolve_level(level.as_deref());
            let run_id = format!("demo-{level}");
            let mut emitter = match &jsonl {
                Some(path) => LogEmitter::to_file(path, &run_id)?,
                None => LogEmitter::discard(&run_id),
            };
            let config = StackConfig::with_level(level);
            let (run, log) = match log {
                Some(path) => {
                    let mut sink = HtmlLog::to_file(&path);
                    let run = run_demo(config, pushes, &mut sink, &mut emitter)?;
                    if let Some(err) = sink.take_error() {
                        return Err(err.into());
                    }
                    (run, path)
                }
                None => {
                    let mut sink = global_html_log().lock();
                    let run = run_demo(config, pushes, &mut *sink, &mut emitter)?;
                    if let Some(err) = sink.take_error() {
                        return Err(err.into());
                    }
                    (run, PathBuf::from(DEFAULT_LOG_PATH))
                }
            };

            for snapshot in &run.snapshots {
                print_snapshot(snapshot);
            }
            let mut index = ArtifactIndex::new(&run_id);
            index.add_file(&log, "html_log")?;
            if let Some(path) = &jsonl {
                index.add_file(path, "jsonl_events")?;
            }
            println!("{}", index.to_json()?);

            if let Some(fault) = run.fault {
                return Err(format!("demo stopped: {fault} ({})", fault.name()).into());
            }
        }
        Command::Inject { fault, level, log } => {
            let level = resolve_level(level.as_deref());
            let stack = inject(fault, StackConfig::with_level(level));
            let mut sink = HtmlLog::to_file(&log);
            let snapshot = report(&stack, &mut sink);
            if sink.is_open() {
                sink.close();
            }
            if let Some(err) = sink.take_error() {
                return Err(err.into());
            }
            print_snapshot(&snapshot);

            let expected = fault.expected(level);
            let outcome = if stack.fault() == expected {
                Outcome::Pass
            } else {
                Outcome::Fail
            };
            let trace_id = format!("canarystack::inject::{fault}");
            let entry = LogEntry::new(trace_id, LogLevel::Info, "inject")
                .with_operation(fault.name())
                .with_stack(&stack)
                .with_outcome(outcome);
            println!("{}", entry.to_jsonl()?);
            if stack.fault() != expected {
                return Err(format!(
                    "{fault}@{level}: expected {expected:?}, latched {:?}",
                    stack.fault()
                )
                .into());
            }
        }
        Command::Verify {
            level,
            seed,
            steps,
            report: report_path,
        } => {
            let level = resolve_level(level.as_deref());
            let seed = parse_seed(&seed)?;
            eprintln!("Verifying at {level} (seed={seed:#x}, steps={steps})");

            let summary = run_verification(level, seed, steps);
            let mut report_doc = RunReport::new(level.as_str(), seed, summary);

            eprintln!(
                "Verification complete: total={}, passed={}, failed={}",
                report_doc.summary.total, report_doc.summary.passed, report_doc.summary.failed
            );

            if let Some(report_path) = report_path {
                write_report(&mut report_doc, &report_path)?;
            } else {
                print!("{}", report_doc.to_markdown());
            }

            if !report_doc.summary.all_passed() {
                return Err("canarystack verification failed".into());
            }
        }
    }

    Ok(())
}

fn resolve_level(raw: Option<&str>) -> DiagnosticLevel {
    raw.map_or_else(diagnostic_level, DiagnosticLevel::from_str_loose)
}

fn print_snapshot(snapshot: &StackSnapshot) {
    for (line, _) in snapshot.lines() {
        println!("{line}");
    }
}

fn write_report(report_doc: &mut RunReport, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Writing report to {}", path.display());
    std::fs::write(path, report_doc.to_markdown())?;
    let mut index = ArtifactIndex::new(format!("verify-{}", report_doc.level));
    index.add_file(path, "markdown_report")?;
    report_doc.artifacts = index.artifacts;

    let json_path = path.with_extension("json");
    std::fs::write(&json_path, report_doc.to_json())?;
    Ok(())
}

fn parse_seed(raw: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let s = raw.trim();
    let seed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let hex = hex.replace('_', "");
        u64::from_str_radix(&hex, 16)?
    } else {
        let dec = s.replace('_', "");
        dec.parse::<u64>()?
    };
    Ok(seed)
}
