//! Integrity overhead benchmarks.
//!
//! Measures push/pop, bulk growth and a standalone validation at every
//! diagnostic level, so the cost of each layer shows up side by side.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use canarystack_core::{DiagnosticLevel, Stack, StackConfig};
use canarystack_membrane::global_metrics;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

const LEVELS: [DiagnosticLevel; 4] = [
    DiagnosticLevel::None,
    DiagnosticLevel::Level1,
    DiagnosticLevel::Level2,
    DiagnosticLevel::Level3,
];

/// Live elements kept on the stack while timing push/pop and validate.
const RESIDENT: usize = 64;

#[derive(Default)]
struct BenchStats {
    samples_ns_per_op: Vec<f64>,
}

impl BenchStats {
    fn record(&mut self, iters: u64, dur: Duration) {
        self.samples_ns_per_op
            .push(dur.as_nanos() as f64 / iters.max(1) as f64);
    }

    fn report(&self, level: DiagnosticLevel, bench_label: &str) {
        let mut samples = self.samples_ns_per_op.clone();
        if samples.is_empty() {
            return;
        }
        samples.sort_by(f64::total_cmp);
        let p50 = percentile_sorted(&samples, 0.50);
        let p99 = percentile_sorted(&samples, 0.99);
        println!(
            "STACK_BENCH level={level} bench={bench_label} samples={} p50_ns_op={p50:.3} p99_ns_op={p99:.3}",
            samples.len()
        );
    }
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn resident_stack(level: DiagnosticLevel) -> Option<Stack> {
    let mut stack = Stack::new(StackConfig::with_level(level)).ok()?;
    for i in 0..RESIDENT {
        stack.push(i as f64).ok()?;
    }
    Some(stack)
}

fn bench_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack");
    group.throughput(Throughput::Elements(1));

    for level in LEVELS {
        let label = level.as_str();

        // push_pop: one push and one pop on a warm stack, no reallocation.
        if let Some(mut stack) = resident_stack(level) {
            let stats = RefCell::new(BenchStats::default());
            group.bench_function(BenchmarkId::new("push_pop", label), |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();
                    for i in 0..iters {
                        let _ = black_box(stack.push(i as f64));
                        let _ = black_box(stack.pop());
                    }
                    let dur = start.elapsed().max(Duration::from_nanos(1));
                    stats.borrow_mut().record(iters, dur);
                    dur
                });
            });
            stats.borrow().report(level, "push_pop");
        }

        // validate: full layer pass over a resident stack.
        if let Some(mut stack) = resident_stack(level) {
            group.bench_function(BenchmarkId::new("validate", label), |b| {
                b.iter(|| black_box(stack.validate()));
            });
        }

        // grow_1k: fill a fresh stack through every growth step.
        group.bench_function(BenchmarkId::new("grow_1k", label), |b| {
            b.iter(|| {
                let Ok(mut stack) = Stack::new(StackConfig::with_level(level)) else {
                    return;
                };
                for i in 0..1_000 {
                    if stack.push(f64::from(i)).is_err() {
                        break;
                    }
                }
                black_box(stack.capacity());
            });
        });
    }

    group.finish();
    println!(
        "STACK_BENCH_META metrics={:?}",
        global_metrics().snapshot()
    );
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(100))
        .measurement_time(Duration::from_secs(2))
        .sample_size(50);
    targets = bench_stack
);
criterion_main!(benches);
