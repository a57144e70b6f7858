//! Verification runs: oracle cases, the growth walkthrough, and
//! deterministic operation sequences checked against a plain `Vec` model.

use canarystack_core::{DiagnosticLevel, MINIMUM_CAPACITY, Stack, StackConfig, StackFault};
use canarystack_membrane::is_poison;
use serde::{Deserialize, Serialize};

use crate::fault_oracle::FaultOracleSuite;

/// Result of a single verification case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Name of the case.
    pub case_name: String,
    /// Case family (`oracle`, `growth`, `sequence`).
    pub category: String,
    /// Whether the case passed.
    pub passed: bool,
    /// Expected observation.
    pub expected: String,
    /// Actual observation.
    pub actual: String,
    /// First divergence if the case failed.
    pub diff: Option<String>,
}

impl VerificationResult {
    fn compare(case_name: String, category: &str, expected: String, actual: String) -> Self {
        let passed = expected == actual;
        let diff = (!passed).then(|| format!("expected {expected}, got {actual}"));
        Self {
            case_name,
            category: category.to_string(),
            passed,
            expected,
            actual,
            diff,
        }
    }
}

/// Aggregate verification summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    /// Total cases run.
    pub total: usize,
    /// Cases passed.
    pub passed: usize,
    /// Cases failed.
    pub failed: usize,
    /// Individual results.
    pub results: Vec<VerificationResult>,
}

impl VerificationSummary {
    /// Build a summary from a list of results.
    #[must_use]
    pub fn from_results(results: Vec<VerificationResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let failed = total - passed;
        Self {
            total,
            passed,
            failed,
            results,
        }
    }

    /// Returns true if all cases passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

fn fault_label(fault: Option<StackFault>) -> String {
    fault.map_or_else(|| "NO_ERROR".to_string(), |f| f.name().to_string())
}

/// Run every oracle case at `level`.
#[must_use]
pub fn verify_oracle(level: DiagnosticLevel) -> Vec<VerificationResult> {
    FaultOracleSuite::for_level(level)
        .cases()
        .iter()
        .map(|case| {
            VerificationResult::compare(
                case.id(),
                "oracle",
                fault_label(case.expected),
                fault_label(case.observe()),
            )
        })
        .collect()
}

/// Thirteen pushes then a clear: capacity goes 10 -> 18 -> 13 (after the
/// clear), and a nineteenth push on a fresh stack reaches 32.
#[must_use]
pub fn verify_growth(level: DiagnosticLevel) -> VerificationResult {
    let expected = "13/18 0/13 19/32".to_string();
    let actual = growth_shape(level).unwrap_or_else(|fault| fault.name().to_string());
    VerificationResult::compare(format!("growth@{level}"), "growth", expected, actual)
}

fn growth_shape(level: DiagnosticLevel) -> Result<String, StackFault> {
    let config = StackConfig::with_level(level);
    let mut stack = Stack::new(config)?;
    for i in 0..13 {
        stack.push(f64::from(i) / 10.0)?;
    }
    let pushed = format!("{}/{}", stack.size(), stack.capacity());
    stack.clear()?;
    let cleared = format!("{}/{}", stack.size(), stack.capacity());

    let mut fresh = Stack::new(config)?;
    for i in 0..19 {
        fresh.push(f64::from(i))?;
    }
    Ok(format!(
        "{pushed} {cleared} {}/{}",
        fresh.size(),
        fresh.capacity()
    ))
}

/// xorshift64* generator for reproducible sequences.
#[derive(Clone, Copy, Debug)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// Seeded generator. A zero seed is remapped since xorshift sticks at 0.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    /// Next 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform-ish value in `0..bound`.
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound.max(1)
    }
}

/// Operation applied by a sequence step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceOp {
    Push,
    Pop,
    Top,
    Clear,
    ShrinkToFit,
}

impl SequenceOp {
    fn pick(rng: &mut XorShift64, empty: bool) -> Self {
        if empty {
            return Self::Push;
        }
        match rng.below(20) {
            0..=9 => Self::Push,
            10..=14 => Self::Pop,
            15..=17 => Self::Top,
            18 => Self::ShrinkToFit,
            _ => Self::Clear,
        }
    }
}

/// Run `steps` random operations from `seed` and check the container
/// invariants after each one.
#[must_use]
pub fn verify_sequence(level: DiagnosticLevel, seed: u64, steps: u32) -> VerificationResult {
    let name = format!("sequence@{level} seed={seed:#x} steps={steps}");
    let expected = format!("{steps} steps clean");
    let actual = match run_sequence(level, seed, steps) {
        Ok(()) => expected.clone(),
        Err(divergence) => divergence,
    };
    VerificationResult::compare(name, "sequence", expected, actual)
}

fn run_sequence(level: DiagnosticLevel, seed: u64, steps: u32) -> Result<(), String> {
    let mut rng = XorShift64::new(seed);
    let mut stack = Stack::new(StackConfig::with_level(level))
        .map_err(|fault| format!("construct: {}", fault.name()))?;
    let mut model: Vec<f64> = Vec::new();

    for step in 0..steps {
        let op = SequenceOp::pick(&mut rng, model.is_empty());
        let fail = |what: String| format!("step {step} {op:?}: {what}");
        match op {
            SequenceOp::Push => {
                let value = rng.below(1 << 20) as f64 / 8.0;
                stack.push(value).map_err(|f| fail(f.name().to_string()))?;
                model.push(value);
            }
            SequenceOp::Pop => {
                let got = stack.pop().map_err(|f| fail(f.name().to_string()))?;
                let want = model.pop();
                if Some(got) != want {
                    return Err(fail(format!("popped {got}, model {want:?}")));
                }
            }
            SequenceOp::Top => {
                let got = stack.top().map_err(|f| fail(f.name().to_string()))?;
                let want = model.last().copied();
                if Some(got) != want {
                    return Err(fail(format!("top {got}, model {want:?}")));
                }
            }
            SequenceOp::Clear => {
                stack.clear().map_err(|f| fail(f.name().to_string()))?;
                model.clear();
            }
            SequenceOp::ShrinkToFit => {
                let shrunk = stack
                    .shrink_to_fit()
                    .map_err(|f| fail(f.name().to_string()))?;
                if shrunk && stack.capacity() != model.len() {
                    return Err(fail(format!("shrunk to {}", stack.capacity())));
                }
            }
        }
        check_invariants(&stack, &model).map_err(fail)?;
    }
    stack
        .destruct()
        .map_err(|fault| format!("destruct: {}", fault.name()))
}

fn check_invariants(stack: &Stack, model: &[f64]) -> Result<(), String> {
    if stack.size() != model.len() {
        return Err(format!("size {} != model {}", stack.size(), model.len()));
    }
    if stack.size() > stack.capacity() {
        return Err(format!(
            "size {} beyond capacity {}",
            stack.size(),
            stack.capacity()
        ));
    }
    if stack.capacity() < MINIMUM_CAPACITY {
        return Err(format!("capacity {} below floor", stack.capacity()));
    }
    stack.inspect().map_err(|violation| violation.to_string())?;

    let buffer = stack.buffer().ok_or("buffer missing")?;
    if let Some(index) = (0..model.len()).find(|&i| buffer.slot(i) != Some(model[i])) {
        return Err(format!("slot {index} differs from model"));
    }
    if stack.level().poison_enabled()
        && let Some(index) = (model.len()..stack.capacity())
            .find(|&i| !buffer.slot(i).is_some_and(is_poison))
    {
        return Err(format!("free slot {index} not poisoned"));
    }
    Ok(())
}

/// Oracle, growth walkthrough and one sequence, all at `level`.
#[must_use]
pub fn run_verification(level: DiagnosticLevel, seed: u64, steps: u32) -> VerificationSummary {
    let mut results = verify_oracle(level);
    results.push(verify_growth(level));
    results.push(verify_sequence(level, seed, steps));
    VerificationSummary::from_results(results)
}
