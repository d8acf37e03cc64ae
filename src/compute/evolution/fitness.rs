//! Fitness contract and program evaluation.
//!
//! A fitness function turns genes into an [`Evaluation`]. Most fitness
//! functions decode the genes with a [`ProgramRunner`], run the program on a
//! private interpreter and score the captured output. Faults never escape:
//! they are reported on the evaluation and scored like any other output.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::compute::decoder::ProgramDecoder;
use crate::compute::vm::{ExitStatus, Fault, Interpreter};
use crate::schema::VmOptions;

/// Score reported for an exact solution. Stops the engine.
pub const SOLUTION_FITNESS: f64 = f64::MAX;

/// Fitness contract consumed by the evolution engine.
///
/// Implementations are shared across ranking threads, so `evaluate` takes
/// `&self` and must keep per-evaluation state local.
pub trait Fitness: Sync {
    /// Evaluate one genome.
    fn evaluate(&self, genes: &[f64]) -> Evaluation;

    /// True fitness at which the problem counts as solved (0 = none).
    fn target_fitness(&self) -> f64 {
        0.0
    }
}

/// Plain scoring closures: the score doubles as the true fitness.
impl<F> Fitness for F
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn evaluate(&self, genes: &[f64]) -> Evaluation {
        Evaluation::from_score(self(genes))
    }
}

/// Result of evaluating a single genome.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Ranking score. May include secondary bonuses.
    pub score: f64,
    /// Score used for solution detection.
    pub true_fitness: f64,
    /// Decoded program source.
    pub program: String,
    /// Captured program output.
    pub output: String,
    /// Instructions executed.
    pub ticks: u32,
    /// Fault raised by the program, if any.
    pub fault: Option<Fault>,
}

impl Evaluation {
    /// Evaluation with no program attached.
    pub fn from_score(score: f64) -> Self {
        Self {
            score,
            true_fitness: score,
            ..Default::default()
        }
    }

    /// Whether the score marks an exact solution.
    pub fn is_solution(&self) -> bool {
        self.score == SOLUTION_FITNESS
    }
}

// ============================================================================
// Program Runner
// ============================================================================

/// Decodes genes and runs the resulting program on a fresh interpreter.
#[derive(Debug, Clone)]
pub struct ProgramRunner {
    decoder: ProgramDecoder,
    options: VmOptions,
    max_instructions: u32,
    append_code: Option<String>,
}

impl ProgramRunner {
    /// Create a runner with an instruction budget (0 = unlimited).
    pub fn new(decoder: ProgramDecoder, max_instructions: u32) -> Self {
        Self {
            decoder,
            options: VmOptions::default(),
            max_instructions,
            append_code: None,
        }
    }

    /// Set interpreter options.
    pub fn with_options(mut self, options: VmOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a fixed function library after every decoded program.
    ///
    /// The library should start with `@` so the decoded main program ends
    /// before the first function body.
    pub fn with_appended_code(mut self, code: impl Into<String>) -> Self {
        self.append_code = Some(code.into());
        self
    }

    pub fn max_instructions(&self) -> u32 {
        self.max_instructions
    }

    pub fn decoder(&self) -> &ProgramDecoder {
        &self.decoder
    }

    /// Decoded program including any appended code.
    pub fn program(&self, genes: &[f64]) -> String {
        let mut program = self.decoder.decode(genes);
        if let Some(code) = &self.append_code {
            program.push_str(code);
        }
        program
    }

    /// Decode and run genes. Input bytes are consumed in order, then zeros.
    pub fn run_genes(&self, genes: &[f64], input: &[u8]) -> ProgramRun {
        self.run_source(self.program(genes), input)
    }

    /// Run an already decoded program.
    pub fn run_source(&self, program: String, input: &[u8]) -> ProgramRun {
        let mut inputs = input.iter().copied();
        let mut output = Vec::new();

        let (status, ticks, executed_functions) = {
            let mut vm = Interpreter::new(
                &program,
                move || inputs.next().unwrap_or(0),
                |b| output.push(b),
                self.options,
            );
            let status = vm.run(self.max_instructions);
            let ticks = vm.ticks();
            (status, ticks, vm.into_executed_functions())
        };

        ProgramRun {
            program,
            output,
            ticks,
            status,
            executed_functions,
        }
    }
}

/// Outcome of running one program.
#[derive(Debug, Clone)]
pub struct ProgramRun {
    /// Program source that was run.
    pub program: String,
    /// Bytes written by `.`, including any produced before a fault.
    pub output: Vec<u8>,
    /// Ticks at the end of the run.
    pub ticks: u32,
    /// How the run ended.
    pub status: Result<ExitStatus, Fault>,
    /// Calls made from the main program, per function letter.
    pub executed_functions: BTreeMap<char, u32>,
}

impl ProgramRun {
    /// Output bytes as text, one char per byte.
    pub fn output_text(&self) -> String {
        self.output.iter().map(|&b| char::from(b)).collect()
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.status.as_ref().err()
    }
}

// ============================================================================
// Reference Fitness
// ============================================================================

/// Rewards programs that print a target string.
///
/// True fitness sums `256 - |diff|` over every target position the program
/// printed, adds a length bonus of 10 for an exact length and subtracts 1 on
/// fault. Unsolved programs earn a secondary bonus for using fewer ticks.
pub struct TargetStringFitness {
    target: Vec<u8>,
    runner: ProgramRunner,
    cancel: Option<Arc<AtomicBool>>,
}

impl TargetStringFitness {
    /// Create for a target string.
    pub fn new(target: impl Into<String>, runner: ProgramRunner) -> Self {
        Self {
            target: target.into().into_bytes(),
            runner,
            cancel: None,
        }
    }

    /// Set the engine's stop flag when a solution is found.
    pub fn with_cancel_handle(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn runner(&self) -> &ProgramRunner {
        &self.runner
    }

    /// Score printed output against the target.
    fn true_fitness(&self, output: &[u8], faulted: bool) -> f64 {
        let mut fitness = if faulted { -1.0 } else { 0.0 };

        for (&expected, &actual) in self.target.iter().zip(output) {
            fitness += 256.0 - (expected as f64 - actual as f64).abs();
        }

        // Whole tens only: partial length matches earn nothing
        let len = self.target.len() as i64;
        if len > 0 {
            let off_by = (output.len() as i64 - len).abs();
            fitness += (10 * ((len - off_by) / len)) as f64;
        }

        fitness
    }
}

impl Fitness for TargetStringFitness {
    fn evaluate(&self, genes: &[f64]) -> Evaluation {
        let run = self.runner.run_genes(genes, &[]);
        let true_fitness = self.true_fitness(&run.output, run.fault().is_some());

        let score = if true_fitness >= self.target_fitness() {
            if let Some(cancel) = &self.cancel {
                cancel.store(true, Ordering::Relaxed);
            }
            SOLUTION_FITNESS
        } else {
            let max = self.runner.max_instructions();
            let bonus = if max > 0 {
                (max as f64 - run.ticks as f64) / 20.0
            } else {
                0.0
            };
            true_fitness + bonus
        };

        Evaluation {
            score,
            true_fitness,
            output: run.output_text(),
            ticks: run.ticks,
            fault: run.status.err(),
            program: run.program,
        }
    }

    fn target_fitness(&self) -> f64 {
        self.target.len() as f64 * 256.0 + 10.0
    }
}
