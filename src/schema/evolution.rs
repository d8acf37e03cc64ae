//! Evolution configuration and state types for program search.
//!
//! This module provides the records shared between the evolution engine,
//! its generation observers and the checkpoint codec.

use serde::{Deserialize, Serialize};

/// Top-level configuration for a genetic programming run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Crossover, mutation and elitism settings.
    #[serde(default)]
    pub operators: OperatorConfig,
    /// Optional genome growth schedule.
    #[serde(default)]
    pub expansion: Option<ExpansionSchedule>,
    /// Evaluation settings (parallelism).
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            operators: OperatorConfig::default(),
            expansion: None,
            evaluation: EvaluationConfig::default(),
            random_seed: None,
        }
    }
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of genomes in every generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Initial number of genes per genome (one instruction per gene).
    #[serde(default = "default_genome_length")]
    pub genome_length: usize,
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Target true fitness. When unset the fitness function's own target is used.
    #[serde(default)]
    pub target_fitness: Option<f64>,
    /// Consecutive generations at or above target required before stopping.
    #[serde(default = "default_target_streak")]
    pub target_streak: usize,
    /// Log a progress line every N generations.
    #[serde(default = "default_log_interval")]
    pub log_interval: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            genome_length: default_genome_length(),
            max_generations: default_max_generations(),
            target_fitness: None,
            target_streak: default_target_streak(),
            log_interval: default_log_interval(),
        }
    }
}

fn default_population_size() -> usize {
    100
}
fn default_genome_length() -> usize {
    100
}
fn default_max_generations() -> usize {
    10_000
}
fn default_target_streak() -> usize {
    500
}
fn default_log_interval() -> usize {
    100
}

/// Genetic operator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Probability that a selected pair is recombined (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Per-gene replacement probability (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Mutation policy applied to every child.
    #[serde(default)]
    pub mutation: MutationPolicy,
    /// Carry the two best genomes into the next generation unchanged.
    #[serde(default = "default_elitism")]
    pub elitism: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            mutation: MutationPolicy::default(),
            elitism: default_elitism(),
        }
    }
}

fn default_crossover_rate() -> f64 {
    0.7
}
fn default_mutation_rate() -> f64 {
    0.01
}
fn default_elitism() -> bool {
    true
}

/// Mutation policy for genomes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MutationPolicy {
    /// Each gene is independently replaced with probability `mutation_rate`.
    PerGene,
    /// One of insertion, deletion or per-gene replacement, chosen uniformly
    /// on every call. Insertion and deletion shift the genes so program
    /// length can drift while the genome length stays fixed.
    #[default]
    ShiftOrReplace,
}

/// Genome growth schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionSchedule {
    /// Genes appended at each expansion.
    pub amount: usize,
    /// Generations between expansions.
    pub interval: usize,
    /// Upper bound on genome length.
    #[serde(default)]
    pub max_length: Option<usize>,
}

/// Evaluation settings for fitness computation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaluationConfig {
    /// Number of parallel evaluations (0 = rayon global pool).
    #[serde(default)]
    pub parallel_workers: usize,
}

// ============================================================================
// Genome Representation
// ============================================================================

/// A fixed-length vector of genes in [0, 1), decoded into a program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Genome {
    /// Gene values.
    pub genes: Vec<f64>,
    /// Fitness from the most recent ranking.
    #[serde(default)]
    pub fitness: f64,
    /// Generations this genome survived unchanged through elitism.
    #[serde(default)]
    pub age: u32,
}

impl Genome {
    /// Wrap gene values in an unranked genome.
    pub fn from_genes(genes: Vec<f64>) -> Self {
        Self {
            genes,
            fitness: 0.0,
            age: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

// ============================================================================
// Run State
// ============================================================================

/// Configuration plus the mutable run state owned by the engine.
///
/// Only written between generations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaParams {
    /// Run configuration.
    pub config: EvolutionConfig,
    /// Current genome length (grows with the expansion schedule).
    pub genome_length: usize,
    /// Current generation counter.
    pub generation: usize,
    /// Effective target fitness (0 = none).
    pub target_fitness: f64,
    /// Consecutive generations at or above the target.
    pub target_streak: usize,
    /// Sum of clamped fitness over the ranked population.
    pub total_fitness: f64,
}

impl GaParams {
    /// Fresh run state for a configuration.
    pub fn new(config: EvolutionConfig) -> Self {
        let genome_length = config.population.genome_length;
        let target_fitness = config.population.target_fitness.unwrap_or(0.0);
        Self {
            config,
            genome_length,
            generation: 0,
            target_fitness,
            target_streak: 0,
            total_fitness: 0.0,
        }
    }
}

/// Serializable engine state: parameters plus both generation buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaSnapshot {
    /// Parameters and counters.
    pub params: GaParams,
    /// Ranked current generation (ascending fitness).
    pub this_generation: Vec<Genome>,
    /// Reproduction buffer from the last generation step.
    #[serde(default)]
    pub next_generation: Vec<Genome>,
    /// Cumulative fitness table matching `this_generation`.
    #[serde(default)]
    pub fitness_table: Vec<f64>,
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Read-only view passed to generation observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Current generation number.
    pub generation: usize,
    /// Generation limit.
    pub total_generations: usize,
    /// Genes per genome.
    pub genome_length: usize,
    /// Genomes per generation.
    pub population_size: usize,
    /// Best ranking score this generation.
    pub best_fitness: f64,
    /// Best true fitness this generation.
    pub best_true_fitness: f64,
    /// Average ranking score this generation.
    pub avg_fitness: f64,
    /// Effective target fitness (0 = none).
    pub target_fitness: f64,
    /// Consecutive generations at or above target.
    pub target_streak: usize,
    /// Best candidate of this generation.
    pub best_candidate: Option<CandidateSnapshot>,
    /// Current phase of the run.
    pub phase: EvolutionPhase,
}

/// Snapshot of an evaluated genome.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CandidateSnapshot {
    /// Gene values.
    pub genes: Vec<f64>,
    /// Ranking score.
    pub fitness: f64,
    /// Solution-detection fitness.
    pub true_fitness: f64,
    /// Decoded program source.
    pub program: String,
    /// Captured program output.
    pub output: String,
    /// Instructions executed.
    pub ticks: u32,
    /// Execution fault, if the program faulted.
    pub fault: Option<String>,
    /// Generations survived through elitism.
    pub age: u32,
}

/// Evolution history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f64>,
    /// Average fitness per generation.
    pub avg_fitness: Vec<f64>,
    /// Genome length per generation.
    pub genome_length: Vec<usize>,
}

/// Current phase of evolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Creating and ranking the initial population.
    #[default]
    Initializing,
    /// Running generations.
    Evolving,
    /// Evolution complete.
    Complete,
    /// Evolution stopped early.
    Stopped,
}

/// Final result of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best candidate of the final generation.
    pub best: CandidateSnapshot,
    /// Statistics from the run.
    pub stats: EvolutionStats,
    /// Full history for analysis.
    pub history: EvolutionHistory,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generation counter at the end of the run.
    pub generations: usize,
    /// Total fitness evaluations performed.
    pub total_evaluations: u64,
    /// Best ranking score in the final generation.
    pub best_fitness: f64,
    /// Average ranking score in the final generation.
    pub final_avg_fitness: f64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// Held the target fitness for longer than the streak threshold.
    TargetReached,
    /// A fitness evaluation reported an exact solution.
    SolutionFound,
    /// Stop flag set externally.
    Cancelled,
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Genome size not set")]
    ZeroGenomeLength,
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
    #[error("Invalid expansion schedule: {0}")]
    InvalidExpansion(String),
    #[error("Log interval must be positive")]
    InvalidLogInterval,
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        if self.population.size < 2 {
            return Err(EvolutionConfigError::PopulationTooSmall);
        }
        if self.population.genome_length == 0 {
            return Err(EvolutionConfigError::ZeroGenomeLength);
        }
        if self.population.log_interval == 0 {
            return Err(EvolutionConfigError::InvalidLogInterval);
        }

        let check_rate = |rate: f64, name: &str| {
            if (0.0..=1.0).contains(&rate) {
                Ok(())
            } else {
                Err(EvolutionConfigError::InvalidRate(format!(
                    "{} ({}) must be between 0 and 1",
                    name, rate
                )))
            }
        };

        check_rate(self.operators.crossover_rate, "crossover_rate")?;
        check_rate(self.operators.mutation_rate, "mutation_rate")?;

        if let Some(expansion) = &self.expansion {
            if expansion.interval == 0 {
                return Err(EvolutionConfigError::InvalidExpansion(
                    "interval must be positive".to_string(),
                ));
            }
            if let Some(max) = expansion.max_length
                && max < self.population.genome_length
            {
                return Err(EvolutionConfigError::InvalidExpansion(format!(
                    "max_length ({}) < genome_length ({})",
                    max, self.population.genome_length
                )));
            }
        }

        Ok(())
    }
}
