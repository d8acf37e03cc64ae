//! Generational genetic algorithm over program genomes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::schema::{
    CandidateSnapshot, EvolutionConfig, EvolutionConfigError, EvolutionHistory, EvolutionPhase,
    EvolutionProgress, EvolutionResult, EvolutionStats, GaParams, GaSnapshot, Genome, StopReason,
};

use super::fitness::{Evaluation, Fitness};
use super::genome::GenomeRng;

/// Number of top genomes carried over unchanged when elitism is enabled.
pub const ELITE_COUNT: usize = 2;

/// Evolution engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] EvolutionConfigError),
    #[error("Genome index {index} out of range for population of {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A genome together with its latest evaluation.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The genome.
    pub genome: Genome,
    /// Latest evaluation.
    pub evaluation: Evaluation,
}

impl Candidate {
    fn new(genome: Genome) -> Self {
        Self {
            genome,
            evaluation: Evaluation::default(),
        }
    }

    /// Convert to snapshot for serialization.
    pub fn to_snapshot(&self) -> CandidateSnapshot {
        CandidateSnapshot {
            genes: self.genome.genes.clone(),
            fitness: self.genome.fitness,
            true_fitness: self.evaluation.true_fitness,
            program: self.evaluation.program.clone(),
            output: self.evaluation.output.clone(),
            ticks: self.evaluation.ticks,
            fault: self.evaluation.fault.as_ref().map(|f| f.to_string()),
            age: self.genome.age,
        }
    }
}

/// Evolution engine that runs the search.
///
/// The population is kept sorted ascending by fitness after every ranking,
/// so the best genome is last.
pub struct EvolutionEngine<F: Fitness> {
    params: GaParams,
    fitness: F,
    rng: GenomeRng,
    population: Vec<Candidate>,
    /// Reproduction buffer; holds the previous generation after a step.
    next_generation: Vec<Genome>,
    /// Cumulative clamped fitness, parallel to `population`.
    fitness_table: Vec<f64>,
    history: EvolutionHistory,
    evaluations: u64,
    solution_found: bool,
    cancelled: Arc<AtomicBool>,
}

impl<F: Fitness> EvolutionEngine<F> {
    /// Create a new evolution engine.
    pub fn new(config: EvolutionConfig, fitness: F) -> Self {
        let seed = config.random_seed.unwrap_or_else(rand::random);

        Self {
            params: GaParams::new(config),
            fitness,
            rng: GenomeRng::new(seed),
            population: Vec::new(),
            next_generation: Vec::new(),
            fitness_table: Vec::new(),
            history: EvolutionHistory::default(),
            evaluations: 0,
            solution_found: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Restore an engine from a snapshot. The run continues from the saved
    /// generation without re-initializing the population.
    pub fn from_snapshot(snapshot: GaSnapshot, fitness: F) -> Result<Self, EvolutionError> {
        let GaSnapshot {
            params,
            this_generation,
            next_generation,
            ..
        } = snapshot;

        params.config.validate()?;
        if this_generation.len() != params.config.population.size {
            return Err(EvolutionError::InvalidSnapshot(format!(
                "population holds {} genomes, expected {}",
                this_generation.len(),
                params.config.population.size
            )));
        }
        if let Some(bad) = this_generation
            .iter()
            .find(|g| g.len() != params.genome_length)
        {
            return Err(EvolutionError::InvalidSnapshot(format!(
                "genome of length {} in a population of length {}",
                bad.len(),
                params.genome_length
            )));
        }

        // Resumed runs seed from the saved generation
        let seed = params
            .config
            .random_seed
            .map(|s| s.wrapping_add(params.generation as u64))
            .unwrap_or_else(rand::random);

        let population: Vec<Candidate> = this_generation
            .into_iter()
            .map(|genome| Candidate {
                evaluation: Evaluation::from_score(genome.fitness),
                genome,
            })
            .collect();

        let mut engine = Self {
            params,
            fitness,
            rng: GenomeRng::new(seed),
            population,
            next_generation,
            fitness_table: Vec::new(),
            history: EvolutionHistory::default(),
            evaluations: 0,
            solution_found: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        engine.sort_and_tabulate();

        Ok(engine)
    }

    /// Capture the engine state.
    pub fn snapshot(&self) -> GaSnapshot {
        GaSnapshot {
            params: self.params.clone(),
            this_generation: self.population.iter().map(|c| c.genome.clone()).collect(),
            next_generation: self.next_generation.clone(),
            fitness_table: self.fitness_table.clone(),
        }
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn params(&self) -> &GaParams {
        &self.params
    }

    pub fn fitness(&self) -> &F {
        &self.fitness
    }

    /// Ranked population, ascending by fitness.
    pub fn population(&self) -> &[Candidate] {
        &self.population
    }

    /// Cumulative fitness table matching the ranked population.
    pub fn fitness_table(&self) -> &[f64] {
        &self.fitness_table
    }

    /// Fittest genome of the current generation.
    pub fn best(&self) -> Result<&Genome, EvolutionError> {
        self.nth(self.population.len().saturating_sub(1))
    }

    /// Least fit genome of the current generation.
    pub fn worst(&self) -> Result<&Genome, EvolutionError> {
        self.nth(0)
    }

    /// Genome at rank `n` (0 = worst).
    pub fn nth(&self, n: usize) -> Result<&Genome, EvolutionError> {
        self.population
            .get(n)
            .map(|c| &c.genome)
            .ok_or(EvolutionError::IndexOutOfRange {
                index: n,
                len: self.population.len(),
            })
    }

    /// Replace the genome at rank `n`. The ranking is not recomputed.
    pub fn set_nth(
        &mut self,
        n: usize,
        genes: Vec<f64>,
        fitness: f64,
    ) -> Result<(), EvolutionError> {
        let len = self.population.len();
        let candidate = self
            .population
            .get_mut(n)
            .ok_or(EvolutionError::IndexOutOfRange { index: n, len })?;

        let fitness = ranking_score(fitness);
        candidate.genome.genes = genes;
        candidate.genome.fitness = fitness;
        candidate.evaluation = Evaluation::from_score(fitness);
        Ok(())
    }

    /// Initialize the population with random genomes.
    pub fn initialize(&mut self) {
        self.population.clear();
        self.params.generation = 0;
        self.params.target_streak = 0;

        for _ in 0..self.params.config.population.size {
            let genome = self.rng.random_genome(self.params.genome_length);
            self.population.push(Candidate::new(genome));
        }
    }

    /// Evaluate every genome in parallel, then sort and rebuild the fitness table.
    fn rank_population(&mut self, pool: Option<&rayon::ThreadPool>) {
        let fitness = &self.fitness;
        let population = &mut self.population;

        match pool {
            Some(pool) => pool.install(|| evaluate_all(fitness, population)),
            None => evaluate_all(fitness, population),
        }

        self.evaluations += self.population.len() as u64;

        if self.population.iter().any(|c| c.evaluation.is_solution()) {
            debug!("Solution found in generation {}", self.params.generation);
            self.solution_found = true;
            self.cancelled.store(true, Ordering::Relaxed);
        }

        self.sort_and_tabulate();
    }

    /// Sort ascending and rebuild the cumulative fitness table.
    ///
    /// Negative and non-finite scores count as zero in the table.
    fn sort_and_tabulate(&mut self) {
        self.population
            .sort_by(|a, b| a.genome.fitness.total_cmp(&b.genome.fitness));

        self.fitness_table.clear();
        let mut total = 0.0;
        for candidate in &self.population {
            total += selection_weight(candidate.genome.fitness);
            self.fitness_table.push(total);
        }
        self.params.total_fitness = total;
    }

    /// Roulette-wheel selection against the cumulative fitness table.
    fn roulette_index(&mut self) -> usize {
        let n = self.population.len();
        let total = self.params.total_fitness;

        if !(total.is_finite() && total > 0.0) {
            return self.rng.index(n);
        }

        let target = self.rng.gene() * total;
        self.fitness_table
            .partition_point(|&cumulative| cumulative <= target)
            .min(n - 1)
    }

    /// Build the next generation from the ranked current one.
    fn create_next_generation(&mut self) {
        let size = self.params.config.population.size;
        let operators = self.params.config.operators.clone();

        if !(self.params.total_fitness.is_finite() && self.params.total_fitness > 0.0) {
            warn!(
                "Generation {}: total fitness is {}, selecting uniformly",
                self.params.generation, self.params.total_fitness
            );
        }

        let elite_count = if operators.elitism {
            ELITE_COUNT.min(size)
        } else {
            0
        };

        let mut next = std::mem::take(&mut self.next_generation);
        next.clear();
        next.reserve(size);

        while next.len() < size - elite_count {
            let parent1 = self.roulette_index();
            let parent2 = self.roulette_index();

            let (mut child1, mut child2) = if self.rng.chance(operators.crossover_rate) {
                self.rng.crossover(
                    &self.population[parent1].genome,
                    &self.population[parent2].genome,
                )
            } else {
                (
                    Genome::from_genes(self.population[parent1].genome.genes.clone()),
                    Genome::from_genes(self.population[parent2].genome.genes.clone()),
                )
            };

            self.rng
                .mutate(&mut child1, operators.mutation_rate, operators.mutation);
            self.rng
                .mutate(&mut child2, operators.mutation_rate, operators.mutation);

            next.push(child1);
            next.push(child2);
        }
        next.truncate(size - elite_count);

        let elites_from = self.population.len().saturating_sub(elite_count);
        for candidate in &self.population[elites_from..] {
            let mut elite = candidate.genome.clone();
            elite.age += 1;
            next.push(elite);
        }

        // Swap buffers: the previous generation stays in `next_generation`
        let previous = std::mem::replace(
            &mut self.population,
            next.into_iter().map(Candidate::new).collect(),
        );
        self.next_generation = previous.into_iter().map(|c| c.genome).collect();
    }

    /// Grow every genome when the expansion schedule is due.
    fn expand_if_scheduled(&mut self) {
        let Some(schedule) = self.params.config.expansion.clone() else {
            return;
        };
        let generation = self.params.generation;
        if generation == 0 || generation % schedule.interval != 0 || schedule.amount == 0 {
            return;
        }

        let mut length = self.params.genome_length + schedule.amount;
        if let Some(max) = schedule.max_length {
            length = length.min(max);
        }
        if length <= self.params.genome_length {
            return;
        }

        debug!(
            "Generation {}: expanding genomes from {} to {} genes",
            generation, self.params.genome_length, length
        );
        self.params.genome_length = length;
        for candidate in &mut self.population {
            self.rng.expand(&mut candidate.genome, length);
        }
    }

    /// Update the sustained-target counter. Returns true once the streak
    /// exceeds its threshold.
    fn update_target_streak(&mut self) -> bool {
        let target = self.params.target_fitness;
        if target <= 0.0 {
            return false;
        }

        if self.best_true_fitness() >= target {
            let streak = self.params.target_streak;
            self.params.target_streak += 1;
            streak > self.params.config.population.target_streak
        } else {
            self.params.target_streak = 0;
            false
        }
    }

    fn best_true_fitness(&self) -> f64 {
        self.population
            .iter()
            .map(|c| c.evaluation.true_fitness)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn average_fitness(&self) -> f64 {
        if self.population.is_empty() {
            return 0.0;
        }
        // Mean over finite scores only so a solution does not swamp the average
        let finite: Vec<f64> = self
            .population
            .iter()
            .map(|c| c.genome.fitness)
            .filter(|f| f.is_finite() && *f < f64::MAX)
            .collect();
        if finite.is_empty() {
            return 0.0;
        }
        finite.iter().sum::<f64>() / finite.len() as f64
    }

    fn best_fitness(&self) -> f64 {
        self.population
            .last()
            .map(|c| c.genome.fitness)
            .unwrap_or(f64::NEG_INFINITY)
    }

    fn record_history(&mut self) {
        self.history.best_fitness.push(self.best_fitness());
        self.history.avg_fitness.push(self.average_fitness());
        self.history.genome_length.push(self.params.genome_length);
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let phase = if self.population.is_empty() {
            EvolutionPhase::Initializing
        } else if self.cancelled.load(Ordering::Relaxed) {
            EvolutionPhase::Stopped
        } else if self.params.generation >= self.params.config.population.max_generations {
            EvolutionPhase::Complete
        } else {
            EvolutionPhase::Evolving
        };

        EvolutionProgress {
            generation: self.params.generation,
            total_generations: self.params.config.population.max_generations,
            genome_length: self.params.genome_length,
            population_size: self.population.len(),
            best_fitness: self.best_fitness(),
            best_true_fitness: self.best_true_fitness(),
            avg_fitness: self.average_fitness(),
            target_fitness: self.params.target_fitness,
            target_streak: self.params.target_streak,
            best_candidate: self.population.last().map(Candidate::to_snapshot),
            phase,
        }
    }

    /// Check if evolution should stop before the next generation.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(if self.solution_found {
                StopReason::SolutionFound
            } else {
                StopReason::Cancelled
            });
        }

        if self.params.generation >= self.params.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        None
    }

    /// Run evolution with a per-generation observer.
    pub fn run_with_callback<C>(
        &mut self,
        mut on_generation: C,
    ) -> Result<EvolutionResult, EvolutionError>
    where
        C: FnMut(&EvolutionProgress),
    {
        self.params.config.validate()?;
        if self.params.genome_length == 0 {
            return Err(EvolutionConfigError::ZeroGenomeLength.into());
        }

        if self.params.target_fitness <= 0.0 {
            self.params.target_fitness = self.fitness.target_fitness();
        }

        let workers = self.params.config.evaluation.parallel_workers;
        let pool = if workers > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()?,
            )
        } else {
            None
        };

        let start_time = Instant::now();
        let log_interval = self.params.config.population.log_interval;

        info!(
            "Evolving population of {} genomes ({} genes) for up to {} generations",
            self.params.config.population.size,
            self.params.genome_length,
            self.params.config.population.max_generations
        );

        if self.population.is_empty() {
            self.initialize();
            self.rank_population(pool.as_ref());
            self.record_history();
        }

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            self.expand_if_scheduled();
            self.create_next_generation();
            self.rank_population(pool.as_ref());
            self.record_history();

            if self.params.generation % log_interval == 0 {
                info!(
                    "Generation {}, best fitness: {:.2}, target: {:.2}",
                    self.params.generation,
                    self.best_fitness(),
                    self.params.target_fitness
                );
            }

            let target_held = self.update_target_streak();

            on_generation(&self.progress());
            self.params.generation += 1;

            if target_held {
                break StopReason::TargetReached;
            }
        };

        let elapsed = start_time.elapsed().as_secs_f64();
        let best = self
            .population
            .last()
            .map(Candidate::to_snapshot)
            .unwrap_or_default();

        info!(
            "Evolution stopped after {} generations ({:?}), best fitness {:.2}",
            self.params.generation,
            stop_reason,
            best.fitness
        );

        Ok(EvolutionResult {
            best,
            stats: EvolutionStats {
                generations: self.params.generation,
                total_evaluations: self.evaluations,
                best_fitness: self.best_fitness(),
                final_avg_fitness: self.average_fitness(),
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    self.evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
            history: self.history.clone(),
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }
}

/// Evaluate every candidate on the current rayon pool.
fn evaluate_all<F: Fitness>(fitness: &F, population: &mut [Candidate]) {
    population.par_iter_mut().for_each(|candidate| {
        let mut evaluation = fitness.evaluate(&candidate.genome.genes);
        evaluation.score = ranking_score(evaluation.score);
        candidate.genome.fitness = evaluation.score;
        candidate.evaluation = evaluation;
    });
}

/// Score used for ranking. NaN ranks below every other score.
#[inline]
fn ranking_score(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Weight of a score on the roulette wheel.
#[inline]
fn selection_weight(fitness: f64) -> f64 {
    if fitness.is_finite() && fitness > 0.0 {
        fitness
    } else {
        0.0
    }
}
