//! Evolutionary search for BrainPlus programs.
//!
//! # Overview
//!
//! The evolutionary search system consists of:
//!
//! - **Fitness** (`fitness`): the scoring contract, the program runner that
//!   decodes genes and executes them, and a reference target-string fitness
//! - **Genome Operations** (`genome`): random generation, crossover, mutation
//!   and expansion
//! - **Search** (`search`): the generational engine with roulette selection,
//!   elitism and target-fitness hysteresis
//!
//! # Example
//!
//! ```rust,no_run
//! use brainplus_evolve::compute::decoder::ProgramDecoder;
//! use brainplus_evolve::compute::evolution::{EvolutionEngine, ProgramRunner, TargetStringFitness};
//! use brainplus_evolve::schema::EvolutionConfig;
//!
//! let runner = ProgramRunner::new(ProgramDecoder::classic(), 2000);
//! let fitness = TargetStringFitness::new("hi", runner);
//!
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default(), fitness);
//! let result = engine
//!     .run_with_callback(|progress| {
//!         println!("Generation {}: best fitness = {:.2}",
//!             progress.generation, progress.best_fitness);
//!     })
//!     .unwrap();
//!
//! println!("{} -> {:?}", result.best.program, result.best.output);
//! ```

mod fitness;
mod genome;
mod search;

pub use fitness::{
    Evaluation, Fitness, ProgramRun, ProgramRunner, SOLUTION_FITNESS, TargetStringFitness,
};
pub use genome::GenomeRng;
pub use search::{Candidate, ELITE_COUNT, EvolutionEngine, EvolutionError};
