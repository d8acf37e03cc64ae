//! BrainPlus Evolve - Genetic programming of Brainfuck-family programs.
//!
//! This crate evolves short programs in BrainPlus, an extended Brainfuck
//! with constants, a storage register and callable functions. Genomes are
//! vectors of reals in [0, 1); each gene decodes to one instruction, and every
//! fitness evaluation runs the decoded program on a private interpreter under
//! an instruction budget.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Configuration, genome and run-state types
//! - `compute`: Decoder, virtual machine and evolutionary search
//! - `checkpoint`: Binary snapshot files for resuming runs
//!
//! # Example
//!
//! ```rust,no_run
//! use brainplus_evolve::{
//!     compute::evolution::{EvolutionEngine, ProgramRunner, TargetStringFitness},
//!     compute::ProgramDecoder,
//!     schema::EvolutionConfig,
//! };
//!
//! let runner = ProgramRunner::new(ProgramDecoder::classic(), 2000);
//! let fitness = TargetStringFitness::new("hi", runner);
//!
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default(), fitness);
//! let result = engine.run().unwrap();
//!
//! println!("Best program: {}", result.best.program);
//! println!("Output: {}", result.best.output);
//! ```

pub mod checkpoint;
pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EvolutionEngine, Fitness, ProgramRunner};
pub use compute::{Interpreter, ProgramDecoder};
pub use schema::{DecoderConfig, EvolutionConfig, RunConfig, VmOptions};
