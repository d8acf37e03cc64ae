//! Compute module - Program decoding, execution and evolutionary search.

pub mod decoder;
pub mod evolution;
pub mod vm;

pub use decoder::ProgramDecoder;
pub use vm::{ExitStatus, Fault, Interpreter};
