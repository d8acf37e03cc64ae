//! BrainPlus virtual machine.
//!
//! Executes decoded program text against a flat byte memory. The low region
//! belongs to the main program; every function letter owns a disjoint slice
//! above it that is cleared on entry. A recursive call reuses its own slice
//! and therefore overwrites the caller's copy.
//!
//! Malformed programs surface as a [`Fault`]. Running out of instructions is
//! not a fault: it is reported as [`ExitStatus::BudgetExhausted`].

mod interpreter;
mod opcode;

pub use interpreter::*;
pub use opcode::*;

use crate::schema::MAX_FUNCTIONS;

/// Total VM memory in cells.
pub const MEMORY_SIZE: usize = 32_768;

/// Cells per memory region: the main program plus one slice per letter.
pub const FUNCTION_MEMORY_SIZE: usize = MEMORY_SIZE / (MAX_FUNCTIONS + 1);

/// Maximum nesting of active function calls.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Hard cap on instructions executed across all call frames, as a multiple
/// of the per-frame budget.
pub const WORK_LIMIT_FACTOR: u64 = 1000;

/// First cell of a function's memory slice.
#[inline]
pub fn function_memory_start(index: u8) -> usize {
    (index as usize + 1) * FUNCTION_MEMORY_SIZE
}

/// How a run ended without faulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Instruction pointer ran past the end of the program.
    Completed,
    /// A top-level separator halted the main program.
    Halted,
    /// The instruction budget ran out in the main program, or the total work
    /// cap was reached in any frame. In the latter case `ticks()` reports
    /// the active frame's count, which may be below the budget.
    BudgetExhausted,
}

/// Runtime faults raised by malformed programs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("Unbalanced loop end at instruction {position}")]
    UnbalancedLoop { position: usize },
    #[error("Call to undefined function '{letter}'")]
    UndefinedFunction { letter: char },
    #[error("Memory access out of bounds at cell {address}")]
    MemoryOutOfBounds { address: isize },
    #[error("Call depth exceeded {MAX_CALL_DEPTH}")]
    CallDepthExceeded,
}
