//! Instruction set and source pre-scan.

use crate::schema::MAX_FUNCTIONS;

/// Function body separator. Also returns from a function, or halts the
/// main program.
pub const FUNCTION_SEPARATOR: char = '@';

/// A single decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// `>`
    IncPtr,
    /// `<`
    DecPtr,
    /// `+`
    Inc,
    /// `-`
    Dec,
    /// `.`
    Output,
    /// `,`
    Input,
    /// `[`
    LoopStart,
    /// `]`
    LoopEnd,
    /// `@`
    Return,
    /// `$` store the current cell (or set the return value when followed by `@`)
    Store,
    /// `!` copy storage into the current cell
    Recall,
    /// `*` mark the current cell as the function's return value
    ReturnValue,
    /// `0`-`9`, `A`-`F`: set the current cell to a multiple of 16
    SetConst(u8),
    /// `a`-`z`: call the function with this index
    Call(u8),
    /// Any other character. Costs a tick, does nothing.
    Nop,
}

impl Opcode {
    /// Decode one source character.
    pub fn from_char(c: char) -> Self {
        match c {
            '>' => Self::IncPtr,
            '<' => Self::DecPtr,
            '+' => Self::Inc,
            '-' => Self::Dec,
            '.' => Self::Output,
            ',' => Self::Input,
            '[' => Self::LoopStart,
            ']' => Self::LoopEnd,
            FUNCTION_SEPARATOR => Self::Return,
            '$' => Self::Store,
            '!' => Self::Recall,
            '*' => Self::ReturnValue,
            '0'..='9' => Self::SetConst((c as u8 - b'0') * 16),
            'A'..='F' => Self::SetConst((c as u8 - b'A' + 10) * 16),
            'a'..='z' => Self::Call(c as u8 - b'a'),
            _ => Self::Nop,
        }
    }

    /// Decode a whole source string.
    pub fn decode_source(source: &str) -> Vec<Self> {
        source.chars().map(Self::from_char).collect()
    }
}

/// Function letter for a call index.
#[inline]
pub fn function_letter(index: u8) -> char {
    char::from(b'a' + index)
}

/// Locate every function body in a decoded program.
///
/// Each separator that is not the final instruction opens a function body
/// starting right after it. Bodies are assigned `a`, `b`, ... in order of
/// appearance; the returned vector is indexed by letter.
pub fn scan_functions(program: &[Opcode]) -> Vec<usize> {
    let last = program.len().saturating_sub(1);
    program
        .iter()
        .enumerate()
        .filter(|&(pos, op)| *op == Opcode::Return && pos < last)
        .map(|(pos, _)| pos + 1)
        .take(MAX_FUNCTIONS)
        .collect()
}
