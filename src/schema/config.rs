//! Configuration types for program decoding and execution.

use serde::{Deserialize, Serialize};

use super::evolution::{EvolutionConfig, EvolutionConfigError};

/// Number of function letters (`a`..`z`) a program may define.
pub const MAX_FUNCTIONS: usize = 26;

/// Number of fixed-memory-set constants (`0`-`9`, `A`-`F`).
pub const CONSTANT_SYMBOLS: usize = 16;

/// How genes are mapped onto instruction symbols.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "scheme")]
pub enum DecoderConfig {
    /// Eight equal-width bins, one per canonical instruction (`> < + - . , [ ]`).
    Classic,
    /// Canonical instructions share `instruction_share` of the unit interval,
    /// the remainder is split evenly across the extra symbols.
    Extended {
        /// Fraction of [0, 1) occupied by the eight canonical instructions.
        #[serde(default = "default_instruction_share")]
        instruction_share: f64,
        /// Number of callable function letters, starting at `a`.
        #[serde(default)]
        function_count: usize,
        /// Include the sixteen constant-setting symbols `0`-`F`.
        #[serde(default = "default_constants")]
        constants: bool,
        /// Include the storage symbols `$`, `!` and `*`.
        #[serde(default)]
        storage: bool,
    },
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::Classic
    }
}

fn default_instruction_share() -> f64 {
    0.98
}
fn default_constants() -> bool {
    true
}

impl DecoderConfig {
    /// Extended scheme with the default 98% instruction share and constants.
    pub fn extended(function_count: usize) -> Self {
        Self::Extended {
            instruction_share: default_instruction_share(),
            function_count,
            constants: default_constants(),
            storage: false,
        }
    }

    /// Validate decoder configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Classic => Ok(()),
            Self::Extended {
                instruction_share,
                function_count,
                constants,
                storage,
            } => {
                if !(*instruction_share > 0.0 && *instruction_share <= 1.0) {
                    return Err(ConfigError::InvalidInstructionShare(*instruction_share));
                }
                if *function_count > MAX_FUNCTIONS {
                    return Err(ConfigError::TooManyFunctions(*function_count));
                }
                let has_extras = *function_count > 0 || *constants || *storage;
                if *instruction_share < 1.0 && !has_extras {
                    return Err(ConfigError::NoExtendedSymbols);
                }
                if *instruction_share >= 1.0 && has_extras {
                    return Err(ConfigError::NoExtendedShare);
                }
                Ok(())
            }
        }
    }
}

/// Interpreter options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct VmOptions {
    /// When true, a function's input cursor starts at the caller's memory
    /// origin (cell 0) instead of the caller's current data pointer.
    #[serde(default)]
    pub read_function_input_at_start: bool,
}

/// A complete run file: evolve a program that prints `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Evolution settings.
    #[serde(default)]
    pub evolution: EvolutionConfig,
    /// Gene decoding scheme.
    #[serde(default)]
    pub decoder: DecoderConfig,
    /// Interpreter options.
    #[serde(default)]
    pub vm: VmOptions,
    /// Text the evolved program should print.
    #[serde(default = "default_target")]
    pub target: String,
    /// Instruction budget per evaluation.
    #[serde(default = "default_max_instructions")]
    pub max_instructions: u32,
    /// Function library appended after every decoded program.
    #[serde(default)]
    pub append_code: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            evolution: EvolutionConfig::default(),
            decoder: DecoderConfig::default(),
            vm: VmOptions::default(),
            target: default_target(),
            max_instructions: default_max_instructions(),
            append_code: None,
        }
    }
}

fn default_target() -> String {
    "hi".to_string()
}
fn default_max_instructions() -> u32 {
    2000
}

impl RunConfig {
    /// Validate the whole run file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decoder.validate()?;
        self.evolution.validate()?;
        if self.max_instructions == 0 {
            return Err(ConfigError::InvalidInstructionBudget);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Instruction share must be in (0, 1], got {0}")]
    InvalidInstructionShare(f64),
    #[error("At most {MAX_FUNCTIONS} functions are addressable, got {0}")]
    TooManyFunctions(usize),
    #[error("Extended scheme reserves space but enables no extra symbols")]
    NoExtendedSymbols,
    #[error("Extra symbols enabled but the instruction share leaves them no room")]
    NoExtendedShare,
    #[error("Instruction budget must be positive")]
    InvalidInstructionBudget,
    #[error("Invalid evolution config: {0}")]
    Evolution(#[from] EvolutionConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_classic() {
        assert_eq!(DecoderConfig::default(), DecoderConfig::Classic);
        assert!(DecoderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_extended_validation() {
        assert!(DecoderConfig::extended(4).validate().is_ok());

        let too_many = DecoderConfig::Extended {
            instruction_share: 0.9,
            function_count: 27,
            constants: false,
            storage: false,
        };
        assert!(matches!(
            too_many.validate(),
            Err(ConfigError::TooManyFunctions(27))
        ));

        let empty = DecoderConfig::Extended {
            instruction_share: 0.9,
            function_count: 0,
            constants: false,
            storage: false,
        };
        assert!(matches!(
            empty.validate(),
            Err(ConfigError::NoExtendedSymbols)
        ));

        let no_room = DecoderConfig::Extended {
            instruction_share: 1.0,
            function_count: 2,
            constants: false,
            storage: false,
        };
        assert!(matches!(
            no_room.validate(),
            Err(ConfigError::NoExtendedShare)
        ));

        let instructions_only = DecoderConfig::Extended {
            instruction_share: 1.0,
            function_count: 0,
            constants: false,
            storage: false,
        };
        assert!(instructions_only.validate().is_ok());
    }

    #[test]
    fn test_run_config_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"target":"hello"}"#).unwrap();
        assert_eq!(config.target, "hello");
        assert_eq!(config.max_instructions, 2000);
        assert_eq!(config.decoder, DecoderConfig::Classic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_config_rejects_zero_budget() {
        let config = RunConfig {
            max_instructions: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidInstructionBudget)
        ));
    }

    #[test]
    fn test_deserialize_tagged() {
        let config: DecoderConfig =
            serde_json::from_str(r#"{"scheme":"Extended","function_count":3}"#).unwrap();
        match config {
            DecoderConfig::Extended {
                instruction_share,
                function_count,
                constants,
                storage,
            } => {
                assert!((instruction_share - 0.98).abs() < 1e-12);
                assert_eq!(function_count, 3);
                assert!(constants);
                assert!(!storage);
            }
            DecoderConfig::Classic => panic!("expected extended scheme"),
        }
    }
}
