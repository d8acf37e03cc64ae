//! Program decoder: maps gene vectors onto instruction symbols.
//!
//! The unit interval is partitioned into contiguous half-open bins, one per
//! symbol. Bin upper bounds are computed once when the decoder is built and
//! shared by every decode call.

use crate::schema::{CONSTANT_SYMBOLS, ConfigError, DecoderConfig};

/// The eight canonical instructions, in bin order.
pub const INSTRUCTIONS: [char; 8] = ['>', '<', '+', '-', '.', ',', '[', ']'];

/// Fixed-memory-set symbols, in bin order.
const CONSTANTS: [char; CONSTANT_SYMBOLS] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F',
];

/// Storage symbols: store, recall, return-value.
const STORAGE: [char; 3] = ['$', '!', '*'];

/// Gene-to-symbol mapping with precomputed bin boundaries.
#[derive(Debug, Clone)]
pub struct ProgramDecoder {
    symbols: Vec<char>,
    /// Upper bound of each bin. Monotonic, last entry is exactly 1.0.
    bounds: Vec<f64>,
}

impl ProgramDecoder {
    /// Eight equal-width bins of 0.125.
    pub fn classic() -> Self {
        let symbols = INSTRUCTIONS.to_vec();
        let bounds = (1..=INSTRUCTIONS.len())
            .map(|i| i as f64 / INSTRUCTIONS.len() as f64)
            .collect();
        Self { symbols, bounds }
    }

    /// Build a decoder from configuration.
    pub fn from_config(config: &DecoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let DecoderConfig::Extended {
            instruction_share,
            function_count,
            constants,
            storage,
        } = *config
        else {
            return Ok(Self::classic());
        };

        let mut extras: Vec<char> = (b'a'..b'a' + function_count as u8)
            .map(char::from)
            .collect();
        if constants {
            extras.extend_from_slice(&CONSTANTS);
        }
        if storage {
            extras.extend_from_slice(&STORAGE);
        }

        let instruction_width = instruction_share / INSTRUCTIONS.len() as f64;
        let extra_width = if extras.is_empty() {
            0.0
        } else {
            (1.0 - instruction_share) / extras.len() as f64
        };

        let mut symbols = Vec::with_capacity(INSTRUCTIONS.len() + extras.len());
        let mut bounds = Vec::with_capacity(symbols.capacity());

        for (i, &symbol) in INSTRUCTIONS.iter().enumerate() {
            symbols.push(symbol);
            bounds.push(instruction_width * (i + 1) as f64);
        }
        for (i, &symbol) in extras.iter().enumerate() {
            symbols.push(symbol);
            bounds.push(instruction_share + extra_width * (i + 1) as f64);
        }

        // Accumulated rounding must not leave a gap below 1.0
        if let Some(last) = bounds.last_mut() {
            *last = 1.0;
        }

        Ok(Self { symbols, bounds })
    }

    /// Symbol for a single gene.
    ///
    /// Out-of-range genes are clamped into [0, 1); NaN maps to the first bin.
    #[inline]
    pub fn symbol_for(&self, gene: f64) -> char {
        let gene = if gene.is_nan() { 0.0 } else { gene };
        let idx = self
            .bounds
            .partition_point(|&upper| upper <= gene)
            .min(self.symbols.len() - 1);
        self.symbols[idx]
    }

    /// Decode a gene vector into program source, one symbol per gene.
    pub fn decode(&self, genes: &[f64]) -> String {
        genes.iter().map(|&g| self.symbol_for(g)).collect()
    }

    /// Symbols in bin order.
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Bins as `(lower, upper, symbol)`, lower inclusive and upper exclusive.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, char)> + '_ {
        let lowers = std::iter::once(0.0).chain(self.bounds.iter().copied());
        lowers
            .zip(self.bounds.iter().copied())
            .zip(self.symbols.iter().copied())
            .map(|((lo, hi), symbol)| (lo, hi, symbol))
    }
}

impl Default for ProgramDecoder {
    fn default() -> Self {
        Self::classic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classic_bins() {
        let decoder = ProgramDecoder::classic();
        assert_eq!(decoder.symbol_for(0.0), '>');
        assert_eq!(decoder.symbol_for(0.124), '>');
        assert_eq!(decoder.symbol_for(0.125), '<');
        assert_eq!(decoder.symbol_for(0.5), '.');
        assert_eq!(decoder.symbol_for(0.999_999), ']');
        assert_eq!(decoder.decode(&[0.3, 0.3, 0.55, 0.8]), "++.[");
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let decoder = ProgramDecoder::classic();
        assert_eq!(decoder.symbol_for(-3.0), '>');
        assert_eq!(decoder.symbol_for(1.0), ']');
        assert_eq!(decoder.symbol_for(42.0), ']');
        assert_eq!(decoder.symbol_for(f64::NAN), '>');
    }

    #[test]
    fn test_extended_layout() {
        let decoder = ProgramDecoder::from_config(&DecoderConfig::extended(2)).unwrap();
        // 8 instructions, 2 functions, 16 constants
        assert_eq!(decoder.symbols().len(), 26);
        assert_eq!(decoder.symbol_for(0.0), '>');
        assert_eq!(decoder.symbol_for(0.97), ']');
        assert_eq!(decoder.symbol_for(0.9801), 'a');
        assert_eq!(decoder.symbol_for(0.9999), 'F');
    }

    #[test]
    fn test_extended_storage_symbols() {
        let config = DecoderConfig::Extended {
            instruction_share: 0.5,
            function_count: 0,
            constants: false,
            storage: true,
        };
        let decoder = ProgramDecoder::from_config(&config).unwrap();
        assert_eq!(decoder.symbols()[8..], ['$', '!', '*']);
        assert_eq!(decoder.symbol_for(0.99), '*');
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DecoderConfig::Extended {
            instruction_share: 1.5,
            function_count: 0,
            constants: true,
            storage: false,
        };
        assert!(ProgramDecoder::from_config(&config).is_err());

        // Full share would give the constants empty bins
        let config = DecoderConfig::Extended {
            instruction_share: 1.0,
            function_count: 0,
            constants: true,
            storage: false,
        };
        assert!(matches!(
            ProgramDecoder::from_config(&config),
            Err(ConfigError::NoExtendedShare)
        ));
    }

    #[test]
    fn test_every_bin_is_reachable() {
        for share in [0.5, 0.9, 0.98, 0.999] {
            let config = DecoderConfig::Extended {
                instruction_share: share,
                function_count: 26,
                constants: true,
                storage: true,
            };
            let decoder = ProgramDecoder::from_config(&config).unwrap();
            for (lo, hi, symbol) in decoder.bins() {
                assert!(lo < hi, "empty bin for {symbol:?} at share {share}");
                assert_eq!(decoder.symbol_for(lo), symbol);
            }
        }
    }

    #[test]
    fn test_bins_partition_unit_interval() {
        let decoder = ProgramDecoder::from_config(&DecoderConfig::extended(5)).unwrap();
        let bins: Vec<_> = decoder.bins().collect();
        assert_eq!(bins.first().unwrap().0, 0.0);
        assert_eq!(bins.last().unwrap().1, 1.0);
        for pair in bins.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
            assert!(pair[0].0 < pair[0].1);
        }
    }

    fn any_decoder() -> impl Strategy<Value = ProgramDecoder> {
        prop_oneof![
            Just(ProgramDecoder::classic()),
            (0.5f64..0.99, 0usize..=26, any::<bool>(), any::<bool>()).prop_map(
                |(share, functions, constants, storage)| {
                    let config = DecoderConfig::Extended {
                        instruction_share: share,
                        function_count: functions,
                        constants: constants || functions == 0,
                        storage,
                    };
                    ProgramDecoder::from_config(&config).unwrap()
                }
            ),
        ]
    }

    proptest! {
        #[test]
        fn test_every_gene_falls_in_exactly_one_bin(
            decoder in any_decoder(),
            gene in 0.0f64..1.0,
        ) {
            let containing: Vec<char> = decoder
                .bins()
                .filter(|&(lo, hi, _)| lo <= gene && gene < hi)
                .map(|(_, _, s)| s)
                .collect();
            prop_assert_eq!(containing.len(), 1);
            prop_assert_eq!(containing[0], decoder.symbol_for(gene));
        }

        #[test]
        fn test_decode_is_one_symbol_per_gene(
            genes in proptest::collection::vec(0.0f64..1.0, 0..64),
        ) {
            let decoder = ProgramDecoder::from_config(&DecoderConfig::extended(3)).unwrap();
            let source = decoder.decode(&genes);
            prop_assert_eq!(source.chars().count(), genes.len());
            prop_assert_eq!(source, decoder.decode(&genes));
        }
    }
}
