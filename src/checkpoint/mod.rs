//! Engine checkpoints.
//!
//! A checkpoint stores a [`GaSnapshot`] so an interrupted run can resume
//! with [`EvolutionEngine::from_snapshot`](crate::compute::evolution::EvolutionEngine::from_snapshot).
//!
//! # File Format
//!
//! ```text
//! Header (40 bytes):
//!   Magic: "BPGA" (4 bytes)
//!   Version: u16
//!   Flags: u16 (compression in the lower 4 bits)
//!   Generation: u64
//!   Population size: u32
//!   Genome length: u32
//!   Payload length: u64
//!   Reserved: 8 bytes
//!
//! Payload (variable):
//!   JSON-encoded snapshot, optionally LZ4 compressed
//! ```

mod format;

pub use format::{CHECKPOINT_MAGIC, CHECKPOINT_VERSION, CheckpointHeader, CompressionType};

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use format::{compress_lz4, decompress_lz4};

use crate::schema::GaSnapshot;

/// Checkpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid snapshot payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Header does not match payload: {0}")]
    Mismatch(String),
}

/// Write a snapshot to any writer.
pub fn write_snapshot<W: Write>(
    w: &mut W,
    snapshot: &GaSnapshot,
    compression: CompressionType,
) -> Result<(), CheckpointError> {
    let json = serde_json::to_vec(snapshot)?;
    let compression = compression.effective();
    let payload = match compression {
        CompressionType::None => json,
        CompressionType::Lz4 => compress_lz4(&json),
    };

    let header = CheckpointHeader {
        compression,
        generation: snapshot.params.generation as u64,
        population_size: snapshot.this_generation.len() as u32,
        genome_length: snapshot.params.genome_length as u32,
        payload_len: payload.len() as u64,
    };

    header.write_to(w)?;
    w.write_all(&payload)?;
    Ok(())
}

/// Read a snapshot from any reader.
pub fn read_snapshot<R: Read>(r: &mut R) -> Result<GaSnapshot, CheckpointError> {
    let header = CheckpointHeader::read_from(r)?;

    let mut payload = Vec::new();
    r.take(header.payload_len).read_to_end(&mut payload)?;
    if payload.len() as u64 != header.payload_len {
        return Err(CheckpointError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "Payload truncated: {} of {} bytes",
                payload.len(),
                header.payload_len
            ),
        )));
    }

    let json = match header.compression {
        CompressionType::None => payload,
        CompressionType::Lz4 => decompress_lz4(&payload)?,
    };
    let snapshot: GaSnapshot = serde_json::from_slice(&json)?;

    if snapshot.this_generation.len() as u32 != header.population_size {
        return Err(CheckpointError::Mismatch(format!(
            "header lists {} genomes, payload holds {}",
            header.population_size,
            snapshot.this_generation.len()
        )));
    }
    if snapshot.params.generation as u64 != header.generation {
        return Err(CheckpointError::Mismatch(format!(
            "header generation {}, payload generation {}",
            header.generation, snapshot.params.generation
        )));
    }

    Ok(snapshot)
}

/// Serialize a snapshot into an in-memory blob.
pub fn to_bytes(
    snapshot: &GaSnapshot,
    compression: CompressionType,
) -> Result<Vec<u8>, CheckpointError> {
    let mut buf = Vec::new();
    write_snapshot(&mut buf, snapshot, compression)?;
    Ok(buf)
}

/// Deserialize a snapshot from an in-memory blob.
pub fn from_bytes(bytes: &[u8]) -> Result<GaSnapshot, CheckpointError> {
    read_snapshot(&mut io::Cursor::new(bytes))
}

/// Save a snapshot to a file, replacing it.
pub fn save<P: AsRef<Path>>(
    path: P,
    snapshot: &GaSnapshot,
    compression: CompressionType,
) -> Result<(), CheckpointError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_snapshot(&mut writer, snapshot, compression)?;
    writer.flush()?;
    Ok(())
}

/// Load a snapshot from a file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<GaSnapshot, CheckpointError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_snapshot(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::{EvolutionEngine, GenomeRng};
    use crate::schema::{EvolutionConfig, GaParams, PopulationConfig};
    use tempfile::tempdir;

    fn plus_count(genes: &[f64]) -> f64 {
        genes.iter().filter(|&&g| (0.25..0.375).contains(&g)).count() as f64
    }

    fn evolved_snapshot() -> GaSnapshot {
        let config = EvolutionConfig {
            population: PopulationConfig {
                size: 10,
                genome_length: 12,
                max_generations: 3,
                ..Default::default()
            },
            random_seed: Some(5),
            ..Default::default()
        };
        let mut engine = EvolutionEngine::new(config, plus_count);
        engine.run().unwrap();
        engine.snapshot()
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.bpga");
        let snapshot = evolved_snapshot();

        save(&path, &snapshot, CompressionType::None).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.params.generation, 3);
        assert_eq!(loaded.this_generation, snapshot.this_generation);
        assert_eq!(loaded.next_generation, snapshot.next_generation);
        assert_eq!(loaded.fitness_table, snapshot.fitness_table);
    }

    #[test]
    fn test_resume_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resume.bpga");
        save(&path, &evolved_snapshot(), CompressionType::Lz4).unwrap();

        let mut snapshot = load(&path).unwrap();
        snapshot.params.config.population.max_generations = 6;
        let mut engine = EvolutionEngine::from_snapshot(snapshot, plus_count).unwrap();
        let result = engine.run().unwrap();
        assert_eq!(result.stats.generations, 6);
    }

    #[test]
    fn test_genes_are_bit_identical_after_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("genes.bpga");

        for seed in [3, 17, 99] {
            let mut rng = GenomeRng::new(seed);
            let mut params = GaParams::new(EvolutionConfig::default());
            params.config.population.size = 16;
            params.genome_length = 64;
            let this_generation: Vec<_> = (0..16).map(|_| rng.random_genome(64)).collect();
            let snapshot = GaSnapshot {
                params,
                this_generation,
                next_generation: Vec::new(),
                fitness_table: Vec::new(),
            };

            save(&path, &snapshot, CompressionType::None).unwrap();
            let loaded = load(&path).unwrap();

            for (saved, restored) in snapshot.this_generation.iter().zip(&loaded.this_generation) {
                let saved_bits: Vec<u64> = saved.genes.iter().map(|g| g.to_bits()).collect();
                let restored_bits: Vec<u64> = restored.genes.iter().map(|g| g.to_bits()).collect();
                assert_eq!(saved_bits, restored_bits, "seed {seed}");
            }
        }
    }

    #[test]
    fn test_truncated_blob() {
        let bytes = to_bytes(&evolved_snapshot(), CompressionType::None).unwrap();
        let err = from_bytes(&bytes[..bytes.len() - 5]).unwrap_err();
        assert!(matches!(err, CheckpointError::Io(_)));
    }

    #[test]
    fn test_header_mismatch() {
        let mut bytes = to_bytes(&evolved_snapshot(), CompressionType::None).unwrap();
        // Population size field
        bytes[16] = 99;
        assert!(matches!(
            from_bytes(&bytes),
            Err(CheckpointError::Mismatch(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load(dir.path().join("absent.bpga")),
            Err(CheckpointError::Io(_))
        ));
    }
}
