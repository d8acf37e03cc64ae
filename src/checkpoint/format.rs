//! Binary layout of checkpoint files.

use std::io::{self, Read, Write};

/// Magic bytes identifying a checkpoint file.
pub const CHECKPOINT_MAGIC: &[u8; 4] = b"BPGA";

/// Current format version.
pub const CHECKPOINT_VERSION: u16 = 1;

/// Compression type for the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// Plain JSON payload.
    #[default]
    None = 0,
    /// LZ4 block compression (size-prepended).
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }

    /// Compression actually applied by this build.
    pub fn effective(self) -> Self {
        if cfg!(feature = "lz4") {
            self
        } else {
            CompressionType::None
        }
    }
}

/// Fixed-size header preceding the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointHeader {
    /// Payload compression.
    pub compression: CompressionType,
    /// Generation counter at save time.
    pub generation: u64,
    /// Genomes in the saved population.
    pub population_size: u32,
    /// Genes per genome.
    pub genome_length: u32,
    /// Payload length in bytes as stored.
    pub payload_len: u64,
}

impl CheckpointHeader {
    /// Magic(4) + Version(2) + Flags(2) + Generation(8) + Population(4) +
    /// GenomeLength(4) + PayloadLen(8) + Reserved(8) = 40
    pub const SIZE: usize = 40;

    /// Write header to output.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(CHECKPOINT_MAGIC)?;
        w.write_all(&CHECKPOINT_VERSION.to_le_bytes())?;
        w.write_all(&(self.compression as u16).to_le_bytes())?;
        w.write_all(&self.generation.to_le_bytes())?;
        w.write_all(&self.population_size.to_le_bytes())?;
        w.write_all(&self.genome_length.to_le_bytes())?;
        w.write_all(&self.payload_len.to_le_bytes())?;
        w.write_all(&[0u8; 8])?;
        Ok(())
    }

    /// Read header from input.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != CHECKPOINT_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid BPGA magic bytes",
            ));
        }

        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf2)?;
        let version = u16::from_le_bytes(buf2);
        if version != CHECKPOINT_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported BPGA version: {}", version),
            ));
        }

        r.read_exact(&mut buf2)?;
        let flags = u16::from_le_bytes(buf2);
        let compression = CompressionType::from_u8((flags & 0x0F) as u8).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown compression type: {}", flags & 0x0F),
            )
        })?;

        r.read_exact(&mut buf8)?;
        let generation = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf4)?;
        let population_size = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let genome_length = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf8)?;
        let payload_len = u64::from_le_bytes(buf8);

        // Skip reserved bytes
        r.read_exact(&mut buf8)?;

        Ok(Self {
            compression,
            generation,
            population_size,
            genome_length,
            payload_len,
        })
    }
}

/// Compress data using LZ4.
#[cfg(feature = "lz4")]
pub fn compress_lz4(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress LZ4 data.
#[cfg(feature = "lz4")]
pub fn decompress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Fallback when LZ4 is not available.
#[cfg(not(feature = "lz4"))]
pub fn compress_lz4(data: &[u8]) -> Vec<u8> {
    data.to_vec()
}

#[cfg(not(feature = "lz4"))]
pub fn decompress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "LZ4 checkpoint requires the lz4 feature",
    ))
}
