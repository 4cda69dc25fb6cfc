//! Blob layout for stored encodings: `dim` little-endian f32 values.

use scanface_core::Encoding;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty encoding blob")]
    Empty,
    #[error("blob length {0} is not a multiple of 4")]
    Truncated(usize),
    #[error("declared {declared} dimensions, blob holds {actual}")]
    DimMismatch { declared: usize, actual: usize },
}

pub fn encode(encoding: &Encoding) -> Vec<u8> {
    encoding.values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode(declared_dim: usize, blob: &[u8]) -> Result<Encoding, CodecError> {
    if blob.is_empty() {
        return Err(CodecError::Empty);
    }
    if blob.len() % 4 != 0 {
        return Err(CodecError::Truncated(blob.len()));
    }
    let actual = blob.len() / 4;
    if actual != declared_dim {
        return Err(CodecError::DimMismatch {
            declared: declared_dim,
            actual,
        });
    }

    let values = blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(Encoding::new(values))
}
