use crate::types::Encoding;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("no face found in image")]
    NoFaceFound,
    #[error("{0} faces found in image, exactly one is required")]
    MultipleFacesFound(usize),
    #[error("image could not be read: {0}")]
    Malformed(String),
}

/// Turns an image into a single face encoding.
///
/// Detection and encoding are done by an external face-recognition model;
/// implementations must reject images with zero or several faces.
pub trait Encoder {
    fn encode(&self, image: &[u8]) -> Result<Encoding, EncodeError>;
}
