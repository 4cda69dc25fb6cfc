use scanface_core::{EncodeError, Encoder, Encoding};

/// Encoder backed by the output of an external face detector.
///
/// The input is a JSON array with one encoding per detected face, e.g.
/// `[[-0.09, 0.11, ...]]`. Anything other than exactly one face is rejected.
pub struct DetectionDumpEncoder;

impl Encoder for DetectionDumpEncoder {
    fn encode(&self, image: &[u8]) -> Result<Encoding, EncodeError> {
        let mut faces: Vec<Vec<f32>> =
            serde_json::from_slice(image).map_err(|e| EncodeError::Malformed(e.to_string()))?;

        match faces.len() {
            0 => Err(EncodeError::NoFaceFound),
            1 => {
                let values = faces.remove(0);
                if values.is_empty() {
                    return Err(EncodeError::Malformed("empty encoding".into()));
                }
                Ok(Encoding::new(values))
            }
            n => Err(EncodeError::MultipleFacesFound(n)),
        }
    }
}
