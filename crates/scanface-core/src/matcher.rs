//! Nearest-neighbour matching of a probe encoding against the enrolled gallery.

use crate::types::{Encoding, GalleryEntry, Identity};

/// Default maximum Euclidean distance for two encodings to be the same person.
/// Lower is stricter.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Best match found in the gallery.
#[derive(Debug, Clone)]
pub struct FaceMatch {
    pub identity: Identity,
    pub distance: f32,
}

/// Strategy for finding the enrolled identity closest to a probe.
///
/// Implementations must return the identity with the minimum distance among
/// those within `tolerance`, or `None`. An approximate index may replace the
/// linear scan as long as it keeps that contract.
pub trait Matcher {
    fn find_match(
        &self,
        probe: &Encoding,
        gallery: &[GalleryEntry],
        tolerance: f32,
    ) -> Option<FaceMatch>;
}

/// Linear scan over the gallery using Euclidean distance.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn find_match(
        &self,
        probe: &Encoding,
        gallery: &[GalleryEntry],
        tolerance: f32,
    ) -> Option<FaceMatch> {
        let mut best: Option<(usize, f32)> = None;

        for (i, entry) in gallery.iter().enumerate() {
            let Some(known) = entry.encoding.as_ref() else {
                continue;
            };
            if known.dim() != probe.dim() {
                tracing::warn!(
                    identity = %entry.identity.id,
                    expected = probe.dim(),
                    found = known.dim(),
                    "skipping gallery entry with mismatched dimensionality"
                );
                continue;
            }

            let distance = probe.euclidean_distance(known);
            // False when either side is NaN.
            let within = distance <= tolerance;
            if !within {
                continue;
            }
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        best.map(|(idx, distance)| {
            tracing::debug!(identity = %gallery[idx].identity.id, distance, "gallery match");
            FaceMatch {
                identity: gallery[idx].identity.clone(),
                distance,
            }
        })
    }
}
