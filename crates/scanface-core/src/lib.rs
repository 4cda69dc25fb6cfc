//! scanface-core — Face matching and attendance session tracking.
//!
//! Pure logic only: nearest-neighbour matching of face encodings, the
//! fixed-offset civil calendar, and the per-day check-in/check-out state
//! machine. Persistence and notification live in other crates.

pub mod civil;
pub mod encoder;
pub mod matcher;
pub mod tracker;
pub mod types;

pub use civil::{civil_day, civil_time, fixed_offset, Clock, SystemClock};
pub use encoder::{EncodeError, Encoder};
pub use matcher::{EuclideanMatcher, FaceMatch, Matcher, DEFAULT_TOLERANCE};
pub use tracker::{plan, SessionState, Transition, TransitionError};
pub use types::{
    AttendanceLog, AttendanceSession, Encoding, GalleryEntry, Identity, ScanAction, SessionStatus,
};
