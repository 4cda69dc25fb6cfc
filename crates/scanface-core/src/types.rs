use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Face encoding vector (128-dimensional for dlib-style encoders).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    pub values: Vec<f32>,
}

impl Encoding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two encodings.
    ///
    /// Only meaningful for encodings of equal dimensionality; callers
    /// check [`dim`](Self::dim) first.
    pub fn euclidean_distance(&self, other: &Encoding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// An enrolled person.
///
/// Created at enrollment with only an encoding; the external ID and names
/// are filled in later by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    /// Student ID assigned by the school, unique when present.
    pub external_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl Identity {
    /// "First Last", or `ID: <id>` when no name has been attached yet.
    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let name = name.trim();
        if name.is_empty() {
            format!("ID: {}", self.id)
        } else {
            name.to_string()
        }
    }
}

/// One row of the matching gallery.
///
/// `encoding` is `None` when the stored vector could not be loaded.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub identity: Identity,
    pub encoding: Option<Encoding>,
}

/// Requested scan intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanAction {
    Enter,
    Exit,
}

impl ScanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanAction::Enter => "enter",
            ScanAction::Exit => "exit",
        }
    }
}

impl fmt::Display for ScanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enter" | "check_in" | "in" => Ok(ScanAction::Enter),
            "exit" | "check_out" | "out" => Ok(ScanAction::Exit),
            other => Err(format!("unknown scan action: {other}")),
        }
    }
}

/// Persisted status of an attendance session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Entered,
    Exited,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Entered => "entered",
            SessionStatus::Exited => "exited",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entered" => Ok(SessionStatus::Entered),
            "exited" => Ok(SessionStatus::Exited),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// One person attending one class on one civil day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSession {
    pub id: i64,
    pub identity_id: String,
    pub class_name: String,
    /// Civil day of `entered_at`.
    pub day: NaiveDate,
    pub entered_at: DateTime<FixedOffset>,
    pub exited_at: Option<DateTime<FixedOffset>>,
    /// Reference to the captured scan image, if the caller stored one.
    pub image_ref: Option<String>,
    pub status: SessionStatus,
}

/// A session joined with the identity fields shown in log views.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceLog {
    #[serde(flatten)]
    pub session: AttendanceSession,
    pub external_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
