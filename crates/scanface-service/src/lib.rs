//! scanface-service — Face enrollment and attendance recording.
//!
//! Wires the matcher and session tracker from `scanface-core` to the SQLite
//! store and an outbound webhook. Every request re-reads the gallery and the
//! session table; nothing is cached between calls.

pub mod config;
pub mod encoder;
pub mod notifier;
pub mod service;

pub use config::{Config, ConfigError};
pub use encoder::DetectionDumpEncoder;
pub use notifier::{AttendanceEvent, Notifier, NotifyError, WebhookNotifier};
pub use service::{
    AttendanceError, AttendanceService, IdentityPatch, ScanReceipt, ServiceStatus, Settings,
};
