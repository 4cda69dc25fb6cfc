//! scanface-store — SQLite persistence for ScanFace.
//!
//! Identities, their face encodings and attendance sessions live in one
//! SQLite file. All access goes through a single tokio-rusqlite connection,
//! so statements run one at a time on its worker thread.

pub mod codec;
pub mod error;
mod identities;
mod rows;
mod sessions;
mod store;

pub use error::{StoreError, StoreResult};
pub use identities::IdentityUpdate;
pub use sessions::ScanRequest;
pub use store::Store;
