//! Row decoding helpers shared by the identity and session queries.

use chrono::{DateTime, FixedOffset, NaiveDate};
use rusqlite::types::Type;
use rusqlite::Row;
use scanface_core::{AttendanceLog, AttendanceSession, Identity, SessionStatus};

pub(crate) const DAY_FORMAT: &str = "%Y-%m-%d";

pub(crate) const IDENTITY_COLUMNS: &str =
    "i.id, i.external_id, i.first_name, i.last_name, i.created_at, i.updated_at";

pub(crate) const SESSION_COLUMNS: &str =
    "s.id, s.identity_id, s.class_name, s.civil_day, s.entered_at, s.exited_at, s.image_ref, s.status";

fn conversion_err(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<FixedOffset>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw).map_err(|e| conversion_err(idx, e))
}

fn opt_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<FixedOffset>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| DateTime::parse_from_rfc3339(&s).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

/// Identity from `IDENTITY_COLUMNS` starting at `base`.
pub(crate) fn identity(row: &Row<'_>, base: usize) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: row.get(base)?,
        external_id: row.get(base + 1)?,
        first_name: row.get(base + 2)?,
        last_name: row.get(base + 3)?,
        created_at: timestamp(row, base + 4)?,
        updated_at: timestamp(row, base + 5)?,
    })
}

/// Session from `SESSION_COLUMNS` starting at column 0.
pub(crate) fn session(row: &Row<'_>) -> rusqlite::Result<AttendanceSession> {
    let day: String = row.get(3)?;
    let status: String = row.get(7)?;
    Ok(AttendanceSession {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        class_name: row.get(2)?,
        day: NaiveDate::parse_from_str(&day, DAY_FORMAT).map_err(|e| conversion_err(3, e))?,
        entered_at: timestamp(row, 4)?,
        exited_at: opt_timestamp(row, 5)?,
        image_ref: row.get(6)?,
        status: status
            .parse::<SessionStatus>()
            .map_err(|e| conversion_err(7, e))?,
    })
}

/// Session columns followed by `external_id, first_name, last_name`.
pub(crate) fn log(row: &Row<'_>) -> rusqlite::Result<AttendanceLog> {
    Ok(AttendanceLog {
        session: session(row)?,
        external_id: row.get(8)?,
        first_name: row.get(9)?,
        last_name: row.get(10)?,
    })
}
