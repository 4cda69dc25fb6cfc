use crate::codec;
use crate::error::StoreResult;
use crate::rows::{self, IDENTITY_COLUMNS};
use crate::store::Store;
use chrono::{DateTime, FixedOffset};
use rusqlite::{params, OptionalExtension};
use scanface_core::{Encoding, GalleryEntry, Identity};

/// Outcome of an administrative identity update.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityUpdate {
    Updated(Identity),
    NotFound,
    /// Another identity already holds the requested external ID.
    ExternalIdTaken,
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl Store {
    /// Insert a new identity together with its encoding.
    pub async fn insert_identity(&self, identity: &Identity, encoding: &Encoding) -> StoreResult<()> {
        let identity = identity.clone();
        let dim = encoding.dim() as i64;
        let blob = codec::encode(encoding);

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO identities (id, external_id, first_name, last_name, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        identity.id,
                        identity.external_id,
                        identity.first_name,
                        identity.last_name,
                        identity.created_at.to_rfc3339(),
                        identity.updated_at.to_rfc3339(),
                    ],
                )?;
                tx.execute(
                    "INSERT INTO face_encodings (identity_id, dim, vector) VALUES (?1, ?2, ?3)",
                    params![identity.id, dim, blob],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// All identities with their encodings, in enrollment order, for matching.
    ///
    /// Rows whose encoding cannot be decoded are returned with
    /// `encoding: None` so the matcher skips them.
    pub async fn load_gallery(&self) -> StoreResult<Vec<GalleryEntry>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {IDENTITY_COLUMNS}, e.dim, e.vector
                     FROM identities i
                     LEFT JOIN face_encodings e ON e.identity_id = i.id
                     ORDER BY i.rowid"
                ))?;
                let rows = stmt
                    .query_map([], |row| {
                        let identity = rows::identity(row, 0)?;
                        let dim: Option<i64> = row.get(6)?;
                        let blob: Option<Vec<u8>> = row.get(7)?;
                        Ok((identity, dim, blob))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let gallery = rows
            .into_iter()
            .map(|(identity, dim, blob)| {
                let encoding = match (dim, blob) {
                    (Some(dim), Some(blob)) => match codec::decode(dim.max(0) as usize, &blob) {
                        Ok(enc) => Some(enc),
                        Err(err) => {
                            tracing::warn!(identity = %identity.id, error = %err, "unreadable face encoding");
                            None
                        }
                    },
                    _ => {
                        tracing::warn!(identity = %identity.id, "identity has no face encoding");
                        None
                    }
                };
                GalleryEntry { identity, encoding }
            })
            .collect();
        Ok(gallery)
    }

    pub async fn get_identity(&self, id: &str) -> StoreResult<Option<Identity>> {
        let id = id.to_string();
        let identity = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {IDENTITY_COLUMNS} FROM identities i WHERE i.id = ?1"),
                        params![id],
                        |row| rows::identity(row, 0),
                    )
                    .optional()?)
            })
            .await?;
        Ok(identity)
    }

    /// All identities, most recently enrolled first.
    pub async fn list_identities(&self) -> StoreResult<Vec<Identity>> {
        let identities = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {IDENTITY_COLUMNS} FROM identities i
                     ORDER BY i.rowid DESC"
                ))?;
                let list = stmt
                    .query_map([], |row| rows::identity(row, 0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(list)
            })
            .await?;
        Ok(identities)
    }

    /// Attach an external ID and display name to an identity.
    pub async fn update_identity(
        &self,
        id: &str,
        external_id: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        updated_at: DateTime<FixedOffset>,
    ) -> StoreResult<IdentityUpdate> {
        let id = id.to_string();
        let outcome = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE identities
                     SET external_id = ?1, first_name = ?2, last_name = ?3, updated_at = ?4
                     WHERE id = ?5",
                    params![external_id, first_name, last_name, updated_at.to_rfc3339(), id],
                );
                let changed = match changed {
                    Ok(n) => n,
                    Err(e) if is_unique_violation(&e) => return Ok(IdentityUpdate::ExternalIdTaken),
                    Err(e) => return Err(e.into()),
                };
                if changed == 0 {
                    return Ok(IdentityUpdate::NotFound);
                }
                let identity = conn.query_row(
                    &format!("SELECT {IDENTITY_COLUMNS} FROM identities i WHERE i.id = ?1"),
                    params![id],
                    |row| rows::identity(row, 0),
                )?;
                Ok(IdentityUpdate::Updated(identity))
            })
            .await?;
        Ok(outcome)
    }

    /// Delete an identity, its encoding and all of its sessions.
    ///
    /// Returns `false` if no such identity exists.
    pub async fn delete_identity(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let sessions = tx.execute(
                    "DELETE FROM attendance_sessions WHERE identity_id = ?1",
                    params![id],
                )?;
                tx.execute("DELETE FROM face_encodings WHERE identity_id = ?1", params![id])?;
                let n = tx.execute("DELETE FROM identities WHERE id = ?1", params![id])?;
                tx.commit()?;
                if n > 0 {
                    tracing::info!(identity = %id, sessions, "identity deleted");
                }
                Ok(n > 0)
            })
            .await?;
        Ok(deleted)
    }

    /// Replace the stored encoding of an existing identity.
    ///
    /// Returns `false` if no such identity exists.
    pub async fn replace_encoding(
        &self,
        id: &str,
        encoding: &Encoding,
        updated_at: DateTime<FixedOffset>,
    ) -> StoreResult<bool> {
        let id = id.to_string();
        let dim = encoding.dim() as i64;
        let blob = codec::encode(encoding);
        let replaced = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let n = tx.execute(
                    "UPDATE identities SET updated_at = ?1 WHERE id = ?2",
                    params![updated_at.to_rfc3339(), id],
                )?;
                if n == 0 {
                    return Ok(false);
                }
                tx.execute("DELETE FROM face_encodings WHERE identity_id = ?1", params![id])?;
                tx.execute(
                    "INSERT INTO face_encodings (identity_id, dim, vector) VALUES (?1, ?2, ?3)",
                    params![id, dim, blob],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await?;
        Ok(replaced)
    }
}
