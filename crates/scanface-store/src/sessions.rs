use crate::error::StoreResult;
use crate::identities::is_unique_violation;
use crate::rows::{self, DAY_FORMAT, SESSION_COLUMNS};
use crate::store::Store;
use chrono::{DateTime, FixedOffset, NaiveDate};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use scanface_core::{
    plan, AttendanceLog, AttendanceSession, ScanAction, SessionState, Transition, TransitionError,
};

/// A scan resolved to an identity, ready to be applied to the session table.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub identity_id: String,
    pub class_name: String,
    /// Civil day of `at`.
    pub day: NaiveDate,
    pub at: DateTime<FixedOffset>,
    pub action: ScanAction,
    pub image_ref: Option<String>,
}

fn sessions_for_key(
    conn: &rusqlite::Connection,
    identity_id: &str,
    class_name: &str,
    day: &str,
) -> rusqlite::Result<Vec<AttendanceSession>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM attendance_sessions s
         WHERE s.identity_id = ?1 AND s.class_name = ?2 AND s.civil_day = ?3
         ORDER BY s.id DESC"
    ))?;
    let sessions = stmt
        .query_map(params![identity_id, class_name, day], rows::session)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sessions)
}

fn session_by_id(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<AttendanceSession> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM attendance_sessions s WHERE s.id = ?1"),
        params![id],
        rows::session,
    )
}

impl Store {
    /// Apply a scan to the session table as one atomic check-then-act.
    ///
    /// The state of the (identity, class, day) key is read and mutated inside
    /// a single immediate transaction on the connection thread, so concurrent
    /// scans for the same key are serialised. The UNIQUE key index rejects any
    /// second session for the same day as `DuplicateEntry`.
    pub async fn apply_scan(
        &self,
        req: ScanRequest,
    ) -> StoreResult<Result<AttendanceSession, TransitionError>> {
        let outcome = self
            .conn
            .call(move |conn| {
                let day = req.day.format(DAY_FORMAT).to_string();
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let existing = sessions_for_key(&tx, &req.identity_id, &req.class_name, &day)?;
                let transition = match plan(SessionState::from_sessions(&existing), req.action) {
                    Ok(t) => t,
                    Err(e) => return Ok(Err(e)),
                };

                let session_id = match transition {
                    Transition::Open => {
                        let inserted = tx.execute(
                            "INSERT INTO attendance_sessions
                                (identity_id, class_name, civil_day, entered_at, image_ref, status)
                             VALUES (?1, ?2, ?3, ?4, ?5, 'entered')",
                            params![
                                req.identity_id,
                                req.class_name,
                                day,
                                req.at.to_rfc3339(),
                                req.image_ref,
                            ],
                        );
                        match inserted {
                            Ok(_) => tx.last_insert_rowid(),
                            Err(e) if is_unique_violation(&e) => {
                                return Ok(Err(TransitionError::DuplicateEntry))
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                    Transition::Close { session_id } => {
                        tx.execute(
                            "UPDATE attendance_sessions
                             SET exited_at = ?1, status = 'exited',
                                 image_ref = COALESCE(?2, image_ref)
                             WHERE id = ?3",
                            params![req.at.to_rfc3339(), req.image_ref, session_id],
                        )?;
                        session_id
                    }
                };

                let session = session_by_id(&tx, session_id)?;
                tx.commit()?;
                Ok(Ok(session))
            })
            .await?;
        Ok(outcome)
    }

    /// Today's open session for (identity, class), if any.
    pub async fn open_session(
        &self,
        identity_id: &str,
        class_name: &str,
        day: NaiveDate,
    ) -> StoreResult<Option<AttendanceSession>> {
        let identity_id = identity_id.to_string();
        let class_name = class_name.to_string();
        let day = day.format(DAY_FORMAT).to_string();
        let session = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!(
                            "SELECT {SESSION_COLUMNS} FROM attendance_sessions s
                             WHERE s.identity_id = ?1 AND s.class_name = ?2
                               AND s.civil_day = ?3 AND s.status = 'entered'
                             ORDER BY s.id DESC LIMIT 1"
                        ),
                        params![identity_id, class_name, day],
                        rows::session,
                    )
                    .optional()?)
            })
            .await?;
        Ok(session)
    }

    /// Most recent sessions with identity details, optionally for one day.
    pub async fn attendance_logs(
        &self,
        limit: u32,
        day: Option<NaiveDate>,
    ) -> StoreResult<Vec<AttendanceLog>> {
        let day = day.map(|d| d.format(DAY_FORMAT).to_string());
        let logs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS}, i.external_id, i.first_name, i.last_name
                     FROM attendance_sessions s
                     LEFT JOIN identities i ON i.id = s.identity_id
                     WHERE ?1 IS NULL OR s.civil_day = ?1
                     ORDER BY s.id DESC
                     LIMIT ?2"
                ))?;
                let logs = stmt
                    .query_map(params![day, limit], rows::log)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(logs)
            })
            .await?;
        Ok(logs)
    }

    /// Every session of one day, optionally restricted to one class.
    pub async fn day_attendance(
        &self,
        day: NaiveDate,
        class_name: Option<&str>,
    ) -> StoreResult<Vec<AttendanceLog>> {
        let day = day.format(DAY_FORMAT).to_string();
        let class_name = class_name.map(str::to_string);
        let logs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS}, i.external_id, i.first_name, i.last_name
                     FROM attendance_sessions s
                     LEFT JOIN identities i ON i.id = s.identity_id
                     WHERE s.civil_day = ?1 AND (?2 IS NULL OR s.class_name = ?2)
                     ORDER BY s.id DESC"
                ))?;
                let logs = stmt
                    .query_map(params![day, class_name], rows::log)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(logs)
            })
            .await?;
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanface_core::{Encoding, Identity, SessionStatus};

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DAY_FORMAT).unwrap()
    }

    async fn store_with(ids: &[&str]) -> Store {
        let store = Store::in_memory().await.unwrap();
        for id in ids {
            let when = ts("2026-03-01T07:00:00+07:00");
            let identity = Identity {
                id: id.to_string(),
                external_id: Some(format!("S-{id}")),
                first_name: Some("First".into()),
                last_name: Some(id.to_uppercase()),
                created_at: when,
                updated_at: when,
            };
            store
                .insert_identity(&identity, &Encoding::new(vec![0.0, 1.0]))
                .await
                .unwrap();
        }
        store
    }

    fn scan(id: &str, class: &str, at: &str, action: ScanAction) -> ScanRequest {
        let at = ts(at);
        ScanRequest {
            identity_id: id.into(),
            class_name: class.into(),
            day: at.date_naive(),
            at,
            action,
            image_ref: None,
        }
    }

    #[tokio::test]
    async fn test_enter_then_exit() {
        let store = store_with(&["a"]).await;

        let entered = store
            .apply_scan(scan("a", "Math", "2026-03-01T08:00:00+07:00", ScanAction::Enter))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entered.status, SessionStatus::Entered);
        assert!(entered.exited_at.is_none());

        let open = store.open_session("a", "Math", day("2026-03-01")).await.unwrap();
        assert_eq!(open.map(|s| s.id), Some(entered.id));

        let mut exit = scan("a", "Math", "2026-03-01T09:30:00+07:00", ScanAction::Exit);
        exit.image_ref = Some("captures/a_exit.jpg".into());
        let exited = store.apply_scan(exit).await.unwrap().unwrap();
        assert_eq!(exited.id, entered.id);
        assert_eq!(exited.status, SessionStatus::Exited);
        assert_eq!(exited.exited_at, Some(ts("2026-03-01T09:30:00+07:00")));
        assert_eq!(exited.image_ref.as_deref(), Some("captures/a_exit.jpg"));

        assert!(store
            .open_session("a", "Math", day("2026-03-01"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rejections_leave_table_untouched() {
        let store = store_with(&["a"]).await;

        let no_entry = store
            .apply_scan(scan("a", "Math", "2026-03-01T08:00:00+07:00", ScanAction::Exit))
            .await
            .unwrap();
        assert_eq!(no_entry, Err(TransitionError::NoOpenEntry));
        assert_eq!(store.count_sessions_on(day("2026-03-01")).await.unwrap(), 0);

        store
            .apply_scan(scan("a", "Math", "2026-03-01T08:00:00+07:00", ScanAction::Enter))
            .await
            .unwrap()
            .unwrap();
        let dup = store
            .apply_scan(scan("a", "Math", "2026-03-01T08:05:00+07:00", ScanAction::Enter))
            .await
            .unwrap();
        assert_eq!(dup, Err(TransitionError::DuplicateEntry));
        assert_eq!(store.count_sessions_on(day("2026-03-01")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unique_index_backs_the_invariant() {
        let store = store_with(&["a"]).await;
        store
            .apply_scan(scan("a", "Math", "2026-03-01T08:00:00+07:00", ScanAction::Enter))
            .await
            .unwrap()
            .unwrap();

        let raw = store
            .conn
            .call(|conn| {
                Ok(conn
                    .execute(
                        "INSERT INTO attendance_sessions
                            (identity_id, class_name, civil_day, entered_at, status)
                         VALUES ('a', 'Math', '2026-03-01', '2026-03-01T08:01:00+07:00', 'entered')",
                        [],
                    )
                    .map_err(|e| is_unique_violation(&e)))
            })
            .await
            .unwrap();
        assert_eq!(raw, Err(true));
    }

    #[tokio::test]
    async fn test_classes_are_independent_keys() {
        let store = store_with(&["a"]).await;
        for class in ["Math", "Physics"] {
            store
                .apply_scan(scan("a", class, "2026-03-01T08:00:00+07:00", ScanAction::Enter))
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(store.count_sessions_on(day("2026-03-01")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_logs_newest_first_across_offsets() {
        let store = store_with(&["a", "b"]).await;
        // 01:00Z, then 03:00Z recorded under a different offset.
        store
            .apply_scan(scan("a", "Math", "2026-03-01T08:00:00+07:00", ScanAction::Enter))
            .await
            .unwrap()
            .unwrap();
        store
            .apply_scan(scan("b", "Math", "2026-03-01T03:00:00+00:00", ScanAction::Enter))
            .await
            .unwrap()
            .unwrap();

        let logs = store.attendance_logs(100, None).await.unwrap();
        let order: Vec<&str> = logs.iter().map(|l| l.session.identity_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);

        let today = store.day_attendance(day("2026-03-01"), None).await.unwrap();
        assert_eq!(today[0].session.identity_id, "b");
    }

    #[tokio::test]
    async fn test_logs_join_identity_and_filter_by_day() {
        let store = store_with(&["a", "b"]).await;
        store
            .apply_scan(scan("a", "Math", "2026-03-01T08:00:00+07:00", ScanAction::Enter))
            .await
            .unwrap()
            .unwrap();
        store
            .apply_scan(scan("b", "Art", "2026-03-02T08:00:00+07:00", ScanAction::Enter))
            .await
            .unwrap()
            .unwrap();

        let all = store.attendance_logs(100, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].session.identity_id, "b");
        assert_eq!(all[0].external_id.as_deref(), Some("S-b"));

        let first_day = store
            .attendance_logs(100, Some(day("2026-03-01")))
            .await
            .unwrap();
        assert_eq!(first_day.len(), 1);
        assert_eq!(first_day[0].last_name.as_deref(), Some("A"));

        let limited = store.attendance_logs(1, None).await.unwrap();
        assert_eq!(limited.len(), 1);

        let art = store
            .day_attendance(day("2026-03-02"), Some("Art"))
            .await
            .unwrap();
        assert_eq!(art.len(), 1);
        let math = store
            .day_attendance(day("2026-03-02"), Some("Math"))
            .await
            .unwrap();
        assert!(math.is_empty());
    }

    #[tokio::test]
    async fn test_delete_identity_cascades_sessions() {
        let store = store_with(&["a", "b"]).await;
        for id in ["a", "b"] {
            store
                .apply_scan(scan(id, "Math", "2026-03-01T08:00:00+07:00", ScanAction::Enter))
                .await
                .unwrap()
                .unwrap();
        }

        assert!(store.delete_identity("a").await.unwrap());
        assert!(!store.delete_identity("a").await.unwrap());

        let logs = store.attendance_logs(100, None).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].session.identity_id, "b");
        assert_eq!(store.load_gallery().await.unwrap().len(), 1);
    }
}
