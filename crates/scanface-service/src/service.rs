use crate::notifier::{AttendanceEvent, Notifier, NotifyError};
use chrono::{DateTime, FixedOffset, NaiveDate};
use scanface_core::{
    civil_day, civil_time, AttendanceLog, AttendanceSession, Clock, EncodeError, Encoder,
    Encoding, Identity, Matcher, ScanAction, TransitionError,
};
use scanface_store::{IdentityUpdate, ScanRequest, Store, StoreError};
use serde::Serialize;
use thiserror::Error;

const DEFAULT_LOG_LIMIT: u32 = 100;

/// User-facing failures. The `Display` text is meant to be shown as-is.
#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("{0}, please retake the photo")]
    InvalidInput(#[from] EncodeError),
    #[error("this face is already registered ({name})")]
    DuplicateFace { identity_id: String, name: String },
    #[error("face not recognised, please register first")]
    IdentityNotFound,
    #[error("already checked in to this class today, check out first")]
    DuplicateEntry,
    #[error("no check-in found for this class today, check in first")]
    NoOpenEntry,
    #[error("identity {0} not found")]
    NotFound(String),
    #[error("student ID {0} is already assigned to someone else")]
    ExternalIdTaken(String),
    #[error("attendance store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl From<TransitionError> for AttendanceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::DuplicateEntry => AttendanceError::DuplicateEntry,
            TransitionError::NoOpenEntry => AttendanceError::NoOpenEntry,
        }
    }
}

/// Matching and calendar settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tolerance: f32,
    pub utc_offset: FixedOffset,
    pub encoding_dim: usize,
    pub default_class: String,
}

/// Administrative details attached to an identity.
#[derive(Debug, Clone, Default)]
pub struct IdentityPatch {
    pub external_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Result of a successful check-in or check-out.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReceipt {
    pub identity: Identity,
    /// Distance between the scan and the matched enrollment.
    pub distance: f32,
    pub action: ScanAction,
    pub session: AttendanceSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub version: &'static str,
    pub identities: i64,
    pub today: NaiveDate,
    pub sessions_today: i64,
    pub tolerance: f32,
    pub utc_offset: String,
    pub encoding_dim: usize,
    pub default_class: String,
    pub notifier_configured: bool,
}

/// Attendance core: enrollment, scanning and administration.
///
/// Collaborators are injected; each call re-reads the store.
pub struct AttendanceService<M, N, C> {
    store: Store,
    matcher: M,
    notifier: N,
    clock: C,
    settings: Settings,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<M: Matcher, N: Notifier, C: Clock> AttendanceService<M, N, C> {
    pub fn new(store: Store, matcher: M, notifier: N, clock: C, settings: Settings) -> Self {
        Self {
            store,
            matcher,
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn now(&self) -> DateTime<FixedOffset> {
        civil_time(self.clock.now(), self.settings.utc_offset)
    }

    fn today(&self) -> NaiveDate {
        civil_day(self.clock.now(), self.settings.utc_offset)
    }

    fn check_dim(&self, encoding: &Encoding) -> Result<(), AttendanceError> {
        if encoding.dim() != self.settings.encoding_dim {
            return Err(EncodeError::Malformed(format!(
                "expected a {}-value encoding, got {}",
                self.settings.encoding_dim,
                encoding.dim()
            ))
            .into());
        }
        Ok(())
    }

    /// Enroll a new face. Names are attached later by an administrator.
    pub async fn register_face(&self, encoding: Encoding) -> Result<Identity, AttendanceError> {
        self.check_dim(&encoding)?;

        let gallery = self.store.load_gallery().await?;
        if let Some(existing) = self
            .matcher
            .find_match(&encoding, &gallery, self.settings.tolerance)
        {
            tracing::info!(
                identity = %existing.identity.id,
                distance = existing.distance,
                "enrollment rejected: face already registered"
            );
            return Err(AttendanceError::DuplicateFace {
                name: existing.identity.display_name(),
                identity_id: existing.identity.id,
            });
        }

        let now = self.now();
        let identity = Identity {
            id: uuid::Uuid::new_v4().to_string(),
            external_id: None,
            first_name: None,
            last_name: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_identity(&identity, &encoding).await?;

        tracing::info!(identity = %identity.id, "face registered");
        Ok(identity)
    }

    /// Run `encoder` on an image and enroll the face it finds.
    pub async fn register_image<E: Encoder>(
        &self,
        encoder: &E,
        image: &[u8],
    ) -> Result<Identity, AttendanceError> {
        let encoding = encoder.encode(image)?;
        self.register_face(encoding).await
    }

    /// Check a scanned face in to or out of a class.
    ///
    /// `class_name` falls back to the configured default class. The session
    /// change is committed before the notifier runs; a notifier failure is
    /// logged and does not affect the result.
    pub async fn record_attendance(
        &self,
        encoding: Encoding,
        class_name: Option<&str>,
        action: ScanAction,
        image_ref: Option<String>,
    ) -> Result<ScanReceipt, AttendanceError> {
        self.check_dim(&encoding)?;
        let class_name = non_empty(class_name.map(str::to_string))
            .unwrap_or_else(|| self.settings.default_class.clone());

        let gallery = self.store.load_gallery().await?;
        let matched = self
            .matcher
            .find_match(&encoding, &gallery, self.settings.tolerance)
            .ok_or(AttendanceError::IdentityNotFound)?;

        let at = self.now();
        let request = ScanRequest {
            identity_id: matched.identity.id.clone(),
            class_name: class_name.clone(),
            day: at.date_naive(),
            at,
            action,
            image_ref,
        };

        let session = match self.store.apply_scan(request).await? {
            Ok(session) => session,
            Err(rejected) => {
                tracing::info!(
                    identity = %matched.identity.id,
                    class = %class_name,
                    %action,
                    reason = %rejected,
                    "scan rejected"
                );
                return Err(rejected.into());
            }
        };

        tracing::info!(
            identity = %matched.identity.id,
            class = %class_name,
            %action,
            distance = matched.distance,
            session = session.id,
            "attendance recorded"
        );

        let receipt = ScanReceipt {
            identity: matched.identity,
            distance: matched.distance,
            action,
            session,
        };
        self.notify(&receipt).await;
        Ok(receipt)
    }

    /// Run `encoder` on an image and record the scan.
    pub async fn scan_image<E: Encoder>(
        &self,
        encoder: &E,
        image: &[u8],
        class_name: Option<&str>,
        action: ScanAction,
        image_ref: Option<String>,
    ) -> Result<ScanReceipt, AttendanceError> {
        let encoding = encoder.encode(image)?;
        self.record_attendance(encoding, class_name, action, image_ref)
            .await
    }

    async fn notify(&self, receipt: &ScanReceipt) {
        let at = match receipt.action {
            ScanAction::Enter => receipt.session.entered_at,
            ScanAction::Exit => receipt.session.exited_at.unwrap_or(receipt.session.entered_at),
        };
        let event = AttendanceEvent {
            identity_id: receipt.identity.id.clone(),
            external_id: receipt.identity.external_id.clone(),
            first_name: receipt.identity.first_name.clone(),
            last_name: receipt.identity.last_name.clone(),
            class_name: receipt.session.class_name.clone(),
            action: receipt.action,
            at,
            image_ref: receipt.session.image_ref.clone(),
        };

        match self.notifier.notify(&event).await {
            Ok(()) => {}
            Err(NotifyError::NotConfigured) => {
                tracing::debug!("notifier not configured, skipping delivery");
            }
            Err(err) => {
                tracing::warn!(
                    identity = %event.identity_id,
                    error = %err,
                    "attendance notification failed"
                );
            }
        }
    }

    /// All identities, most recently enrolled first.
    pub async fn list_identities(&self) -> Result<Vec<Identity>, AttendanceError> {
        Ok(self.store.list_identities().await?)
    }

    pub async fn get_identity(&self, id: &str) -> Result<Identity, AttendanceError> {
        self.store
            .get_identity(id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(id.to_string()))
    }

    /// Attach a student ID and name to an enrolled face.
    pub async fn update_identity(
        &self,
        id: &str,
        patch: IdentityPatch,
    ) -> Result<Identity, AttendanceError> {
        let external_id = non_empty(patch.external_id);
        let outcome = self
            .store
            .update_identity(
                id,
                external_id.clone(),
                non_empty(patch.first_name),
                non_empty(patch.last_name),
                self.now(),
            )
            .await?;

        match outcome {
            IdentityUpdate::Updated(identity) => {
                tracing::info!(identity = %identity.id, "identity updated");
                Ok(identity)
            }
            IdentityUpdate::NotFound => Err(AttendanceError::NotFound(id.to_string())),
            IdentityUpdate::ExternalIdTaken => Err(AttendanceError::ExternalIdTaken(
                external_id.unwrap_or_default(),
            )),
        }
    }

    /// Delete an identity together with its encoding and sessions.
    pub async fn delete_identity(&self, id: &str) -> Result<(), AttendanceError> {
        if self.store.delete_identity(id).await? {
            Ok(())
        } else {
            Err(AttendanceError::NotFound(id.to_string()))
        }
    }

    /// Replace the stored face of an identity.
    ///
    /// Rejected if the new face matches a different enrolled identity.
    pub async fn reenroll_face(
        &self,
        id: &str,
        encoding: Encoding,
    ) -> Result<Identity, AttendanceError> {
        self.check_dim(&encoding)?;

        let gallery = self.store.load_gallery().await?;
        if !gallery.iter().any(|e| e.identity.id == id) {
            return Err(AttendanceError::NotFound(id.to_string()));
        }
        let others: Vec<_> = gallery.into_iter().filter(|e| e.identity.id != id).collect();
        if let Some(existing) = self
            .matcher
            .find_match(&encoding, &others, self.settings.tolerance)
        {
            return Err(AttendanceError::DuplicateFace {
                name: existing.identity.display_name(),
                identity_id: existing.identity.id,
            });
        }

        if !self.store.replace_encoding(id, &encoding, self.now()).await? {
            return Err(AttendanceError::NotFound(id.to_string()));
        }
        tracing::info!(identity = %id, "face re-enrolled");
        self.get_identity(id).await
    }

    /// Most recent sessions, optionally for one civil day.
    pub async fn attendance_logs(
        &self,
        limit: Option<u32>,
        day: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceLog>, AttendanceError> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT);
        Ok(self.store.attendance_logs(limit, day).await?)
    }

    /// Today's sessions, optionally for one class.
    pub async fn today_attendance(
        &self,
        class_name: Option<&str>,
    ) -> Result<Vec<AttendanceLog>, AttendanceError> {
        Ok(self.store.day_attendance(self.today(), class_name).await?)
    }

    /// Open session for (identity, class) today, if any.
    pub async fn open_session(
        &self,
        identity_id: &str,
        class_name: &str,
    ) -> Result<Option<AttendanceSession>, AttendanceError> {
        Ok(self
            .store
            .open_session(identity_id, class_name, self.today())
            .await?)
    }

    pub async fn status(&self) -> Result<ServiceStatus, AttendanceError> {
        let today = self.today();
        Ok(ServiceStatus {
            version: env!("CARGO_PKG_VERSION"),
            identities: self.store.count_identities().await?,
            today,
            sessions_today: self.store.count_sessions_on(today).await?,
            tolerance: self.settings.tolerance,
            utc_offset: self.settings.utc_offset.to_string(),
            encoding_dim: self.settings.encoding_dim,
            default_class: self.settings.default_class.clone(),
            notifier_configured: self.notifier.is_configured(),
        })
    }
}
