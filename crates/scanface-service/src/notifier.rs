//! Outbound notification of committed attendance transitions.

use chrono::{DateTime, FixedOffset};
use scanface_core::ScanAction;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const ENTER_COLOR: u32 = 0x57F287;
const EXIT_COLOR: u32 = 0xFFA500;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("webhook URL not configured")]
    NotConfigured,
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    Status(u16),
}

/// Summary of one committed check-in or check-out.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceEvent {
    pub identity_id: String,
    pub external_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub class_name: String,
    pub action: ScanAction,
    pub at: DateTime<FixedOffset>,
    pub image_ref: Option<String>,
}

/// Delivers attendance events to an external system.
///
/// Called only after the transition is durable. Errors are logged by the
/// caller and never fail the request.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        event: &AttendanceEvent,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;

    /// Whether delivery is set up at all.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Posts a chat-style embed to a webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    /// JSON body for one event.
    pub fn payload(event: &AttendanceEvent) -> serde_json::Value {
        let name = format!(
            "{} {}",
            event.first_name.as_deref().unwrap_or("Unnamed"),
            event.last_name.as_deref().unwrap_or("")
        );
        let (title, color, time_label) = match event.action {
            ScanAction::Enter => ("Check-in", ENTER_COLOR, "Entry time"),
            ScanAction::Exit => ("Check-out", EXIT_COLOR, "Exit time"),
        };

        serde_json::json!({
            "embeds": [{
                "title": title,
                "color": color,
                "fields": [
                    { "name": "Student", "value": name.trim(), "inline": true },
                    {
                        "name": "Student ID",
                        "value": event.external_id.as_deref().unwrap_or("Not assigned"),
                        "inline": true
                    },
                    { "name": "Class", "value": event.class_name, "inline": false },
                    { "name": time_label, "value": event.at.format("%H:%M:%S").to_string(), "inline": true },
                    { "name": "Date", "value": event.at.format("%d/%m/%Y").to_string(), "inline": true }
                ],
                "footer": { "text": "ScanFace attendance" },
                "timestamp": event.at.to_rfc3339()
            }]
        })
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &AttendanceEvent) -> Result<(), NotifyError> {
        let url = self.url.as_deref().ok_or(NotifyError::NotConfigured)?;

        let resp = self
            .client
            .post(url)
            .json(&Self::payload(event))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status().as_u16()));
        }

        tracing::debug!(
            identity = %event.identity_id,
            class = %event.class_name,
            action = %event.action,
            "webhook delivered"
        );
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}
