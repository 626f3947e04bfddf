// libs/booking-cell/src/services/notifications.rs
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{Client, Psychologist, TherapySession};

/// Everything the fan-out needs, owned, so the detached task shares no
/// mutable state with the request path.
#[derive(Debug, Clone)]
pub struct BookingNotificationContext {
    pub client: Client,
    pub psychologist: Psychologist,
    pub session: TherapySession,
}

/// Fire-and-forget fan-out to email and WhatsApp, plus a reminder-eligibility
/// trigger. Each channel is isolated: one failing never stops the next, and
/// none of them are ever surfaced to the booking caller.
pub struct NotificationService {
    http: reqwest::Client,
    config: Arc<AppConfig>,
}

impl NotificationService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn dispatch(&self, context: BookingNotificationContext) {
        if let Err(e) = self.send_email_confirmation(&context).await {
            warn!("Email confirmation failed for session {}: {}", context.session.id, e);
        }
        if let Err(e) = self.send_client_whatsapp(&context).await {
            warn!(
                "Client WhatsApp confirmation failed for session {}: {}",
                context.session.id, e
            );
        }
        if let Err(e) = self.send_psychologist_whatsapp(&context).await {
            warn!(
                "Psychologist WhatsApp notification failed for session {}: {}",
                context.session.id, e
            );
        }
        if let Err(e) = self.trigger_reminder_check(&context).await {
            warn!("Reminder-eligibility check failed for session {}: {}", context.session.id, e);
        }
    }

    async fn send_email_confirmation(
        &self,
        context: &BookingNotificationContext,
    ) -> Result<(), reqwest::Error> {
        let Some(to) = context.client.email.as_deref() else {
            debug!("Client {} has no email, skipping confirmation", context.client.id);
            return Ok(());
        };

        let url = format!("{}/send", self.config.email_api_url);
        self.http
            .post(&url)
            .bearer_auth(&self.config.email_api_key)
            .json(&json!({
                "to": to,
                "template": "session_confirmation",
                "session_id": context.session.id,
                "session_date": context.session.session_date,
                "session_time": context.session.session_time,
                "psychologist_name": context.psychologist.full_name,
                "meet_link": context.session.meet_link,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn send_client_whatsapp(
        &self,
        context: &BookingNotificationContext,
    ) -> Result<(), reqwest::Error> {
        let Some(to) = context.client.phone.as_deref() else {
            debug!("Client {} has no phone, skipping WhatsApp", context.client.id);
            return Ok(());
        };
        self.send_whatsapp(to, "client_session_confirmation", context).await
    }

    async fn send_psychologist_whatsapp(
        &self,
        context: &BookingNotificationContext,
    ) -> Result<(), reqwest::Error> {
        let Some(to) = context.psychologist.phone.as_deref() else {
            debug!(
                "Psychologist {} has no phone, skipping WhatsApp",
                context.psychologist.id
            );
            return Ok(());
        };
        self.send_whatsapp(to, "psychologist_session_booked", context).await
    }

    async fn send_whatsapp(
        &self,
        to: &str,
        template: &str,
        context: &BookingNotificationContext,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/messages", self.config.whatsapp_api_url);
        self.http
            .post(&url)
            .bearer_auth(&self.config.whatsapp_api_token)
            .json(&json!({
                "to": to,
                "template": template,
                "session_date": context.session.session_date,
                "session_time": context.session.session_time,
                "client_name": context.client.full_name,
                "psychologist_name": context.psychologist.full_name,
                "meet_link": context.session.meet_link,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// A session booked inside the reminder lead window would be missed by
    /// the next scheduled batch sweep, so nudge the checker immediately.
    async fn trigger_reminder_check(
        &self,
        context: &BookingNotificationContext,
    ) -> Result<(), reqwest::Error> {
        if !session_within_reminder_window(context, self.config.reminder_lead_hours) {
            debug!("Session {} outside reminder lead window", context.session.id);
            return Ok(());
        }

        let url = format!("{}/reminders/check", self.config.whatsapp_api_url);
        self.http
            .post(&url)
            .bearer_auth(&self.config.whatsapp_api_token)
            .json(&json!({ "session_id": context.session.id }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn session_within_reminder_window(context: &BookingNotificationContext, lead_hours: i64) -> bool {
    let Ok(time) = chrono::NaiveTime::parse_from_str(&context.session.session_time, "%H:%M") else {
        return false;
    };
    let start = context.session.session_date.and_time(time).and_utc();
    start <= Utc::now() + Duration::hours(lead_hours)
}
