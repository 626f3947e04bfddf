// libs/booking-cell/src/services/sessions.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use shared_database::{DbError, SupabaseClient};

use crate::models::{
    BookSessionRequest, BookingError, MeetingDetails, PaymentRecord, SessionStatus, TherapySession,
};

/// Inserts the canonical booking record. The store enforces a partial unique
/// index over (psychologist_id, session_date, session_time) for active
/// statuses; two racing coordinators both pass the advisory check, exactly
/// one insert wins, the other sees `SlotTaken` here.
pub struct SessionWriterService {
    supabase: Arc<SupabaseClient>,
}

impl SessionWriterService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create(
        &self,
        request: &BookSessionRequest,
        payment: &PaymentRecord,
        meeting: &MeetingDetails,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        let now = Utc::now();
        let body = json!({
            "client_id": payment.client_id,
            "psychologist_id": request.psychologist_id,
            "package_id": request.package_id,
            "session_date": request.scheduled_date,
            "session_time": request.scheduled_time,
            "status": SessionStatus::Booked.to_string(),
            "payment_id": payment.id,
            "price": request.amount,
            "meet_link": meeting.meet_link,
            "calendar_event_id": meeting.event_id,
            "calendar_link": meeting.calendar_link,
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let session: TherapySession = self
            .supabase
            .insert_returning("sessions", Some(auth_token), body)
            .await
            .map_err(|e| match e {
                DbError::Conflict(detail) => {
                    warn!(
                        "Session slot race lost for psychologist {} on {} {}: {}",
                        request.psychologist_id, request.scheduled_date, request.scheduled_time, detail
                    );
                    BookingError::SlotTaken
                }
                other => BookingError::Database(other.to_string()),
            })?;

        info!(
            "Session {} booked for psychologist {} on {} {}",
            session.id, session.psychologist_id, session.session_date, session.session_time
        );
        Ok(session)
    }

    /// Used only by compensation.
    pub async fn delete(&self, session_id: Uuid, auth_token: &str) -> Result<(), DbError> {
        let path = format!("/rest/v1/sessions?id=eq.{}", session_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;
        Ok(())
    }
}
