// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// BOOKING REQUEST
// ==============================================================================

/// Input DTO for the booking saga. `client_id` may be either the canonical
/// client primary key or a linked account key; the resolver tries both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSessionRequest {
    pub client_id: Uuid,
    pub psychologist_id: Uuid,
    pub package_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub amount: f64,
    pub payment_received_date: NaiveDate,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

impl BookSessionRequest {
    pub fn validate(&self) -> Result<(), BookingError> {
        if NaiveTime::parse_from_str(&self.scheduled_time, "%H:%M").is_err() {
            return Err(BookingError::Validation(format!(
                "scheduled_time must be HH:MM, got '{}'",
                self.scheduled_time
            )));
        }
        if self.amount <= 0.0 {
            return Err(BookingError::Validation(
                "amount must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Session start as a UTC instant, used for the reminder lead-time check.
    pub fn scheduled_start(&self) -> Option<DateTime<Utc>> {
        let time = NaiveTime::parse_from_str(&self.scheduled_time, "%H:%M").ok()?;
        Some(self.scheduled_date.and_time(time).and_utc())
    }
}

// ==============================================================================
// RESOLVED ENTITIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Psychologist {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub calendar_access_token: Option<String>,
    pub calendar_refresh_token: Option<String>,
    pub calendar_token_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    pub name: String,
    pub session_count: i32,
    pub price: f64,
}

/// Everything the coordinator needs resolved before any write happens.
#[derive(Debug, Clone)]
pub struct ResolvedParties {
    pub client: Client,
    pub psychologist: Psychologist,
    pub package: Option<Package>,
}

// ==============================================================================
// LEDGER RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub transaction_id: String,
    pub session_id: Option<Uuid>,
    pub client_id: Uuid,
    pub psychologist_id: Uuid,
    pub package_id: Option<Uuid>,
    pub amount: f64,
    pub status: String,
    pub payment_method: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapySession {
    pub id: Uuid,
    pub client_id: Uuid,
    pub psychologist_id: Uuid,
    pub package_id: Option<Uuid>,
    pub session_date: NaiveDate,
    pub session_time: String,
    pub status: SessionStatus,
    pub payment_id: Uuid,
    pub price: f64,
    pub meet_link: Option<String>,
    pub calendar_event_id: Option<String>,
    pub calendar_link: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Booked,
    Rescheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl SessionStatus {
    /// Statuses covered by the store-level uniqueness constraint on
    /// (psychologist, date, time).
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Booked | SessionStatus::Rescheduled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Booked => write!(f, "booked"),
            SessionStatus::Rescheduled => write!(f, "rescheduled"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
            SessionStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// Per (psychologist, date) record of bookable times. Advisory only; the
/// session uniqueness constraint is the authoritative guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub id: Uuid,
    pub psychologist_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<String>,
    #[serde(default)]
    pub blocked_times: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConsumption {
    pub id: Uuid,
    pub client_id: Uuid,
    pub package_id: Uuid,
    pub psychologist_id: Uuid,
    pub first_session_id: Option<Uuid>,
    pub remaining_sessions: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// MEETING PROVISIONING
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MeetingMethod {
    Oauth,
    Service,
    Error,
}

/// Outcome of the meeting-link provisioning step. Never fatal to the saga:
/// a failed provider call becomes `method: error` with null links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub meet_link: Option<String>,
    pub event_id: Option<String>,
    pub calendar_link: Option<String>,
    pub method: MeetingMethod,
    pub requires_reauth: bool,
}

impl MeetingDetails {
    pub fn degraded() -> Self {
        Self {
            meet_link: None,
            event_id: None,
            calendar_link: None,
            method: MeetingMethod::Error,
            requires_reauth: false,
        }
    }
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// Fully joined booking record returned on HTTP 201.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub session: TherapySession,
    pub client: Client,
    pub psychologist: Psychologist,
    pub package: Option<Package>,
}

// ==============================================================================
// ERROR TAXONOMY
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Client not found")]
    ClientNotFound,

    #[error("Psychologist not found")]
    PsychologistNotFound,

    #[error("Package not found")]
    PackageNotFound,

    #[error("The requested time slot is not available")]
    SlotUnavailable,

    #[error("The requested time slot was just taken by another booking")]
    SlotTaken,

    #[error("Database error: {0}")]
    Database(String),
}
