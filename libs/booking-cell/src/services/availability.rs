// libs/booking-cell/src/services/availability.rs
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{AvailabilityDay, BookingError};

/// Advisory availability gate over the per-day slot records. A `false` here
/// rejects the request early; a `true` guarantees nothing — the session
/// uniqueness constraint at write time is the only binding check.
pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
}

impl AvailabilityService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn is_available(
        &self,
        psychologist_id: Uuid,
        date: NaiveDate,
        time: &str,
        auth_token: &str,
    ) -> Result<bool, BookingError> {
        debug!(
            "Checking availability for psychologist {} on {} at {}",
            psychologist_id, date, time
        );

        let day = self.get_day(psychologist_id, date, auth_token).await?;
        Ok(day.map(|d| slot_is_open(&d, time)).unwrap_or(false))
    }

    /// Remove the consumed time from the day's slot list. Best effort only:
    /// the session row is the authoritative record, so any failure here is
    /// logged and swallowed rather than undoing a committed booking.
    pub async fn consume(&self, psychologist_id: Uuid, date: NaiveDate, time: &str, auth_token: &str) {
        let day = match self.get_day(psychologist_id, date, auth_token).await {
            Ok(Some(day)) => day,
            Ok(None) => {
                warn!(
                    "No availability record for psychologist {} on {} while consuming slot {}",
                    psychologist_id, date, time
                );
                return;
            }
            Err(e) => {
                warn!("Failed to load availability for slot consumption: {}", e);
                return;
            }
        };

        let remaining: Vec<&String> = day.slots.iter().filter(|s| s.as_str() != time).collect();

        let path = format!(
            "/rest/v1/availability_slots?psychologist_id=eq.{}&date=eq.{}",
            psychologist_id, date
        );
        let body = json!({ "slots": remaining });

        let result: Result<Vec<Value>, _> = self
            .supabase
            .request(Method::PATCH, &path, Some(auth_token), Some(body))
            .await;

        if let Err(e) = result {
            warn!(
                "Failed to remove slot {} for psychologist {} on {}: {}",
                time, psychologist_id, date, e
            );
        }
    }

    async fn get_day(
        &self,
        psychologist_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<AvailabilityDay>, BookingError> {
        let path = format!(
            "/rest/v1/availability_slots?psychologist_id=eq.{}&date=eq.{}",
            psychologist_id, date
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| BookingError::Database(format!("Failed to parse availability: {}", e))),
            None => Ok(None),
        }
    }
}

/// A slot is open when the day lists it and no externally-synced busy time
/// covers it.
pub fn slot_is_open(day: &AvailabilityDay, time: &str) -> bool {
    day.slots.iter().any(|s| s == time) && !day.blocked_times.iter().any(|b| b == time)
}
