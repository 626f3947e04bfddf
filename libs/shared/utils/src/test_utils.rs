use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;

/// Configuration pointing every external surface at a local mock server.
pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub calendar_api_url: String,
    pub notification_api_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            calendar_api_url: "http://localhost:54322".to_string(),
            notification_api_url: "http://localhost:54323".to_string(),
        }
    }
}

impl TestConfig {
    /// Point all external surfaces at a single wiremock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            calendar_api_url: format!("{}/calendar", uri),
            notification_api_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            calendar_api_url: self.calendar_api_url.clone(),
            calendar_service_token: "test-calendar-service-token".to_string(),
            email_api_url: format!("{}/email", self.notification_api_url),
            email_api_key: "test-email-key".to_string(),
            whatsapp_api_url: format!("{}/whatsapp", self.notification_api_url),
            whatsapp_api_token: "test-whatsapp-token".to_string(),
            reminder_lead_hours: 24,
            meeting_provision_timeout_secs: 2,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Canned PostgREST row payloads for wiremock-backed tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn client_row(id: &Uuid, name: &str) -> Value {
        json!({
            "id": id,
            "account_id": null,
            "full_name": name,
            "email": format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            "phone": "+5215512345678"
        })
    }

    pub fn client_row_with_account(id: &Uuid, account_id: &Uuid, name: &str) -> Value {
        let mut row = Self::client_row(id, name);
        row["account_id"] = json!(account_id);
        row
    }

    pub fn psychologist_row(id: &Uuid, name: &str) -> Value {
        json!({
            "id": id,
            "full_name": name,
            "email": format!("{}@clinic.example.com", name.to_lowercase().replace(' ', ".")),
            "phone": "+5215587654321",
            "calendar_access_token": null,
            "calendar_refresh_token": null,
            "calendar_token_expiry": null
        })
    }

    pub fn psychologist_row_with_calendar(id: &Uuid, name: &str, expires_in_minutes: i64) -> Value {
        let mut row = Self::psychologist_row(id, name);
        row["calendar_access_token"] = json!("ya29.test-access-token");
        row["calendar_refresh_token"] = json!("1//test-refresh-token");
        row["calendar_token_expiry"] =
            json!(Utc::now() + chrono::Duration::minutes(expires_in_minutes));
        row
    }

    pub fn package_row(id: &Uuid, session_count: i32, price: f64) -> Value {
        json!({
            "id": id,
            "name": format!("{}-session package", session_count),
            "session_count": session_count,
            "price": price
        })
    }

    pub fn payment_row(id: &Uuid, client_id: &Uuid, psychologist_id: &Uuid, amount: f64) -> Value {
        json!({
            "id": id,
            "transaction_id": format!("MANUAL-{}-abc123def", Utc::now().timestamp_millis()),
            "session_id": null,
            "client_id": client_id,
            "psychologist_id": psychologist_id,
            "package_id": null,
            "amount": amount,
            "status": "success",
            "payment_method": "cash",
            "metadata": {},
            "created_at": Utc::now()
        })
    }

    pub fn session_row(
        id: &Uuid,
        client_id: &Uuid,
        psychologist_id: &Uuid,
        payment_id: &Uuid,
        date: &str,
        time: &str,
    ) -> Value {
        json!({
            "id": id,
            "client_id": client_id,
            "psychologist_id": psychologist_id,
            "package_id": null,
            "session_date": date,
            "session_time": time,
            "status": "booked",
            "payment_id": payment_id,
            "price": 1000.0,
            "meet_link": null,
            "calendar_event_id": null,
            "calendar_link": null,
            "notes": null,
            "created_at": Utc::now(),
            "updated_at": Utc::now()
        })
    }

    pub fn availability_row(psychologist_id: &Uuid, date: &str, slots: &[&str]) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "psychologist_id": psychologist_id,
            "date": date,
            "slots": slots,
            "blocked_times": []
        })
    }

    pub fn consumption_row(
        client_id: &Uuid,
        package_id: &Uuid,
        psychologist_id: &Uuid,
        remaining: i32,
    ) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "client_id": client_id,
            "package_id": package_id,
            "psychologist_id": psychologist_id,
            "first_session_id": null,
            "remaining_sessions": remaining,
            "status": "active",
            "created_at": Utc::now(),
            "updated_at": Utc::now()
        })
    }

    /// PostgREST body for a unique-index violation on the session tuple.
    pub fn unique_violation_body() -> Value {
        json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"sessions_slot_active_key\"",
            "details": "Key (psychologist_id, session_date, session_time) already exists."
        })
    }
}
