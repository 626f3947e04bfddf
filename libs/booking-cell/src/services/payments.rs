// libs/booking-cell/src/services/payments.rs
use chrono::Utc;
use rand::Rng;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{DbError, SupabaseClient};

use crate::models::{BookSessionRequest, BookingError, PaymentRecord, ResolvedParties};

/// Writes payment records for money received outside the automated payment
/// flow (cash, bank transfer, manual entry). Manual entries carry status
/// `success` directly: there is no verification step for them.
pub struct PaymentLedgerService {
    supabase: Arc<SupabaseClient>,
}

impl PaymentLedgerService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create_manual_payment(
        &self,
        request: &BookSessionRequest,
        parties: &ResolvedParties,
        auth_token: &str,
    ) -> Result<PaymentRecord, BookingError> {
        let transaction_id = generate_transaction_id();
        debug!("Creating manual payment {}", transaction_id);

        let body = json!({
            "transaction_id": transaction_id,
            "session_id": null,
            "client_id": parties.client.id,
            "psychologist_id": parties.psychologist.id,
            "package_id": request.package_id,
            "amount": request.amount,
            "status": "success",
            "payment_method": request.payment_method,
            "metadata": {
                "entry": "manual",
                "recorded_at": Utc::now().to_rfc3339(),
                "received_date": request.payment_received_date,
            },
            "created_at": Utc::now().to_rfc3339(),
        });

        let payment: PaymentRecord = self
            .supabase
            .insert_returning("payments", Some(auth_token), body)
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        info!("Manual payment {} recorded as {}", payment.transaction_id, payment.id);
        Ok(payment)
    }

    /// Link the payment to the session it funded. Called exactly once, right
    /// after the session insert succeeds.
    pub async fn attach_session(
        &self,
        payment_id: Uuid,
        session_id: Uuid,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        let path = format!("/rest/v1/payments?id=eq.{}", payment_id);
        let body = json!({ "session_id": session_id });

        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        Ok(())
    }

    /// Used only by compensation.
    pub async fn delete(&self, payment_id: Uuid, auth_token: &str) -> Result<(), DbError> {
        let path = format!("/rest/v1/payments?id=eq.{}", payment_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;
        Ok(())
    }
}

/// `MANUAL-<unix-millis>-<9 random base36 chars>`: unique in practice without
/// any coordinator-wide counter, and traceable by eye in the ledger.
pub fn generate_transaction_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| {
            let digit = rng.gen_range(0..36u32);
            char::from_digit(digit, 36).unwrap()
        })
        .collect();
    format!("MANUAL-{}-{}", millis, suffix)
}
