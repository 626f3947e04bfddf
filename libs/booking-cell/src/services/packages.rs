// libs/booking-cell/src/services/packages.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{DbError, SupabaseClient};

use crate::models::{Package, PackageConsumption};

/// Tracks prepaid-session consumption. Runs after the session is committed
/// and its failure never unwinds the booking: an under-decremented package is
/// reconcilable, a cancelled paid session is not.
pub struct PackageConsumptionService {
    supabase: Arc<SupabaseClient>,
}

impl PackageConsumptionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn apply(
        &self,
        client_id: Uuid,
        package_id: Uuid,
        psychologist_id: Uuid,
        session_id: Uuid,
        package: &Package,
        auth_token: &str,
    ) -> Result<(), DbError> {
        match self.find_active(client_id, package_id, auth_token).await? {
            Some(consumption) => {
                let remaining = consumption.remaining_sessions - 1;
                debug!(
                    "Decrementing package {} for client {} to {} remaining",
                    package_id, client_id, remaining
                );

                let path = format!("/rest/v1/package_consumptions?id=eq.{}", consumption.id);
                let body = json!({
                    "remaining_sessions": remaining,
                    "updated_at": Utc::now().to_rfc3339(),
                });
                let _: Vec<Value> = self
                    .supabase
                    .request(Method::PATCH, &path, Some(auth_token), Some(body))
                    .await?;
            }
            None => {
                let remaining = package.session_count - 1;
                info!(
                    "First use of package {} by client {}, opening consumption with {} remaining",
                    package_id, client_id, remaining
                );

                let body = json!({
                    "client_id": client_id,
                    "package_id": package_id,
                    "psychologist_id": psychologist_id,
                    "first_session_id": session_id,
                    "remaining_sessions": remaining,
                    "status": "active",
                    "created_at": Utc::now().to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339(),
                });
                let _: Vec<Value> = self
                    .supabase
                    .request(Method::POST, "/rest/v1/package_consumptions", Some(auth_token), Some(body))
                    .await?;
            }
        }

        Ok(())
    }

    async fn find_active(
        &self,
        client_id: Uuid,
        package_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<PackageConsumption>, DbError> {
        let path = format!(
            "/rest/v1/package_consumptions?client_id=eq.{}&package_id=eq.{}&status=eq.active",
            client_id, package_id
        );

        let result: Vec<PackageConsumption> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(result.into_iter().next())
    }
}
