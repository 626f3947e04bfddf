// libs/booking-cell/src/services/resolver.rs
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{BookSessionRequest, BookingError, Client, Package, Psychologist, ResolvedParties};

/// Pure-read lookup of the parties to a booking. No side effects.
pub struct EntityResolver {
    supabase: Arc<SupabaseClient>,
}

impl EntityResolver {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn resolve(
        &self,
        request: &BookSessionRequest,
        auth_token: &str,
    ) -> Result<ResolvedParties, BookingError> {
        let client = self.resolve_client(request.client_id, auth_token).await?;
        let psychologist = self
            .resolve_psychologist(request.psychologist_id, auth_token)
            .await?;

        let package = match request.package_id {
            Some(package_id) => Some(self.resolve_package(package_id, auth_token).await?),
            None => None,
        };

        Ok(ResolvedParties {
            client,
            psychologist,
            package,
        })
    }

    /// The client reference may be the canonical primary key or a linked
    /// account key; try the primary key first, then fall back.
    async fn resolve_client(&self, client_ref: Uuid, auth_token: &str) -> Result<Client, BookingError> {
        let by_id = format!("/rest/v1/clients?id=eq.{}", client_ref);
        if let Some(client) = self.fetch_one::<Client>(&by_id, auth_token).await? {
            return Ok(client);
        }

        debug!("Client {} not found by primary key, retrying by account key", client_ref);
        let by_account = format!("/rest/v1/clients?account_id=eq.{}", client_ref);
        self.fetch_one::<Client>(&by_account, auth_token)
            .await?
            .ok_or(BookingError::ClientNotFound)
    }

    async fn resolve_psychologist(
        &self,
        psychologist_id: Uuid,
        auth_token: &str,
    ) -> Result<Psychologist, BookingError> {
        let path = format!("/rest/v1/psychologists?id=eq.{}", psychologist_id);
        self.fetch_one::<Psychologist>(&path, auth_token)
            .await?
            .ok_or(BookingError::PsychologistNotFound)
    }

    async fn resolve_package(&self, package_id: Uuid, auth_token: &str) -> Result<Package, BookingError> {
        let path = format!("/rest/v1/packages?id=eq.{}", package_id);
        self.fetch_one::<Package>(&path, auth_token)
            .await?
            .ok_or(BookingError::PackageNotFound)
    }

    async fn fetch_one<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Option<T>, BookingError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| BookingError::Database(format!("Failed to parse row: {}", e))),
            None => Ok(None),
        }
    }
}
