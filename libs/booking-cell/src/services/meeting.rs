// libs/booking-cell/src/services/meeting.rs
use chrono::{Duration, Utc};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{BookSessionRequest, MeetingDetails, MeetingMethod, Psychologist, ResolvedParties};

/// Minutes of validity an access token must still have to be used as-is.
const TOKEN_EXPIRY_BUFFER_MINUTES: i64 = 5;

enum CredentialPlan {
    /// Use the psychologist's own token; the provider refreshes it when a
    /// refresh token exists.
    PractitionerToken(String),
    /// Service-level credential: can create the calendar event but cannot
    /// mint a live meeting link. `requires_reauth` tells the caller the
    /// practitioner should re-connect their calendar.
    ServiceFallback { requires_reauth: bool },
}

/// Best-effort call to the external calendar/meeting provider. This service
/// never fails the saga: every error path collapses to a degraded
/// `MeetingDetails` and the coordinator proceeds.
pub struct MeetingLinkService {
    http: reqwest::Client,
    config: Arc<AppConfig>,
}

impl MeetingLinkService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn provision(
        &self,
        request: &BookSessionRequest,
        parties: &ResolvedParties,
    ) -> MeetingDetails {
        if !self.config.is_calendar_configured() {
            debug!("Calendar provider not configured, skipping meeting provisioning");
            return MeetingDetails::degraded();
        }

        let plan = select_credential(&parties.psychologist);
        let wait = std::time::Duration::from_secs(self.config.meeting_provision_timeout_secs);

        match timeout(wait, self.create_event(request, parties, &plan)).await {
            Ok(Ok(details)) => details,
            Ok(Err(e)) => {
                warn!("Meeting provisioning failed, continuing without link: {}", e);
                MeetingDetails::degraded()
            }
            Err(_) => {
                warn!(
                    "Meeting provisioning timed out after {}s, continuing without link",
                    self.config.meeting_provision_timeout_secs
                );
                MeetingDetails::degraded()
            }
        }
    }

    async fn create_event(
        &self,
        request: &BookSessionRequest,
        parties: &ResolvedParties,
        plan: &CredentialPlan,
    ) -> Result<MeetingDetails, reqwest::Error> {
        let (token, method, requires_reauth, with_meet_link) = match plan {
            CredentialPlan::PractitionerToken(token) => {
                (token.clone(), MeetingMethod::Oauth, false, true)
            }
            CredentialPlan::ServiceFallback { requires_reauth } => (
                self.config.calendar_service_token.clone(),
                MeetingMethod::Service,
                *requires_reauth,
                false,
            ),
        };

        let body = json!({
            "summary": format!("Therapy session with {}", parties.client.full_name),
            "date": request.scheduled_date,
            "time": request.scheduled_time,
            "attendees": [parties.client.email, parties.psychologist.email],
            "refresh_token": parties.psychologist.calendar_refresh_token,
            "request_meet_link": with_meet_link,
        });

        let url = format!("{}/events", self.config.calendar_api_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let event: Value = response.json().await?;

        let meet_link = event["meet_link"]
            .as_str()
            .filter(|link| !is_placeholder_link(link))
            .map(String::from);

        let details = MeetingDetails {
            meet_link,
            event_id: event["event_id"].as_str().map(String::from),
            calendar_link: event["html_link"].as_str().map(String::from),
            method,
            requires_reauth,
        };

        info!(
            "Provisioned calendar event {:?} via {:?} (live link: {})",
            details.event_id,
            details.method,
            details.meet_link.is_some()
        );
        Ok(details)
    }
}

fn select_credential(psychologist: &Psychologist) -> CredentialPlan {
    let now = Utc::now();
    let buffer = Duration::minutes(TOKEN_EXPIRY_BUFFER_MINUTES);

    match (
        &psychologist.calendar_access_token,
        psychologist.calendar_token_expiry,
    ) {
        (Some(token), Some(expiry)) if expiry > now + buffer => {
            CredentialPlan::PractitionerToken(token.clone())
        }
        (Some(token), _) if psychologist.calendar_refresh_token.is_some() => {
            // Expired, but the provider can refresh on our behalf.
            CredentialPlan::PractitionerToken(token.clone())
        }
        (Some(_), _) => CredentialPlan::ServiceFallback { requires_reauth: true },
        (None, _) => CredentialPlan::ServiceFallback { requires_reauth: false },
    }
}

/// Links of the `.../new?...` shape are the provider's "create one yourself"
/// placeholder, not a real meeting. Treat them as absent everywhere.
pub fn is_placeholder_link(link: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"/new(\?|$)").expect("valid placeholder pattern"));
    re.is_match(link)
}
