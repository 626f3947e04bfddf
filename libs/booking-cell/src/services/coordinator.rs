// libs/booking-cell/src/services/coordinator.rs
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{BookSessionRequest, BookingConfirmation, BookingError};
use crate::services::availability::AvailabilityService;
use crate::services::meeting::MeetingLinkService;
use crate::services::notifications::{BookingNotificationContext, NotificationService};
use crate::services::packages::PackageConsumptionService;
use crate::services::payments::PaymentLedgerService;
use crate::services::resolver::EntityResolver;
use crate::services::sessions::SessionWriterService;

/// A resource the saga has committed and may need to undo. Extending the saga
/// with a new resource type means adding a variant here and an arm in
/// `compensate`; nothing else can be forgotten.
#[derive(Debug, Clone, Copy)]
pub enum CommittedStep {
    Payment(Uuid),
    Session(Uuid),
}

/// Orchestrates one booking request as a saga across the payment ledger, the
/// session ledger, the availability calendar and the package ledger. No
/// cross-resource transaction exists, so ordering plus compensation is the
/// whole correctness story. No in-process lock either: the session table's
/// uniqueness constraint arbitrates concurrent bookings, which keeps multiple
/// coordinator processes safe.
pub struct BookingCoordinator {
    resolver: EntityResolver,
    availability: Arc<AvailabilityService>,
    payments: Arc<PaymentLedgerService>,
    meeting: MeetingLinkService,
    sessions: Arc<SessionWriterService>,
    packages: Arc<PackageConsumptionService>,
    notifications: Arc<NotificationService>,
}

impl BookingCoordinator {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let config = Arc::new(config.clone());

        Self {
            resolver: EntityResolver::new(Arc::clone(&supabase)),
            availability: Arc::new(AvailabilityService::new(Arc::clone(&supabase))),
            payments: Arc::new(PaymentLedgerService::new(Arc::clone(&supabase))),
            meeting: MeetingLinkService::new(Arc::clone(&config)),
            sessions: Arc::new(SessionWriterService::new(Arc::clone(&supabase))),
            packages: Arc::new(PackageConsumptionService::new(supabase)),
            notifications: Arc::new(NotificationService::new(config)),
        }
    }

    pub async fn book(
        &self,
        request: BookSessionRequest,
        auth_token: &str,
    ) -> Result<BookingConfirmation, BookingError> {
        info!(
            "Booking session for client {} with psychologist {} on {} {}",
            request.client_id, request.psychologist_id, request.scheduled_date, request.scheduled_time
        );

        // No side effects before this line and none until the payment insert:
        // validation, resolution and the advisory check can all bail cleanly.
        request.validate()?;

        let parties = self.resolver.resolve(&request, auth_token).await?;

        let available = self
            .availability
            .is_available(
                request.psychologist_id,
                request.scheduled_date,
                &request.scheduled_time,
                auth_token,
            )
            .await?;
        if !available {
            return Err(BookingError::SlotUnavailable);
        }

        let mut committed: Vec<CommittedStep> = Vec::new();

        let payment = self
            .payments
            .create_manual_payment(&request, &parties, auth_token)
            .await?;
        committed.push(CommittedStep::Payment(payment.id));

        // Best effort; a degraded result still books the session.
        let meeting = self.meeting.provision(&request, &parties).await;

        let session = match self
            .sessions
            .create(&request, &payment, &meeting, auth_token)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.compensate(&committed, auth_token).await;
                return Err(e);
            }
        };
        committed.push(CommittedStep::Session(session.id));

        // Last fatal point: a session whose payment never links to it would
        // break the ledger invariant, so unwind both records instead.
        if let Err(e) = self
            .payments
            .attach_session(payment.id, session.id, auth_token)
            .await
        {
            self.compensate(&committed, auth_token).await;
            return Err(e);
        }

        // Committed. Everything below is best effort and cannot revert the
        // booking.
        self.availability
            .consume(
                request.psychologist_id,
                request.scheduled_date,
                &request.scheduled_time,
                auth_token,
            )
            .await;

        self.spawn_side_effects(&request, &parties, &session, auth_token);

        Ok(BookingConfirmation {
            session,
            client: parties.client,
            psychologist: parties.psychologist,
            package: parties.package,
        })
    }

    /// Walk the committed steps in reverse, deleting each resource. Failures
    /// are logged and do not stop the remaining deletions: the saga has
    /// already failed, and a stray unlinked payment is auditable residue
    /// while a duplicate paid session is not.
    async fn compensate(&self, steps: &[CommittedStep], auth_token: &str) {
        warn!("Compensating {} committed step(s) in reverse order", steps.len());

        for step in steps.iter().rev() {
            match step {
                CommittedStep::Session(session_id) => {
                    if let Err(e) = self.sessions.delete(*session_id, auth_token).await {
                        error!("Compensation failed to delete session {}: {}", session_id, e);
                    }
                }
                CommittedStep::Payment(payment_id) => {
                    if let Err(e) = self.payments.delete(*payment_id, auth_token).await {
                        error!("Compensation failed to delete payment {}: {}", payment_id, e);
                    }
                }
            }
        }
    }

    /// Package bookkeeping and the notification fan-out run detached: the
    /// caller's response does not wait on them, and the task owns all of its
    /// data and catches every error itself.
    fn spawn_side_effects(
        &self,
        request: &BookSessionRequest,
        parties: &crate::models::ResolvedParties,
        session: &crate::models::TherapySession,
        auth_token: &str,
    ) {
        let packages = Arc::clone(&self.packages);
        let notifications = Arc::clone(&self.notifications);
        let package = parties.package.clone();
        let context = BookingNotificationContext {
            client: parties.client.clone(),
            psychologist: parties.psychologist.clone(),
            session: session.clone(),
        };
        let package_id = request.package_id;
        let token = auth_token.to_string();

        tokio::spawn(async move {
            if let (Some(package_id), Some(package)) = (package_id, package) {
                let result = packages
                    .apply(
                        context.client.id,
                        package_id,
                        context.psychologist.id,
                        context.session.id,
                        &package,
                        &token,
                    )
                    .await;
                if let Err(e) = result {
                    // Known eventual-consistency gap: the package can stay
                    // under-decremented until reconciled out of band.
                    warn!(
                        "Package consumption update failed for session {}: {}",
                        context.session.id, e
                    );
                }
            }

            notifications.dispatch(context).await;
        });
    }
}
