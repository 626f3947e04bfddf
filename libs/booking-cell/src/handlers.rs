// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{BookSessionRequest, BookingError};
use crate::services::coordinator::BookingCoordinator;

/// Single entry point of the booking saga. The bearer token is passed through
/// to the store; verification happens upstream.
#[axum::debug_handler]
pub async fn book_session(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookSessionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let coordinator = BookingCoordinator::new(&state);

    let booking = coordinator
        .book(request, token)
        .await
        .map_err(map_booking_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "booking": booking,
            "message": "Session booked successfully"
        })),
    ))
}

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::Validation(msg) => AppError::BadRequest(msg),
        BookingError::ClientNotFound => AppError::NotFound("Client not found".to_string()),
        BookingError::PsychologistNotFound => {
            AppError::NotFound("Psychologist not found".to_string())
        }
        BookingError::PackageNotFound => AppError::NotFound("Package not found".to_string()),
        BookingError::SlotUnavailable => {
            AppError::Conflict("The requested time slot is not available".to_string())
        }
        BookingError::SlotTaken => {
            AppError::Conflict("The requested time slot was just taken by another booking".to_string())
        }
        // The caller gets a generic failure; compensation details stay in the
        // logs.
        BookingError::Database(_) => AppError::Internal("Booking could not be completed".to_string()),
    }
}
