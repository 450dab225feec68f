use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::auth::authenticate;
use super::{read_multipart, AppJson, BookingResponse};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingRequest, BookingStatus};
use crate::services::{calendar, lifecycle};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let identity = authenticate(&state, &headers).await?;
    let today = Utc::now().date_naive();

    let booking = {
        let mut db = state.db()?;
        lifecycle::create_booking(&mut db, &identity, body, &state.pricing, today)?
    };
    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::new(booking, &state.pricing)),
    ))
}

// GET /api/bookings
pub async fn list_my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let identity = authenticate(&state, &headers).await?;
    let bookings = {
        let db = state.db()?;
        queries::list_bookings_for_customer(&db, &identity.id)?
    };
    Ok(Json(
        bookings
            .into_iter()
            .map(|b| BookingResponse::new(b, &state.pricing))
            .collect(),
    ))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let identity = authenticate(&state, &headers).await?;
    let db = state.db()?;
    let booking = lifecycle::load_booking(&db, &identity, &id)?;
    Ok(Json(BookingResponse::new(booking, &state.pricing)))
}

// POST /api/bookings/:id/id-proofs
//
// Multipart: every file part is treated as one ID document.
pub async fn upload_id_proofs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<BookingResponse>, AppError> {
    let identity = authenticate(&state, &headers).await?;
    let form = read_multipart(multipart).await?;
    let booking = lifecycle::upload_identity_proofs(&state, &identity, &id, form.files).await?;
    Ok(Json(BookingResponse::new(booking, &state.pricing)))
}

// POST /api/bookings/:id/payment
//
// Multipart: text fields `amount` and `reference`, optional screenshot file.
pub async fn submit_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<BookingResponse>, AppError> {
    let identity = authenticate(&state, &headers).await?;
    let mut form = read_multipart(multipart).await?;

    let raw_amount = form
        .fields
        .remove("amount")
        .ok_or_else(|| AppError::validation("amount", "payment amount is required"))?;
    let amount = Decimal::from_str(raw_amount.trim())
        .map_err(|_| AppError::validation("amount", format!("not a valid amount: {raw_amount}")))?;
    let reference = form.fields.remove("reference");
    if form.files.len() > 1 {
        return Err(AppError::validation("screenshot", "only one screenshot may be attached"));
    }
    let screenshot = form.files.pop();

    let booking = lifecycle::submit_payment_with_screenshot(
        &state,
        &identity,
        &id,
        amount,
        reference,
        screenshot,
    )
    .await?;
    Ok(Json(BookingResponse::new(booking, &state.pricing)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<AppJson<CancelRequest>>,
) -> Result<Json<BookingResponse>, AppError> {
    let identity = authenticate(&state, &headers).await?;
    let reason = body.and_then(|AppJson(b)| b.reason);

    let booking = {
        let mut db = state.db()?;
        lifecycle::cancel_booking(&mut db, &identity, &id, reason)?
    };
    Ok(Json(BookingResponse::new(booking, &state.pricing)))
}

// GET /api/bookings/:id/calendar.ics
pub async fn download_calendar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let identity = authenticate(&state, &headers).await?;

    let (booking, property) = {
        let db = state.db()?;
        let booking = lifecycle::load_booking(&db, &identity, &id)?;
        let property = queries::get_property(&db, &booking.property_id)?
            .ok_or_else(|| AppError::NotFound(format!("property {}", booking.property_id)))?;
        (booking, property)
    };
    if !matches!(
        booking.status,
        BookingStatus::Confirmed | BookingStatus::Completed
    ) {
        return Err(AppError::guard(
            "Calendar invites are only available for confirmed bookings",
        ));
    }

    let ics = calendar::generate_ics(&booking, &property);
    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"booking-{id}.ics\""),
            ),
        ],
        ics,
    ))
}
