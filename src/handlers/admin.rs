use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::auth::authenticate_admin;
use super::{AppJson, AppQuery, BookingResponse};
use crate::db::queries::{self, BookingFilter, BookingStats};
use crate::errors::AppError;
use crate::models::{BookingStatus, VerificationStatus};
use crate::services::lifecycle;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub verification_status: Option<String>,
    pub property_id: Option<String>,
    pub limit: Option<i64>,
}

impl BookingsQuery {
    fn into_filter(self) -> Result<BookingFilter, AppError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(BookingStatus::parse(s).ok_or_else(|| {
                AppError::validation("status", format!("unknown booking status: {s}"))
            })?),
            None => None,
        };
        let verification_status = match self
            .verification_status
            .as_deref()
            .filter(|s| !s.is_empty())
        {
            Some(s) => Some(VerificationStatus::parse(s).ok_or_else(|| {
                AppError::validation(
                    "verification_status",
                    format!("unknown verification status: {s}"),
                )
            })?),
            None => None,
        };

        Ok(BookingFilter {
            status,
            verification_status,
            property_id: self.property_id.filter(|p| !p.is_empty()),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        })
    }
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppQuery(query): AppQuery<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    authenticate_admin(&state, &headers).await?;
    let filter = query.into_filter()?;

    let bookings = {
        let db = state.db()?;
        queries::list_bookings(&db, &filter)?
    };
    Ok(Json(
        bookings
            .into_iter()
            .map(|b| BookingResponse::new(b, &state.pricing))
            .collect(),
    ))
}

// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BookingStats>, AppError> {
    authenticate_admin(&state, &headers).await?;
    let db = state.db()?;
    Ok(Json(queries::get_booking_stats(&db)?))
}

// POST /api/admin/bookings/:id/verify
#[derive(Deserialize)]
pub struct VerifyRequest {
    pub status: VerificationStatus,
}

pub async fn verify_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    AppJson(body): AppJson<VerifyRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let admin = authenticate_admin(&state, &headers).await?;
    let booking = {
        let mut db = state.db()?;
        lifecycle::set_verification(&mut db, &admin, &id, body.status)?
    };
    Ok(Json(BookingResponse::new(booking, &state.pricing)))
}

// POST /api/admin/bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let admin = authenticate_admin(&state, &headers).await?;
    let booking = {
        let mut db = state.db()?;
        lifecycle::confirm_booking(&mut db, &admin, &id)?
    };
    Ok(Json(BookingResponse::new(booking, &state.pricing)))
}

// POST /api/admin/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let admin = authenticate_admin(&state, &headers).await?;
    let booking = {
        let mut db = state.db()?;
        lifecycle::complete_booking(&mut db, &admin, &id)?
    };
    Ok(Json(BookingResponse::new(booking, &state.pricing)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(
        status: Option<&str>,
        verification: Option<&str>,
        limit: Option<i64>,
    ) -> BookingsQuery {
        BookingsQuery {
            status: status.map(str::to_string),
            verification_status: verification.map(str::to_string),
            property_id: None,
            limit,
        }
    }

    #[test]
    fn test_filter_defaults() {
        let f = query(None, None, None).into_filter().unwrap();
        assert!(f.status.is_none());
        assert!(f.verification_status.is_none());
        assert_eq!(f.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_filter_parses_statuses_and_clamps_limit() {
        let f = query(Some("confirmed"), Some("approved"), Some(10_000))
            .into_filter()
            .unwrap();
        assert_eq!(f.status, Some(BookingStatus::Confirmed));
        assert_eq!(f.verification_status, Some(VerificationStatus::Approved));
        assert_eq!(f.limit, MAX_LIMIT);
    }

    #[test]
    fn test_filter_rejects_unknown_status() {
        let err = query(Some("archived"), None, None).into_filter().unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "status"));
    }
}
