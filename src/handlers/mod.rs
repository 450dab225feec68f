pub mod admin;
pub mod auth;
pub mod bookings;
pub mod health;
pub mod profile;
pub mod properties;

use std::collections::HashMap;

use axum::extract::{FromRequest, FromRequestParts, Multipart};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Booking, BookingStage};
use crate::services::pricing::{self, PricingPolicy};
use crate::services::storage::Upload;

/// `Json` whose rejections come back as field-level validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query` with the same rejection mapping as [`AppJson`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Booking as returned to clients: the stored record plus derived state.
#[derive(Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: Booking,
    pub stage: BookingStage,
    pub advance_due: Decimal,
    pub outstanding: Decimal,
}

impl BookingResponse {
    pub fn new(booking: Booking, policy: &PricingPolicy) -> Self {
        // The advance never exceeds the total, so it is the fallback.
        let advance = pricing::advance_for(booking.total_amount, policy)
            .unwrap_or(booking.total_amount);
        let advance_due = (advance - booking.advance_paid).max(Decimal::ZERO);
        Self {
            stage: booking.stage(),
            outstanding: booking.outstanding_amount(),
            advance_due,
            booking,
        }
    }
}

/// A multipart body split into text fields and file parts.
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<Upload>,
}

pub async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm, AppError> {
    let mut fields = HashMap::new();
    let mut files = vec![];

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation("body", e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        if file_name.is_some() || content_type.is_some() {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::validation(&name, e.body_text()))?;
            files.push(Upload {
                field: name,
                file_name,
                content_type: content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                bytes: bytes.to_vec(),
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::validation(&name, e.body_text()))?;
            fields.insert(name, text);
        }
    }

    Ok(MultipartForm { fields, files })
}
