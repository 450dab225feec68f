use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::auth::authenticate_admin;
use super::{read_multipart, AppJson};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{NewProperty, Property, PropertyPatch};
use crate::services::lifecycle;
use crate::services::pricing::PriceBreakdown;
use crate::services::storage::{self, Upload, UploadKind};
use crate::state::AppState;

fn property_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("property {id}"))
}

// GET /api/properties
pub async fn list_properties(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Property>>, AppError> {
    let db = state.db()?;
    Ok(Json(queries::list_properties(&db, true)?))
}

// GET /api/properties/:id
pub async fn get_property(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Property>, AppError> {
    let db = state.db()?;
    match queries::get_property(&db, &id)? {
        Some(p) if p.is_active => Ok(Json(p)),
        _ => Err(property_not_found(&id)),
    }
}

// GET /api/properties/:id/booked-dates
#[derive(Serialize)]
pub struct BookedDatesResponse {
    property_id: String,
    dates: Vec<NaiveDate>,
}

pub async fn booked_dates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookedDatesResponse>, AppError> {
    let db = state.db()?;
    if queries::get_property(&db, &id)?.is_none() {
        return Err(property_not_found(&id));
    }
    let today = Utc::now().date_naive();
    let dates = queries::held_dates(&db, &id, &today)?;
    Ok(Json(BookedDatesResponse {
        property_id: id,
        dates,
    }))
}

// POST /api/quotes
#[derive(Deserialize)]
pub struct QuoteRequest {
    pub property_id: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: Option<NaiveDate>,
    pub num_guests: u32,
    #[serde(default)]
    pub food_required: bool,
}

pub async fn quote(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<QuoteRequest>,
) -> Result<Json<PriceBreakdown>, AppError> {
    let property = {
        let db = state.db()?;
        queries::get_property(&db, &body.property_id)?
    }
    .filter(|p| p.is_active)
    .ok_or_else(|| property_not_found(&body.property_id))?;

    let breakdown = lifecycle::compute_booking_quote(
        &property,
        body.check_in_date,
        body.check_out_date.unwrap_or(body.check_in_date),
        body.num_guests,
        body.food_required,
        &state.pricing,
    )?;
    Ok(Json(breakdown))
}

// GET /api/admin/properties
pub async fn admin_list_properties(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Property>>, AppError> {
    authenticate_admin(&state, &headers).await?;
    let db = state.db()?;
    Ok(Json(queries::list_properties(&db, false)?))
}

// POST /api/admin/properties
pub async fn create_property(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<NewProperty>,
) -> Result<(StatusCode, Json<Property>), AppError> {
    let admin = authenticate_admin(&state, &headers).await?;

    let property = Property::from_new(
        uuid::Uuid::new_v4().to_string(),
        body,
        Utc::now().naive_utc(),
    )?;
    {
        let db = state.db()?;
        queries::insert_property(&db, &property)?;
    }

    tracing::info!(property_id = %property.id, admin = %admin.id, "property created");
    Ok((StatusCode::CREATED, Json(property)))
}

// PUT /api/admin/properties/:id
pub async fn update_property(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    AppJson(patch): AppJson<PropertyPatch>,
) -> Result<Json<Property>, AppError> {
    let admin = authenticate_admin(&state, &headers).await?;

    let db = state.db()?;
    let mut property =
        queries::get_property(&db, &id)?.ok_or_else(|| property_not_found(&id))?;
    property.apply(patch, Utc::now().naive_utc())?;
    queries::update_property(&db, &property)?;

    tracing::info!(
        property_id = %id,
        admin = %admin.id,
        active = property.is_active,
        "property updated"
    );
    Ok(Json(property))
}

// POST /api/admin/properties/:id/media
//
// Multipart: file parts named `images` or `videos`.
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Property>, AppError> {
    authenticate_admin(&state, &headers).await?;
    {
        let db = state.db()?;
        if queries::get_property(&db, &id)?.is_none() {
            return Err(property_not_found(&id));
        }
    }

    let form = read_multipart(multipart).await?;
    let (videos, images): (Vec<Upload>, Vec<Upload>) =
        form.files.into_iter().partition(|f| f.field == "videos");
    if images.is_empty() && videos.is_empty() {
        return Err(AppError::validation("images", "no files uploaded"));
    }

    let max = state.config.max_upload_bytes;
    // Validate everything up front so a bad video does not leave stored images behind.
    for f in &images {
        f.validate(UploadKind::PropertyImage, max)?;
    }
    for f in &videos {
        f.validate(UploadKind::PropertyVideo, max)?;
    }
    let image_urls = storage::store_all(
        state.blobs.as_ref(),
        &format!("properties/{id}/images"),
        UploadKind::PropertyImage,
        images,
        max,
    )
    .await?;
    let video_urls = storage::store_all(
        state.blobs.as_ref(),
        &format!("properties/{id}/videos"),
        UploadKind::PropertyVideo,
        videos,
        max,
    )
    .await?;

    // Re-read so edits made while uploading are not lost.
    let db = state.db()?;
    let mut property =
        queries::get_property(&db, &id)?.ok_or_else(|| property_not_found(&id))?;
    property.images.extend(image_urls);
    property.videos.extend(video_urls);
    property.updated_at = Utc::now().naive_utc();
    queries::update_property(&db, &property)?;

    tracing::info!(
        property_id = %id,
        images = property.images.len(),
        videos = property.videos.len(),
        "property media uploaded"
    );
    Ok(Json(property))
}
