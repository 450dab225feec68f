use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::auth::authenticate;
use super::AppJson;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Identity, Profile};
use crate::state::AppState;

fn empty_profile(identity: &Identity) -> Profile {
    Profile {
        user_id: identity.id.clone(),
        full_name: None,
        phone: identity.phone.clone(),
        phone_verified: identity.phone.is_some(),
        updated_at: Utc::now().naive_utc(),
    }
}

// GET /api/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Profile>, AppError> {
    let identity = authenticate(&state, &headers).await?;
    let db = state.db()?;
    let profile =
        queries::get_profile(&db, &identity.id)?.unwrap_or_else(|| empty_profile(&identity));
    Ok(Json(profile))
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// Applies `update` to `profile`. A phone number only counts as verified when
/// it matches the one vouched for by the identity provider.
fn apply_update(
    profile: &mut Profile,
    identity: &Identity,
    update: ProfileUpdate,
) -> Result<(), AppError> {
    if let Some(name) = update.full_name {
        let name = name.trim();
        profile.full_name = (!name.is_empty()).then(|| name.to_string());
    }
    if let Some(phone) = update.phone {
        let phone = phone.trim().to_string();
        if !phone.is_empty()
            && !phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
        {
            return Err(AppError::validation(
                "phone",
                "phone number contains invalid characters",
            ));
        }
        if profile.phone.as_deref() != Some(phone.as_str()) {
            profile.phone_verified = identity.phone.as_deref() == Some(phone.as_str());
            profile.phone = (!phone.is_empty()).then_some(phone);
        }
    }
    Ok(())
}

// PUT /api/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(update): AppJson<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    let identity = authenticate(&state, &headers).await?;

    let db = state.db()?;
    let mut profile =
        queries::get_profile(&db, &identity.id)?.unwrap_or_else(|| empty_profile(&identity));
    apply_update(&mut profile, &identity, update)?;
    profile.updated_at = Utc::now().naive_utc();
    queries::save_profile(&db, &profile)?;

    tracing::info!(user_id = %identity.id, has_phone = profile.has_phone(), "profile updated");
    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn identity(phone: Option<&str>) -> Identity {
        Identity {
            id: "u-1".to_string(),
            role: Role::Customer,
            phone: phone.map(str::to_string),
        }
    }

    #[test]
    fn test_changing_phone_resets_verification() {
        let id = identity(Some("+15550001111"));
        let mut profile = empty_profile(&id);
        assert!(profile.phone_verified);

        let update = ProfileUpdate {
            full_name: Some(" Ana ".into()),
            phone: Some("+15559998888".into()),
        };
        apply_update(&mut profile, &id, update).unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ana"));
        assert_eq!(profile.phone.as_deref(), Some("+15559998888"));
        assert!(!profile.phone_verified);
    }

    #[test]
    fn test_matching_identity_phone_is_verified() {
        let id = identity(Some("+15550001111"));
        let mut profile = empty_profile(&identity(None));
        assert!(!profile.has_phone());

        let update = ProfileUpdate {
            full_name: None,
            phone: Some("+15550001111".into()),
        };
        apply_update(&mut profile, &id, update).unwrap();
        assert!(profile.phone_verified);
        assert!(profile.has_phone());
    }

    #[test]
    fn test_rejects_garbage_phone() {
        let id = identity(None);
        let mut profile = empty_profile(&id);
        let update = ProfileUpdate {
            full_name: None,
            phone: Some("call me".into()),
        };
        assert!(apply_update(&mut profile, &id, update).is_err());
        assert!(profile.phone.is_none());
    }
}
