use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::AppError;
use crate::models::{Identity, Role};

/// Maps a bearer credential to a verified identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity, AppError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Expiry, seconds since the unix epoch.
    pub exp: i64,
}

/// Verifies `base64url(claims).base64url(hmac_sha256(claims))` tokens issued
/// with a shared secret.
pub struct HmacTokenVerifier {
    secret: Vec<u8>,
}

impl HmacTokenVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<Hmac<Sha256>, AppError> {
        Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| AppError::Config(format!("invalid auth secret: {e}")))
    }

    pub fn issue(&self, claims: &Claims) -> anyhow::Result<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    pub fn decode(&self, token: &str, now: i64) -> Result<Claims, AppError> {
        let (payload, signature) = token.split_once('.').ok_or(AppError::Unauthorized)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AppError::Unauthorized)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| {
            tracing::debug!("token signature mismatch");
            AppError::Unauthorized
        })?;

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AppError::Unauthorized)?;
        let claims: Claims = serde_json::from_slice(&raw).map_err(|_| AppError::Unauthorized)?;

        if claims.exp <= now {
            tracing::debug!(sub = %claims.sub, "token expired");
            return Err(AppError::Unauthorized);
        }
        if claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized);
        }
        Ok(claims)
    }
}

#[async_trait]
impl IdentityVerifier for HmacTokenVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, AppError> {
        let claims = self.decode(credential, chrono::Utc::now().timestamp())?;
        Ok(Identity {
            id: claims.sub,
            role: claims.role,
            phone: claims.phone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: "user-1".to_string(),
            role: Role::Customer,
            phone: Some("+919800000000".to_string()),
            exp,
        }
    }

    #[test]
    fn test_issue_then_decode() {
        let v = HmacTokenVerifier::new("secret");
        let token = v.issue(&claims(2_000)).unwrap();
        let decoded = v.decode(&token, 1_000).unwrap();
        assert_eq!(decoded.sub, "user-1");
        assert_eq!(decoded.role, Role::Customer);
    }

    #[test]
    fn test_expired_token_rejected() {
        let v = HmacTokenVerifier::new("secret");
        let token = v.issue(&claims(1_000)).unwrap();
        assert!(matches!(v.decode(&token, 1_000), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = HmacTokenVerifier::new("secret").issue(&claims(2_000)).unwrap();
        let other = HmacTokenVerifier::new("other");
        assert!(matches!(other.decode(&token, 1_000), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let v = HmacTokenVerifier::new("secret");
        let token = v.issue(&claims(2_000)).unwrap();
        let (_, sig) = token.split_once('.').unwrap();

        let mut forged = claims(2_000);
        forged.role = Role::Admin;
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{payload}.{sig}");
        assert!(matches!(v.decode(&forged_token, 1_000), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_garbage_rejected() {
        let v = HmacTokenVerifier::new("secret");
        assert!(v.decode("", 0).is_err());
        assert!(v.decode("no-dot", 0).is_err());
        assert!(v.decode("a.b", 0).is_err());
    }
}
