use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::errors::AppError;
use crate::services::pricing::PricingPolicy;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Http,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub auth_secret: String,
    pub advance_fraction: Decimal,
    pub food_rate_per_guest: Decimal,
    pub storage_backend: StorageBackend,
    pub storage_dir: String,
    pub public_base_url: String,
    pub storage_bucket_url: String,
    pub storage_api_key: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "staybook.db".to_string()),
            auth_secret: env::var("AUTH_SECRET").unwrap_or_default(),
            advance_fraction: decimal_var("ADVANCE_FRACTION", Decimal::new(5, 1)),
            food_rate_per_guest: decimal_var("FOOD_RATE_PER_GUEST", Decimal::from(250)),
            storage_backend: match env::var("STORAGE_BACKEND").as_deref() {
                Ok("http") => StorageBackend::Http,
                _ => StorageBackend::Local,
            },
            storage_dir: env::var("STORAGE_DIR").unwrap_or_else(|_| "uploads".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            storage_bucket_url: env::var("STORAGE_BUCKET_URL").unwrap_or_default(),
            storage_api_key: env::var("STORAGE_API_KEY").unwrap_or_default(),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5 * 1024 * 1024),
        }
    }

    pub fn pricing_policy(&self) -> Result<PricingPolicy, AppError> {
        if self.advance_fraction < Decimal::ZERO || self.advance_fraction > Decimal::ONE {
            return Err(AppError::Config(format!(
                "ADVANCE_FRACTION must be between 0 and 1, got {}",
                self.advance_fraction
            )));
        }
        if self.food_rate_per_guest < Decimal::ZERO {
            return Err(AppError::Config(
                "FOOD_RATE_PER_GUEST must not be negative".to_string(),
            ));
        }
        Ok(PricingPolicy {
            food_rate: self.food_rate_per_guest,
            advance_fraction: self.advance_fraction,
        })
    }
}

fn decimal_var(name: &str, default: Decimal) -> Decimal {
    env::var(name)
        .ok()
        .and_then(|v| Decimal::from_str(v.trim()).ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            auth_secret: "secret".to_string(),
            advance_fraction: Decimal::new(5, 1),
            food_rate_per_guest: Decimal::from(250),
            storage_backend: StorageBackend::Local,
            storage_dir: "uploads".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            storage_bucket_url: String::new(),
            storage_api_key: String::new(),
            max_upload_bytes: 1024,
        }
    }

    #[test]
    fn test_pricing_policy_accepts_half() {
        let policy = config().pricing_policy().unwrap();
        assert_eq!(policy.advance_fraction, Decimal::new(5, 1));
        assert_eq!(policy.food_rate, Decimal::from(250));
    }

    #[test]
    fn test_pricing_policy_rejects_fraction_above_one() {
        let mut c = config();
        c.advance_fraction = Decimal::new(15, 1);
        assert!(matches!(c.pricing_policy(), Err(AppError::Config(_))));
    }
}
