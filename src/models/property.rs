use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub base_price_per_night: Decimal,
    pub per_head_price: Decimal,
    pub max_guests: u32,
    pub cleaning_fee: Decimal,
    pub service_fee: Decimal,
    pub facilities: Vec<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub base_price_per_night: Decimal,
    #[serde(default)]
    pub per_head_price: Decimal,
    pub max_guests: u32,
    #[serde(default)]
    pub cleaning_fee: Decimal,
    #[serde(default)]
    pub service_fee: Decimal,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub base_price_per_night: Option<Decimal>,
    pub per_head_price: Option<Decimal>,
    pub max_guests: Option<u32>,
    pub cleaning_fee: Option<Decimal>,
    pub service_fee: Option<Decimal>,
    pub facilities: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl Property {
    pub fn from_new(id: String, input: NewProperty, now: NaiveDateTime) -> Result<Self, AppError> {
        let property = Property {
            id,
            name: input.name.trim().to_string(),
            location: input.location.trim().to_string(),
            description: input.description,
            base_price_per_night: input.base_price_per_night,
            per_head_price: input.per_head_price,
            max_guests: input.max_guests,
            cleaning_fee: input.cleaning_fee,
            service_fee: input.service_fee,
            facilities: normalize_facilities(input.facilities),
            images: vec![],
            videos: vec![],
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };
        property.validate()?;
        Ok(property)
    }

    pub fn apply(&mut self, patch: PropertyPatch, now: NaiveDateTime) -> Result<(), AppError> {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(location) = patch.location {
            self.location = location.trim().to_string();
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if let Some(v) = patch.base_price_per_night {
            self.base_price_per_night = v;
        }
        if let Some(v) = patch.per_head_price {
            self.per_head_price = v;
        }
        if let Some(v) = patch.max_guests {
            self.max_guests = v;
        }
        if let Some(v) = patch.cleaning_fee {
            self.cleaning_fee = v;
        }
        if let Some(v) = patch.service_fee {
            self.service_fee = v;
        }
        if let Some(facilities) = patch.facilities {
            self.facilities = normalize_facilities(facilities);
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
        self.validate()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_empty() {
            return Err(AppError::validation("name", "name is required"));
        }
        if self.location.is_empty() {
            return Err(AppError::validation("location", "location is required"));
        }
        if self.max_guests < 1 {
            return Err(AppError::validation("max_guests", "must be at least 1"));
        }
        let money = [
            ("base_price_per_night", self.base_price_per_night),
            ("per_head_price", self.per_head_price),
            ("cleaning_fee", self.cleaning_fee),
            ("service_fee", self.service_fee),
        ];
        for (field, value) in money {
            if value < Decimal::ZERO {
                return Err(AppError::validation(field, "must not be negative"));
            }
        }
        Ok(())
    }
}

fn normalize_facilities(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim();
        if !label.is_empty() && !out.iter().any(|l| l.eq_ignore_ascii_case(label)) {
            out.push(label.to_string());
        }
    }
    out
}
