use std::str::FromStr;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{
    Booking, BookingStatus, FoodPreference, Profile, Property, VerificationStatus,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("bad stored date: {s}"))
}

fn parse_decimal(s: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("bad stored amount: {s}"))
}

fn parse_list(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn to_list(items: &[String]) -> anyhow::Result<String> {
    Ok(serde_json::to_string(items)?)
}

// ── Properties ──

const PROPERTY_COLUMNS: &str = "id, name, location, description, base_price_per_night, per_head_price, \
     max_guests, cleaning_fee, service_fee, facilities, images, videos, is_active, created_at, updated_at";

pub fn insert_property(conn: &Connection, p: &Property) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO properties ({PROPERTY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            p.id,
            p.name,
            p.location,
            p.description,
            p.base_price_per_night.to_string(),
            p.per_head_price.to_string(),
            p.max_guests,
            p.cleaning_fee.to_string(),
            p.service_fee.to_string(),
            to_list(&p.facilities)?,
            to_list(&p.images)?,
            to_list(&p.videos)?,
            p.is_active,
            ts(&p.created_at),
            ts(&p.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_property(conn: &Connection, p: &Property) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE properties SET
           name = ?2, location = ?3, description = ?4, base_price_per_night = ?5,
           per_head_price = ?6, max_guests = ?7, cleaning_fee = ?8, service_fee = ?9,
           facilities = ?10, images = ?11, videos = ?12, is_active = ?13, updated_at = ?14
         WHERE id = ?1",
        params![
            p.id,
            p.name,
            p.location,
            p.description,
            p.base_price_per_night.to_string(),
            p.per_head_price.to_string(),
            p.max_guests,
            p.cleaning_fee.to_string(),
            p.service_fee.to_string(),
            to_list(&p.facilities)?,
            to_list(&p.images)?,
            to_list(&p.videos)?,
            p.is_active,
            ts(&p.updated_at),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_property(conn: &Connection, id: &str) -> anyhow::Result<Option<Property>> {
    let result = conn.query_row(
        &format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?1"),
        params![id],
        |row| Ok(parse_property_row(row)),
    );

    match result {
        Ok(property) => Ok(Some(property?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_properties(conn: &Connection, active_only: bool) -> anyhow::Result<Vec<Property>> {
    let sql = if active_only {
        format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE is_active = 1 ORDER BY created_at DESC"
        )
    } else {
        format!("SELECT {PROPERTY_COLUMNS} FROM properties ORDER BY created_at DESC")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_property_row(row)))?;

    let mut properties = vec![];
    for row in rows {
        properties.push(row??);
    }
    Ok(properties)
}

fn parse_property_row(row: &rusqlite::Row) -> anyhow::Result<Property> {
    let base: String = row.get(4)?;
    let per_head: String = row.get(5)?;
    let cleaning: String = row.get(7)?;
    let service: String = row.get(8)?;
    let facilities: String = row.get(9)?;
    let images: String = row.get(10)?;
    let videos: String = row.get(11)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(Property {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        description: row.get(3)?,
        base_price_per_night: parse_decimal(&base)?,
        per_head_price: parse_decimal(&per_head)?,
        max_guests: row.get(6)?,
        cleaning_fee: parse_decimal(&cleaning)?,
        service_fee: parse_decimal(&service)?,
        facilities: parse_list(&facilities),
        images: parse_list(&images),
        videos: parse_list(&videos),
        is_active: row.get(12)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, property_id, customer_id, check_in_date, check_out_date, num_guests, \
     base_amount, guest_charges, extra_fees, total_amount, advance_paid, status, verification_status, \
     id_proofs, payment_method, manual_reference, payment_screenshot_url, food_required, food_preference, \
     allergies, special_requests, cancellation_reason, created_at, updated_at";

pub fn insert_booking(conn: &Connection, b: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
                     ?19, ?20, ?21, ?22, ?23, ?24)"
        ),
        params![
            b.id,
            b.property_id,
            b.customer_id,
            date(&b.check_in_date),
            date(&b.check_out_date),
            b.num_guests,
            b.base_amount.to_string(),
            b.guest_charges.to_string(),
            b.extra_fees.to_string(),
            b.total_amount.to_string(),
            b.advance_paid.to_string(),
            b.status.as_str(),
            b.verification_status.as_str(),
            to_list(&b.id_proofs)?,
            b.payment_method,
            b.manual_reference,
            b.payment_screenshot_url,
            b.food_required,
            b.food_preference.map(|f| f.as_str()),
            b.allergies,
            b.special_requests,
            b.cancellation_reason,
            ts(&b.created_at),
            ts(&b.updated_at),
        ],
    )?;
    Ok(())
}

/// Writes back the mutable part of a booking. Dates, guests and the price
/// breakdown are fixed at creation.
pub fn update_booking(conn: &Connection, b: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
           advance_paid = ?2, status = ?3, verification_status = ?4, id_proofs = ?5,
           manual_reference = ?6, payment_screenshot_url = ?7, cancellation_reason = ?8,
           updated_at = ?9
         WHERE id = ?1",
        params![
            b.id,
            b.advance_paid.to_string(),
            b.status.as_str(),
            b.verification_status.as_str(),
            to_list(&b.id_proofs)?,
            b.manual_reference,
            b.payment_screenshot_url,
            b.cancellation_reason,
            ts(&b.updated_at),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Pending or confirmed bookings on `property_id` whose dates intersect
/// `[check_in, check_out]`, both ends inclusive.
pub fn find_overlapping_bookings(
    conn: &Connection,
    property_id: &str,
    check_in: &NaiveDate,
    check_out: &NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE property_id = ?1
           AND status IN ('pending', 'confirmed')
           AND check_in_date <= ?3
           AND check_out_date >= ?2
         ORDER BY check_in_date ASC"
    ))?;

    let rows = stmt.query_map(
        params![property_id, date(check_in), date(check_out)],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Dates from `from` onwards that a live booking holds on the property.
pub fn held_dates(
    conn: &Connection,
    property_id: &str,
    from: &NaiveDate,
) -> anyhow::Result<Vec<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT check_in_date, check_out_date FROM bookings
         WHERE property_id = ?1
           AND status IN ('pending', 'confirmed')
           AND check_out_date >= ?2
         ORDER BY check_in_date ASC",
    )?;

    let rows = stmt.query_map(params![property_id, date(from)], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut dates: Vec<NaiveDate> = vec![];
    for row in rows {
        let (start, end) = row?;
        let mut day = parse_date(&start)?.max(*from);
        let end = parse_date(&end)?;
        while day <= end {
            if !dates.contains(&day) {
                dates.push(day);
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
    }
    dates.sort();
    Ok(dates)
}

pub fn list_bookings_for_customer(
    conn: &Connection,
    customer_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE customer_id = ?1 ORDER BY created_at DESC"
    ))?;

    let rows = stmt.query_map(params![customer_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub verification_status: Option<VerificationStatus>,
    pub property_id: Option<String>,
    pub limit: i64,
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let mut clauses: Vec<String> = vec![];
    let mut values: Vec<Box<dyn ToSql>> = vec![];

    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(verification) = filter.verification_status {
        values.push(Box::new(verification.as_str()));
        clauses.push(format!("verification_status = ?{}", values.len()));
    }
    if let Some(property_id) = &filter.property_id {
        values.push(Box::new(property_id.clone()));
        clauses.push(format!("property_id = ?{}", values.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    values.push(Box::new(filter.limit));
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {where_sql} ORDER BY created_at DESC LIMIT ?{}",
        values.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let check_in: String = row.get(3)?;
    let check_out: String = row.get(4)?;
    let base_amount: String = row.get(6)?;
    let guest_charges: String = row.get(7)?;
    let extra_fees: String = row.get(8)?;
    let total_amount: String = row.get(9)?;
    let advance_paid: String = row.get(10)?;
    let status: String = row.get(11)?;
    let verification: String = row.get(12)?;
    let id_proofs: String = row.get(13)?;
    let food_preference: Option<String> = row.get(18)?;
    let created_at: String = row.get(22)?;
    let updated_at: String = row.get(23)?;

    Ok(Booking {
        id: row.get(0)?,
        property_id: row.get(1)?,
        customer_id: row.get(2)?,
        check_in_date: parse_date(&check_in)?,
        check_out_date: parse_date(&check_out)?,
        num_guests: row.get(5)?,
        base_amount: parse_decimal(&base_amount)?,
        guest_charges: parse_decimal(&guest_charges)?,
        extra_fees: parse_decimal(&extra_fees)?,
        total_amount: parse_decimal(&total_amount)?,
        advance_paid: parse_decimal(&advance_paid)?,
        status: BookingStatus::parse(&status)
            .with_context(|| format!("unknown booking status: {status}"))?,
        verification_status: VerificationStatus::parse(&verification)
            .with_context(|| format!("unknown verification status: {verification}"))?,
        id_proofs: parse_list(&id_proofs),
        payment_method: row.get(14)?,
        manual_reference: row.get(15)?,
        payment_screenshot_url: row.get(16)?,
        food_required: row.get(17)?,
        food_preference: food_preference.as_deref().and_then(FoodPreference::parse),
        allergies: row.get(19)?,
        special_requests: row.get(20)?,
        cancellation_reason: row.get(21)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingStats {
    pub pending: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub completed: i64,
    pub awaiting_verification: i64,
    pub awaiting_confirmation: i64,
    pub advance_collected: Decimal,
}

pub fn get_booking_stats(conn: &Connection) -> anyhow::Result<BookingStats> {
    let count_status = |status: &str| -> rusqlite::Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM bookings WHERE status = ?1",
            params![status],
            |row| row.get(0),
        )
    };

    let awaiting_verification: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE status = 'pending' AND verification_status = 'pending' AND id_proofs != '[]'",
        [],
        |row| row.get(0),
    )?;

    let awaiting_confirmation: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE status = 'pending' AND verification_status = 'approved'
           AND (manual_reference IS NOT NULL OR payment_screenshot_url IS NOT NULL)",
        [],
        |row| row.get(0),
    )?;

    // Amounts are stored as decimal text; sum them here rather than in SQL
    // so no float rounding creeps in.
    let mut stmt = conn.prepare(
        "SELECT advance_paid FROM bookings WHERE status IN ('confirmed', 'completed')",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut advance_collected = Decimal::ZERO;
    for row in rows {
        advance_collected = advance_collected
            .checked_add(parse_decimal(&row?)?)
            .context("advance total overflowed")?;
    }

    Ok(BookingStats {
        pending: count_status("pending")?,
        confirmed: count_status("confirmed")?,
        cancelled: count_status("cancelled")?,
        completed: count_status("completed")?,
        awaiting_verification,
        awaiting_confirmation,
        advance_collected,
    })
}

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ── Profiles ──

pub fn get_profile(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Profile>> {
    let result = conn.query_row(
        "SELECT user_id, full_name, phone, phone_verified, updated_at FROM profiles WHERE user_id = ?1",
        params![user_id],
        |row| {
            let updated_at: String = row.get(4)?;
            Ok(Profile {
                user_id: row.get(0)?,
                full_name: row.get(1)?,
                phone: row.get(2)?,
                phone_verified: row.get::<_, i32>(3)? != 0,
                updated_at: parse_ts(&updated_at),
            })
        },
    );

    match result {
        Ok(profile) => Ok(Some(profile)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_profile(conn: &Connection, profile: &Profile) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO profiles (user_id, full_name, phone, phone_verified, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
           full_name = excluded.full_name,
           phone = excluded.phone,
           phone_verified = excluded.phone_verified,
           updated_at = excluded.updated_at",
        params![
            profile.user_id,
            profile.full_name,
            profile.phone,
            profile.phone_verified as i32,
            ts(&profile.updated_at),
        ],
    )?;
    Ok(())
}
