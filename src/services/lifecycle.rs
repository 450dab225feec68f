use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::booking::PAYMENT_METHOD_MANUAL;
use crate::models::{
    Booking, BookingRequest, BookingStatus, Identity, Property, VerificationStatus,
};
use crate::services::admission::{self, AdmissionError};
use crate::services::pricing::{self, PriceBreakdown, PricingPolicy, RateCard};
use crate::services::storage::{self, Upload, UploadKind};
use crate::state::AppState;

pub const MIN_ID_PROOFS: usize = 2;

/// The booking's customer and any admin may act on it.
pub fn can_act(identity: &Identity, booking: &Booking) -> bool {
    identity.is_admin() || identity.id == booking.customer_id
}

fn authorize(identity: &Identity, booking: &Booking) -> Result<(), AppError> {
    if can_act(identity, booking) {
        Ok(())
    } else {
        tracing::warn!(
            booking_id = %booking.id,
            actor = %identity.id,
            "actor is neither owner nor admin"
        );
        Err(AppError::Forbidden)
    }
}

fn require_admin(identity: &Identity) -> Result<(), AppError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn not_found(booking_id: &str) -> AppError {
    AppError::NotFound(format!("booking {booking_id}"))
}

/// Prices a candidate stay without touching the store.
pub fn compute_booking_quote(
    property: &Property,
    check_in: NaiveDate,
    check_out: NaiveDate,
    num_guests: u32,
    food_required: bool,
    policy: &PricingPolicy,
) -> Result<PriceBreakdown, AppError> {
    if num_guests > property.max_guests {
        return Err(AppError::validation(
            "num_guests",
            format!("Maximum {} guests allowed", property.max_guests),
        ));
    }
    let quote = pricing::compute_quote(
        RateCard::from(property),
        check_in,
        check_out,
        num_guests,
        food_required,
        policy,
    )?;
    Ok(quote)
}

/// Reads a booking the identity is allowed to see.
pub fn load_booking(
    conn: &Connection,
    identity: &Identity,
    booking_id: &str,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?.ok_or_else(|| not_found(booking_id))?;
    authorize(identity, &booking)?;
    Ok(booking)
}

pub fn create_booking(
    conn: &mut Connection,
    identity: &Identity,
    request: BookingRequest,
    policy: &PricingPolicy,
    today: NaiveDate,
) -> Result<Booking, AppError> {
    if request.num_guests < 1 {
        return Err(AppError::validation("num_guests", "at least one guest is required"));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let property = queries::get_property(&tx, &request.property_id)?;
    admission::check_admission(&tx, identity, property.as_ref(), &request, today)?;
    let property = property.ok_or(AdmissionError::PropertyNotFound)?;

    let quote = pricing::compute_quote(
        RateCard::from(&property),
        request.check_in_date,
        request.check_out_date,
        request.num_guests,
        request.food_required,
        policy,
    )?;

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        property_id: property.id.clone(),
        customer_id: identity.id.clone(),
        check_in_date: request.check_in_date,
        check_out_date: request.check_out_date,
        num_guests: request.num_guests,
        base_amount: quote.base_amount,
        guest_charges: quote.guest_charges,
        extra_fees: quote.extra_fees,
        total_amount: quote.total_amount,
        advance_paid: Decimal::ZERO,
        status: BookingStatus::Pending,
        verification_status: VerificationStatus::Pending,
        id_proofs: vec![],
        payment_method: PAYMENT_METHOD_MANUAL.to_string(),
        manual_reference: None,
        payment_screenshot_url: None,
        food_required: request.food_required,
        food_preference: request.food_preference.filter(|_| request.food_required),
        allergies: non_empty(request.allergies),
        special_requests: non_empty(request.special_requests),
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    };

    // The unique index on live (property, day) pairs catches a writer that
    // slipped past the overlap query.
    if let Err(e) = queries::insert_booking(&tx, &booking) {
        if queries::is_unique_violation(&e) {
            return Err(AdmissionError::AlreadyBooked.into());
        }
        return Err(e.into());
    }
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        property_id = %booking.property_id,
        customer_id = %booking.customer_id,
        date = %booking.check_in_date,
        total = %booking.total_amount,
        "booking created"
    );
    Ok(booking)
}

/// Re-reads the booking, applies `change` and writes it back, all inside one
/// immediate transaction. Nothing is written if `change` fails.
fn transition<F>(conn: &mut Connection, booking_id: &str, change: F) -> Result<Booking, AppError>
where
    F: FnOnce(&mut Booking) -> Result<(), AppError>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut booking = queries::get_booking(&tx, booking_id)?.ok_or_else(|| not_found(booking_id))?;
    change(&mut booking)?;
    booking.updated_at = Utc::now().naive_utc();
    if !queries::update_booking(&tx, &booking)? {
        return Err(not_found(booking_id));
    }
    tx.commit()?;
    Ok(booking)
}

pub fn id_proof_guard(booking: &Booking) -> Result<(), AppError> {
    if booking.status.is_terminal() {
        return Err(AppError::guard(format!(
            "Cannot upload ID proofs to a {} booking",
            booking.status.as_str()
        )));
    }
    Ok(())
}

pub fn record_identity_proofs(
    conn: &mut Connection,
    identity: &Identity,
    booking_id: &str,
    urls: Vec<String>,
) -> Result<Booking, AppError> {
    let booking = transition(conn, booking_id, |b| {
        authorize(identity, b)?;
        if urls.len() < MIN_ID_PROOFS {
            return Err(AppError::validation(
                "id_proofs",
                format!("At least {MIN_ID_PROOFS} ID proof files are required"),
            ));
        }
        id_proof_guard(b)?;
        b.id_proofs.extend(urls);
        b.verification_status = VerificationStatus::Pending;
        Ok(())
    })?;

    tracing::info!(
        booking_id = %booking.id,
        actor = %identity.id,
        proofs = booking.id_proofs.len(),
        "ID proofs uploaded"
    );
    Ok(booking)
}

pub fn set_verification(
    conn: &mut Connection,
    admin: &Identity,
    booking_id: &str,
    decision: VerificationStatus,
) -> Result<Booking, AppError> {
    require_admin(admin)?;
    if decision == VerificationStatus::Pending {
        return Err(AppError::validation(
            "status",
            "verification decision must be approved or rejected",
        ));
    }

    let booking = transition(conn, booking_id, |b| {
        b.verification_status = decision;
        Ok(())
    })?;

    tracing::info!(
        booking_id = %booking.id,
        admin = %admin.id,
        decision = decision.as_str(),
        "ID verification set"
    );
    Ok(booking)
}

#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    pub amount: Decimal,
    pub reference: Option<String>,
    pub screenshot_url: Option<String>,
}

pub fn payment_guard(booking: &Booking) -> Result<(), AppError> {
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::guard("Booking has been cancelled"));
    }
    if booking.status == BookingStatus::Completed {
        return Err(AppError::guard("Booking is already completed"));
    }
    if booking.verification_status != VerificationStatus::Approved {
        return Err(AppError::guard("ID proof not approved yet"));
    }
    Ok(())
}

/// Input checks that do not depend on the stored booking.
pub fn validate_payment_input(
    amount: Decimal,
    reference: Option<&str>,
    has_screenshot: bool,
) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation("amount", "payment amount must be positive"));
    }
    let has_reference = reference.is_some_and(|r| !r.trim().is_empty());
    if !has_reference && !has_screenshot {
        return Err(AppError::validation(
            "reference",
            "a transaction reference or payment screenshot is required",
        ));
    }
    Ok(())
}

pub fn submit_payment(
    conn: &mut Connection,
    identity: &Identity,
    booking_id: &str,
    payment: PaymentSubmission,
) -> Result<Booking, AppError> {
    let reference = non_empty(payment.reference);
    validate_payment_input(
        payment.amount,
        reference.as_deref(),
        payment.screenshot_url.is_some(),
    )?;

    let booking = transition(conn, booking_id, |b| {
        authorize(identity, b)?;
        payment_guard(b)?;
        let paid = b
            .advance_paid
            .checked_add(payment.amount)
            .filter(|paid| *paid <= b.total_amount)
            .ok_or_else(|| {
                AppError::validation(
                    "amount",
                    format!(
                        "payment exceeds outstanding balance of {}",
                        b.outstanding_amount()
                    ),
                )
            })?;
        b.advance_paid = paid;
        if reference.is_some() {
            b.manual_reference = reference;
        }
        if payment.screenshot_url.is_some() {
            b.payment_screenshot_url = payment.screenshot_url;
        }
        Ok(())
    })?;

    tracing::info!(
        booking_id = %booking.id,
        actor = %identity.id,
        amount = %payment.amount,
        advance_paid = %booking.advance_paid,
        "manual payment submitted"
    );
    Ok(booking)
}

pub fn confirm_booking(
    conn: &mut Connection,
    admin: &Identity,
    booking_id: &str,
) -> Result<Booking, AppError> {
    require_admin(admin)?;
    let booking = transition(conn, booking_id, |b| {
        if b.status != BookingStatus::Pending {
            return Err(AppError::guard("Only pending bookings can be confirmed"));
        }
        b.status = BookingStatus::Confirmed;
        Ok(())
    })?;

    tracing::info!(booking_id = %booking.id, admin = %admin.id, "booking confirmed");
    Ok(booking)
}

pub fn cancel_booking(
    conn: &mut Connection,
    identity: &Identity,
    booking_id: &str,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    let booking = transition(conn, booking_id, |b| {
        authorize(identity, b)?;
        if b.status.is_terminal() {
            return Err(AppError::guard("Booking cannot be cancelled"));
        }
        b.status = BookingStatus::Cancelled;
        b.cancellation_reason = non_empty(reason);
        Ok(())
    })?;

    tracing::info!(booking_id = %booking.id, actor = %identity.id, "booking cancelled");
    Ok(booking)
}

pub fn complete_booking(
    conn: &mut Connection,
    admin: &Identity,
    booking_id: &str,
) -> Result<Booking, AppError> {
    require_admin(admin)?;
    let booking = transition(conn, booking_id, |b| {
        if b.status != BookingStatus::Confirmed {
            return Err(AppError::guard("Only confirmed bookings can be completed"));
        }
        b.status = BookingStatus::Completed;
        Ok(())
    })?;

    tracing::info!(booking_id = %booking.id, admin = %admin.id, "booking completed");
    Ok(booking)
}

/// Stores the uploaded documents and records them on the booking. Access,
/// file count and file types are all checked before anything is written.
pub async fn upload_identity_proofs(
    state: &AppState,
    identity: &Identity,
    booking_id: &str,
    files: Vec<Upload>,
) -> Result<Booking, AppError> {
    {
        let db = state.db()?;
        let booking = load_booking(&db, identity, booking_id)?;
        id_proof_guard(&booking)?;
    }
    if files.len() < MIN_ID_PROOFS {
        return Err(AppError::validation(
            "id_proofs",
            format!("At least {MIN_ID_PROOFS} ID proof files are required"),
        ));
    }

    let urls = storage::store_all(
        state.blobs.as_ref(),
        &format!("id-proofs/{booking_id}"),
        UploadKind::IdProof,
        files,
        state.config.max_upload_bytes,
    )
    .await?;

    let mut db = state.db()?;
    record_identity_proofs(&mut db, identity, booking_id, urls)
}

pub async fn submit_payment_with_screenshot(
    state: &AppState,
    identity: &Identity,
    booking_id: &str,
    amount: Decimal,
    reference: Option<String>,
    screenshot: Option<Upload>,
) -> Result<Booking, AppError> {
    validate_payment_input(amount, reference.as_deref(), screenshot.is_some())?;
    {
        let db = state.db()?;
        let booking = load_booking(&db, identity, booking_id)?;
        payment_guard(&booking)?;
    }

    let screenshot_url = match screenshot {
        Some(file) => storage::store_all(
            state.blobs.as_ref(),
            &format!("payments/{booking_id}"),
            UploadKind::PaymentScreenshot,
            vec![file],
            state.config.max_upload_bytes,
        )
        .await?
        .into_iter()
        .next(),
        None => None,
    };

    let mut db = state.db()?;
    submit_payment(
        &mut db,
        identity,
        booking_id,
        PaymentSubmission {
            amount,
            reference,
            screenshot_url,
        },
    )
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{BookingStage, Role};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn today() -> NaiveDate {
        day("2025-05-20")
    }

    fn policy() -> PricingPolicy {
        PricingPolicy {
            food_rate: Decimal::from(250),
            advance_fraction: Decimal::new(5, 1),
        }
    }

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now().naive_utc();
        let property = Property {
            id: "prop-1".to_string(),
            name: "Lake House".to_string(),
            location: "Lonavala".to_string(),
            description: None,
            base_price_per_night: Decimal::from(2000),
            per_head_price: Decimal::from(200),
            max_guests: 10,
            cleaning_fee: Decimal::from(100),
            service_fee: Decimal::from(50),
            facilities: vec!["Pool".to_string()],
            images: vec![],
            videos: vec![],
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        queries::insert_property(&conn, &property).unwrap();
        conn
    }

    fn who(id: &str, role: Role) -> Identity {
        Identity {
            id: id.to_string(),
            role,
            phone: Some("+919800000000".to_string()),
        }
    }

    fn customer() -> Identity {
        who("cust-1", Role::Customer)
    }

    fn admin() -> Identity {
        who("admin-1", Role::Admin)
    }

    fn request(on: &str, guests: u32) -> BookingRequest {
        BookingRequest {
            property_id: "prop-1".to_string(),
            check_in_date: day(on),
            check_out_date: day(on),
            num_guests: guests,
            food_required: false,
            food_preference: None,
            allergies: None,
            special_requests: None,
        }
    }

    fn book_as(
        conn: &mut Connection,
        who: &Identity,
        req: BookingRequest,
    ) -> Result<Booking, AppError> {
        create_booking(conn, who, req, &policy(), today())
    }

    fn booked(conn: &mut Connection) -> Booking {
        book_as(conn, &customer(), request("2025-06-01", 4)).unwrap()
    }

    fn proofs() -> Vec<String> {
        vec!["https://cdn/a.png".to_string(), "https://cdn/b.pdf".to_string()]
    }

    fn payment(amount: i64) -> PaymentSubmission {
        PaymentSubmission {
            amount: Decimal::from(amount),
            reference: Some("UPI-4411".to_string()),
            screenshot_url: None,
        }
    }

    fn approved(conn: &mut Connection) -> Booking {
        let b = booked(conn);
        record_identity_proofs(conn, &customer(), &b.id, proofs()).unwrap();
        set_verification(conn, &admin(), &b.id, VerificationStatus::Approved).unwrap()
    }

    fn stored(conn: &Connection, id: &str) -> Booking {
        queries::get_booking(conn, id).unwrap().unwrap()
    }

    #[test]
    fn test_create_persists_pending_with_breakdown() {
        let mut conn = setup();
        let b = booked(&mut conn);
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.verification_status, VerificationStatus::Pending);
        assert_eq!(b.base_amount, Decimal::from(2000));
        assert_eq!(b.guest_charges, Decimal::from(800));
        assert_eq!(b.extra_fees, Decimal::from(150));
        assert_eq!(b.total_amount, Decimal::from(2950));
        assert_eq!(b.advance_paid, Decimal::ZERO);
        assert_eq!(b.payment_method, "manual");

        let s = stored(&conn, &b.id);
        assert_eq!(s.total_amount, Decimal::from(2950));
        assert_eq!(s.customer_id, "cust-1");
    }

    #[test]
    fn test_create_rejects_second_booking_same_day() {
        let mut conn = setup();
        let first = booked(&mut conn);
        confirm_booking(&mut conn, &admin(), &first.id).unwrap();

        let other = who("cust-2", Role::Customer);
        let err = book_as(&mut conn, &other, request("2025-06-01", 2)).unwrap_err();
        assert!(matches!(err, AppError::Admission(AdmissionError::AlreadyBooked)));

        let next = book_as(&mut conn, &other, request("2025-06-02", 2));
        assert!(next.is_ok());
    }

    #[test]
    fn test_create_rejects_over_capacity() {
        let mut conn = setup();
        let err = book_as(&mut conn, &customer(), request("2025-06-01", 12)).unwrap_err();
        assert_eq!(err.to_string(), "Maximum 10 guests allowed");
    }

    #[test]
    fn test_create_rejects_past_date() {
        let mut conn = setup();
        let err = book_as(&mut conn, &customer(), request("2025-05-19", 2)).unwrap_err();
        assert!(matches!(err, AppError::Admission(AdmissionError::PastDate)));
    }

    #[test]
    fn test_create_rejects_unknown_property() {
        let mut conn = setup();
        let mut req = request("2025-06-01", 2);
        req.property_id = "nope".to_string();
        let err = create_booking(&mut conn, &customer(), req, &policy(), today()).unwrap_err();
        assert!(matches!(err, AppError::Admission(AdmissionError::PropertyNotFound)));
    }

    #[test]
    fn test_create_drops_food_preference_without_food() {
        let mut conn = setup();
        let mut req = request("2025-06-01", 2);
        req.food_preference = Some(crate::models::FoodPreference::Veg);
        let b = create_booking(&mut conn, &customer(), req, &policy(), today()).unwrap();
        assert!(b.food_preference.is_none());
    }

    #[test]
    fn test_unique_index_backs_up_overlap_check() {
        let mut conn = setup();
        let first = booked(&mut conn);
        let mut dup = first.clone();
        dup.id = "dup".to_string();
        let err = queries::insert_booking(&conn, &dup).unwrap_err();
        assert!(queries::is_unique_violation(&err));
    }

    #[test]
    fn test_other_constraint_failures_are_not_double_bookings() {
        let mut conn = setup();
        let b = booked(&mut conn);

        let check = conn
            .execute(
                "UPDATE bookings SET status = 'archived' WHERE id = ?1",
                [&b.id],
            )
            .unwrap_err();
        assert!(!queries::is_unique_violation(&anyhow::Error::from(check)));

        let not_null = conn
            .execute("INSERT INTO properties (id) VALUES ('bare')", [])
            .unwrap_err();
        assert!(!queries::is_unique_violation(&anyhow::Error::from(not_null)));
    }

    #[test]
    fn test_id_proofs_need_two_files() {
        let mut conn = setup();
        let b = booked(&mut conn);
        let one = vec!["https://cdn/a.png".to_string()];
        let err = record_identity_proofs(&mut conn, &customer(), &b.id, one).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(stored(&conn, &b.id).id_proofs.is_empty());
    }

    #[test]
    fn test_resubmitting_proofs_resets_verification() {
        let mut conn = setup();
        let b = booked(&mut conn);
        record_identity_proofs(&mut conn, &customer(), &b.id, proofs()).unwrap();
        set_verification(&mut conn, &admin(), &b.id, VerificationStatus::Rejected).unwrap();

        let again = record_identity_proofs(&mut conn, &customer(), &b.id, proofs()).unwrap();
        assert_eq!(again.verification_status, VerificationStatus::Pending);
        assert_eq!(again.id_proofs.len(), 4);
    }

    #[test]
    fn test_verify_is_admin_only_even_for_owner() {
        let mut conn = setup();
        let b = booked(&mut conn);
        let err = set_verification(&mut conn, &customer(), &b.id, VerificationStatus::Approved)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(stored(&conn, &b.id).verification_status, VerificationStatus::Pending);
    }

    #[test]
    fn test_verify_approved_twice_is_accepted() {
        let mut conn = setup();
        let b = approved(&mut conn);
        let again =
            set_verification(&mut conn, &admin(), &b.id, VerificationStatus::Approved).unwrap();
        assert_eq!(again.verification_status, VerificationStatus::Approved);
    }

    #[test]
    fn test_verify_missing_booking() {
        let mut conn = setup();
        let err = set_verification(&mut conn, &admin(), "missing", VerificationStatus::Approved)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_payment_requires_approved_proofs() {
        let mut conn = setup();
        let b = booked(&mut conn);
        let err = submit_payment(&mut conn, &customer(), &b.id, payment(1475)).unwrap_err();
        assert_eq!(err.to_string(), "ID proof not approved yet");
        assert_eq!(stored(&conn, &b.id).advance_paid, Decimal::ZERO);
    }

    #[test]
    fn test_payment_accumulates_and_stays_pending() {
        let mut conn = setup();
        let b = approved(&mut conn);
        assert_eq!(b.stage(), BookingStage::AwaitingPayment);

        let paid = submit_payment(&mut conn, &customer(), &b.id, payment(1000)).unwrap();
        assert_eq!(paid.advance_paid, Decimal::from(1000));
        assert_eq!(paid.status, BookingStatus::Pending);
        assert_eq!(paid.manual_reference.as_deref(), Some("UPI-4411"));
        assert_eq!(paid.stage(), BookingStage::AwaitingConfirmation);

        let more = submit_payment(&mut conn, &customer(), &b.id, payment(475)).unwrap();
        assert_eq!(more.advance_paid, Decimal::from(1475));
    }

    #[test]
    fn test_payment_cannot_exceed_total() {
        let mut conn = setup();
        let b = approved(&mut conn);
        let err = submit_payment(&mut conn, &customer(), &b.id, payment(3000)).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "amount"));
        assert_eq!(stored(&conn, &b.id).advance_paid, Decimal::ZERO);
    }

    #[test]
    fn test_payment_rejected_after_cancel() {
        let mut conn = setup();
        let b = approved(&mut conn);
        cancel_booking(&mut conn, &customer(), &b.id, None).unwrap();
        let err = submit_payment(&mut conn, &customer(), &b.id, payment(100)).unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }

    #[test]
    fn test_payment_input_checks() {
        let mut conn = setup();
        let b = approved(&mut conn);
        let mut zero = payment(0);
        zero.amount = Decimal::ZERO;
        assert!(matches!(
            submit_payment(&mut conn, &customer(), &b.id, zero),
            Err(AppError::Validation { .. })
        ));

        let blank = PaymentSubmission {
            amount: Decimal::from(100),
            reference: Some("   ".to_string()),
            screenshot_url: None,
        };
        assert!(matches!(
            submit_payment(&mut conn, &customer(), &b.id, blank),
            Err(AppError::Validation { .. })
        ));

        let screenshot_only = PaymentSubmission {
            amount: Decimal::from(100),
            reference: None,
            screenshot_url: Some("https://cdn/pay.png".to_string()),
        };
        let b = submit_payment(&mut conn, &customer(), &b.id, screenshot_only).unwrap();
        assert!(b.manual_reference.is_none());
        assert_eq!(b.payment_screenshot_url.as_deref(), Some("https://cdn/pay.png"));
    }

    #[test]
    fn test_confirm_only_from_pending() {
        let mut conn = setup();
        let b = booked(&mut conn);
        let err = confirm_booking(&mut conn, &customer(), &b.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let confirmed = confirm_booking(&mut conn, &admin(), &b.id).unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let err = confirm_booking(&mut conn, &admin(), &b.id).unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }

    #[test]
    fn test_cancel_after_confirm_then_twice() {
        let mut conn = setup();
        let b = booked(&mut conn);
        confirm_booking(&mut conn, &admin(), &b.id).unwrap();

        let reason = Some(" plans changed ".to_string());
        let cancelled = cancel_booking(&mut conn, &customer(), &b.id, reason).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("plans changed"));

        let err = cancel_booking(&mut conn, &customer(), &b.id, None).unwrap_err();
        assert_eq!(err.to_string(), "Booking cannot be cancelled");
    }

    #[test]
    fn test_complete_is_terminal() {
        let mut conn = setup();
        let b = booked(&mut conn);

        let err = complete_booking(&mut conn, &admin(), &b.id).unwrap_err();
        assert_eq!(err.to_string(), "Only confirmed bookings can be completed");

        confirm_booking(&mut conn, &admin(), &b.id).unwrap();
        let done = complete_booking(&mut conn, &admin(), &b.id).unwrap();
        assert_eq!(done.status, BookingStatus::Completed);

        let err = cancel_booking(&mut conn, &customer(), &b.id, None).unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
        assert_eq!(stored(&conn, &b.id).status, BookingStatus::Completed);
    }

    #[test]
    fn test_complete_is_admin_only_even_for_owner() {
        let mut conn = setup();
        let b = booked(&mut conn);
        confirm_booking(&mut conn, &admin(), &b.id).unwrap();

        let err = complete_booking(&mut conn, &customer(), &b.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(stored(&conn, &b.id).status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_create_with_huge_rate_fails_without_poisoning_lock() {
        let conn = setup();
        let mut property = queries::get_property(&conn, "prop-1").unwrap().unwrap();
        property.base_price_per_night = Decimal::MAX;
        property.validate().unwrap();
        queries::update_property(&conn, &property).unwrap();

        let shared = std::sync::Mutex::new(conn);
        let err = {
            let mut guard = shared.lock().unwrap();
            create_booking(
                &mut guard,
                &customer(),
                request("2025-06-01", 4),
                &policy(),
                today(),
            )
            .unwrap_err()
        };
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "total_amount"));
        assert!(!shared.is_poisoned());

        let conn = shared.into_inner().unwrap();
        assert!(queries::list_bookings_for_customer(&conn, "cust-1")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_payment_overflow_is_rejected() {
        let mut conn = setup();
        let b = approved(&mut conn);
        submit_payment(&mut conn, &customer(), &b.id, payment(500)).unwrap();

        let huge = PaymentSubmission {
            amount: Decimal::MAX,
            reference: Some("UPI-9".to_string()),
            screenshot_url: None,
        };
        let err = submit_payment(&mut conn, &customer(), &b.id, huge).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "amount"));
        assert_eq!(stored(&conn, &b.id).advance_paid, Decimal::from(500));
    }

    #[test]
    fn test_stranger_cannot_touch_booking() {
        let mut conn = setup();
        let b = approved(&mut conn);
        let stranger = who("cust-9", Role::Customer);
        let before = stored(&conn, &b.id);

        assert!(matches!(
            record_identity_proofs(&mut conn, &stranger, &b.id, proofs()),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            submit_payment(&mut conn, &stranger, &b.id, payment(100)),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            cancel_booking(&mut conn, &stranger, &b.id, None),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(load_booking(&conn, &stranger, &b.id), Err(AppError::Forbidden)));

        let after = stored(&conn, &b.id);
        assert_eq!(after.status, before.status);
        assert_eq!(after.advance_paid, before.advance_paid);
        assert_eq!(after.id_proofs, before.id_proofs);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn test_admin_can_act_for_customer() {
        let mut conn = setup();
        let b = approved(&mut conn);
        let paid = submit_payment(&mut conn, &admin(), &b.id, payment(500)).unwrap();
        assert_eq!(paid.advance_paid, Decimal::from(500));
        let cancelled = cancel_booking(&mut conn, &admin(), &b.id, None).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_cancelled_day_can_be_rebooked() {
        let mut conn = setup();
        let b = booked(&mut conn);
        cancel_booking(&mut conn, &customer(), &b.id, None).unwrap();
        let again = book_as(&mut conn, &who("cust-2", Role::Customer), request("2025-06-01", 2));
        assert!(again.is_ok());
    }

    #[test]
    fn test_quote_rejects_over_capacity() {
        let conn = setup();
        let property = queries::get_property(&conn, "prop-1").unwrap().unwrap();
        let on = day("2025-06-01");
        let err = compute_booking_quote(&property, on, on, 11, false, &policy()).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let quote = compute_booking_quote(&property, on, on, 4, false, &policy()).unwrap();
        assert_eq!(quote.advance_amount, Decimal::from(1475));
    }
}
