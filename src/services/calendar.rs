use crate::models::{Booking, Property};

/// Renders a booking as a single all-day iCalendar event. `DTEND` is
/// exclusive, so a day-use stay ends on the following date.
pub fn generate_ics(booking: &Booking, property: &Property) -> String {
    let dtstart = booking.check_in_date.format("%Y%m%d").to_string();
    let dtend = booking
        .check_out_date
        .succ_opt()
        .unwrap_or(booking.check_out_date)
        .format("%Y%m%d")
        .to_string();
    let dtstamp = booking.updated_at.format("%Y%m%dT%H%M%SZ").to_string();
    let uid = format!("{}@staybook", booking.id);

    let summary = escape(&format!("Stay at {}", property.name));
    let location = escape(&property.location);
    let description = escape(&format!(
        "{} guest(s). Total {} (paid {}). Status: {}",
        booking.num_guests,
        booking.total_amount,
        booking.advance_paid,
        booking.status.as_str()
    ));

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Staybook//Bookings//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART;VALUE=DATE:{dtstart}\r\n\
         DTEND;VALUE=DATE:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         LOCATION:{location}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

// RFC 5545 text escaping.
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
