use chrono::{DateTime, FixedOffset, Utc};

use spicecart_core::AggregateId;

/// India Standard Time, UTC+05:30.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Human-facing order reference, e.g. `SC-260314-4F9A1C`.
///
/// The date is the placement day in IST; the suffix is the random tail of the
/// order id, upper-cased.
pub fn order_number(id: &AggregateId, placed_at: DateTime<Utc>) -> String {
    let day = match FixedOffset::east_opt(IST_OFFSET_SECS) {
        Some(ist) => placed_at.with_timezone(&ist).format("%y%m%d").to_string(),
        None => placed_at.format("%y%m%d").to_string(),
    };
    format!("SC-{day}-{}", id.short_hex(6).to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn uses_ist_calendar_day() {
        let id = AggregateId::from_uuid(Uuid::from_u128(0xabcdef));
        // 20:00 UTC on 14 March is already 15 March in India.
        let placed = Utc.with_ymd_and_hms(2026, 3, 14, 20, 0, 0).unwrap();
        assert_eq!(order_number(&id, placed), "SC-260315-ABCDEF");
    }
}
