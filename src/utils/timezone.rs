use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::{America::Argentina::Buenos_Aires, Tz};

/// Warehouse timezone constant
pub const DEPOSITO_TZ: Tz = Buenos_Aires;

/// Get current time in the warehouse timezone
pub fn deposito_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&DEPOSITO_TZ)
}

/// Get "today" as a calendar date in the warehouse timezone.
/// Used as the cut-off when listing expired lots.
pub fn deposito_today() -> NaiveDate {
    deposito_now().date_naive()
}

/// Get current time in the warehouse timezone as RFC3339 string
pub fn deposito_now_rfc3339() -> String {
    deposito_now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;

    #[test]
    fn test_deposito_timezone() {
        let local_time = deposito_now();
        let _utc_time = Utc::now();

        // Buenos Aires is 3 hours behind UTC year-round (no DST)
        let diff = local_time.offset().fix().local_minus_utc();
        assert_eq!(diff, -3 * 3600);
    }

    #[test]
    fn test_rfc3339_format() {
        let rfc3339_string = deposito_now_rfc3339();
        // Should be a valid RFC3339 string with timezone
        assert!(rfc3339_string.contains("-03:00"));
    }

    #[test]
    fn test_today_matches_local_clock() {
        let today = deposito_today();
        assert_eq!(today, deposito_now().date_naive());
    }
}
