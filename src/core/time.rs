use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Whole minutes between two instants, rounded to the nearest minute.
pub(crate) fn minutes_between_rounded(start: PrimitiveDateTime, end: PrimitiveDateTime) -> i32 {
    let seconds = (end.assume_utc() - start.assume_utc()).whole_seconds().max(0);
    ((seconds as f64) / 60.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time};

    fn at(hour: u8, minute: u8, second: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, time::Month::March, 14).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, second).unwrap())
    }

    #[test]
    fn format_primitive_outputs_utc_z() {
        assert_eq!(format_primitive(at(10, 20, 30)), "2025-03-14T10:20:30Z");
    }

    #[test]
    fn minutes_rounded_half_up() {
        assert_eq!(minutes_between_rounded(at(10, 0, 0), at(10, 29, 29)), 29);
        assert_eq!(minutes_between_rounded(at(10, 0, 0), at(10, 29, 30)), 30);
        assert_eq!(minutes_between_rounded(at(10, 0, 0), at(10, 0, 0)), 0);
    }

    #[test]
    fn minutes_clamped_at_zero_for_reversed_range() {
        assert_eq!(minutes_between_rounded(at(11, 0, 0), at(10, 0, 0)), 0);
    }
}
