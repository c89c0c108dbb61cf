use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};

/// Parses RFC 3339 timestamps, and the bare `YYYY-MM-DD HH:MM:SS[.fff]` form
/// SQLite's `CURRENT_TIMESTAMP` produces, which is UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }

    let bare = raw.replacen(' ', "T", 1);
    let bare = bare.trim_end_matches('Z');
    let seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let subseconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    PrimitiveDateTime::parse(bare, &seconds)
        .or_else(|_| PrimitiveDateTime::parse(bare, &subseconds))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

pub fn hour_minute(ts: OffsetDateTime, offset: UtcOffset) -> String {
    let hm = format_description!("[hour]:[minute]");
    ts.to_offset(offset)
        .format(&hm)
        .unwrap_or_default()
}

pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
    use time::macros::{datetime, offset};

    use super::*;

    #[test]
    fn parses_rfc3339() {
        assert_eq!(parse_timestamp("2024-01-01T10:00:00Z"), Some(datetime!(2024-01-01 10:00 UTC)));
        assert_eq!(
            parse_timestamp("2024-01-01T12:30:00+02:00"),
            Some(datetime!(2024-01-01 10:30 UTC)),
        );
    }

    #[test]
    fn parses_sqlite_timestamps_as_utc() {
        assert_eq!(parse_timestamp("2024-01-01 10:00:00"), Some(datetime!(2024-01-01 10:00 UTC)));
        assert_eq!(
            parse_timestamp("2024-01-01 10:00:00.250"),
            Some(datetime!(2024-01-01 10:00:00.25 UTC)),
        );
        assert_eq!(parse_timestamp("2024-01-01T10:00:00"), Some(datetime!(2024-01-01 10:00 UTC)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn formats_in_the_given_offset() {
        let ts = datetime!(2024-01-01 10:05 UTC);
        assert_eq!(hour_minute(ts, UtcOffset::UTC), "10:05");
        assert_eq!(hour_minute(ts, offset!(-3)), "07:05");
        assert_eq!(hour_minute(ts, offset!(+14)), "00:05");
    }
}
