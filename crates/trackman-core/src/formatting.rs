use chrono::{DateTime, Utc};

/// Token rendered for undefined values and for the unknown club bucket.
pub const MISSING_TOKEN: &str = "nan";

/// Meters/second to miles/hour.
pub const MS_TO_MPH: f64 = 2.23694;

/// Format an optional value with a fixed number of decimal places.
///
/// Undefined values render as [`MISSING_TOKEN`], never as `0`.
///
/// # Examples
///
/// ```
/// use trackman_core::formatting::format_fixed;
///
/// assert_eq!(format_fixed(Some(155.84), 1), "155.8");
/// assert_eq!(format_fixed(Some(6543.6), 0), "6544");
/// assert_eq!(format_fixed(Some(1.3449), 2), "1.34");
/// assert_eq!(format_fixed(None, 1), "nan");
/// ```
pub fn format_fixed(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.prec$}", v, prec = decimals),
        _ => MISSING_TOKEN.to_string(),
    }
}

/// Convert a speed in meters/second to miles/hour.
pub fn ms_to_mph(speed_ms: f64) -> f64 {
    speed_ms * MS_TO_MPH
}

/// Render a timestamp the way the analysis report prints dates.
pub fn format_report_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Underline `title` with `ch`, matching the report's section headers.
pub fn underline(title: &str, ch: char) -> String {
    let rule: String = std::iter::repeat(ch).take(title.chars().count()).collect();
    format!("{}\n{}\n", title, rule)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── format_fixed ─────────────────────────────────────────────────────────

    #[test]
    fn test_format_fixed_one_decimal() {
        assert_eq!(format_fixed(Some(55.0), 1), "55.0");
        assert_eq!(format_fixed(Some(155.76), 1), "155.8");
    }

    #[test]
    fn test_format_fixed_integer() {
        assert_eq!(format_fixed(Some(7012.4), 0), "7012");
    }

    #[test]
    fn test_format_fixed_no_thousands_separator() {
        assert_eq!(format_fixed(Some(12_345.0), 0), "12345");
    }

    #[test]
    fn test_format_fixed_negative() {
        assert_eq!(format_fixed(Some(-2.26), 1), "-2.3");
    }

    #[test]
    fn test_format_fixed_undefined_is_not_zero() {
        assert_eq!(format_fixed(None, 1), "nan");
        assert_ne!(format_fixed(None, 1), format_fixed(Some(0.0), 1));
        assert_eq!(format_fixed(Some(f64::NAN), 2), "nan");
    }

    // ── ms_to_mph ────────────────────────────────────────────────────────────

    #[test]
    fn test_ms_to_mph() {
        assert!((ms_to_mph(40.0) - 89.4776).abs() < 1e-9);
        assert_eq!(ms_to_mph(0.0), 0.0);
    }

    // ── format_report_time ───────────────────────────────────────────────────

    #[test]
    fn test_format_report_time() {
        let ts = DateTime::parse_from_rfc3339("2024-03-02T10:15:30.5Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_report_time(&ts), "2024-03-02 10:15:30");
    }

    // ── underline ────────────────────────────────────────────────────────────

    #[test]
    fn test_underline() {
        assert_eq!(underline("ABC", '-'), "ABC\n---\n");
    }
}
