//! Human-friendly interval strings such as `5s`, `30m`, `1h`, `1d`.

/// Unit suffixes, largest first, with their length in seconds.
const UNITS: [(char, u64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

/// Parse an interval string into seconds. A bare number is seconds.
pub fn parse_interval(s: &str) -> Result<u64, String> {
    let s = s.trim().to_ascii_lowercase();

    let (count, scale) = match s.chars().last() {
        Some(unit) if unit.is_ascii_alphabetic() => {
            let scale = UNITS
                .iter()
                .find(|(u, _)| *u == unit)
                .map(|(_, secs)| *secs)
                .ok_or_else(|| format!("Unknown unit '{}' in interval {:?}; use s, m, h or d", unit, s))?;
            (&s[..s.len() - 1], scale)
        }
        _ => (s.as_str(), 1),
    };

    let count: u64 = count
        .trim()
        .parse()
        .map_err(|_| format!("Invalid interval {:?}; expected something like 5s, 10m or 1h", s))?;

    count
        .checked_mul(scale)
        .ok_or_else(|| format!("Interval {:?} is too large", s))
}

/// Format seconds back into the largest unit that divides them exactly.
pub fn format_interval(secs: u64) -> String {
    UNITS
        .iter()
        .find(|(_, unit_secs)| secs >= *unit_secs && secs % unit_secs == 0)
        .map(|(unit, unit_secs)| format!("{}{}", secs / unit_secs, unit))
        .unwrap_or_else(|| format!("{}s", secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("5s").unwrap(), 5);
        assert_eq!(parse_interval("1m").unwrap(), 60);
        assert_eq!(parse_interval("1h").unwrap(), 3600);
        assert_eq!(parse_interval("1d").unwrap(), 86400);
        assert_eq!(parse_interval(" 30 ").unwrap(), 30);
        assert!(parse_interval("soon").is_err());
        assert!(parse_interval("xh").is_err());
        assert!(parse_interval("").is_err());
    }

    #[test]
    fn test_huge_interval_is_rejected() {
        assert!(parse_interval("999999999999999999d").is_err());
        assert!(parse_interval("18446744073709551615h").is_err());
        assert_eq!(parse_interval("18446744073709551615s").unwrap(), u64::MAX);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "0s");
        assert_eq!(format_interval(5), "5s");
        assert_eq!(format_interval(90), "90s");
        assert_eq!(format_interval(120), "2m");
        assert_eq!(format_interval(7200), "2h");
        assert_eq!(format_interval(86400), "1d");
    }
}
