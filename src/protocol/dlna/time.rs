/// Formats seconds as DLNA's `HH:MM:SS` REL_TIME representation.
pub fn format_time(total_secs: f64) -> String {
    let total = total_secs.max(0.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parses `H:MM:SS` (or `H:MM:SS.mmm`) back into seconds.
pub fn parse_time(text: &str) -> Option<f64> {
    let text = text.split('.').next().unwrap_or(text);
    let mut parts = text.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_whole_seconds() {
        for secs in [0.0, 59.0, 60.0, 3599.0, 3600.0, 7325.0] {
            let formatted = format_time(secs);
            assert_eq!(parse_time(&formatted), Some(secs));
        }
    }

    #[test]
    fn parses_with_fractional_seconds() {
        assert_eq!(parse_time("0:01:30.500"), Some(90.0));
    }

    #[test]
    fn formats_zero_as_zero_padded() {
        assert_eq!(format_time(-5.0), "00:00:00");
    }

    #[test]
    fn pads_single_digit_hours() {
        assert_eq!(format_time(3725.0), "01:02:05");
    }
}
