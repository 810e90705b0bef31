/// Format seconds as `M:SS`. Unknown, negative or non-finite input shows `0:00`.
pub fn format_time(seconds: Option<f64>) -> String {
    let seconds = match seconds {
        Some(s) if s.is_finite() && s >= 0.0 => s,
        _ => return "0:00".to_string(),
    };

    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_zero() {
        assert_eq!(format_time(None), "0:00");
        assert_eq!(format_time(Some(f64::NAN)), "0:00");
        assert_eq!(format_time(Some(-4.0)), "0:00");
    }

    #[test]
    fn test_pads_seconds() {
        assert_eq!(format_time(Some(0.0)), "0:00");
        assert_eq!(format_time(Some(5.9)), "0:05");
        assert_eq!(format_time(Some(65.0)), "1:05");
        assert_eq!(format_time(Some(180.0)), "3:00");
    }

    #[test]
    fn test_minutes_are_not_wrapped() {
        assert_eq!(format_time(Some(3725.4)), "62:05");
    }
}
