//! Time helpers shared by the stores and the codec

/// Round seconds to millisecond precision (3 decimal places)
pub fn round3(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Integer millisecond key, used to group bounds without float equality
pub fn millis_key(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Format seconds for display columns ("1.500")
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round3() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(3.5), 3.5);
        assert_eq!(round3(0.0004), 0.0);
    }

    #[test]
    fn test_millis_key_absorbs_float_noise() {
        assert_eq!(millis_key(0.1 + 0.2), millis_key(0.3));
        assert_eq!(millis_key(1.0), 1000);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(1.0), "1.000");
        assert_eq!(format_seconds(3.25), "3.250");
        assert_eq!(format_seconds(0.1 + 0.2), "0.300");
    }
}
