//! Parsing helpers for numeric fields that external sources deliver as strings.

use crate::error::ScreenerError;
use chrono::{DateTime, Utc};

/// Parse a finite `f64` from a string field, eg/ Binance's `"lastPrice": "0.51230"`.
pub fn parse_f64(origin: &str, field: &str, raw: &str) -> Result<f64, ScreenerError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ScreenerError::malformed(origin, field, raw))
}

/// Parse a finite, non-negative `f64` from a string field.
pub fn parse_non_negative_f64(origin: &str, field: &str, raw: &str) -> Result<f64, ScreenerError> {
    match parse_f64(origin, field, raw)? {
        value if value >= 0.0 => Ok(value),
        _ => Err(ScreenerError::malformed(origin, field, raw)),
    }
}

/// Convert an epoch millisecond timestamp into a [`DateTime<Utc>`].
pub fn datetime_from_epoch_ms(
    origin: &str,
    field: &str,
    epoch_ms: i64,
) -> Result<DateTime<Utc>, ScreenerError> {
    DateTime::from_timestamp_millis(epoch_ms)
        .ok_or_else(|| ScreenerError::malformed(origin, field, epoch_ms.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_f64() {
        struct TestCase {
            input: &'static str,
            expected: Option<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: plain decimal
                input: "64250.10",
                expected: Some(64250.10),
            },
            TestCase {
                // TC1: negative percent change
                input: "-3.215",
                expected: Some(-3.215),
            },
            TestCase {
                // TC2: surrounding whitespace
                input: " 12 ",
                expected: Some(12.0),
            },
            TestCase {
                // TC3: non-numeric
                input: "abc",
                expected: None,
            },
            TestCase {
                // TC4: empty
                input: "",
                expected: None,
            },
            TestCase {
                // TC5: NaN parses in Rust but is not a usable number
                input: "NaN",
                expected: None,
            },
            TestCase {
                // TC6: infinity
                input: "inf",
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = parse_f64("binance", "lastPrice", test.input).ok();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_parse_f64_error_carries_field() {
        let actual = parse_f64("binance", "quoteVolume", "n/a").unwrap_err();
        assert_eq!(
            actual,
            ScreenerError::malformed("binance", "quoteVolume", "n/a")
        );
    }

    #[test]
    fn test_parse_non_negative_f64() {
        assert_eq!(
            parse_non_negative_f64("binance", "openInterest", "0").unwrap(),
            0.0
        );
        assert!(parse_non_negative_f64("binance", "openInterest", "-1").is_err());
    }
}
