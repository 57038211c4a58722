//! Conversion between display units and planck, the chain's indivisible unit.
//!
//! One display unit is 10^12 planck. Parsing is exact for any input with at
//! most twelve fractional digits; display output is rounded half-up to six
//! decimal places.

use crate::error::{ClientError, ClientResult};

/// Fractional digits of one display unit
pub const PLANCK_DECIMALS: u32 = 12;

/// Planck per display unit
pub const PLANCK_PER_UNIT: u128 = 10u128.pow(PLANCK_DECIMALS);

/// Decimal places kept when rendering amounts for people
pub const DISPLAY_DECIMALS: u32 = 6;

/// Parse a display-unit decimal string ("1", "0.25", "12.000000000001") into planck.
///
/// Negative, empty, non-numeric and over-precise inputs are `InvalidAmount`.
/// Zero parses successfully; positivity is the caller's rule.
pub fn to_smallest_unit(amount: &str) -> ClientResult<u128> {
    let trimmed = amount.trim();
    let invalid = |why: &str| ClientError::InvalidAmount(format!("{:?}: {}", amount, why));

    if trimmed.is_empty() {
        return Err(invalid("empty amount"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("amount must be positive"));
    }
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let (integer, fraction) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if integer.is_empty() && fraction.is_empty() {
        return Err(invalid("not a number"));
    }
    if !integer.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid("not a number"));
    }
    if fraction.len() > PLANCK_DECIMALS as usize {
        return Err(invalid("more than 12 decimal places"));
    }

    let whole: u128 = if integer.is_empty() {
        0
    } else {
        integer.parse().map_err(|_| invalid("amount too large"))?
    };
    let padded = format!("{:0<width$}", fraction, width = PLANCK_DECIMALS as usize);
    let frac: u128 = padded.parse().map_err(|_| invalid("not a number"))?;

    whole
        .checked_mul(PLANCK_PER_UNIT)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| invalid("amount too large"))
}

/// Render planck as display units rounded half-up to six decimals ("1.500000")
pub fn from_smallest_unit(planck: u128) -> String {
    let step = 10u128.pow(PLANCK_DECIMALS - DISPLAY_DECIMALS);
    let scaled = planck / step + u128::from(planck % step >= step / 2);
    let per_unit = 10u128.pow(DISPLAY_DECIMALS);
    format!(
        "{}.{:0width$}",
        scaled / per_unit,
        scaled % per_unit,
        width = DISPLAY_DECIMALS as usize
    )
}

/// Render planck exactly, trimming trailing zeros ("1.5", "1000")
pub fn format_exact(planck: u128) -> String {
    let whole = planck / PLANCK_PER_UNIT;
    let frac = planck % PLANCK_PER_UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = PLANCK_DECIMALS as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_amounts() {
        assert_eq!(to_smallest_unit("1").unwrap(), 1_000_000_000_000);
        assert_eq!(to_smallest_unit(" 42 ").unwrap(), 42 * PLANCK_PER_UNIT);
        assert_eq!(to_smallest_unit("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_fractional_amounts() {
        assert_eq!(to_smallest_unit("0.5").unwrap(), 500_000_000_000);
        assert_eq!(to_smallest_unit(".25").unwrap(), 250_000_000_000);
        assert_eq!(to_smallest_unit("1.000000000001").unwrap(), 1_000_000_000_001);
        assert_eq!(to_smallest_unit("3.").unwrap(), 3 * PLANCK_PER_UNIT);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for input in ["", "  ", "-1", "abc", "1.2.3", "1e5", "0.0000000000001", ".", "0x10"] {
            assert!(
                matches!(to_smallest_unit(input), Err(ClientError::InvalidAmount(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_overflow() {
        let huge = "9".repeat(40);
        assert!(matches!(
            to_smallest_unit(&huge),
            Err(ClientError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_display_rounds_to_six_places() {
        assert_eq!(from_smallest_unit(1_500_000_000_000), "1.500000");
        assert_eq!(from_smallest_unit(1_234_567_890_123), "1.234568");
        assert_eq!(from_smallest_unit(1_234_567_490_000), "1.234567");
        assert_eq!(from_smallest_unit(999_999_999_999), "1.000000");
        assert_eq!(from_smallest_unit(0), "0.000000");
    }

    #[test]
    fn test_integer_round_trip() {
        let samples = (1..=1000u64).chain([10_000, 1_000_000, 123_456_789, u32::MAX as u64]);
        for units in samples {
            let planck = to_smallest_unit(&units.to_string()).unwrap();
            assert_eq!(planck, u128::from(units) * PLANCK_PER_UNIT);
            let again = to_smallest_unit(&from_smallest_unit(planck)).unwrap();
            assert_eq!(again, planck, "round trip failed for {units}");
        }
    }

    #[test]
    fn test_format_exact() {
        assert_eq!(format_exact(1_500_000_000_000), "1.5");
        assert_eq!(format_exact(1_000 * PLANCK_PER_UNIT), "1000");
        assert_eq!(format_exact(1), "0.000000000001");
    }
}
