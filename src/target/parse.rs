use nom::branch::alt;
use nom::character::complete::{char, digit0, digit1, one_of};
use nom::combinator::{map_res, opt, recognize};
use nom::number::complete::double;
use nom::{IResult, Parser};

use crate::config::defaults::{BYTES_PER_KILOBYTE, BYTES_PER_MEGABYTE};
use crate::error::TargetSizeError;

/// Unit a target size value is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeUnit {
    Kilobytes,
    #[default]
    Megabytes,
}

impl SizeUnit {
    /// Map a form token to a unit. Only "kb" and "mb" are recognized;
    /// anything else falls back to megabytes.
    pub fn normalize(token: &str) -> Self {
        match token {
            "kb" => SizeUnit::Kilobytes,
            _ => SizeUnit::Megabytes,
        }
    }

    pub fn multiplier(&self) -> u64 {
        match self {
            SizeUnit::Kilobytes => BYTES_PER_KILOBYTE,
            SizeUnit::Megabytes => BYTES_PER_MEGABYTE,
        }
    }
}

/// Sign, digits and fraction without an exponent
fn mantissa(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize((
            opt(one_of("+-")),
            alt((
                recognize((digit1, opt((char('.'), digit0)))),
                recognize((char('.'), digit1)),
            )),
        )),
        str::parse::<f64>,
    )
    .parse(input)
}

/// Parse the leading decimal number, ignoring whatever follows it.
///
/// A dangling exponent ("1.5e") is treated as trailing text.
fn leading_number(input: &str) -> IResult<&str, f64> {
    let full: IResult<&str, f64> = double(input);
    full.or_else(|_| mantissa(input))
}

/// Parse a target size value into bytes.
///
/// Empty input means "no target" and yields 0. Negative, non-finite and
/// non-numeric values are rejected.
pub fn parse_target_size(value: &str, unit: SizeUnit) -> Result<u64, TargetSizeError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Ok(0);
    }

    let parsed = match leading_number(trimmed) {
        Ok((_, number)) => number,
        Err(_) => return Err(TargetSizeError::Invalid(trimmed.to_string())),
    };

    if !parsed.is_finite() || parsed < 0.0 {
        return Err(TargetSizeError::Invalid(trimmed.to_string()));
    }

    // `as` saturates for values beyond u64
    Ok((parsed * unit.multiplier() as f64).floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_means_no_target() {
        assert_eq!(parse_target_size("", SizeUnit::Kilobytes), Ok(0));
        assert_eq!(parse_target_size("   ", SizeUnit::Megabytes), Ok(0));
    }

    #[test]
    fn test_kilobytes() {
        assert_eq!(parse_target_size("500", SizeUnit::Kilobytes), Ok(512_000));
        assert_eq!(parse_target_size("0.5", SizeUnit::Kilobytes), Ok(512));
    }

    #[test]
    fn test_megabytes_floor() {
        assert_eq!(parse_target_size("2.5", SizeUnit::Megabytes), Ok(2_621_440));
        // 0.1 MB = 104857.6 bytes
        assert_eq!(parse_target_size("0.1", SizeUnit::Megabytes), Ok(104_857));
    }

    #[test]
    fn test_trailing_text_ignored() {
        assert_eq!(parse_target_size(" 3MB", SizeUnit::Megabytes), Ok(3 * 1024 * 1024));
    }

    #[test]
    fn test_dangling_exponent_ignored() {
        assert_eq!(parse_target_size("1e", SizeUnit::Kilobytes), Ok(1024));
        assert_eq!(parse_target_size("1.5e", SizeUnit::Kilobytes), Ok(1536));
        assert_eq!(parse_target_size("1.5e+", SizeUnit::Kilobytes), Ok(1536));
        assert_eq!(parse_target_size("2e1", SizeUnit::Kilobytes), Ok(20 * 1024));
        assert!(parse_target_size("-1e", SizeUnit::Kilobytes).is_err());
    }

    #[test]
    fn test_zero_is_valid() {
        assert_eq!(parse_target_size("0", SizeUnit::Megabytes), Ok(0));
    }

    #[test]
    fn test_negative_rejected() {
        assert!(parse_target_size("-1", SizeUnit::Kilobytes).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_target_size("abc", SizeUnit::Megabytes).is_err());
    }

    #[test]
    fn test_unit_normalization() {
        assert_eq!(SizeUnit::normalize("kb"), SizeUnit::Kilobytes);
        assert_eq!(SizeUnit::normalize("mb"), SizeUnit::Megabytes);
        assert_eq!(SizeUnit::normalize("KB"), SizeUnit::Megabytes);
        assert_eq!(SizeUnit::normalize("gigabytes"), SizeUnit::Megabytes);
        assert_eq!(SizeUnit::normalize(""), SizeUnit::Megabytes);
    }
}
