//! Duration-token parsing for auction lengths.

use std::time::Duration;
use thiserror::Error;

/// Error for a duration token that is not `<digits>m` or `<digits>h`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid duration format, expected e.g. `5m` or `2h`")]
pub struct ParseDurationError;

/// Parse a short duration token: `5m` is five minutes, `2h` is two hours.
///
/// Matching is case-insensitive and exact; anything beyond digits followed
/// by a single unit letter fails. Zero is syntactically legal and left to
/// the caller to clamp.
pub fn parse_duration(text: &str) -> Result<Duration, ParseDurationError> {
    let text = text.to_ascii_lowercase();

    let unit = text.chars().last().ok_or(ParseDurationError)?;
    let digits = &text[..text.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseDurationError);
    }

    let count: u64 = digits.parse().map_err(|_| ParseDurationError)?;
    let secs = match unit {
        'm' => count.checked_mul(60),
        'h' => count.checked_mul(3600),
        _ => None,
    }
    .ok_or(ParseDurationError)?;

    Ok(Duration::from_secs(secs))
}
