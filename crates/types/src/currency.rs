//! Coin amounts and bid-expression parsing.
//!
//! Amounts are carried in silver, the base unit of a fixed four-tier
//! ladder: 1 mithril = 1,000,000 silver, 1 platinum = 10,000 silver,
//! 1 gold = 100 silver.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The four coin denominations, highest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Denomination {
    Mithril,
    Platinum,
    Gold,
    Silver,
}

impl Denomination {
    /// All denominations in descending value order.
    const ALL: [Denomination; 4] = [
        Denomination::Mithril,
        Denomination::Platinum,
        Denomination::Gold,
        Denomination::Silver,
    ];

    /// Value in silver.
    fn multiplier(self) -> u64 {
        match self {
            Denomination::Mithril => 1_000_000,
            Denomination::Platinum => 10_000,
            Denomination::Gold => 100,
            Denomination::Silver => 1,
        }
    }

    /// Single-letter code used in display strings.
    fn code(self) -> char {
        match self {
            Denomination::Mithril => 'm',
            Denomination::Platinum => 'p',
            Denomination::Gold => 'g',
            Denomination::Silver => 's',
        }
    }

    /// Position in the descending order, mithril first.
    fn rank(self) -> usize {
        match self {
            Denomination::Mithril => 0,
            Denomination::Platinum => 1,
            Denomination::Gold => 2,
            Denomination::Silver => 3,
        }
    }

    /// Match a lowercased unit suffix, accepting long forms and
    /// abbreviations alongside the single-letter codes.
    fn from_unit(unit: &str) -> Option<Self> {
        match unit {
            "m" | "mith" | "mithril" => Some(Denomination::Mithril),
            "p" | "plat" | "platinum" => Some(Denomination::Platinum),
            "g" | "gold" => Some(Denomination::Gold),
            "s" | "sil" | "silver" => Some(Denomination::Silver),
            _ => None,
        }
    }
}

/// An amount of coin, stored in silver.
///
/// `Display` renders the greedy decomposition into the four tiers, highest
/// first, omitting zero tiers; zero renders as `0s`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Coins(pub u64);

impl Coins {
    pub const ZERO: Coins = Coins(0);

    /// Total amount in silver.
    pub fn silver(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut remainder = self.0;
        let mut wrote = false;

        for denom in Denomination::ALL {
            let count = remainder / denom.multiplier();
            remainder %= denom.multiplier();
            if count > 0 {
                if wrote {
                    write!(f, " ")?;
                }
                write!(f, "{}{}", count, denom.code())?;
                wrote = true;
            }
        }

        if !wrote {
            write!(f, "0s")?;
        }
        Ok(())
    }
}

/// Errors from bid-expression parsing.
///
/// A failed parse never yields an amount; callers must not treat any of
/// these as "parsed to zero".
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseBidError {
    #[error("empty bid")]
    Empty,

    #[error("malformed token `{0}`")]
    MalformedToken(String),

    #[error("denominations out of order")]
    OutOfOrder,

    #[error("denomination given twice")]
    DuplicateDenomination,

    #[error("amount too large")]
    Overflow,
}

/// Parse a free-text bid expression into a total amount.
///
/// The input is case-insensitive and split on whitespace. Every token must
/// be exactly `<digits><unit>`, where the unit is one of the single-letter
/// codes `m`/`p`/`g`/`s` or a long form (`mithril`, `mith`, `platinum`,
/// `plat`, `gold`, `silver`, `sil`). Denominations must appear in strictly
/// descending order, each at most once. Any violation rejects the whole
/// expression.
///
/// ```
/// use auction_types::{parse_bid, Coins};
///
/// let total = parse_bid("1m 50p 100g 500s").unwrap();
/// assert_eq!(total, Coins(1_510_500));
/// // Display regroups from the total: 100g carries into platinum.
/// assert_eq!(total.to_string(), "1m 51p 5g");
/// ```
pub fn parse_bid(text: &str) -> Result<Coins, ParseBidError> {
    let text = text.to_ascii_lowercase();

    let mut total: u64 = 0;
    let mut last_rank: Option<usize> = None;
    let mut saw_token = false;

    for token in text.split_whitespace() {
        saw_token = true;

        let digits_end = token
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(token.len());
        let (digits, unit) = token.split_at(digits_end);

        if digits.is_empty() {
            return Err(ParseBidError::MalformedToken(token.to_string()));
        }
        let denom = Denomination::from_unit(unit)
            .ok_or_else(|| ParseBidError::MalformedToken(token.to_string()))?;

        match last_rank {
            Some(prev) if denom.rank() == prev => {
                return Err(ParseBidError::DuplicateDenomination)
            }
            Some(prev) if denom.rank() < prev => return Err(ParseBidError::OutOfOrder),
            _ => {}
        }
        last_rank = Some(denom.rank());

        // Digits-only by construction, so a parse failure is an overflow.
        let count: u64 = digits.parse().map_err(|_| ParseBidError::Overflow)?;
        total = count
            .checked_mul(denom.multiplier())
            .and_then(|value| total.checked_add(value))
            .ok_or(ParseBidError::Overflow)?;
    }

    if !saw_token {
        return Err(ParseBidError::Empty);
    }
    Ok(Coins(total))
}
