use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use thiserror::Error;

/// Decimal places between the chain's smallest unit and the display unit.
pub const WEI_DECIMALS: i64 = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalanceParseError {
    #[error("balance must be a 0x-prefixed hex string, got `{0}`")]
    MissingHexPrefix(String),
    #[error("invalid hex quantity `{0}`")]
    InvalidHex(String),
    #[error("invalid decimal balance `{0}`")]
    InvalidDecimal(String),
}

/// Exact decimal amount in display units (1 unit = 10^18 wei).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Balance(BigDecimal);

impl Balance {
    pub fn zero() -> Self {
        Self(BigDecimal::zero())
    }

    /// Scales an integer amount of the smallest unit down by 18 places.
    pub fn from_wei(wei: BigInt) -> Self {
        Self(BigDecimal::new(wei, WEI_DECIMALS))
    }

    /// Parses a JSON-RPC hex quantity such as `0x8ac7230489e80000`.
    pub fn from_hex_wei(raw: &str) -> Result<Self, BalanceParseError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| BalanceParseError::MissingHexPrefix(raw.to_string()))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(BalanceParseError::InvalidHex(raw.to_string()));
        }
        let wei = BigInt::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| BalanceParseError::InvalidHex(raw.to_string()))?;
        Ok(Self::from_wei(wei))
    }

    pub fn is_negative(&self) -> bool {
        self.0.sign() == Sign::Minus
    }

    /// Renders with an explicit `+` for non-negative values.
    pub fn signed(&self) -> String {
        if self.is_negative() {
            self.to_string()
        } else {
            format!("+{self}")
        }
    }

    /// Lossy view for gauges; never feed the result back into arithmetic.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }

    pub fn as_decimal(&self) -> &BigDecimal {
        &self.0
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<BigDecimal> for Balance {
    fn from(value: BigDecimal) -> Self {
        Self(value)
    }
}

impl Sub for &Balance {
    type Output = Balance;

    fn sub(self, rhs: &Balance) -> Balance {
        Balance(&self.0 - &rhs.0)
    }
}

impl FromStr for Balance {
    type Err = BalanceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigDecimal::from_str(s.trim())
            .map(Self)
            .map_err(|_| BalanceParseError::InvalidDecimal(s.to_string()))
    }
}

// Plain positional notation with trailing zeros trimmed, so the text form
// stored in the database parses back to the same value.
impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (digits, _) = self.0.with_scale(WEI_DECIMALS).as_bigint_and_exponent();
        let negative = digits.sign() == Sign::Minus;
        let mut magnitude = digits.magnitude().to_str_radix(10);
        let scale = WEI_DECIMALS as usize;
        if magnitude.len() <= scale {
            magnitude = format!("{}{}", "0".repeat(scale + 1 - magnitude.len()), magnitude);
        }
        let (whole, fraction) = magnitude.split_at(magnitude.len() - scale);
        let fraction = fraction.trim_end_matches('0');
        if negative {
            f.write_str("-")?;
        }
        f.write_str(whole)?;
        if !fraction.is_empty() {
            write!(f, ".{fraction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_ten_ether() {
        let balance = Balance::from_hex_wei("0x8ac7230489e80000").unwrap();
        assert_eq!(balance.to_string(), "10");
        assert_eq!(balance, "10".parse().unwrap());
    }

    #[test]
    fn keeps_every_wei_at_large_balances() {
        // 123456789012345678901234567 wei, well past f64's 53-bit mantissa.
        let balance = Balance::from_hex_wei("0x661efdf158f2a82c9f4b87").unwrap();
        assert_eq!(balance.to_string(), "123456789.012345678901234567");
    }

    #[test]
    fn renders_sub_unit_amounts() {
        assert_eq!(Balance::from_hex_wei("0x1").unwrap().to_string(), "0.000000000000000001");
        assert_eq!(Balance::from_hex_wei("0x0").unwrap().to_string(), "0");
    }

    #[test]
    fn rejects_malformed_quantities() {
        assert!(matches!(
            Balance::from_hex_wei("1234"),
            Err(BalanceParseError::MissingHexPrefix(_))
        ));
        assert!(matches!(
            Balance::from_hex_wei("0x"),
            Err(BalanceParseError::InvalidHex(_))
        ));
        assert!(matches!(
            Balance::from_hex_wei("0xzz"),
            Err(BalanceParseError::InvalidHex(_))
        ));
        assert!(matches!(
            Balance::from_hex_wei("0x-1"),
            Err(BalanceParseError::InvalidHex(_))
        ));
        assert!(matches!(
            Balance::from_hex_wei("0x+1"),
            Err(BalanceParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn subtraction_and_sign_rendering() {
        let previous: Balance = "2.5".parse().unwrap();
        let current: Balance = "1.25".parse().unwrap();
        let change = &current - &previous;
        assert!(change.is_negative());
        assert_eq!(change.signed(), "-1.25");
        assert_eq!((&previous - &current).signed(), "+1.25");
        assert_eq!(Balance::zero().signed(), "+0");
    }
}
