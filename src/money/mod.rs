//! Monetary model: exact minor-unit amounts and typed transaction units.
//!
//! Amounts are integers in minor units (cents) paired with a currency code;
//! there is no floating point in any amount. Exchange rates are the single
//! floating-point value in the model, and the one-minor-unit tolerance
//! `FOREX_TOLERANCE` absorbs their rounding.

use serde::{Deserialize, Serialize};

use crate::error::MoneyError;

/// Allowed deviation, in minor units, between a unit's settlement amount and
/// its forex amount converted through the stored exchange rate.
pub const FOREX_TOLERANCE: i64 = 1;

/// Fixed-point scale for share quantities (8 decimal places).
pub const SHARES_SCALE: i64 = 100_000_000;

/// Decimal notation used by an institution's documents.
///
/// Selected once per institution profile; never inferred per-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecimalFormat {
    /// `1.234,56`
    German,
    /// `1,234.56`
    English,
    /// `1'234.56`
    Swiss,
}

impl DecimalFormat {
    /// Strip thousands separators and normalize the decimal separator to `.`.
    fn normalize(&self, text: &str) -> String {
        let trimmed: String = text
            .trim()
            .chars()
            .filter(|c| *c != ' ' && *c != '\u{a0}' && *c != '\u{202f}')
            .collect();
        match self {
            DecimalFormat::German => trimmed.replace('.', "").replace(',', "."),
            DecimalFormat::English => trimmed.replace(',', ""),
            DecimalFormat::Swiss => trimmed.replace('\'', "").replace('’', ""),
        }
    }

    /// Parse a decimal string into a fixed-point integer with `scale`
    /// fractional digits, exactly. Excess fractional digits are rounded
    /// half-up.
    pub fn parse_fixed(&self, text: &str, scale: u32) -> Option<i64> {
        let normalized = self.normalize(text);
        if normalized.is_empty() {
            return None;
        }

        let (sign, digits) = match normalized.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, normalized.strip_prefix('+').unwrap_or(&normalized)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let factor = 10i64.checked_pow(scale)?;
        let int_value = if int_part.is_empty() {
            0
        } else {
            int_part.parse::<i64>().ok()?
        };
        let mut value = int_value.checked_mul(factor)?;

        let scale = scale as usize;
        if !frac_part.is_empty() {
            let (kept, rest) = if frac_part.len() > scale {
                frac_part.split_at(scale)
            } else {
                (frac_part, "")
            };
            let mut frac = if kept.is_empty() { 0 } else { kept.parse::<i64>().ok()? };
            frac *= 10i64.pow((scale - kept.len()) as u32);
            // round half-up on the first dropped digit
            if rest.chars().next().map(|c| c >= '5').unwrap_or(false) {
                frac += 1;
            }
            value = value.checked_add(frac)?;
        }

        Some(sign * value)
    }

    /// Parse an exchange rate. Rates are not money; they stay floating point.
    pub fn parse_rate(&self, text: &str) -> Option<f64> {
        let normalized = self.normalize(text);
        normalized.parse::<f64>().ok().filter(|r| r.is_finite())
    }
}

/// An exact amount in minor units of a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

impl Money {
    /// Build from an already-scaled minor-unit amount.
    pub fn from_minor(currency: &str, amount: i64) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
        }
    }

    /// Parse a decimal string (e.g. `"1.234,56"`) under the given notation.
    pub fn of(currency: &str, text: &str, format: DecimalFormat) -> Result<Self, MoneyError> {
        format
            .parse_fixed(text, 2)
            .map(|amount| Self::from_minor(currency, amount))
            .ok_or_else(|| MoneyError::MalformedAmount {
                currency: currency.to_string(),
                input: text.to_string(),
            })
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Add an amount of the same currency. Mixing currencies or overflowing
    /// the minor-unit range is a programming error, not a runtime coercion.
    pub fn add(&self, other: &Money) -> Money {
        assert_eq!(
            self.currency, other.currency,
            "cannot add {} to {}",
            other.currency, self.currency
        );
        let amount = self
            .amount
            .checked_add(other.amount)
            .expect("money amount overflow");
        Money::from_minor(&self.currency, amount)
    }

    pub fn subtract(&self, other: &Money) -> Money {
        assert_eq!(
            self.currency, other.currency,
            "cannot subtract {} from {}",
            other.currency, self.currency
        );
        let amount = self
            .amount
            .checked_sub(other.amount)
            .expect("money amount overflow");
        Money::from_minor(&self.currency, amount)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        write!(f, "{}{}.{:02} {}", sign, abs / 100, abs % 100, self.currency)
    }
}

/// Component kind of a monetary unit attached to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitKind {
    GrossValue,
    Tax,
    Fee,
}

/// A typed monetary component of a transaction, optionally backed by an
/// original foreign-currency amount and the exchange rate linking them.
///
/// Units are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub kind: UnitKind,
    /// Amount in the transaction's settlement currency.
    pub amount: Money,
    pub forex: Option<Money>,
    pub exchange_rate: Option<f64>,
}

impl Unit {
    pub fn new(kind: UnitKind, amount: Money) -> Self {
        Self {
            kind,
            amount,
            forex: None,
            exchange_rate: None,
        }
    }

    /// Gross-value unit carrying the original foreign amount. The forex
    /// amount divided by the rate must reproduce the settlement amount
    /// within [`FOREX_TOLERANCE`].
    pub fn gross_value_with_forex(
        amount: Money,
        forex: Money,
        exchange_rate: f64,
    ) -> Result<Self, MoneyError> {
        if !exchange_rate.is_finite() || exchange_rate <= 0.0 {
            return Err(MoneyError::InvalidExchangeRate {
                rate: exchange_rate,
            });
        }

        let converted = (forex.amount as f64 / exchange_rate).round() as i64;
        if (converted - amount.amount).abs() > FOREX_TOLERANCE {
            return Err(MoneyError::InconsistentForexUnit {
                currency: amount.currency.clone(),
                expected: amount.amount,
                converted,
                forex_currency: forex.currency.clone(),
                forex_amount: forex.amount,
                rate: exchange_rate,
            });
        }

        Ok(Self {
            kind: UnitKind::GrossValue,
            amount,
            forex: Some(forex),
            exchange_rate: Some(exchange_rate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_german_decimals() {
        assert_eq!(
            Money::of("EUR", "1.234,56", DecimalFormat::German).unwrap(),
            Money::from_minor("EUR", 123_456)
        );
        assert_eq!(
            Money::of("EUR", "0,01", DecimalFormat::German).unwrap(),
            Money::from_minor("EUR", 1)
        );
        assert_eq!(
            Money::of("EUR", "-123,45", DecimalFormat::German).unwrap(),
            Money::from_minor("EUR", -12_345)
        );
    }

    #[test]
    fn parses_english_and_swiss_decimals() {
        assert_eq!(
            Money::of("USD", "1,234.56", DecimalFormat::English).unwrap(),
            Money::from_minor("USD", 123_456)
        );
        assert_eq!(
            Money::of("CHF", "1'234.50", DecimalFormat::Swiss).unwrap(),
            Money::from_minor("CHF", 123_450)
        );
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!(Money::of("EUR", "abc", DecimalFormat::German).is_err());
        assert!(Money::of("EUR", "", DecimalFormat::German).is_err());
        assert!(Money::of("EUR", "12x34", DecimalFormat::German).is_err());
    }

    #[test]
    fn shares_parse_to_eight_decimals() {
        let shares = DecimalFormat::German
            .parse_fixed("1,535249", SHARES_SCALE.ilog10())
            .unwrap();
        assert_eq!(shares, 153_524_900);
    }

    #[test]
    #[should_panic(expected = "cannot add")]
    fn cross_currency_addition_panics() {
        let eur = Money::from_minor("EUR", 100);
        let usd = Money::from_minor("USD", 100);
        let _ = eur.add(&usd);
    }

    #[test]
    #[should_panic(expected = "money amount overflow")]
    fn addition_overflow_panics_instead_of_wrapping() {
        let max = Money::from_minor("EUR", i64::MAX);
        let one = Money::from_minor("EUR", 1);
        let _ = max.add(&one);
    }

    #[test]
    fn forex_unit_reconciles_within_tolerance() {
        // 68.00 USD at rate 1.13615 -> 59.85 EUR, stated 59.86 EUR: 1 cent off
        let unit = Unit::gross_value_with_forex(
            Money::from_minor("EUR", 5_986),
            Money::from_minor("USD", 6_800),
            1.13615,
        )
        .unwrap();
        assert_eq!(unit.kind, UnitKind::GrossValue);
        assert_eq!(unit.forex.as_ref().unwrap().amount, 6_800);
    }

    #[test]
    fn forex_unit_beyond_tolerance_is_rejected() {
        let result = Unit::gross_value_with_forex(
            Money::from_minor("EUR", 6_100),
            Money::from_minor("USD", 6_800),
            1.13615,
        );
        assert!(matches!(
            result,
            Err(MoneyError::InconsistentForexUnit { .. })
        ));
    }

    #[test]
    fn zero_or_negative_rate_is_invalid() {
        let result = Unit::gross_value_with_forex(
            Money::from_minor("EUR", 5_986),
            Money::from_minor("USD", 6_800),
            0.0,
        );
        assert!(matches!(
            result,
            Err(MoneyError::InvalidExchangeRate { .. })
        ));
    }

    #[test]
    fn display_renders_minor_units() {
        assert_eq!(Money::from_minor("EUR", 10_726).to_string(), "107.26 EUR");
        assert_eq!(Money::from_minor("EUR", -5).to_string(), "-0.05 EUR");
    }
}
