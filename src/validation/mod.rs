//! Post-extraction currency validation.
//!
//! Checks an extracted transaction against the account it would be imported
//! into and against its security's trading currency. Mismatches are data,
//! not errors: the caller decides whether to block the import or ask the
//! user.

use serde::{Deserialize, Serialize};

use crate::models::{Account, Security, Transaction};

/// Outcome of a currency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ValidationStatus {
    /// Currencies line up; the transaction can be imported as-is.
    Ok,
    /// The transaction cannot be booked without a conversion the document
    /// does not provide.
    CurrencyMismatch {
        transaction_currency: String,
        expected_currency: String,
    },
}

impl ValidationStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationStatus::Ok)
    }
}

/// Check that a transaction can be booked into the given cash account.
///
/// A transaction settling in another currency is acceptable only when its
/// gross unit carries a forex component in the account's currency, i.e. the
/// document itself stated the conversion.
pub fn check_account_currency(transaction: &Transaction, account: &Account) -> ValidationStatus {
    if transaction.currency() == account.currency {
        return ValidationStatus::Ok;
    }

    let converted = transaction
        .forex_gross_unit()
        .and_then(|unit| unit.forex.as_ref())
        .is_some_and(|forex| forex.currency == account.currency);

    if converted {
        ValidationStatus::Ok
    } else {
        ValidationStatus::CurrencyMismatch {
            transaction_currency: transaction.currency().to_string(),
            expected_currency: account.currency.clone(),
        }
    }
}

/// Check that a transaction's settlement relates to its security's trading
/// currency.
///
/// When the security trades in a different currency than the settlement,
/// the gross unit must carry the foreign amount in the security's currency;
/// otherwise the stated total cannot be traced back to the instrument.
pub fn check_security_currency(transaction: &Transaction, security: &Security) -> ValidationStatus {
    if transaction.currency() == security.currency {
        return ValidationStatus::Ok;
    }

    let traced = transaction
        .forex_gross_unit()
        .and_then(|unit| unit.forex.as_ref())
        .is_some_and(|forex| forex.currency == security.currency);

    if traced {
        ValidationStatus::Ok
    } else {
        ValidationStatus::CurrencyMismatch {
            transaction_currency: transaction.currency().to_string(),
            expected_currency: security.currency.clone(),
        }
    }
}
