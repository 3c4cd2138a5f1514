//! Core data model: securities, transactions, paired trades, and the Item
//! envelope returned by extraction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Money, Unit, UnitKind};

/// A tradable instrument owned by the Client registry.
///
/// Created by the security resolver the first time a document references an
/// unknown instrument; never mutated by the extraction engine afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub id: String,
    pub name: String,
    pub isin: Option<String>,
    pub wkn: Option<String>,
    pub ticker: Option<String>,
    pub currency: String,
}

impl Security {
    pub fn new(
        name: String,
        isin: Option<String>,
        wkn: Option<String>,
        ticker: Option<String>,
        currency: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            isin,
            wkn,
            ticker,
            currency,
        }
    }
}

/// Identifying fields for an instrument as stated by a document, before
/// resolution against the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityCandidate {
    pub name: Option<String>,
    pub isin: Option<String>,
    pub wkn: Option<String>,
    pub ticker: Option<String>,
    pub currency: String,
}

/// Canonical transaction shapes produced by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Buy,
    Sell,
    Dividends,
    Taxes,
    Fees,
    Deposit,
    Removal,
    Interest,
    InterestCharge,
    DeliveryInbound,
    DeliveryOutbound,
}

/// Direction of the cash movement, which decides how taxes and fees relate
/// gross value to the settlement amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Money arrives: amount = gross - taxes - fees.
    Inflow,
    /// Money leaves: amount = gross + taxes + fees.
    Outflow,
}

impl TransactionType {
    pub fn direction(&self) -> Direction {
        match self {
            TransactionType::Sell
            | TransactionType::Dividends
            | TransactionType::Interest
            | TransactionType::Deposit
            | TransactionType::DeliveryInbound => Direction::Inflow,
            TransactionType::Buy
            | TransactionType::Taxes
            | TransactionType::Fees
            | TransactionType::Removal
            | TransactionType::InterestCharge
            | TransactionType::DeliveryOutbound => Direction::Outflow,
        }
    }

    /// Whether this shape moves securities and therefore carries shares.
    pub fn is_security_related(&self) -> bool {
        matches!(
            self,
            TransactionType::Buy
                | TransactionType::Sell
                | TransactionType::Dividends
                | TransactionType::DeliveryInbound
                | TransactionType::DeliveryOutbound
        )
    }
}

/// A single-sided financial transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub txn_type: TransactionType,
    pub date: NaiveDate,
    /// Fixed-point share quantity scaled by [`crate::money::SHARES_SCALE`].
    pub shares: Option<i64>,
    /// Net settlement amount.
    pub amount: Money,
    pub units: Vec<Unit>,
    pub note: Option<String>,
    /// Document identifier this transaction was extracted from.
    pub source: String,
    pub security_id: Option<String>,
}

impl Transaction {
    pub fn currency(&self) -> &str {
        &self.amount.currency
    }

    fn unit_sum(&self, kind: UnitKind) -> i64 {
        self.units
            .iter()
            .filter(|u| u.kind == kind)
            .map(|u| u.amount.amount)
            .sum()
    }

    pub fn gross_value(&self) -> i64 {
        self.unit_sum(UnitKind::GrossValue)
    }

    pub fn tax_sum(&self) -> i64 {
        self.unit_sum(UnitKind::Tax)
    }

    pub fn fee_sum(&self) -> i64 {
        self.unit_sum(UnitKind::Fee)
    }

    /// The gross-value unit carrying a forex component, if any.
    pub fn forex_gross_unit(&self) -> Option<&Unit> {
        self.units
            .iter()
            .find(|u| u.kind == UnitKind::GrossValue && u.forex.is_some())
    }

    /// Settlement amount implied by the attached units, following the
    /// transaction's cash direction. Transactions without a gross unit have
    /// nothing to check against.
    pub fn computed_amount(&self) -> Option<i64> {
        if !self.units.iter().any(|u| u.kind == UnitKind::GrossValue) {
            return None;
        }
        let gross = self.gross_value();
        Some(match self.txn_type.direction() {
            Direction::Inflow => gross - self.tax_sum() - self.fee_sum(),
            Direction::Outflow => gross + self.tax_sum() + self.fee_sum(),
        })
    }
}

/// The paired cash-leg + security-leg representation of a single trade.
///
/// Both legs share date, shares and monetary totals by construction and are
/// never emitted separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuySellEntry {
    pub portfolio: Transaction,
    pub account: Transaction,
}

/// Why a business-level Item is marked failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    TransactionTypeNotSupported,
    OrderCancellationUnsupported,
}

/// Failure marker carried by Items that could not be imported automatically
/// but should still be shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Extraction result envelope.
///
/// A failed item still carries its (possibly incomplete) payload for
/// diagnostic display. Items are immutable after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "itemType")]
pub enum Item {
    /// A newly discovered security (only emitted when the registry did not
    /// already contain the instrument).
    SecurityItem {
        security: Security,
        failure: Option<ItemFailure>,
    },
    /// A single-sided transaction (dividend, deposit, fee, ...).
    TransactionItem {
        transaction: Transaction,
        failure: Option<ItemFailure>,
    },
    /// A paired trade.
    BuySellEntryItem {
        entry: BuySellEntry,
        failure: Option<ItemFailure>,
    },
}

impl Item {
    pub fn failure(&self) -> Option<&ItemFailure> {
        match self {
            Item::SecurityItem { failure, .. }
            | Item::TransactionItem { failure, .. }
            | Item::BuySellEntryItem { failure, .. } => failure.as_ref(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure().is_some()
    }
}

/// Cash account a transaction is later imported into; only its currency
/// matters to the currency validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    pub currency: String,
}
