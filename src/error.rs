//! Error taxonomy for the extraction engine.
//!
//! Hard errors (`ExtractError`) end up in the caller's error sink and never
//! produce an Item. Business-level failures (unsupported transaction types,
//! cancellations) are *not* errors: they are carried as failed Items so the
//! caller can still show what was found. An empty error sink therefore does
//! not imply that every Item succeeded.

use thiserror::Error;

/// Errors raised while parsing monetary values and units.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MoneyError {
    /// Input that could not be parsed as a decimal amount.
    #[error("malformed amount {input:?} for currency {currency}")]
    MalformedAmount { currency: String, input: String },

    /// A forex-backed unit whose converted amount does not reconcile with
    /// the settlement amount within the allowed tolerance.
    #[error(
        "inconsistent forex unit: {forex_amount} {forex_currency} at rate {rate} \
         converts to {converted}, expected {expected} {currency}"
    )]
    InconsistentForexUnit {
        currency: String,
        expected: i64,
        converted: i64,
        forex_currency: String,
        forex_amount: i64,
        rate: f64,
    },

    /// Exchange rate missing or unusable (zero, negative, NaN).
    #[error("invalid exchange rate {rate}")]
    InvalidExchangeRate { rate: f64 },
}

/// Hard extraction errors, collected in the error sink.
///
/// These abort only the offending block instance; sibling blocks of the same
/// document are still processed (partial-success extraction is the default).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// A numeric or date field did not parse under the institution's locale.
    #[error("{source_name}: malformed {field} {value:?} in lines {start_line}-{end_line}")]
    MalformedInput {
        source_name: String,
        field: String,
        value: String,
        start_line: usize,
        end_line: usize,
    },

    /// A required field pattern never matched inside the block span.
    #[error("{source_name}: required field {field} not found in lines {start_line}-{end_line}")]
    UnresolvedRequiredField {
        source_name: String,
        field: String,
        start_line: usize,
        end_line: usize,
    },

    /// The computed transaction violates the unit-sum invariant. This points
    /// at a defective field mapping, so the transaction cannot be trusted.
    #[error(
        "{source_name}: inconsistent unit sum, amount {amount} but units resolve to {computed}"
    )]
    InconsistentUnitSum {
        source_name: String,
        amount: i64,
        computed: i64,
    },

    /// Monetary model violation (forex cross-check, malformed amounts).
    #[error("{source_name}: {error}")]
    Money {
        source_name: String,
        #[source]
        error: MoneyError,
    },

    /// No institution profile recognized the document text.
    #[error("no institution profile matched the document {source_name}")]
    UnknownDocumentType { source_name: String },

    /// Input exceeds the bounded-time/size guard for untrusted documents.
    #[error("document {source_name} exceeds limits ({bytes} bytes, {lines} lines)")]
    DocumentTooLarge {
        source_name: String,
        bytes: usize,
        lines: usize,
    },
}
