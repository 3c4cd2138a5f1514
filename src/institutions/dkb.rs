//! DKB (Deutsche Kreditbank) document profile.
//!
//! Covers securities settlement notes, dividend credits, and cancellation
//! (Storno) notes for booked-in/booked-out deliveries. Cancellations are
//! recognized but not importable; they surface as failed Items.

use crate::matcher::{
    compile, BlockShape, BlockTemplate, DateOrder, DocumentProfile, FieldPattern, LocaleSettings,
    TradeSide,
};
use crate::money::DecimalFormat;
use crate::models::{FailureKind, TransactionType};

const SECURITY_LINE: &str = r"^Stück (?P<shares>[\d.,]+) (?P<name>.+) (?P<isin>[A-Z]{2}[A-Z0-9]{10}) \((?P<wkn>[A-Z0-9]{6})\)$";

fn trade_fields() -> Vec<FieldPattern> {
    vec![
        FieldPattern::required("isin", SECURITY_LINE),
        FieldPattern::required("gross", r"^Kurswert (?P<gross>[\d.,]+)-? (?P<currency>[A-Z]{3})$"),
        FieldPattern::repeated(
            "fee",
            r"^(?:Provision|Abwicklungskosten Börse|Transaktionsentgelt Börse) (?P<fee>[\d.,]+)-? [A-Z]{3}$",
        ),
        FieldPattern::repeated(
            "tax",
            r"^(?:Kapitalertragsteuer|Solidaritätszuschlag|Kirchensteuer) (?P<tax>[\d.,]+)-? [A-Z]{3}$",
        ),
        FieldPattern::optional(
            "amount",
            r"^Ausmachender Betrag (?P<amount>[\d.,]+)[-+]? [A-Z]{3}$",
        ),
        FieldPattern::required(
            "date",
            r"^Schlusstag(?:/-Zeit)? (?P<date>\d{2}\.\d{2}\.\d{4}).*$",
        ),
    ]
}

fn storno_fields() -> Vec<FieldPattern> {
    vec![
        FieldPattern::required("isin", SECURITY_LINE),
        FieldPattern::required("date", r"^Datum (?P<date>\d{2}\.\d{2}\.\d{4})$"),
        FieldPattern::optional(
            "amount",
            r"^Ausmachender Betrag (?P<amount>[\d.,]+)[-+]? [A-Z]{3}$",
        ),
    ]
}

pub fn profile() -> DocumentProfile {
    DocumentProfile {
        institution: "DKB".into(),
        must_include: vec![compile(r"Deutsche Kreditbank")],
        must_not_include: vec![],
        locale: LocaleSettings {
            decimal: DecimalFormat::German,
            dates: DateOrder::DayFirst,
        },
        fallback_currency: "EUR".into(),
        context_fields: vec![],
        posting_types: vec![],
        blocks: vec![
            BlockTemplate::new(
                BlockShape::Trade {
                    side: TradeSide::Buy,
                },
                r"^Wertpapier Abrechnung Kauf$",
                trade_fields(),
            ),
            BlockTemplate::new(
                BlockShape::Trade {
                    side: TradeSide::Sell,
                },
                r"^Wertpapier Abrechnung Verkauf$",
                trade_fields(),
            ),
            BlockTemplate::new(
                BlockShape::Dividend,
                r"^Dividendengutschrift$",
                vec![
                    FieldPattern::required("isin", SECURITY_LINE),
                    FieldPattern::required(
                        "gross",
                        r"^Dividendengutschrift (?P<gross>[\d.,]+)\+? (?P<currency>[A-Z]{3})$",
                    ),
                    FieldPattern::repeated(
                        "tax",
                        r"^(?:Kapitalertragsteuer|Solidaritätszuschlag|Kirchensteuer) (?P<tax>[\d.,]+)- [A-Z]{3}$",
                    ),
                    FieldPattern::required(
                        "date",
                        r"^Zahlbarkeitstag (?P<date>\d{2}\.\d{2}\.\d{4})$",
                    ),
                    FieldPattern::optional(
                        "amount",
                        r"^Ausmachender Betrag (?P<amount>[\d.,]+)\+? [A-Z]{3}$",
                    ),
                ],
            ),
            // cancellation notes: recognized, built best-effort, never imported
            BlockTemplate::new(
                BlockShape::Unsupported {
                    kind: FailureKind::OrderCancellationUnsupported,
                    txn_type: TransactionType::DeliveryInbound,
                },
                r"^Storno der Einbuchung$",
                storno_fields(),
            ),
            BlockTemplate::new(
                BlockShape::Unsupported {
                    kind: FailureKind::OrderCancellationUnsupported,
                    txn_type: TransactionType::DeliveryOutbound,
                },
                r"^Storno der Ausbuchung$",
                storno_fields(),
            ),
        ],
    }
}
