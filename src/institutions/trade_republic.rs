//! Trade Republic document profile.
//!
//! Covers securities settlement notes (Kauf/Verkauf/Sparplan), dividend
//! notices including foreign-currency dividends settled in EUR, and interest
//! credits.

use crate::matcher::{
    compile, BlockShape, BlockTemplate, DateOrder, DocumentProfile, FieldPattern, LocaleSettings,
    TradeSide,
};
use crate::money::DecimalFormat;
use crate::models::TransactionType;

const POSITION_LINE: &str = r"^(?P<name>.+) ISIN: (?P<isin>[A-Z]{2}[A-Z0-9]{10}) (?P<shares>[\d.,]+) Stk\. (?P<price>[\d.,]+) (?P<currency>[A-Z]{3}) (?P<gross>[\d.,]+) [A-Z]{3}$";

pub fn profile() -> DocumentProfile {
    DocumentProfile {
        institution: "Trade Republic".into(),
        must_include: vec![compile(r"TRADE REPUBLIC")],
        must_not_include: vec![],
        locale: LocaleSettings {
            decimal: DecimalFormat::German,
            dates: DateOrder::DayFirst,
        },
        fallback_currency: "EUR".into(),
        context_fields: vec![],
        posting_types: vec![],
        blocks: vec![
            // settlement note, buy side (incl. savings-plan executions)
            BlockTemplate::new(
                BlockShape::Trade {
                    side: TradeSide::Buy,
                },
                r"^WERTPAPIERABRECHNUNG(?: SPARPLAN)?$",
                vec![
                    FieldPattern::required("isin", POSITION_LINE),
                    FieldPattern::required("date", r"^DATUM (?P<date>\d{2}\.\d{2}\.\d{4})$"),
                    FieldPattern::repeated("fee", r"^Fremdkostenzuschlag -(?P<fee>[\d.,]+) EUR$"),
                    FieldPattern::repeated("tax", r"^Kapitalertragsteuer -(?P<tax>[\d.,]+) EUR$"),
                    FieldPattern::optional("amount", r"^GESAMT -(?P<amount>[\d.,]+) EUR$"),
                ],
            ),
            BlockTemplate::new(
                BlockShape::Trade {
                    side: TradeSide::Sell,
                },
                r"^WERTPAPIERABRECHNUNG VERKAUF$",
                vec![
                    FieldPattern::required("isin", POSITION_LINE),
                    FieldPattern::required("date", r"^DATUM (?P<date>\d{2}\.\d{2}\.\d{4})$"),
                    FieldPattern::repeated("fee", r"^Fremdkostenzuschlag -(?P<fee>[\d.,]+) EUR$"),
                    FieldPattern::repeated("tax", r"^Kapitalertragsteuer -(?P<tax>[\d.,]+) EUR$"),
                    FieldPattern::optional("amount", r"^GESAMT (?P<amount>[\d.,]+) EUR$"),
                ],
            ),
            BlockTemplate::new(
                BlockShape::Dividend,
                r"^DIVIDENDE$",
                vec![
                    FieldPattern::required(
                        "isin",
                        r"^(?P<name>.+) ISIN: (?P<isin>[A-Z]{2}[A-Z0-9]{10}) (?P<shares>[\d.,]+) Stk\.$",
                    ),
                    // foreign gross, e.g. "Bruttoertrag 68,00 USD"
                    FieldPattern::optional(
                        "forex_gross",
                        r"^Bruttoertrag (?P<forex_gross>[\d.,]+) (?P<forex_currency>[A-Z]{3})$",
                    ),
                    FieldPattern::optional(
                        "exchange_rate",
                        r"^Umrechnungskurs [A-Z]{3}/[A-Z]{3} (?P<exchange_rate>[\d.,]+)$",
                    ),
                    // settled gross; plain EUR dividends state it directly
                    FieldPattern::required(
                        "gross",
                        r"^Bruttoertrag(?: in EUR)? (?P<gross>[\d.,]+) EUR$",
                    ),
                    FieldPattern::repeated(
                        "tax",
                        r"^(?:Kapitalertragsteuer|Quellensteuer|Solidaritätszuschlag) -(?P<tax>[\d.,]+) EUR$",
                    ),
                    FieldPattern::required("date", r"^ZAHLTAG (?P<date>\d{2}\.\d{2}\.\d{4})$"),
                    FieldPattern::optional("amount", r"^GESAMT (?P<amount>[\d.,]+) EUR$"),
                ],
            ),
            BlockTemplate::new(
                BlockShape::Payment {
                    txn_type: TransactionType::Interest,
                },
                r"^ZINSEN$",
                vec![
                    FieldPattern::required("date", r"^ZAHLTAG (?P<date>\d{2}\.\d{2}\.\d{4})$"),
                    FieldPattern::required("amount", r"^GESAMT (?P<amount>[\d.,]+) EUR$"),
                ],
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::matcher::match_blocks;

    const BUY: &str = "\
TRADE REPUBLIC BANK GMBH
WERTPAPIERABRECHNUNG
POSITION ANZAHL KURS BETRAG
iShares Core MSCI World ISIN: IE00B4L5Y983 2 Stk. 53,47 EUR 106,94 EUR
Fremdkostenzuschlag -0,32 EUR
DATUM 15.03.2024
GESAMT -107,26 EUR
";

    const DIVIDEND_USD: &str = "\
TRADE REPUBLIC BANK GMBH
DIVIDENDE
Apple Inc. ISIN: US0378331005 12 Stk.
Bruttoertrag 68,00 USD
Umrechnungskurs USD/EUR 1,1361
Bruttoertrag in EUR 59,86 EUR
Kapitalertragsteuer -8,98 EUR
ZAHLTAG 16.05.2024
GESAMT 50,88 EUR
";

    #[test]
    fn detects_trade_republic_documents() {
        let profile = profile();
        assert!(profile.matches(BUY));
        assert!(!profile.matches("Deutsche Kreditbank AG"));
    }

    #[test]
    fn buy_block_captures_position_fields() {
        let profile = profile();
        let mut errors: Vec<ExtractError> = Vec::new();
        let blocks = match_blocks(&profile, BUY, "kauf.txt", &mut errors);

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.first("name"), Some("iShares Core MSCI World"));
        assert_eq!(block.first("isin"), Some("IE00B4L5Y983"));
        assert_eq!(block.first("shares"), Some("2"));
        assert_eq!(block.first("gross"), Some("106,94"));
        assert_eq!(block.all("fee"), ["0,32"]);
        assert_eq!(block.first("amount"), Some("107,26"));
    }

    #[test]
    fn usd_dividend_block_captures_forex_fields() {
        let profile = profile();
        let mut errors: Vec<ExtractError> = Vec::new();
        let blocks = match_blocks(&profile, DIVIDEND_USD, "dividende.txt", &mut errors);

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.first("forex_gross"), Some("68,00"));
        assert_eq!(block.first("forex_currency"), Some("USD"));
        assert_eq!(block.first("exchange_rate"), Some("1,1361"));
        assert_eq!(block.first("gross"), Some("59,86"));
        assert_eq!(block.all("tax"), ["8,98"]);
    }

    #[test]
    fn plain_eur_dividend_needs_no_forex_lines() {
        let text = "\
TRADE REPUBLIC BANK GMBH
DIVIDENDE
Siemens AG ISIN: DE0007236101 10 Stk.
Bruttoertrag 47,00 EUR
Kapitalertragsteuer -11,75 EUR
ZAHLTAG 08.02.2024
GESAMT 35,25 EUR
";
        let profile = profile();
        let mut errors: Vec<ExtractError> = Vec::new();
        let blocks = match_blocks(&profile, text, "dividende.txt", &mut errors);

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(blocks[0].first("gross"), Some("47,00"));
        assert_eq!(blocks[0].first("exchange_rate"), None);
    }
}
