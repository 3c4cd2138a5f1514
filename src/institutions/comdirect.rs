//! comdirect account-statement profile.
//!
//! A statement is one repeatable posting-line block; the posting keyword is
//! looked up in the keyword table to pick the transaction type, and the
//! statement year is document context (posting lines only carry day and
//! month).

use crate::matcher::{
    compile, BlockShape, BlockTemplate, DateOrder, DocumentProfile, FieldPattern, LocaleSettings,
};
use crate::money::DecimalFormat;
use crate::models::TransactionType;

pub fn profile() -> DocumentProfile {
    DocumentProfile {
        institution: "comdirect".into(),
        must_include: vec![compile(r"comdirect"), compile(r"Kontoauszug")],
        must_not_include: vec![],
        locale: LocaleSettings {
            decimal: DecimalFormat::German,
            dates: DateOrder::DayFirst,
        },
        fallback_currency: "EUR".into(),
        context_fields: vec![FieldPattern::optional(
            "year",
            r"^Kontoauszug Nr\. \d+/(?P<year>\d{4})$",
        )],
        // longer keywords first: lookup is a substring match
        posting_types: vec![
            ("Kontoführungsentgelt", TransactionType::Fees),
            ("Sollzinsen", TransactionType::InterestCharge),
            ("Zinsgutschrift", TransactionType::Interest),
            ("Lastschrift", TransactionType::Removal),
            ("Auszahlung", TransactionType::Removal),
            ("Gutschrift", TransactionType::Deposit),
            ("Einzahlung", TransactionType::Deposit),
        ],
        blocks: vec![BlockTemplate::new(
            BlockShape::AccountStatement,
            r"^\d{2}\.\d{2}\. \d{2}\.\d{2}\. .+ [+-][\d.,]+$",
            vec![FieldPattern::required(
                "posting",
                r"^(?P<day_month>\d{2}\.\d{2}\.) \d{2}\.\d{2}\. (?P<posting>.+?) (?P<signed_amount>[+-][\d.,]+)$",
            )],
        )
        .max_lines(1)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::matcher::match_blocks;

    const STATEMENT: &str = "\
comdirect bank AG
Kontoauszug Nr. 03/2024
Buchungstag Valuta Vorgang Umsatz in EUR
15.03. 15.03. Lastschrift -123,45
18.03. 18.03. Gutschrift +1.000,00
20.03. 20.03. Kontoführungsentgelt -4,90
";

    #[test]
    fn one_block_per_posting_line() {
        let profile = profile();
        let mut errors: Vec<ExtractError> = Vec::new();
        let blocks = match_blocks(&profile, STATEMENT, "auszug.txt", &mut errors);

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].first("posting"), Some("Lastschrift"));
        assert_eq!(blocks[0].first("signed_amount"), Some("-123,45"));
        assert_eq!(blocks[1].first("signed_amount"), Some("+1.000,00"));
        // statement year flows in from the document context
        assert_eq!(blocks[2].first("year"), Some("2024"));
    }

    #[test]
    fn posting_keywords_map_to_transaction_types() {
        let profile = profile();
        assert_eq!(
            profile.posting_type("Lastschrift"),
            Some(TransactionType::Removal)
        );
        assert_eq!(
            profile.posting_type("Kontoführungsentgelt"),
            Some(TransactionType::Fees)
        );
        assert_eq!(profile.posting_type("Scheckeinzug"), None);
    }
}
