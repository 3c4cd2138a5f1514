//! Transaction builder: turns matched blocks into canonical transactions.
//!
//! The builder reconciles monetary units at construction time. Violations of
//! the unit-sum or forex invariants are hard errors (they indicate a
//! defective field mapping, not an expected document condition), while
//! unsupported transaction variants and cancellations come back as *failed*
//! payloads that the orchestrator still emits as Items.

use chrono::NaiveDate;

use crate::error::ExtractError;
use crate::matcher::{self, BlockShape, DocumentProfile, MatchedBlock, TradeSide};
use crate::models::{
    BuySellEntry, FailureKind, ItemFailure, SecurityCandidate, Transaction, TransactionType,
};
use crate::money::{DecimalFormat, Money, Unit, UnitKind, SHARES_SCALE};

/// What one block turned into, before security resolution.
#[derive(Debug, Clone)]
pub enum Payload {
    Trade(BuySellEntry),
    Single(Transaction),
    Failed {
        transaction: Transaction,
        failure: ItemFailure,
    },
}

/// Builder output for one block: the payload plus the security description
/// the orchestrator must resolve against the registry.
#[derive(Debug, Clone)]
pub struct BuiltBlock {
    pub candidate: Option<SecurityCandidate>,
    pub payload: Payload,
}

/// Build the canonical transaction(s) for a matched block.
pub fn build_block(
    block: &MatchedBlock,
    profile: &DocumentProfile,
    source_name: &str,
) -> Result<BuiltBlock, ExtractError> {
    match block.shape {
        BlockShape::Trade { side } => build_trade(block, profile, source_name, side),
        BlockShape::Dividend => build_dividend(block, profile, source_name),
        BlockShape::Payment { txn_type } => build_payment(block, profile, source_name, txn_type),
        BlockShape::AccountStatement => build_statement_line(block, profile, source_name),
        BlockShape::Unsupported { kind, txn_type } => {
            build_unsupported(block, profile, source_name, kind, txn_type)
        }
    }
}

fn build_trade(
    block: &MatchedBlock,
    profile: &DocumentProfile,
    source_name: &str,
    side: TradeSide,
) -> Result<BuiltBlock, ExtractError> {
    let ctx = Ctx::new(block, profile, source_name);

    let date = ctx.date()?;
    let shares = ctx.shares_required()?;
    let currency = ctx.settlement_currency();
    let gross = ctx.money_required("gross", &currency)?;
    let taxes = ctx.money_all("tax", &currency)?;
    let fees = ctx.money_all("fee", &currency)?;

    let txn_type = match side {
        TradeSide::Buy => TransactionType::Buy,
        TradeSide::Sell => TransactionType::Sell,
    };

    let units = ctx.units_with_forex(gross.clone(), &taxes, &fees)?;
    let amount = ctx.settled_amount(txn_type, &gross, &taxes, &fees)?;

    let candidate = ctx.security_candidate()?;

    let portfolio = Transaction {
        txn_type,
        date,
        shares: Some(shares),
        amount,
        units,
        note: ctx.note(),
        source: source_name.to_string(),
        security_id: None,
    };
    let account = Transaction {
        security_id: None,
        ..portfolio.clone()
    };

    Ok(BuiltBlock {
        candidate: Some(candidate),
        payload: Payload::Trade(BuySellEntry { portfolio, account }),
    })
}

fn build_dividend(
    block: &MatchedBlock,
    profile: &DocumentProfile,
    source_name: &str,
) -> Result<BuiltBlock, ExtractError> {
    let ctx = Ctx::new(block, profile, source_name);

    let date = ctx.date()?;
    let currency = ctx.settlement_currency();
    let gross = ctx.money_required("gross", &currency)?;
    let taxes = ctx.money_all("tax", &currency)?;
    let fees = ctx.money_all("fee", &currency)?;

    let units = ctx.units_with_forex(gross.clone(), &taxes, &fees)?;
    let amount = ctx.settled_amount(TransactionType::Dividends, &gross, &taxes, &fees)?;

    let candidate = ctx.security_candidate()?;

    let transaction = Transaction {
        txn_type: TransactionType::Dividends,
        date,
        shares: ctx.shares_optional()?,
        amount,
        units,
        note: ctx.note(),
        source: source_name.to_string(),
        security_id: None,
    };

    Ok(BuiltBlock {
        candidate: Some(candidate),
        payload: Payload::Single(transaction),
    })
}

fn build_payment(
    block: &MatchedBlock,
    profile: &DocumentProfile,
    source_name: &str,
    txn_type: TransactionType,
) -> Result<BuiltBlock, ExtractError> {
    let ctx = Ctx::new(block, profile, source_name);

    let date = ctx.date()?;
    let currency = ctx.settlement_currency();
    let amount = ctx.money_required("amount", &currency)?;

    let transaction = Transaction {
        txn_type,
        date,
        shares: None,
        amount,
        units: Vec::new(),
        note: ctx.note(),
        source: source_name.to_string(),
        security_id: None,
    };

    Ok(BuiltBlock {
        candidate: None,
        payload: Payload::Single(transaction),
    })
}

fn build_statement_line(
    block: &MatchedBlock,
    profile: &DocumentProfile,
    source_name: &str,
) -> Result<BuiltBlock, ExtractError> {
    let ctx = Ctx::new(block, profile, source_name);

    let posting = ctx.required_raw("posting")?.trim().to_string();
    let date = ctx.statement_date()?;
    let currency = ctx.settlement_currency();
    let amount = ctx.signed_amount(&currency)?;

    let transaction_for = |txn_type| Transaction {
        txn_type,
        date,
        shares: None,
        amount: Money::from_minor(&currency, amount.amount.abs()),
        units: Vec::new(),
        note: Some(posting.clone()),
        source: source_name.to_string(),
        security_id: None,
    };

    match profile.posting_type(&posting) {
        Some(txn_type) => Ok(BuiltBlock {
            candidate: None,
            payload: Payload::Single(transaction_for(txn_type)),
        }),
        None => {
            // best effort: keep the cash direction the statement shows
            let fallback = if amount.amount < 0 {
                TransactionType::Removal
            } else {
                TransactionType::Deposit
            };
            log::debug!("{}: unsupported posting type {:?}", source_name, posting);
            Ok(BuiltBlock {
                candidate: None,
                payload: Payload::Failed {
                    transaction: transaction_for(fallback),
                    failure: ItemFailure {
                        kind: FailureKind::TransactionTypeNotSupported,
                        message: format!("transaction type not supported: {posting}"),
                    },
                },
            })
        }
    }
}

fn build_unsupported(
    block: &MatchedBlock,
    profile: &DocumentProfile,
    source_name: &str,
    kind: FailureKind,
    txn_type: TransactionType,
) -> Result<BuiltBlock, ExtractError> {
    let ctx = Ctx::new(block, profile, source_name);

    let date = ctx.date()?;
    let currency = ctx.settlement_currency();
    let amount = ctx
        .money_optional("amount", &currency)?
        .unwrap_or_else(|| Money::from_minor(&currency, 0));

    let candidate = if ctx.has_security_fields() {
        Some(ctx.security_candidate()?)
    } else {
        None
    };

    let transaction = Transaction {
        txn_type,
        date,
        shares: ctx.shares_optional()?,
        amount,
        units: Vec::new(),
        note: ctx.note(),
        source: source_name.to_string(),
        security_id: None,
    };

    let message = match kind {
        FailureKind::OrderCancellationUnsupported => {
            "order cancellations are not imported automatically".to_string()
        }
        FailureKind::TransactionTypeNotSupported => {
            "transaction type not supported".to_string()
        }
    };

    Ok(BuiltBlock {
        candidate,
        payload: Payload::Failed {
            transaction,
            failure: ItemFailure { kind, message },
        },
    })
}

/// Field-parsing context for one block; wraps the raw values with the
/// profile's locale sub-parsers and the error taxonomy.
struct Ctx<'a> {
    block: &'a MatchedBlock,
    profile: &'a DocumentProfile,
    source_name: &'a str,
}

impl<'a> Ctx<'a> {
    fn new(block: &'a MatchedBlock, profile: &'a DocumentProfile, source_name: &'a str) -> Self {
        Self {
            block,
            profile,
            source_name,
        }
    }

    fn decimal(&self) -> DecimalFormat {
        self.profile.locale.decimal
    }

    fn malformed(&self, field: &str, value: &str) -> ExtractError {
        ExtractError::MalformedInput {
            source_name: self.source_name.to_string(),
            field: field.to_string(),
            value: value.to_string(),
            start_line: self.block.start_line + 1,
            end_line: self.block.end_line + 1,
        }
    }

    fn missing(&self, field: &str) -> ExtractError {
        ExtractError::UnresolvedRequiredField {
            source_name: self.source_name.to_string(),
            field: field.to_string(),
            start_line: self.block.start_line + 1,
            end_line: self.block.end_line + 1,
        }
    }

    fn required_raw(&self, field: &str) -> Result<&str, ExtractError> {
        self.block.first(field).ok_or_else(|| self.missing(field))
    }

    fn settlement_currency(&self) -> String {
        self.block
            .first("currency")
            .map(str::to_string)
            .unwrap_or_else(|| self.profile.fallback_currency.clone())
    }

    fn date(&self) -> Result<NaiveDate, ExtractError> {
        let raw = self.required_raw("date")?;
        matcher::parse_date(raw, self.profile.locale.dates)
            .ok_or_else(|| self.malformed("date", raw))
    }

    /// Statement postings state only day and month; the year comes from the
    /// document context.
    fn statement_date(&self) -> Result<NaiveDate, ExtractError> {
        if let Some(raw) = self.block.first("date") {
            return matcher::parse_date(raw, self.profile.locale.dates)
                .ok_or_else(|| self.malformed("date", raw));
        }
        let day_month = self.required_raw("day_month")?;
        let year_raw = self.required_raw("year")?;
        let year: i32 = year_raw
            .parse()
            .map_err(|_| self.malformed("year", year_raw))?;
        matcher::parse_day_month(day_month, year)
            .ok_or_else(|| self.malformed("day_month", day_month))
    }

    fn shares_required(&self) -> Result<i64, ExtractError> {
        let raw = self.required_raw("shares")?;
        self.decimal()
            .parse_fixed(raw, SHARES_SCALE.ilog10())
            .ok_or_else(|| self.malformed("shares", raw))
    }

    fn shares_optional(&self) -> Result<Option<i64>, ExtractError> {
        match self.block.first("shares") {
            Some(raw) => self
                .decimal()
                .parse_fixed(raw, SHARES_SCALE.ilog10())
                .map(Some)
                .ok_or_else(|| self.malformed("shares", raw)),
            None => Ok(None),
        }
    }

    fn money_required(&self, field: &str, currency: &str) -> Result<Money, ExtractError> {
        let raw = self.required_raw(field)?;
        Money::of(currency, raw, self.decimal()).map_err(|_| self.malformed(field, raw))
    }

    fn money_optional(&self, field: &str, currency: &str) -> Result<Option<Money>, ExtractError> {
        match self.block.first(field) {
            Some(raw) => Money::of(currency, raw, self.decimal())
                .map(Some)
                .map_err(|_| self.malformed(field, raw)),
            None => Ok(None),
        }
    }

    /// Parse every occurrence of a repeated field (multiple tax or fee
    /// lines) into individual amounts.
    fn money_all(&self, field: &str, currency: &str) -> Result<Vec<Money>, ExtractError> {
        self.block
            .all(field)
            .iter()
            .map(|raw| {
                Money::of(currency, raw, self.decimal()).map_err(|_| self.malformed(field, raw))
            })
            .collect()
    }

    /// Amount carrying its own sign, either leading (`-123,45`) or trailing
    /// (`123,45-`), as account statements print it.
    fn signed_amount(&self, currency: &str) -> Result<Money, ExtractError> {
        let raw = self.required_raw("signed_amount")?;
        let trimmed = raw.trim().trim_start_matches('+');
        let (text, negate) = match trimmed.strip_suffix('-') {
            Some(rest) => (rest, true),
            None => (trimmed, false),
        };
        let mut money =
            Money::of(currency, text, self.decimal()).map_err(|_| self.malformed("amount", raw))?;
        if negate {
            money.amount = -money.amount;
        }
        Ok(money)
    }

    /// Assemble the unit list: the gross unit (forex-backed when the block
    /// states a foreign amount in another currency) plus tax and fee units.
    fn units_with_forex(
        &self,
        gross: Money,
        taxes: &[Money],
        fees: &[Money],
    ) -> Result<Vec<Unit>, ExtractError> {
        let forex_currency = self.block.first("forex_currency");
        let forex_raw = self.block.first("forex_gross");
        let rate_raw = self.block.first("exchange_rate");

        let gross_unit = match (forex_currency, forex_raw, rate_raw) {
            (Some(fx_currency), Some(fx_raw), Some(rate_raw))
                if fx_currency != gross.currency =>
            {
                let forex = Money::of(fx_currency, fx_raw, self.decimal())
                    .map_err(|_| self.malformed("forex_gross", fx_raw))?;
                let rate = self
                    .decimal()
                    .parse_rate(rate_raw)
                    .ok_or_else(|| self.malformed("exchange_rate", rate_raw))?;
                Unit::gross_value_with_forex(gross, forex, rate).map_err(|error| {
                    ExtractError::Money {
                        source_name: self.source_name.to_string(),
                        error,
                    }
                })?
            }
            _ => Unit::new(UnitKind::GrossValue, gross),
        };

        let mut units = vec![gross_unit];
        units.extend(taxes.iter().cloned().map(|m| Unit::new(UnitKind::Tax, m)));
        units.extend(fees.iter().cloned().map(|m| Unit::new(UnitKind::Fee, m)));
        Ok(units)
    }

    /// Settlement amount implied by gross, taxes and fees; cross-checked
    /// against the block's own total when it states one.
    fn settled_amount(
        &self,
        txn_type: TransactionType,
        gross: &Money,
        taxes: &[Money],
        fees: &[Money],
    ) -> Result<Money, ExtractError> {
        let tax_sum: i64 = taxes.iter().map(|m| m.amount).sum();
        let fee_sum: i64 = fees.iter().map(|m| m.amount).sum();
        let computed = match txn_type.direction() {
            crate::models::Direction::Inflow => gross.amount - tax_sum - fee_sum,
            crate::models::Direction::Outflow => gross.amount + tax_sum + fee_sum,
        };

        if let Some(stated) = self.money_optional("amount", &gross.currency)? {
            if stated.amount != computed {
                return Err(ExtractError::InconsistentUnitSum {
                    source_name: self.source_name.to_string(),
                    amount: stated.amount,
                    computed,
                });
            }
        }

        Ok(Money::from_minor(&gross.currency, computed))
    }

    fn has_security_fields(&self) -> bool {
        self.block.first("isin").is_some()
            || self.block.first("wkn").is_some()
            || self.block.first("name").is_some()
    }

    /// The security description as the document states it. The candidate's
    /// currency is the instrument's trading currency: the forex currency
    /// when the block carries one, the settlement currency otherwise.
    fn security_candidate(&self) -> Result<SecurityCandidate, ExtractError> {
        if !self.has_security_fields() {
            return Err(self.missing("isin"));
        }

        let currency = self
            .block
            .first("forex_currency")
            .filter(|c| self.block.first("exchange_rate").is_some())
            .map(str::to_string)
            .unwrap_or_else(|| self.settlement_currency());

        Ok(SecurityCandidate {
            name: self.block.first("name").map(|n| n.trim().to_string()),
            isin: self.block.first("isin").map(str::to_string),
            wkn: self.block.first("wkn").map(str::to_string),
            ticker: self.block.first("ticker").map(str::to_string),
            currency,
        })
    }

    fn note(&self) -> Option<String> {
        self.block.first("note").map(|n| n.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{DateOrder, LocaleSettings};
    use std::collections::HashMap;

    fn profile() -> DocumentProfile {
        DocumentProfile {
            institution: "Testbank".into(),
            must_include: vec![],
            must_not_include: vec![],
            locale: LocaleSettings {
                decimal: DecimalFormat::German,
                dates: DateOrder::DayFirst,
            },
            fallback_currency: "EUR".into(),
            context_fields: vec![],
            posting_types: vec![
                ("Lastschrift", TransactionType::Removal),
                ("Gutschrift", TransactionType::Deposit),
            ],
            blocks: vec![],
        }
    }

    fn block(shape: BlockShape, fields: &[(&str, &[&str])]) -> MatchedBlock {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for (name, vals) in fields {
            values.insert(
                name.to_string(),
                vals.iter().map(|v| v.to_string()).collect(),
            );
        }
        MatchedBlock {
            shape,
            values,
            start_line: 0,
            end_line: 5,
        }
    }

    #[test]
    fn buy_amount_is_gross_plus_fees_and_taxes() {
        let block = block(
            BlockShape::Trade {
                side: TradeSide::Buy,
            },
            &[
                ("date", &["15.03.2024"]),
                ("shares", &["2"]),
                ("isin", &["IE00B4L5Y983"]),
                ("name", &["iShares Core MSCI World"]),
                ("gross", &["106,94"]),
                ("fee", &["0,32"]),
                ("amount", &["107,26"]),
            ],
        );

        let built = build_block(&block, &profile(), "kauf.txt").unwrap();
        let entry = match built.payload {
            Payload::Trade(entry) => entry,
            other => panic!("expected trade, got {other:?}"),
        };

        assert_eq!(entry.account.amount, Money::from_minor("EUR", 10_726));
        assert_eq!(entry.portfolio.shares, Some(2 * SHARES_SCALE));
        assert_eq!(entry.portfolio.gross_value(), 10_694);
        assert_eq!(entry.portfolio.fee_sum(), 32);
        assert_eq!(entry.portfolio.date, entry.account.date);
        assert_eq!(
            entry.portfolio.computed_amount(),
            Some(entry.portfolio.amount.amount)
        );
    }

    #[test]
    fn stated_total_disagreeing_with_units_is_a_hard_error() {
        let block = block(
            BlockShape::Trade {
                side: TradeSide::Buy,
            },
            &[
                ("date", &["15.03.2024"]),
                ("shares", &["2"]),
                ("isin", &["IE00B4L5Y983"]),
                ("gross", &["106,94"]),
                ("fee", &["0,32"]),
                ("amount", &["108,00"]),
            ],
        );

        let result = build_block(&block, &profile(), "kauf.txt");
        assert!(matches!(
            result,
            Err(ExtractError::InconsistentUnitSum { amount: 10_800, computed: 10_726, .. })
        ));
    }

    #[test]
    fn dividend_with_forex_attaches_the_foreign_gross() {
        let block = block(
            BlockShape::Dividend,
            &[
                ("date", &["16.05.2024"]),
                ("shares", &["12"]),
                ("isin", &["US0378331005"]),
                ("name", &["Apple Inc."]),
                ("gross", &["59,86"]),
                ("forex_gross", &["68,00"]),
                ("forex_currency", &["USD"]),
                ("exchange_rate", &["1,1361"]),
                ("tax", &["8,98"]),
                ("amount", &["50,88"]),
            ],
        );

        let built = build_block(&block, &profile(), "dividende.txt").unwrap();
        assert_eq!(built.candidate.as_ref().unwrap().currency, "USD");

        let tx = match built.payload {
            Payload::Single(tx) => tx,
            other => panic!("expected single transaction, got {other:?}"),
        };
        assert_eq!(tx.amount, Money::from_minor("EUR", 5_088));
        let forex_unit = tx.forex_gross_unit().expect("gross unit carries forex");
        assert_eq!(
            forex_unit.forex.as_ref().unwrap(),
            &Money::from_minor("USD", 6_800)
        );
        assert_eq!(forex_unit.exchange_rate, Some(1.1361));
    }

    #[test]
    fn multiple_tax_lines_are_summed() {
        let block = block(
            BlockShape::Dividend,
            &[
                ("date", &["16.05.2024"]),
                ("isin", &["DE0007236101"]),
                ("gross", &["100,00"]),
                ("tax", &["10,00", "5,00"]),
            ],
        );

        let built = build_block(&block, &profile(), "dividende.txt").unwrap();
        let tx = match built.payload {
            Payload::Single(tx) => tx,
            other => panic!("expected single transaction, got {other:?}"),
        };
        assert_eq!(tx.tax_sum(), 1_500);
        assert_eq!(tx.amount.amount, 8_500);
    }

    #[test]
    fn malformed_share_count_is_a_parse_error() {
        let block = block(
            BlockShape::Trade {
                side: TradeSide::Sell,
            },
            &[
                ("date", &["15.03.2024"]),
                ("shares", &["zwei"]),
                ("isin", &["IE00B4L5Y983"]),
                ("gross", &["106,94"]),
            ],
        );

        let result = build_block(&block, &profile(), "verkauf.txt");
        assert!(matches!(
            result,
            Err(ExtractError::MalformedInput { ref field, .. }) if field == "shares"
        ));
    }

    #[test]
    fn statement_line_maps_posting_keyword() {
        let block = block(
            BlockShape::AccountStatement,
            &[
                ("day_month", &["15.03."]),
                ("year", &["2024"]),
                ("posting", &["Lastschrift"]),
                ("signed_amount", &["-123,45"]),
            ],
        );

        let built = build_block(&block, &profile(), "auszug.txt").unwrap();
        let tx = match built.payload {
            Payload::Single(tx) => tx,
            other => panic!("expected single transaction, got {other:?}"),
        };
        assert_eq!(tx.txn_type, TransactionType::Removal);
        assert_eq!(tx.amount, Money::from_minor("EUR", 12_345));
        assert_eq!(
            tx.date,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
    }

    #[test]
    fn unknown_posting_becomes_a_failed_item_not_an_error() {
        let block = block(
            BlockShape::AccountStatement,
            &[
                ("day_month", &["20.03."]),
                ("year", &["2024"]),
                ("posting", &["Scheckeinzug"]),
                ("signed_amount", &["-50,00"]),
            ],
        );

        let built = build_block(&block, &profile(), "auszug.txt").unwrap();
        match built.payload {
            Payload::Failed {
                transaction,
                failure,
            } => {
                assert_eq!(failure.kind, FailureKind::TransactionTypeNotSupported);
                assert!(failure.message.contains("Scheckeinzug"));
                assert_eq!(transaction.txn_type, TransactionType::Removal);
                assert_eq!(transaction.amount.amount, 5_000);
            }
            other => panic!("expected failed payload, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_builds_best_effort_zero_transaction() {
        let block = block(
            BlockShape::Unsupported {
                kind: FailureKind::OrderCancellationUnsupported,
                txn_type: TransactionType::DeliveryInbound,
            },
            &[
                ("date", &["10.04.2024"]),
                ("shares", &["5"]),
                ("isin", &["DE0007236101"]),
            ],
        );

        let built = build_block(&block, &profile(), "storno.txt").unwrap();
        match built.payload {
            Payload::Failed {
                transaction,
                failure,
            } => {
                assert_eq!(failure.kind, FailureKind::OrderCancellationUnsupported);
                assert_eq!(transaction.txn_type, TransactionType::DeliveryInbound);
                assert!(transaction.amount.is_zero());
                assert_eq!(transaction.shares, Some(5 * SHARES_SCALE));
            }
            other => panic!("expected failed payload, got {other:?}"),
        }
    }
}
