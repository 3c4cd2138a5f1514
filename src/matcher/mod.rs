//! Declarative document pattern matcher.
//!
//! Each institution format is data: a list of block templates, where a block
//! template is an anchor pattern locating the start of a repeatable section
//! plus named field patterns scoped to the text between that anchor and the
//! next anchor of *any* template in the profile (or the document end), so
//! adjacent sections of different kinds never leak fields into each other.
//! One template may match zero, one, or many times; an account-statement
//! template typically matches once per posting line.
//!
//! Matching is deterministic and single-pass per template. Field values stay
//! raw strings here; the builder parses them through the profile's
//! locale-aware sub-parsers.

use std::collections::HashMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ExtractError;
use crate::models::{FailureKind, TransactionType};
use crate::money::DecimalFormat;

/// Date notation used by an institution's documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    /// `15.03.2024`
    DayFirst,
    /// `2024-03-15`
    Iso,
}

/// Locale configuration selected per institution, never inferred per-field.
#[derive(Debug, Clone, Copy)]
pub struct LocaleSettings {
    pub decimal: DecimalFormat,
    pub dates: DateOrder,
}

/// Trade direction of a confirmation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// What the builder should make of a matched block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockShape {
    /// A trade confirmation: produces a paired BuySellEntry.
    Trade { side: TradeSide },
    /// A dividend or distribution notice.
    Dividend,
    /// A cash movement of a fixed type (interest credit, plan fee, ...).
    Payment { txn_type: TransactionType },
    /// One account-statement posting line; the transaction type is looked up
    /// in the profile's posting keyword table.
    AccountStatement,
    /// A recognized but unimportable variant (cancellations, corporate
    /// actions). Still built best-effort and emitted as a failed Item.
    Unsupported {
        kind: FailureKind,
        txn_type: TransactionType,
    },
}

/// A named field extractor scoped to one block span.
///
/// The regex uses named capture groups; every named group that matches is
/// recorded, so one pattern may fill several fields (name + ISIN + shares on
/// a single line). `name` identifies the field whose presence satisfies the
/// `required` flag.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    pub name: &'static str,
    pub pattern: Regex,
    pub required: bool,
    /// Keep scanning after the first hit and accumulate every match
    /// (multiple tax or fee lines inside one block).
    pub repeated: bool,
}

impl FieldPattern {
    pub fn required(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: compile(pattern),
            required: true,
            repeated: false,
        }
    }

    pub fn optional(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: compile(pattern),
            required: false,
            repeated: false,
        }
    }

    pub fn repeated(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: compile(pattern),
            required: false,
            repeated: true,
        }
    }
}

/// Compile a profile pattern. Profiles are compiled-in data; a bad pattern
/// is a defect in the profile table itself.
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid profile pattern {pattern:?}: {e}"))
}

/// One repeatable section of an institution's document layout.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub shape: BlockShape,
    /// Locates the first line of each block instance.
    pub anchor: Regex,
    /// Optional early terminator; a block instance without it is skipped.
    pub ends_with: Option<Regex>,
    /// Upper bound on the number of lines per block instance.
    pub max_lines: Option<usize>,
    pub fields: Vec<FieldPattern>,
}

impl BlockTemplate {
    pub fn new(shape: BlockShape, anchor: &str, fields: Vec<FieldPattern>) -> Self {
        Self {
            shape,
            anchor: compile(anchor),
            ends_with: None,
            max_lines: None,
            fields,
        }
    }

    pub fn ends_with(mut self, pattern: &str) -> Self {
        self.ends_with = Some(compile(pattern));
        self
    }

    pub fn max_lines(mut self, max: usize) -> Self {
        self.max_lines = Some(max);
        self
    }
}

/// Declarative description of one institution's document format.
#[derive(Debug, Clone)]
pub struct DocumentProfile {
    pub institution: String,
    pub must_include: Vec<Regex>,
    pub must_not_include: Vec<Regex>,
    pub locale: LocaleSettings,
    /// Settlement currency assumed when a block does not state one.
    pub fallback_currency: String,
    /// Document-level fields parsed once over the whole text and mixed into
    /// every block's values (statement year, statement-wide base currency).
    pub context_fields: Vec<FieldPattern>,
    /// Posting keyword table for account-statement blocks.
    pub posting_types: Vec<(&'static str, TransactionType)>,
    pub blocks: Vec<BlockTemplate>,
}

impl DocumentProfile {
    /// Whether this profile recognizes the document text.
    pub fn matches(&self, text: &str) -> bool {
        self.must_include.iter().all(|p| p.is_match(text))
            && !self.must_not_include.iter().any(|p| p.is_match(text))
    }

    /// Map an account-statement posting keyword to a transaction type.
    pub fn posting_type(&self, posting: &str) -> Option<TransactionType> {
        self.posting_types
            .iter()
            .find(|(keyword, _)| posting.contains(keyword))
            .map(|(_, t)| *t)
    }
}

/// Raw field values extracted from one block instance.
#[derive(Debug, Clone)]
pub struct MatchedBlock {
    pub shape: BlockShape,
    pub values: HashMap<String, Vec<String>>,
    pub start_line: usize,
    pub end_line: usize,
}

impl MatchedBlock {
    /// First value captured for a field.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values captured for a repeated field.
    pub fn all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Run every block template of the profile across the document text.
///
/// Blocks are returned in document order regardless of which template
/// produced them. A block instance missing a required field is dropped and
/// recorded in `errors`; matching continues with the rest of the document.
pub fn match_blocks(
    profile: &DocumentProfile,
    text: &str,
    source_name: &str,
    errors: &mut Vec<ExtractError>,
) -> Vec<MatchedBlock> {
    let lines: Vec<&str> = text.lines().collect();

    let context = extract_context(profile, &lines);

    // spans end where the next block of *any* template begins, so a trade
    // confirmation followed by a dividend notice never absorbs its tax lines
    let mut boundaries: Vec<usize> = profile
        .blocks
        .iter()
        .flat_map(|t| anchor_lines(&t.anchor, &lines))
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut matched = Vec::new();
    for template in &profile.blocks {
        match_template(
            template,
            &lines,
            &boundaries,
            &context,
            source_name,
            &mut matched,
            errors,
        );
    }

    matched.sort_by_key(|b| b.start_line);
    matched
}

fn anchor_lines(anchor: &Regex, lines: &[&str]) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| anchor.is_match(line))
        .map(|(i, _)| i)
        .collect()
}

fn extract_context(profile: &DocumentProfile, lines: &[&str]) -> HashMap<String, Vec<String>> {
    let mut context = HashMap::new();
    for field in &profile.context_fields {
        scan_field(field, lines, 0, lines.len().saturating_sub(1), &mut context);
    }
    context
}

fn match_template(
    template: &BlockTemplate,
    lines: &[&str],
    boundaries: &[usize],
    context: &HashMap<String, Vec<String>>,
    source_name: &str,
    matched: &mut Vec<MatchedBlock>,
    errors: &mut Vec<ExtractError>,
) {
    let anchors = anchor_lines(&template.anchor, lines);

    for &start in &anchors {
        let mut end = boundaries
            .iter()
            .copied()
            .find(|&next| next > start)
            .map(|next| next - 1)
            .unwrap_or(lines.len() - 1);

        if let Some(ends_with) = &template.ends_with {
            match (start..=end).find(|&n| ends_with.is_match(lines[n])) {
                Some(n) => end = n,
                None => continue,
            }
        }

        if let Some(max) = template.max_lines {
            end = end.min(start + max - 1);
        }

        let mut values = context.clone();
        let mut missing = None;
        for field in &template.fields {
            let found = scan_field(field, lines, start, end, &mut values);
            if !found && field.required {
                missing = Some(field.name);
                break;
            }
        }

        if let Some(field) = missing {
            log::debug!(
                "{}: skipping block at lines {}-{}, required field {} not found",
                source_name,
                start + 1,
                end + 1,
                field
            );
            errors.push(ExtractError::UnresolvedRequiredField {
                source_name: source_name.to_string(),
                field: field.to_string(),
                start_line: start + 1,
                end_line: end + 1,
            });
            continue;
        }

        matched.push(MatchedBlock {
            shape: template.shape,
            values,
            start_line: start,
            end_line: end,
        });
    }
}

/// Scan the span for a field pattern, recording every named capture group of
/// each hit. One pattern may fill several fields at once (name + ISIN +
/// shares on a single line). Returns whether the field's own group was
/// captured at least once.
fn scan_field(
    field: &FieldPattern,
    lines: &[&str],
    start: usize,
    end: usize,
    values: &mut HashMap<String, Vec<String>>,
) -> bool {
    let group_names: Vec<&str> = field.pattern.capture_names().flatten().collect();

    let mut found = false;
    for line in lines.iter().take(end + 1).skip(start) {
        if let Some(caps) = field.pattern.captures(line) {
            for &group in &group_names {
                if let Some(m) = caps.name(group) {
                    values
                        .entry(group.to_string())
                        .or_default()
                        .push(m.as_str().to_string());
                    if group == field.name {
                        found = true;
                    }
                }
            }
            if !field.repeated && found {
                break;
            }
        }
    }
    found
}

/// ISIN shape: two letters followed by ten alphanumerics.
pub static ISIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z]{2}[A-Z0-9]{9}[0-9])\b").expect("static pattern"));

/// Extract the first ISIN-shaped token from free text.
pub fn extract_isin(text: &str) -> Option<String> {
    ISIN_RE.captures(text).map(|c| c[1].to_string())
}

/// Parse a date under the institution's date order.
pub fn parse_date(text: &str, order: DateOrder) -> Option<NaiveDate> {
    let trimmed = text.trim();
    match order {
        DateOrder::DayFirst => {
            let mut parts = trimmed.splitn(3, '.');
            let day: u32 = parts.next()?.parse().ok()?;
            let month: u32 = parts.next()?.parse().ok()?;
            let year: i32 = parts.next()?.trim().parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
        DateOrder::Iso => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok(),
    }
}

/// Parse a day-and-month fragment (`15.03.`) against a statement-wide year.
pub fn parse_day_month(text: &str, year: i32) -> Option<NaiveDate> {
    let mut parts = text.trim().trim_end_matches('.').splitn(2, '.');
    let day: u32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
