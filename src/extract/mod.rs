//! Extraction orchestrator: document text in, Items out.
//!
//! Runs profile detection, the block matcher and the transaction builder
//! over one document, resolves securities against the Client registry and
//! assembles the Item list. Hard errors land in the caller's error sink and
//! never surface as Items; business failures surface as failed Items and
//! never land in the sink. One bad block never suppresses its siblings.

use crate::builder::{build_block, Payload};
use crate::error::ExtractError;
use crate::matcher::{match_blocks, DocumentProfile};
use crate::models::Item;
use crate::registry::{resolve, Client};

/// Upper bound on accepted document size. Bank documents are a few pages of
/// text; anything larger is rejected before matching.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound on accepted line count.
pub const MAX_LINES: usize = 100_000;

/// Find the first profile that recognizes the document text.
pub fn detect_profile<'a>(
    text: &str,
    profiles: &'a [DocumentProfile],
) -> Option<&'a DocumentProfile> {
    profiles.iter().find(|p| p.matches(text))
}

/// Detect the institution and extract; an unrecognized document is recorded
/// as [`ExtractError::UnknownDocumentType`] and yields no Items.
pub fn extract_auto(
    text: &str,
    source_name: &str,
    profiles: &[DocumentProfile],
    client: &mut Client,
    errors: &mut Vec<ExtractError>,
) -> Vec<Item> {
    match detect_profile(text, profiles) {
        Some(profile) => extract(text, source_name, profile, client, errors),
        None => {
            errors.push(ExtractError::UnknownDocumentType {
                source_name: source_name.to_string(),
            });
            Vec::new()
        }
    }
}

/// Extract all Items from one document under a known profile.
///
/// Newly discovered securities are added to the registry and emitted first,
/// in discovery order and deduplicated per document (resolution sees each
/// earlier addition). Transaction items follow in document order.
pub fn extract(
    text: &str,
    source_name: &str,
    profile: &DocumentProfile,
    client: &mut Client,
    errors: &mut Vec<ExtractError>,
) -> Vec<Item> {
    if text.len() > MAX_DOCUMENT_BYTES || text.lines().count() > MAX_LINES {
        errors.push(ExtractError::DocumentTooLarge {
            source_name: source_name.to_string(),
            bytes: text.len(),
            lines: text.lines().count(),
        });
        return Vec::new();
    }

    log::debug!("{}: extracting as {}", source_name, profile.institution);

    let blocks = match_blocks(profile, text, source_name, errors);

    let mut security_items: Vec<Item> = Vec::new();
    let mut transaction_items: Vec<Item> = Vec::new();

    for block in &blocks {
        let built = match build_block(block, profile, source_name) {
            Ok(built) => built,
            Err(error) => {
                errors.push(error);
                continue;
            }
        };

        let security_id = built.candidate.as_ref().map(|candidate| {
            let resolution = resolve(candidate, client);
            if resolution.created {
                client.add_security(resolution.security.clone());
                security_items.push(Item::SecurityItem {
                    security: resolution.security.clone(),
                    failure: None,
                });
            }
            resolution.security.id
        });

        match built.payload {
            Payload::Trade(mut entry) => {
                entry.portfolio.security_id = security_id;
                transaction_items.push(Item::BuySellEntryItem {
                    entry,
                    failure: None,
                });
            }
            Payload::Single(mut transaction) => {
                if transaction.txn_type.is_security_related() {
                    transaction.security_id = security_id;
                }
                transaction_items.push(Item::TransactionItem {
                    transaction,
                    failure: None,
                });
            }
            Payload::Failed {
                mut transaction,
                failure,
            } => {
                if transaction.txn_type.is_security_related() {
                    transaction.security_id = security_id;
                }
                transaction_items.push(Item::TransactionItem {
                    transaction,
                    failure: Some(failure),
                });
            }
        }
    }

    log::info!(
        "{}: {} securities, {} transactions, {} errors",
        source_name,
        security_items.len(),
        transaction_items.len(),
        errors.len()
    );

    let mut items = security_items;
    items.extend(transaction_items);
    items
}
