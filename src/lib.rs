//! Extraction of typed financial transactions from semi-structured bank
//! document text (trade confirmations, dividend notices, account
//! statements).
//!
//! The pipeline is declarative: each institution contributes a
//! [`matcher::DocumentProfile`] data table, the [`matcher`] locates block
//! instances and raw field values, the [`builder`] turns them into canonical
//! transactions with reconciled monetary units, and the [`extract`]
//! orchestrator resolves securities against the caller's [`registry::Client`]
//! and emits [`models::Item`]s. Hard errors accumulate in an error sink so a
//! single defective block never suppresses the rest of a document.

pub mod builder;
pub mod error;
pub mod extract;
pub mod institutions;
pub mod matcher;
pub mod models;
pub mod money;
pub mod registry;
pub mod validation;

pub use error::ExtractError;
pub use extract::{detect_profile, extract, extract_auto};
pub use models::Item;
pub use registry::Client;
