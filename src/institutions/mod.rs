//! Per-institution document profiles.
//!
//! Each institution format is one declarative [`DocumentProfile`] table:
//! anchor patterns, named field patterns, locale settings, and (for account
//! statements) a posting keyword table. Adding a bank means adding data, not
//! code.

pub mod comdirect;
pub mod dkb;
pub mod trade_republic;

use crate::matcher::DocumentProfile;

/// All built-in institution profiles, in detection order.
pub fn all_profiles() -> Vec<DocumentProfile> {
    vec![
        trade_republic::profile(),
        dkb::profile(),
        comdirect::profile(),
    ]
}
