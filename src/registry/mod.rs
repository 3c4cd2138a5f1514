//! Client security registry and the idempotent security resolver.
//!
//! Resolution is a pure function over a registry snapshot; the caller applies
//! the returned mutation. Concurrent extraction runs may share read access,
//! but new-security writes must be serialized per Client (the orchestrator
//! takes `&mut Client`, making the single-writer rule a borrow-check fact).

use crate::models::{Security, SecurityCandidate};

/// Owning registry of securities, matching the collaborator contract
/// (`findSecurityByIsin/Wkn/Name` plus `addSecurity`).
#[derive(Debug, Clone, Default)]
pub struct Client {
    securities: Vec<Security>,
}

fn norm(s: &str) -> String {
    s.trim().to_uppercase()
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn securities(&self) -> &[Security] {
        &self.securities
    }

    pub fn find_security_by_isin(&self, isin: &str) -> Option<&Security> {
        let wanted = norm(isin);
        self.securities
            .iter()
            .find(|s| s.isin.as_deref().is_some_and(|i| norm(i) == wanted))
    }

    pub fn find_security_by_wkn(&self, wkn: &str) -> Option<&Security> {
        let wanted = norm(wkn);
        self.securities
            .iter()
            .find(|s| s.wkn.as_deref().is_some_and(|w| norm(w) == wanted))
    }

    pub fn find_security_by_name(&self, name: &str, currency: &str) -> Option<&Security> {
        let wanted = norm(name);
        self.securities
            .iter()
            .find(|s| norm(&s.name) == wanted && s.currency == currency)
    }

    pub fn add_security(&mut self, security: Security) {
        self.securities.push(security);
    }
}

/// Outcome of resolving a candidate against a registry snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The security the transaction must reference.
    pub security: Security,
    /// Set only when the registry had no match and a new security was
    /// created; the caller adds it to the registry and emits a SecurityItem.
    pub created: bool,
}

/// Resolve a document's security description against the registry.
///
/// Matching priority, first match wins: exact ISIN, exact WKN, then
/// name + currency. Identifier comparison is trim- and case-insensitive.
/// When nothing matches, a new security is created from the candidate; the
/// existing security is reused otherwise, which is why a pre-populated
/// registry yields one fewer Item for the same document.
pub fn resolve(candidate: &SecurityCandidate, registry: &Client) -> Resolution {
    if let Some(isin) = candidate.isin.as_deref() {
        if let Some(existing) = registry.find_security_by_isin(isin) {
            return Resolution {
                security: existing.clone(),
                created: false,
            };
        }
    }

    if let Some(wkn) = candidate.wkn.as_deref() {
        if let Some(existing) = registry.find_security_by_wkn(wkn) {
            return Resolution {
                security: existing.clone(),
                created: false,
            };
        }
    }

    if let Some(name) = candidate.name.as_deref() {
        if let Some(existing) = registry.find_security_by_name(name, &candidate.currency) {
            return Resolution {
                security: existing.clone(),
                created: false,
            };
        }
    }

    let name = candidate
        .name
        .clone()
        .or_else(|| candidate.isin.clone())
        .or_else(|| candidate.wkn.clone())
        .unwrap_or_else(|| "Unknown security".to_string());

    let security = Security::new(
        name,
        candidate.isin.as_deref().map(norm),
        candidate.wkn.as_deref().map(norm),
        candidate.ticker.clone(),
        candidate.currency.clone(),
    );

    log::debug!(
        "creating security {:?} (isin {:?}, wkn {:?})",
        security.name,
        security.isin,
        security.wkn
    );

    Resolution {
        security,
        created: true,
    }
}
