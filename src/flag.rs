use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// FlagKey names one feature flag, e.g. `"enable-refunds"`.
///
/// Keys are opaque: the coordinator never parses them, and a key is never reused for a different
/// meaning.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FlagKey(String);

impl FlagKey {
    pub const ENABLE_REFUNDS: &'static str = "enable-refunds";
    pub const ENABLE_SPLIT_TENDER: &'static str = "enable-split-tender";
    pub const ENABLE_OFFLINE_CARD_PAYMENTS: &'static str = "enable-offline-card-payments";
    pub const ENABLE_TIPPING: &'static str = "enable-tipping";
    pub const RECEIPT_FOOTER_TEXT: &'static str = "receipt-footer-text";
    pub const MAX_OFFLINE_TRANSACTIONS: &'static str = "max-offline-transactions";
    pub const DISCOUNT_LIMIT_PERCENT: &'static str = "discount-limit-percent";

    pub fn new(key: impl Into<String>) -> Self {
        FlagKey(key.into())
    }

    pub fn enable_refunds() -> Self {
        FlagKey::new(Self::ENABLE_REFUNDS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlagKey {
    fn from(s: &str) -> Self {
        FlagKey::new(s)
    }
}

impl From<String> for FlagKey {
    fn from(s: String) -> Self {
        FlagKey(s)
    }
}

impl AsRef<str> for FlagKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FlagKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
