use std::collections::HashMap;

use lazy_static::lazy_static;
use maplit::hashmap;

use crate::flag::FlagKey;

lazy_static! {
    /// Boolean values compiled into the app, used when neither source has an answer for a flag.
    static ref BOOL_DEFAULTS: HashMap<&'static str, bool> = hashmap! {
        FlagKey::ENABLE_REFUNDS => false,
        FlagKey::ENABLE_SPLIT_TENDER => false,
        FlagKey::ENABLE_OFFLINE_CARD_PAYMENTS => false,
        FlagKey::ENABLE_TIPPING => true,
    };
}

/// Returns the compiled-in default for a boolean flag. Keys without an entry default to `false`.
pub fn default_bool(key: &FlagKey) -> bool {
    BOOL_DEFAULTS.get(key.as_str()).copied().unwrap_or(false)
}
