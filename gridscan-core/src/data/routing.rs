//! Exchange-code to venue routing.
//!
//! Listings deliver bare six-digit codes (or, for some fund listings, codes
//! that already carry a venue prefix). History endpoints want `sh`/`sz`
//! prefixed symbols. The leading-digit rules differ per asset class and are
//! kept here as pure functions.

use crate::domain::AssetClass;

/// Venue prefix for the Shanghai exchange.
pub const SHANGHAI: &str = "sh";
/// Venue prefix for the Shenzhen exchange.
pub const SHENZHEN: &str = "sz";

/// Route a listing code to a provider symbol, or `None` if the code belongs
/// to a venue that is not scanned.
pub fn route(class: AssetClass, code: &str) -> Option<String> {
    match class {
        AssetClass::Etf => route_etf(code),
        AssetClass::Equity => route_equity(code),
    }
}

/// Funds: codes already prefixed with `s…` pass through; `5`/`7` → Shanghai;
/// everything else → Shenzhen.
pub fn route_etf(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    if code.starts_with('s') {
        return Some(code.to_string());
    }
    let venue = if code.starts_with(['5', '7']) {
        SHANGHAI
    } else {
        SHENZHEN
    };
    Some(format!("{venue}{code}"))
}

/// Shares: zero-pad to six digits; `6`/`9` → Shanghai, `0`/`3` → Shenzhen.
/// Any other leading digit (including the Beijing `8`/`4` board) is not routed.
pub fn route_equity(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{code:0>6}");
    let venue = match padded.as_bytes()[0] {
        b'6' | b'9' => SHANGHAI,
        b'0' | b'3' => SHENZHEN,
        _ => return None,
    };
    Some(format!("{venue}{padded}"))
}
