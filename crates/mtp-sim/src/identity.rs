// crates/mtp-sim/src/identity.rs

//! Tag identity normalization.
//!
//! The same tag can reach the simulator in three textual encodings:
//! - vendor-compact `NS2|String|R0001`
//! - qualified `ns=2;s=R0001`
//! - bare `R0001`
//!
//! [`normalize`] maps all of them onto one [`CanonicalKey`], which is the join key
//! used by the engine, the resolver, the fan-out and any sink.

use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;

/// Namespace index applied to bare identifiers.
pub const DEFAULT_NAMESPACE: u16 = 2;

/// The normalized identity of one tag. Only constructed through [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Normalizes `raw` into a key. Equivalent to [`normalize`].
    pub fn from_raw(raw: &str) -> Self {
        normalize(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier part after `;s=`, if the key carries one.
    pub fn identifier(&self) -> Option<&str> {
        self.0.split_once(";s=").map(|(_, id)| id)
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CanonicalKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Maps any accepted identifier encoding to its canonical key.
///
/// Recognition order:
/// 1. `NS<digits>|<anything>|<tail>` (case-insensitive) becomes `ns=<digits>;s=<tail>`.
/// 2. Anything starting with `ns=` (case-insensitive) is already qualified and kept.
/// 3. Anything else is a bare token and becomes `ns=2;s=<token>`.
///
/// Surrounding whitespace is ignored. The function is idempotent.
pub fn normalize(raw: &str) -> CanonicalKey {
    let trimmed = raw.trim();

    if let Some((ns, tail)) = split_vendor_compact(trimmed) {
        return CanonicalKey(format!("ns={ns};s={tail}"));
    }
    if is_qualified(trimmed) {
        return CanonicalKey(trimmed.to_string());
    }
    CanonicalKey(format!("ns={DEFAULT_NAMESPACE};s={trimmed}"))
}

/// Splits `NS<digits>|<type>|<tail>` into `(digits, tail)`.
fn split_vendor_compact(s: &str) -> Option<(&str, &str)> {
    let prefix = s.get(..2)?;
    if !prefix.eq_ignore_ascii_case("ns") {
        return None;
    }
    let rest = &s[2..];
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    let (digits, rest) = rest.split_at(digits_len);
    let rest = rest.strip_prefix('|')?;
    // The middle segment may not contain a separator; the tail may.
    let (_, tail) = rest.split_once('|')?;
    Some((digits, tail))
}

fn is_qualified(s: &str) -> bool {
    s.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("ns="))
}
