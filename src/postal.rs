/*!
 * Postal code normalization
 *
 * Canonicalizes raw postal codes to `DDDDD` or `DDDDD-DDDD`. Anything else
 * degrades to the unresolvable sentinel; normalization never fails.
 */

use serde::{Deserialize, Serialize};

use crate::constants::UNRESOLVABLE_SENTINEL;

/// Result of normalizing a raw postal code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostalCode {
    /// Five-digit ZIP code
    Zip5(String),
    /// ZIP+4 in `DDDDD-DDDD` form
    ZipPlus4(String),
    /// Input could not be normalized
    Unresolvable,
}

impl PostalCode {
    /// Normalize a raw postal code
    pub fn normalize(raw: &str) -> Self {
        let bytes = raw.as_bytes();
        let all_digits = |b: &[u8]| b.iter().all(u8::is_ascii_digit);

        match bytes.len() {
            5 if all_digits(bytes) => PostalCode::Zip5(raw.to_string()),
            9 if all_digits(bytes) => PostalCode::ZipPlus4(format!("{}-{}", &raw[..5], &raw[5..])),
            10 if bytes[5] == b'-' && all_digits(&bytes[..5]) && all_digits(&bytes[6..]) => {
                PostalCode::ZipPlus4(raw.to_string())
            }
            _ => PostalCode::Unresolvable,
        }
    }

    /// Normalize an optional value; absent input is unresolvable
    pub fn normalize_opt(raw: Option<&str>) -> Self {
        raw.map(Self::normalize).unwrap_or(PostalCode::Unresolvable)
    }

    /// Canonical text form, or the sentinel for unresolvable input
    pub fn as_str(&self) -> &str {
        match self {
            PostalCode::Zip5(code) | PostalCode::ZipPlus4(code) => code,
            PostalCode::Unresolvable => UNRESOLVABLE_SENTINEL,
        }
    }

    /// Five-digit base used for location lookups
    pub fn base(&self) -> Option<&str> {
        match self {
            PostalCode::Zip5(code) | PostalCode::ZipPlus4(code) => Some(&code[..5]),
            PostalCode::Unresolvable => None,
        }
    }

    pub fn is_resolvable(&self) -> bool {
        !matches!(self, PostalCode::Unresolvable)
    }
}

impl std::fmt::Display for PostalCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a raw postal code; shorthand for [`PostalCode::normalize`]
pub fn normalize_postal_code(raw: &str) -> PostalCode {
    PostalCode::normalize(raw)
}
