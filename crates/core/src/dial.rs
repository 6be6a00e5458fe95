// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dial-string canonicalization
//!
//! Two dial strings that reach the same phone share one destination queue, so
//! they must reduce to the same canonical `+<country><number>` form.

use serde::{Deserialize, Serialize};

/// Local dialing conventions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialRules {
    pub country_code: String,
    pub area_code: String,
    pub long_distance_prefix: String,
    pub international_prefix: String,
}

impl Default for DialRules {
    fn default() -> Self {
        Self {
            country_code: "1".to_string(),
            area_code: String::new(),
            long_distance_prefix: "1".to_string(),
            international_prefix: "011".to_string(),
        }
    }
}

impl DialRules {
    /// Reduce a dial string to its canonical form.
    ///
    /// Formatting characters are dropped. A leading `+` or the international
    /// prefix marks a fully qualified number; the long-distance prefix adds the
    /// local country code; anything else is local and gets country and area.
    pub fn canonical(&self, dial: &str) -> String {
        let trimmed = dial.trim();
        let qualified = trimmed.starts_with('+');
        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.is_empty() {
            return String::new();
        }
        if qualified {
            return format!("+{digits}");
        }
        if !self.international_prefix.is_empty() {
            if let Some(rest) = digits.strip_prefix(&self.international_prefix) {
                return format!("+{rest}");
            }
        }
        if self.country_code.is_empty() {
            return digits;
        }
        if !self.long_distance_prefix.is_empty() {
            if let Some(rest) = digits.strip_prefix(&self.long_distance_prefix) {
                return format!("+{}{}", self.country_code, rest);
            }
        }
        format!("+{}{}{}", self.country_code, self.area_code, digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn rules() -> DialRules {
        DialRules {
            country_code: "1".to_string(),
            area_code: "408".to_string(),
            long_distance_prefix: "1".to_string(),
            international_prefix: "011".to_string(),
        }
    }

    #[parameterized(
        local = { "555-0100", "+14085550100" },
        long_distance = { "1 (650) 555-0100", "+16505550100" },
        international = { "011 44 20 7946 0000", "+442079460000" },
        already_canonical = { "+1 408 555 0100", "+14085550100" },
        empty = { "  -  ", "" },
    )]
    fn canonicalizes(dial: &str, expected: &str) {
        assert_eq!(rules().canonical(dial), expected);
    }

    #[test]
    fn different_spellings_share_a_destination() {
        let r = rules();
        assert_eq!(r.canonical("5550100"), r.canonical("1-408-555-0100"));
        assert_eq!(r.canonical("5550100"), r.canonical("+14085550100"));
    }

    #[test]
    fn without_country_code_digits_are_kept() {
        let r = DialRules {
            country_code: String::new(),
            ..rules()
        };
        assert_eq!(r.canonical("555.0100"), "5550100");
    }

    proptest::proptest! {
        #[test]
        fn canonical_form_is_a_fixed_point(dial in "[0-9 ()+-]{1,20}") {
            let r = rules();
            let once = r.canonical(&dial);
            proptest::prop_assert_eq!(r.canonical(&once), once);
        }
    }
}
