//! Mail merge
//!
//! Two flavours of placeholder substitution are supported:
//!
//! - **basic**: a fixed set of variables (`email`, `recipient_email`,
//!   `emailname`, `domain`, `time`) in `{x}` and `{{x}}` form.
//! - **enhanced**: any `{x}`/`{{x}}` token, resolved against variables
//!   derived from an advanced recipient line (`email|key=value|...`).

mod basic;
mod catalog;
mod enhanced;

pub use basic::{apply_basic_merge, BasicVars};
pub use catalog::{documentation_html, variable_catalog, VariableDoc};
pub use enhanced::{apply_enhanced_merge, parse_recipient_line, RecipientVars};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Which merge flavour a send uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    #[default]
    Basic,
    Enhanced,
}

impl MergeMode {
    pub fn from_enhanced_flag(enhanced: bool) -> Self {
        if enhanced {
            MergeMode::Enhanced
        } else {
            MergeMode::Basic
        }
    }

    /// Personalize `template` for one recipient line
    pub fn apply(&self, template: &str, recipient_line: &str, now: DateTime<Local>) -> String {
        match self {
            MergeMode::Basic => {
                apply_basic_merge(template, &BasicVars::from_address(recipient_line, now))
            }
            MergeMode::Enhanced => {
                apply_enhanced_merge(template, &parse_recipient_line(recipient_line, now))
            }
        }
    }

    /// The address part of a recipient line
    pub fn address<'a>(&self, recipient_line: &'a str) -> &'a str {
        match self {
            MergeMode::Basic => recipient_line.trim(),
            MergeMode::Enhanced => recipient_line
                .trim()
                .split('|')
                .next()
                .unwrap_or_default(),
        }
    }
}

/// Title-case a word the way `str.title()` does in most scripting
/// languages: the first letter of each alphabetic run is upper-cased,
/// the rest lower-cased.
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 4, 18, 14, 30, 45).unwrap()
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("john"), "John");
        assert_eq!(title_case("mary-jane"), "Mary-Jane");
        assert_eq!(title_case("ACME"), "Acme");
        assert_eq!(title_case("j2doe"), "J2Doe");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_mode_address() {
        assert_eq!(
            MergeMode::Enhanced.address("a@b.com|firstname=A"),
            "a@b.com"
        );
        assert_eq!(MergeMode::Basic.address("  a@b.com "), "a@b.com");
    }

    #[test]
    fn test_modes_differ_on_domain() {
        let tpl = "{domain}";
        assert_eq!(
            MergeMode::Basic.apply(tpl, "a@acme.com", fixed_now()),
            "acme.com"
        );
        assert_eq!(
            MergeMode::Enhanced.apply(tpl, "a@acme.com", fixed_now()),
            "acme"
        );
    }
}
