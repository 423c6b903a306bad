use super::title_case;
use chrono::{DateTime, Local};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Variables available to the enhanced merge, keyed by lower-case name
pub type RecipientVars = BTreeMap<String, String>;

fn variable_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([{]{1,2})([a-zA-Z0-9_.]+)([}]{1,2})").expect("static variable pattern")
    })
}

/// Three digits derived from a SHA-256 of the address
fn random_number(email: &str) -> String {
    let digest = Sha256::digest(email.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("{:03}", u64::from_be_bytes(prefix) % 1000)
}

/// Parse a recipient line (`email` or `email|key=value|...`) into variables.
///
/// Custom fields override derived ones; their keys are trimmed and lower-cased.
pub fn parse_recipient_line(line: &str, now: DateTime<Local>) -> RecipientVars {
    let mut parts = line.trim().split('|');
    let email = parts.next().unwrap_or_default();

    let (emailname, full_domain) = email.split_once('@').unwrap_or(("user", "example.com"));
    let domain = full_domain.split('.').next().unwrap_or_default();

    let (firstname, lastname) = match emailname.split_once('.') {
        Some((first, rest)) => {
            let second = rest.split('.').next().unwrap_or_default();
            (title_case(first), title_case(second))
        }
        None => (title_case(emailname), String::new()),
    };

    let mut vars = RecipientVars::new();
    let mut set = |k: &str, v: String| {
        vars.insert(k.to_string(), v);
    };
    set("email", email.to_string());
    set("recipient_email", email.to_string());
    set("emailname", emailname.to_string());
    set("domain", domain.to_string());
    set("full_domain", full_domain.to_string());
    set("time", now.format("%Y-%m-%d %H:%M:%S").to_string());
    set("date", now.format("%Y-%m-%d").to_string());
    set("day", now.format("%A").to_string());
    set("month", now.format("%B").to_string());
    set("year", now.format("%Y").to_string());
    set("firstname", firstname);
    set("lastname", lastname);
    set("company", title_case(domain));
    set("random_number", random_number(email));
    set(
        "unsubscribe",
        format!("https://example.com/unsubscribe?email={}", email),
    );

    for field in parts {
        if let Some((key, value)) = field.split_once('=') {
            vars.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    vars
}

/// Replace every `{x}` / `{{x}}` token with the variable named `x`
/// (case-insensitive), or with nothing when the variable is unknown.
pub fn apply_enhanced_merge(template: &str, vars: &RecipientVars) -> String {
    if template.is_empty() {
        return String::new();
    }

    variable_regex()
        .replace_all(template, |caps: &Captures| {
            vars.get(&caps[2].to_lowercase())
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}
