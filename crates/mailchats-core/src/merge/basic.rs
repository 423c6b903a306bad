use chrono::{DateTime, Local};

/// Values substituted by the basic merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicVars {
    pub email: String,
    pub emailname: String,
    /// Everything after the first `@`
    pub domain: String,
    /// `%Y-%m-%d %H:%M:%S`
    pub time: String,
}

impl BasicVars {
    /// Derive the variables for `email`.
    ///
    /// An address without `@` merges as `user` / `example.com`.
    pub fn from_address(email: &str, now: DateTime<Local>) -> Self {
        let email = email.trim();
        let (emailname, domain) = email.split_once('@').unwrap_or(("user", "example.com"));
        Self {
            email: email.to_string(),
            emailname: emailname.to_string(),
            domain: domain.to_string(),
            time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("email", &self.email),
            ("recipient_email", &self.email),
            ("emailname", &self.emailname),
            ("domain", &self.domain),
            ("time", &self.time),
        ]
    }
}

/// Replace the basic variables in `template`.
///
/// Double-brace tokens are replaced before single-brace ones so `{{x}}`
/// never leaves stray braces behind.
pub fn apply_basic_merge(template: &str, vars: &BasicVars) -> String {
    if template.is_empty() {
        return String::new();
    }

    let mut result = template.to_string();
    for (name, value) in vars.pairs() {
        result = result.replace(&format!("{{{{{}}}}}", name), value);
    }
    for (name, value) in vars.pairs() {
        result = result.replace(&format!("{{{}}}", name), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn vars(email: &str) -> BasicVars {
        BasicVars::from_address(
            email,
            Local.with_ymd_and_hms(2025, 4, 18, 14, 30, 45).unwrap(),
        )
    }

    #[test]
    fn test_single_and_double_braces() {
        let out = apply_basic_merge(
            "Hi {{emailname}} from {domain} ({email}) at {{time}}",
            &vars("jane@shop.example.com"),
        );
        assert_eq!(
            out,
            "Hi jane from shop.example.com (jane@shop.example.com) at 2025-04-18 14:30:45"
        );
    }

    #[test]
    fn test_recipient_email_alias() {
        let out = apply_basic_merge("{recipient_email}|{{recipient_email}}", &vars("a@b.c"));
        assert_eq!(out, "a@b.c|a@b.c");
    }

    #[test]
    fn test_unknown_tokens_left_alone() {
        let out = apply_basic_merge("{firstname} {{company}}", &vars("a@b.c"));
        assert_eq!(out, "{firstname} {{company}}");
    }

    #[test]
    fn test_address_without_at_uses_placeholders() {
        let v = vars("not-an-address");
        assert_eq!(v.emailname, "user");
        assert_eq!(v.domain, "example.com");
        assert_eq!(v.email, "not-an-address");
    }

    #[test]
    fn test_empty_template() {
        assert_eq!(apply_basic_merge("", &vars("a@b.c")), "");
    }
}
