use serde::Serialize;

/// One documented personalization variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDoc {
    pub name: &'static str,
    pub description: &'static str,
    pub example: &'static str,
}

const fn var(name: &'static str, description: &'static str, example: &'static str) -> VariableDoc {
    VariableDoc {
        name,
        description,
        example,
    }
}

const CATALOG: [VariableDoc; 16] = [
    var("email", "Full email address of recipient", "john.doe@example.com"),
    var("recipient_email", "Same as email", "john.doe@example.com"),
    var("emailname", "Username part of email address", "john.doe"),
    var(
        "domain",
        "Domain name without TLD (e.g. 'example' from 'example.com')",
        "example",
    ),
    var(
        "full_domain",
        "Complete domain part of email address with TLD",
        "example.com",
    ),
    var("time", "Current date and time", "2025-04-18 14:30:45"),
    var("date", "Current date", "2025-04-18"),
    var("day", "Current day of week", "Friday"),
    var("month", "Current month", "April"),
    var("year", "Current year", "2025"),
    var(
        "firstname",
        "First name (derived from email or custom field)",
        "John",
    ),
    var(
        "lastname",
        "Last name (derived from email or custom field)",
        "Doe",
    ),
    var(
        "company",
        "Company name (derived from domain name or custom field)",
        "Example",
    ),
    var("random_number", "Unique 3-digit number based on email", "123"),
    var(
        "unsubscribe",
        "Unsubscribe link with email parameter",
        "https://example.com/unsubscribe?email=john.doe@example.com",
    ),
    var(
        "Custom fields",
        "Any custom field added with format email@example.com|fieldname=value",
        "position, company, phone, etc.",
    ),
];

/// Every variable the enhanced merge understands
pub fn variable_catalog() -> &'static [VariableDoc] {
    &CATALOG
}

/// HTML reference table for the variable catalog
pub fn documentation_html() -> String {
    let mut html = String::from("<h2>Available Personalization Variables</h2>");
    html.push_str("<p>Use these variables in your email templates with either single braces {variable} or double braces {{variable}}.</p>");
    html.push_str("<table border='1' cellpadding='5' cellspacing='0'>");
    html.push_str("<tr><th>Variable</th><th>Description</th><th>Example</th></tr>");

    for v in variable_catalog() {
        html.push_str(&format!(
            "<tr><td><code>{{{}}}</code></td><td>{}</td><td>{}</td></tr>",
            v.name, v.description, v.example
        ));
    }

    html.push_str("</table>");
    html.push_str("<h3>Advanced Recipient Format</h3>");
    html.push_str("<p>To include custom fields, format your recipients file as follows:</p>");
    html.push_str(
        "<pre>email@example.com|firstname=John|lastname=Doe|company=Acme Inc|position=CEO</pre>",
    );
    html.push_str("<p>Then you can use {firstname}, {lastname}, {company}, and {position} variables in your templates.</p>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape() {
        let catalog = variable_catalog();
        assert_eq!(catalog.len(), 16);
        assert_eq!(catalog[0].name, "email");
        assert_eq!(catalog[15].name, "Custom fields");
    }

    #[test]
    fn test_documentation_html() {
        let html = documentation_html();
        assert!(html.starts_with("<h2>Available Personalization Variables</h2>"));
        assert!(html.contains("<tr><td><code>{firstname}</code></td>"));
        assert!(html.contains("<h3>Advanced Recipient Format</h3>"));
        assert_eq!(html.matches("<tr>").count(), 17);
    }
}
