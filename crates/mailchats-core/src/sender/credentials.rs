//! SMTP credentials file parsing

use std::fmt;
use tracing::{debug, warn};

const DEFAULT_SUBMISSION_PORT: u16 = 587;

/// One outgoing SMTP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpServer {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl SmtpServer {
    /// Build a server from individually supplied fields.
    ///
    /// Returns `None` unless host, username and password are all non-empty.
    /// An unparsable port falls back to 587.
    pub fn from_parts(
        host: Option<&str>,
        port: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Option<Self> {
        fn non_empty(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }
        Some(Self {
            host: non_empty(host)?.to_string(),
            port: parse_port(port.unwrap_or_default()),
            username: non_empty(username)?.to_string(),
            password: non_empty(password)?.to_string(),
        })
    }
}

impl fmt::Display for SmtpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (username: {})", self.host, self.port, self.username)
    }
}

fn parse_port(s: &str) -> u16 {
    s.trim().parse().unwrap_or(DEFAULT_SUBMISSION_PORT)
}

/// Parse a credentials file with one `host,port,username,password` per line.
///
/// Blank lines and `#` comments are skipped, as are lines with fewer
/// than four fields.
pub fn parse_credentials(content: &str) -> Vec<SmtpServer> {
    let servers: Vec<SmtpServer> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() < 4 {
                debug!(line, "Ignoring malformed SMTP credentials line");
                return None;
            }
            Some(SmtpServer {
                host: parts[0].trim().to_string(),
                port: parse_port(parts[1]),
                username: parts[2].trim().to_string(),
                password: parts[3].trim().to_string(),
            })
        })
        .collect();

    if servers.is_empty() {
        warn!("No valid SMTP credentials found");
    } else {
        debug!(count = servers.len(), "Loaded SMTP configurations");
    }

    servers
}
