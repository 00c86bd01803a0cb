use crate::error::{Result, VerifyError};
use regex::Regex;
use std::fmt;

/// Matches Linear issue URLs, e.g. `https://linear.app/acme/issue/ENG-123/some-title`.
pub const LINEAR_ISSUE_PATTERN: &str =
    r"https://linear\.app/[A-Za-z0-9_-]+/issue/(?P<key>[A-Za-z][A-Za-z0-9]*-[0-9]+)";

#[derive(Debug, PartialEq, Clone)]
pub struct TicketRef {
    pub url: String,
    pub key: Option<String>,
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} ({})", key, self.url),
            None => write!(f, "{}", self.url),
        }
    }
}

/// A ticket-tracker URL pattern. A capture group named `key` is reported
/// as the ticket key when present.
#[derive(Debug, Clone)]
pub struct TicketPattern(Regex);

impl TicketPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        Regex::new(pattern).map(TicketPattern).map_err(|err| {
            VerifyError::configuration(format!("invalid ticket url pattern `{}`: {}", pattern, err))
        })
    }

    pub fn linear() -> Self {
        TicketPattern(Regex::new(LINEAR_ISSUE_PATTERN).expect("built-in pattern is valid"))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn find(&self, body: &str) -> Option<TicketRef> {
        self.0.captures(body).map(|caps| TicketRef {
            url: caps[0].to_owned(),
            key: caps.name("key").map(|m| m.as_str().to_owned()),
        })
    }
}

impl Default for TicketPattern {
    fn default() -> Self {
        TicketPattern::linear()
    }
}

impl PartialEq for TicketPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
