use crate::{
    github::{ActionEnv, GithubHandle},
    ticket::TicketPattern,
};
use anyhow::Context;
use serde::Deserializer;
use serde_derive::Deserialize;
use std::fs;
use std::{collections::BTreeSet, path::Path, time::Duration};

pub const DEFAULT_MISSING_MESSAGE: &str =
    "No Linear ticket found for this pull request. Please link an issue in Linear by mentioning the ticket.";
/// Slugs of the apps that post Linear ticket links: Linear's own GitHub
/// integration and the `verify-linked-issue-bot` app.
pub const DEFAULT_TICKET_INTEGRATIONS: &[&str] = &["linear", "verify-linked-issue-bot"];
pub const DEFAULT_TRACKER_NAME: &str = "Linear";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub skip_users: BTreeSet<GithubHandle>,
    /// Body of the warning comment, also used to recognise stale warnings.
    pub missing_message: String,
    /// App slugs or logins of the integrations that post ticket links.
    pub ticket_integrations: BTreeSet<String>,
    /// Tracker name used in log lines, e.g. "Found Linear ticket."
    pub tracker_name: String,
    #[serde(deserialize_with = "ticket_pattern")]
    pub ticket_url_pattern: TicketPattern,
    pub api_url: String,
    #[serde(deserialize_with = "humantime_duration")]
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            skip_users: BTreeSet::new(),
            missing_message: DEFAULT_MISSING_MESSAGE.to_owned(),
            ticket_integrations: DEFAULT_TICKET_INTEGRATIONS
                .iter()
                .map(|slug| slug.to_string())
                .collect(),
            tracker_name: DEFAULT_TRACKER_NAME.to_owned(),
            ticket_url_pattern: TicketPattern::linear(),
            api_url: DEFAULT_API_URL.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> anyhow::Result<Self> {
        let file_path = file_path.as_ref();
        let config_s = fs::read_to_string(file_path)
            .with_context(|| format!("cannot read config file {}", file_path.display()))?;
        let config = toml::from_str(&config_s)
            .with_context(|| format!("cannot parse config file {}", file_path.display()))?;
        Ok(config)
    }

    /// Applies the command line, then the Actions environment, on top of the
    /// file. Blank values are ignored at both levels.
    pub fn with_overrides(mut self, cli: &ConfigOverrides, env: &ActionEnv) -> Self {
        let skip_users = non_blank(cli.skip_users.as_deref())
            .or_else(|| non_blank(env.skip_users.as_deref()));
        if let Some(skip_users) = skip_users {
            self.skip_users = parse_skip_users(skip_users);
        }
        let api_url =
            non_blank(cli.api_url.as_deref()).or_else(|| non_blank(env.api_url.as_deref()));
        if let Some(api_url) = api_url {
            self.api_url = api_url.trim().to_owned();
        }
        self
    }

    pub fn is_skipped(&self, login: &GithubHandle) -> bool {
        self.skip_users.contains(login)
    }

    pub fn is_ticket_integration(&self, identity: &str) -> bool {
        self.ticket_integrations.contains(identity)
    }
}

/// Configuration values given on the command line.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub skip_users: Option<String>,
    pub api_url: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses the comma-separated `skip-users` input.
pub fn parse_skip_users(s: &str) -> BTreeSet<GithubHandle> {
    s.split(',')
        .map(str::trim)
        .filter(|login| !login.is_empty())
        .map(|login| GithubHandle(login.to_owned()))
        .collect()
}

fn ticket_pattern<'de, D>(deserializer: D) -> std::result::Result<TicketPattern, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let pattern: String = serde::Deserialize::deserialize(deserializer)?;
    TicketPattern::new(&pattern).map_err(Error::custom)
}

fn humantime_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    humantime::parse_duration(&s)
        .map_err(|err| Error::custom(format!("Cannot parse duration `{}`: {}", s, err)))
}
