pub mod comments;

use crate::error::VerifyError;
use anyhow::Context;
use serde::Deserialize;
use std::{env, fmt, fs::File, io::BufReader, path::Path, path::PathBuf, str::FromStr};

#[derive(PartialEq, Hash, Eq, PartialOrd, Ord, Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct GithubHandle(pub String);

impl fmt::Display for GithubHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Deserialize)]
pub enum AccountType {
    User,
    Bot,
    Organization,
    #[serde(other)]
    Other,
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct GithubUser {
    pub login: GithubHandle,
    #[serde(rename = "type")]
    pub kind: AccountType,
}

/// `owner/name` of a GitHub repository.
#[derive(Debug, PartialEq, Clone)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl FromStr for Repository {
    type Err = VerifyError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut chunks = s.trim().splitn(2, '/');
        match (chunks.next(), chunks.next()) {
            (Some(owner), Some(name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Repository {
                    owner: owner.to_owned(),
                    name: name.to_owned(),
                })
            }
            _ => Err(VerifyError::configuration(format!(
                "invalid repository `{}`, expected `owner/name`",
                s
            ))),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct GithubEvent {
    pub pull_request: Option<PullRequest>,
}

impl GithubEvent {
    pub fn from_file<T: AsRef<Path>>(path: T) -> anyhow::Result<GithubEvent> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open event file {}", path.display()))?;
        let reader = BufReader::new(file);
        let event: GithubEvent = serde_json::from_reader(reader)
            .with_context(|| format!("cannot parse event file {}", path.display()))?;
        Ok(event)
    }
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: Option<String>,
    pub html_url: Option<String>,
    pub user: Option<GithubUser>,
}

/// The pull request under review. Number and author stay optional until
/// the verifier validates them.
#[derive(Debug, PartialEq, Clone)]
pub struct PullRequestContext {
    pub number: Option<u64>,
    pub author: Option<GithubHandle>,
    pub repository: Repository,
}

impl PullRequestContext {
    pub fn from_event(event: &GithubEvent, repository: Repository) -> Self {
        let pull_request = event.pull_request.as_ref();
        PullRequestContext {
            number: pull_request.map(|pr| pr.number),
            author: pull_request
                .and_then(|pr| pr.user.as_ref())
                .map(|user| user.login.clone()),
            repository,
        }
    }

    /// Builds the context from the event payload. Command-line values win
    /// over the Actions environment and over the payload.
    pub fn resolve(cli: &ContextOverrides, env: &ActionEnv) -> anyhow::Result<Self> {
        let repository = match (&cli.repository, &env.repository) {
            (Some(repository), _) => repository.clone(),
            (None, Some(repository)) => repository.parse()?,
            (None, None) => {
                return Err(VerifyError::configuration("GITHUB_REPOSITORY is not set").into())
            }
        };
        let event = match cli.event_path.as_ref().or_else(|| env.event_path.as_ref()) {
            Some(path) => GithubEvent::from_file(path)?,
            None => GithubEvent { pull_request: None },
        };
        let mut ctx = PullRequestContext::from_event(&event, repository);
        if cli.pr_number.is_some() {
            ctx.number = cli.pr_number;
        }
        if let Some(author) = cli.author.as_ref().filter(|a| !a.trim().is_empty()) {
            ctx.author = Some(GithubHandle(author.trim().to_owned()));
        }
        Ok(ctx)
    }
}

/// Pull request values given on the command line.
#[derive(Debug, Default)]
pub struct ContextOverrides {
    pub repository: Option<Repository>,
    pub event_path: Option<PathBuf>,
    pub pr_number: Option<u64>,
    pub author: Option<String>,
}

/// Values GitHub Actions hands to a step through its environment.
#[derive(Debug, PartialEq, Default)]
pub struct ActionEnv {
    pub event_path: Option<PathBuf>,
    pub repository: Option<String>,
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub skip_users: Option<String>,
    pub in_actions: bool,
}

impl ActionEnv {
    pub fn from_env() -> Self {
        ActionEnv::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        ActionEnv {
            event_path: non_empty("GITHUB_EVENT_PATH").map(PathBuf::from),
            repository: non_empty("GITHUB_REPOSITORY"),
            token: non_empty("GITHUB_TOKEN"),
            api_url: non_empty("GITHUB_API_URL"),
            // the runner keeps the hyphen of `skip-users` in the variable name
            skip_users: non_empty("INPUT_SKIP-USERS").or_else(|| non_empty("INPUT_SKIP_USERS")),
            in_actions: lookup("GITHUB_ACTIONS").map_or(false, |v| v == "true"),
        }
    }
}
