use super::{AccountType, GithubHandle, GithubUser, Repository};
use crate::config::Config;
use crate::error::{Result, VerifyError};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::{blocking::Response, StatusCode};
use serde::Deserialize;

#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct GithubApp {
    pub slug: String,
}

/// An issue comment as returned by the GitHub REST API.
#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub html_url: String,
    pub user: Option<GithubUser>,
    pub performed_via_github_app: Option<GithubApp>,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    pub fn is_bot(&self) -> bool {
        self.user
            .as_ref()
            .map_or(false, |user| user.kind == AccountType::Bot)
    }

    /// The app slug for comments posted through a GitHub App, the author's
    /// login otherwise.
    pub fn identity(&self) -> Option<&str> {
        self.performed_via_github_app
            .as_ref()
            .map(|app| app.slug.as_str())
            .or_else(|| self.user.as_ref().map(|user| user.login.0.as_str()))
    }

    pub fn author(&self) -> Option<&GithubHandle> {
        self.user.as_ref().map(|user| &user.login)
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Deletion {
    Deleted,
    AlreadyGone,
}

pub trait CommentStore {
    /// First page of comments on the given issue or pull request.
    fn list_comments(&mut self, issue_number: u64) -> Result<Vec<Comment>>;
    fn delete_comment(&mut self, comment_id: u64) -> Result<Deletion>;
    fn create_comment(&mut self, issue_number: u64, body: &str) -> Result<Comment>;
}

pub struct GithubCommentStore {
    api_url: String,
    repository: Repository,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl GithubCommentStore {
    /// The token is only required once a request is sent, so runs that never
    /// touch the API can go without one.
    pub fn new(config: &Config, repository: Repository, token: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("ticketcheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| VerifyError::configuration(format!("cannot build http client: {}", err)))?;
        Ok(GithubCommentStore {
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            repository,
            token,
            client,
        })
    }

    fn issue_comments_url(&self, issue_number: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, self.repository.owner, self.repository.name, issue_number
        )
    }

    fn comment_url(&self, comment_id: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/comments/{}",
            self.api_url, self.repository.owner, self.repository.name, comment_id
        )
    }

    fn send(
        &self,
        operation: &'static str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<Response> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| VerifyError::configuration("GITHUB_TOKEN is not set"))?;
        request
            .header("Authorization", format!("token {}", token))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .map_err(|err| VerifyError::external(operation, None, err.to_string()))
    }
}

fn ensure_success(operation: &'static str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let response_body = resp.text().unwrap_or_default();
    warn!(
        "Server responded with non-successful status code {}: {}",
        status, response_body
    );
    Err(VerifyError::external(
        operation,
        Some(status.as_u16()),
        github_message(&response_body),
    ))
}

/// GitHub error payloads carry a `message` field; fall back to the raw body.
fn github_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_owned())
}

impl CommentStore for GithubCommentStore {
    fn list_comments(&mut self, issue_number: u64) -> Result<Vec<Comment>> {
        const OP: &str = "list comments";
        let endpoint_url = self.issue_comments_url(issue_number);
        debug!("Listing comments using API endpoint: {}", &endpoint_url);

        let resp = self.send(OP, self.client.get(&endpoint_url))?;
        let comments: Vec<Comment> = ensure_success(OP, resp)?
            .json()
            .map_err(|err| VerifyError::external(OP, None, err.to_string()))?;
        debug!("Fetched {} comments", comments.len());
        Ok(comments)
    }

    fn delete_comment(&mut self, comment_id: u64) -> Result<Deletion> {
        const OP: &str = "delete comment";
        let endpoint_url = self.comment_url(comment_id);
        info!("Deleting comment using API endpoint: {}", &endpoint_url);

        let resp = self.send(OP, self.client.delete(&endpoint_url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("Comment {} no longer exists", comment_id);
            return Ok(Deletion::AlreadyGone);
        }
        ensure_success(OP, resp)?;
        Ok(Deletion::Deleted)
    }

    fn create_comment(&mut self, issue_number: u64, body: &str) -> Result<Comment> {
        const OP: &str = "create comment";
        let endpoint_url = self.issue_comments_url(issue_number);
        info!("Publishing PR comment using API endpoint: {}", &endpoint_url);

        let payload = serde_json::json!({ "body": body });
        let resp = self.send(OP, self.client.post(&endpoint_url).json(&payload))?;
        ensure_success(OP, resp)?
            .json()
            .map_err(|err| VerifyError::external(OP, None, err.to_string()))
    }
}
