use crate::config::Config;
use crate::console::Console;
use crate::error::{Result, VerifyError};
use crate::github::comments::{Comment, CommentStore, Deletion};
use crate::github::PullRequestContext;
use crate::ticket::TicketRef;
use log::debug;

#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The PR author is listed in `skip_users`.
    Skipped,
    Verified { ticket: TicketRef, comment_url: String },
    /// A warning comment was posted. Fails the CI step.
    MissingTicket { warning: Comment },
}

impl Outcome {
    pub fn is_successful(&self) -> bool {
        !matches!(self, Outcome::MissingTicket { .. })
    }
}

/// A comment this step posted on an earlier run.
pub fn is_stale_warning(comment: &Comment, config: &Config) -> bool {
    comment.is_bot() && comment.body().contains(&config.missing_message)
}

pub fn find_ticket_link<'a>(
    comments: &'a [Comment],
    config: &Config,
) -> Option<(&'a Comment, TicketRef)> {
    comments
        .iter()
        .filter(|comment| {
            comment
                .identity()
                .map_or(false, |identity| config.is_ticket_integration(identity))
        })
        .find_map(|comment| {
            config
                .ticket_url_pattern
                .find(comment.body())
                .map(|ticket| (comment, ticket))
        })
}

/// Checks that the pull request carries a ticket link and reconciles the
/// warning comment. Stale warnings are always removed before a new one is
/// posted.
pub fn verify<S: CommentStore>(
    ctx: &PullRequestContext,
    store: &mut S,
    config: &Config,
    console: &mut Console,
) -> Result<Outcome> {
    let number = ctx.number.ok_or_else(|| {
        VerifyError::configuration("No pull request number found in context")
    })?;
    let author = ctx.author.as_ref().ok_or_else(|| {
        VerifyError::configuration("No pull request author found in context")
    })?;

    if config.is_skipped(author) {
        console.notice(&format!(
            "Skipping ticket check for pull requests opened by {}.",
            author
        ));
        return Ok(Outcome::Skipped);
    }

    let tracker = &config.tracker_name;
    console.debug(&format!("Searching for {} ticket link ...", tracker));
    let comments = store.list_comments(number)?;

    let mut removed = 0;
    for stale in comments.iter().filter(|c| is_stale_warning(c, config)) {
        match store.delete_comment(stale.id)? {
            Deletion::Deleted => removed += 1,
            Deletion::AlreadyGone => debug!("Stale warning {} was already deleted", stale.id),
        }
    }
    console.debug(&format!(
        "Inspected {} comments on {}#{}, removed {} stale warnings",
        comments.len(),
        ctx.repository,
        number,
        removed
    ));

    match find_ticket_link(&comments, config) {
        Some((comment, ticket)) => {
            console.notice(&format!("Found {} ticket.", tracker));
            console.debug(&format!("Ticket link {} in {}", ticket, comment.html_url));
            Ok(Outcome::Verified {
                ticket,
                comment_url: comment.html_url.clone(),
            })
        }
        None => {
            let warning = store.create_comment(number, &config.missing_message)?;
            console.error(&format!("No {} ticket found.", tracker));
            Ok(Outcome::MissingTicket { warning })
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate pretty_assertions;

    use super::*;
    use crate::config::parse_skip_users;
    use crate::github::{AccountType, GithubHandle, GithubUser};
    use crate::console::testing::SharedBuf;
    use crate::github::comments::{GithubApp, GithubCommentStore};
    use crate::ticket::TicketPattern;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::io;

    #[derive(Debug, PartialEq, Clone)]
    enum Call {
        List(u64),
        Delete(u64),
        Create(u64, String),
    }

    /// In-memory comment thread recording every call.
    #[derive(Default)]
    struct FakeStore {
        comments: Vec<Comment>,
        calls: Vec<Call>,
        next_id: u64,
        fail_deletes: bool,
    }

    impl FakeStore {
        fn with(comments: Vec<Comment>) -> Self {
            FakeStore {
                comments,
                next_id: 9000,
                ..FakeStore::default()
            }
        }

        fn live_warnings(&self, config: &Config) -> usize {
            self.comments
                .iter()
                .filter(|c| is_stale_warning(c, config))
                .count()
        }
    }

    impl CommentStore for FakeStore {
        fn list_comments(&mut self, issue_number: u64) -> Result<Vec<Comment>> {
            self.calls.push(Call::List(issue_number));
            Ok(self.comments.clone())
        }

        fn delete_comment(&mut self, comment_id: u64) -> Result<Deletion> {
            self.calls.push(Call::Delete(comment_id));
            if self.fail_deletes {
                return Err(VerifyError::external("delete comment", Some(403), "Forbidden"));
            }
            let before = self.comments.len();
            self.comments.retain(|c| c.id != comment_id);
            if self.comments.len() < before {
                Ok(Deletion::Deleted)
            } else {
                Ok(Deletion::AlreadyGone)
            }
        }

        fn create_comment(&mut self, issue_number: u64, body: &str) -> Result<Comment> {
            self.calls.push(Call::Create(issue_number, body.to_owned()));
            self.next_id += 1;
            let comment = via_app(
                comment(self.next_id, "github-actions[bot]", AccountType::Bot, body),
                "github-actions",
            );
            self.comments.push(comment.clone());
            Ok(comment)
        }
    }

    fn comment(id: u64, login: &str, kind: AccountType, body: &str) -> Comment {
        Comment {
            id,
            html_url: format!("https://github.com/acme/widgets/pull/7#issuecomment-{}", id),
            user: Some(GithubUser {
                login: GithubHandle(login.to_owned()),
                kind,
            }),
            performed_via_github_app: None,
            body: Some(body.to_owned()),
            created_at: Utc.with_ymd_and_hms(2023, 5, 2, 9, 0, 0).unwrap(),
        }
    }

    fn via_app(mut comment: Comment, slug: &str) -> Comment {
        comment.performed_via_github_app = Some(GithubApp {
            slug: slug.to_owned(),
        });
        comment
    }

    fn linear_link(id: u64) -> Comment {
        let body = "<a href=\"https://linear.app/acme/issue/ENG-42/add-retry-budget\">ENG-42</a>";
        via_app(comment(id, "linear[bot]", AccountType::Bot, body), "linear")
    }

    fn stale_warning(id: u64) -> Comment {
        let body = crate::config::DEFAULT_MISSING_MESSAGE;
        via_app(comment(id, "github-actions[bot]", AccountType::Bot, body), "github-actions")
    }

    fn ctx() -> PullRequestContext {
        PullRequestContext {
            number: Some(7),
            author: Some(GithubHandle("octocat".to_owned())),
            repository: "acme/widgets".parse().unwrap(),
        }
    }

    fn quiet() -> Console {
        Console::plain(Box::new(io::sink()), false, true)
    }

    #[test]
    fn skipped_author_touches_nothing() {
        let config = Config {
            skip_users: parse_skip_users("dependabot[bot],octocat"),
            ..Config::default()
        };
        let mut store = FakeStore::with(vec![stale_warning(1)]);

        let outcome = verify(&ctx(), &mut store, &config, &mut quiet()).unwrap();

        assert_eq!(Outcome::Skipped, outcome);
        assert!(outcome.is_successful());
        assert_eq!(Vec::<Call>::new(), store.calls);
    }

    #[test]
    fn existing_ticket_link_verifies() {
        let config = Config::default();
        let mut store = FakeStore::with(vec![
            comment(1, "octocat", AccountType::User, "LGTM"),
            linear_link(2),
        ]);

        let outcome = verify(&ctx(), &mut store, &config, &mut quiet()).unwrap();

        assert_eq!(
            Outcome::Verified {
                ticket: TicketRef {
                    url: "https://linear.app/acme/issue/ENG-42".to_owned(),
                    key: Some("ENG-42".to_owned()),
                },
                comment_url: "https://github.com/acme/widgets/pull/7#issuecomment-2".to_owned(),
            },
            outcome
        );
        assert!(outcome.is_successful());
        assert_eq!(vec![Call::List(7)], store.calls);
    }

    #[test]
    fn stale_warning_is_removed_once_ticket_is_linked() {
        let config = Config::default();
        let mut store = FakeStore::with(vec![stale_warning(1), linear_link(2)]);

        let outcome = verify(&ctx(), &mut store, &config, &mut quiet()).unwrap();

        assert!(outcome.is_successful());
        assert_eq!(vec![Call::List(7), Call::Delete(1)], store.calls);
        assert_eq!(0, store.live_warnings(&config));
    }

    #[test]
    fn missing_ticket_replaces_stale_warning() {
        let config = Config::default();
        let mut store = FakeStore::with(vec![
            comment(1, "octocat", AccountType::User, "Ready for review"),
            stale_warning(2),
        ]);

        let outcome = verify(&ctx(), &mut store, &config, &mut quiet()).unwrap();

        assert!(!outcome.is_successful());
        match outcome {
            Outcome::MissingTicket { warning } => {
                assert_eq!(9001, warning.id);
                assert_eq!(config.missing_message, warning.body());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(
            vec![
                Call::List(7),
                Call::Delete(2),
                Call::Create(7, config.missing_message.clone()),
            ],
            store.calls
        );
        assert_eq!(1, store.live_warnings(&config));
    }

    #[test]
    fn stale_detection_requires_bot_and_exact_message() {
        let config = Config::default();
        let quoted = format!("> {}\nI did link it!", config.missing_message);

        assert!(is_stale_warning(&stale_warning(1), &config));
        assert!(is_stale_warning(
            &comment(2, "some-other[bot]", AccountType::Bot, &quoted),
            &config
        ));
        assert!(!is_stale_warning(
            &comment(3, "octocat", AccountType::User, &quoted),
            &config
        ));
        assert!(!is_stale_warning(
            &comment(4, "github-actions[bot]", AccountType::Bot, "No Linear ticket found"),
            &config
        ));
        let mut no_user = stale_warning(5);
        no_user.user = None;
        assert!(!is_stale_warning(&no_user, &config));
    }

    #[test]
    fn ticket_link_needs_integration_and_url() {
        let config = Config::default();
        let url_from_human = comment(
            1,
            "octocat",
            AccountType::User,
            "https://linear.app/acme/issue/ENG-42",
        );
        let integration_without_url = via_app(
            comment(2, "linear[bot]", AccountType::Bot, "Linked to a project"),
            "linear",
        );

        assert_eq!(
            None,
            find_ticket_link(&[url_from_human, integration_without_url], &config)
        );
        assert!(find_ticket_link(&[linear_link(3)], &config).is_some());
    }

    #[test]
    fn integration_identified_by_login_without_app() {
        let config = Config {
            ticket_integrations: vec!["jira-bot".to_owned()].into_iter().collect(),
            ticket_url_pattern: TicketPattern::new(
                r"https://acme\.atlassian\.net/browse/(?P<key>[A-Z]+-\d+)",
            )
            .unwrap(),
            ..Config::default()
        };
        let link = comment(
            1,
            "jira-bot",
            AccountType::Bot,
            "Linked https://acme.atlassian.net/browse/OPS-7",
        );

        let (_, ticket) = find_ticket_link(&[link], &config).unwrap();
        assert_eq!(Some("OPS-7".to_owned()), ticket.key);
    }

    #[test]
    fn linked_issue_bot_comment_is_a_ticket_link() {
        let config = Config::default();
        let link = via_app(
            comment(
                1,
                "verify-linked-issue-bot[bot]",
                AccountType::Bot,
                "https://linear.app/acme/issue/ENG-42/x",
            ),
            "verify-linked-issue-bot",
        );
        let mut store = FakeStore::with(vec![link]);

        let outcome = verify(&ctx(), &mut store, &config, &mut quiet()).unwrap();

        assert!(outcome.is_successful());
        assert_eq!(vec![Call::List(7)], store.calls);
    }

    #[test]
    fn skipped_author_needs_no_token() {
        let config = Config {
            skip_users: parse_skip_users("octocat"),
            api_url: "http://127.0.0.1:9".to_owned(),
            ..Config::default()
        };
        let mut store =
            GithubCommentStore::new(&config, "acme/widgets".parse().unwrap(), None).unwrap();

        let outcome = verify(&ctx(), &mut store, &config, &mut quiet()).unwrap();

        assert_eq!(Outcome::Skipped, outcome);
    }

    #[test]
    fn log_lines_name_the_configured_tracker() {
        let config = Config {
            tracker_name: "JIRA".to_owned(),
            ticket_integrations: vec!["jira".to_owned()].into_iter().collect(),
            ticket_url_pattern: TicketPattern::new(
                r"https://acme\.atlassian\.net/browse/\w+-\d+",
            )
            .unwrap(),
            ..Config::default()
        };
        let buf = SharedBuf::default();
        let mut console = Console::plain(Box::new(buf.clone()), false, false);
        let mut store = FakeStore::with(vec![]);

        verify(&ctx(), &mut store, &config, &mut console).unwrap();

        assert_eq!("error  No JIRA ticket found.\n", buf.contents());

        let buf = SharedBuf::default();
        let mut console = Console::plain(Box::new(buf.clone()), false, false);
        let link = via_app(
            comment(
                2,
                "jira[bot]",
                AccountType::Bot,
                "https://acme.atlassian.net/browse/OPS-7",
            ),
            "jira",
        );
        let mut store = FakeStore::with(vec![link]);

        verify(&ctx(), &mut store, &config, &mut console).unwrap();

        assert_eq!("notice Found JIRA ticket.\n", buf.contents());
    }

    #[test]
    fn running_twice_leaves_one_warning() {
        let config = Config::default();
        let mut store = FakeStore::with(vec![comment(1, "octocat", AccountType::User, "wip")]);

        let first = verify(&ctx(), &mut store, &config, &mut quiet()).unwrap();
        let second = verify(&ctx(), &mut store, &config, &mut quiet()).unwrap();

        assert!(!first.is_successful());
        assert!(!second.is_successful());
        assert_eq!(1, store.live_warnings(&config));
        assert_eq!(
            vec![
                Call::List(7),
                Call::Create(7, config.missing_message.clone()),
                Call::List(7),
                Call::Delete(9001),
                Call::Create(7, config.missing_message.clone()),
            ],
            store.calls
        );
    }

    #[test]
    fn missing_number_or_author_is_a_configuration_error() {
        let config = Config::default();
        let mut store = FakeStore::with(vec![]);

        let no_number = PullRequestContext {
            number: None,
            ..ctx()
        };
        match verify(&no_number, &mut store, &config, &mut quiet()) {
            Err(VerifyError::Configuration(msg)) => {
                assert_eq!("No pull request number found in context", msg)
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let no_author = PullRequestContext {
            author: None,
            ..ctx()
        };
        assert!(matches!(
            verify(&no_author, &mut store, &config, &mut quiet()),
            Err(VerifyError::Configuration(_))
        ));
        assert!(store.calls.is_empty());
    }

    #[test]
    fn failed_deletion_aborts_before_creating() {
        let config = Config::default();
        let mut store = FakeStore::with(vec![stale_warning(1)]);
        store.fail_deletes = true;

        let err = verify(&ctx(), &mut store, &config, &mut quiet()).unwrap_err();

        assert_eq!(
            "delete comment failed with status 403: Forbidden",
            err.to_string()
        );
        assert_eq!(vec![Call::List(7), Call::Delete(1)], store.calls);
    }
}
