use ticketcheck::config::{Config, ConfigOverrides};
use ticketcheck::console::Console;
use ticketcheck::github::comments::GithubCommentStore;
use ticketcheck::github::{ActionEnv, ContextOverrides, PullRequestContext, Repository};
use ticketcheck::verify::{self, Outcome};

use log::debug;
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "ticketcheck",
    about = "Verifies that a pull request links an issue-tracker ticket"
)]
struct Opt {
    /// TOML configuration file
    #[structopt(short, long, parse(from_os_str))]
    config_path: Option<PathBuf>,
    /// GitHub event payload. Defaults to $GITHUB_EVENT_PATH
    #[structopt(long, parse(from_os_str))]
    event_path: Option<PathBuf>,
    /// `owner/name`. Defaults to $GITHUB_REPOSITORY
    #[structopt(long)]
    repository: Option<Repository>,
    #[structopt(long, help = "pull request number, overrides the event payload")]
    pr_number: Option<u64>,
    #[structopt(long, help = "pull request author, overrides the event payload")]
    author: Option<String>,
    #[structopt(long, help = "comma-separated logins whose pull requests are not checked")]
    skip_users: Option<String>,
    /// Defaults to $GITHUB_API_URL
    #[structopt(long)]
    api_url: Option<String>,
    #[structopt(short, long, help = "print debug lines outside of GitHub Actions")]
    verbose: bool,
}

fn run(opt: Opt, env: ActionEnv, console: &mut Console) -> anyhow::Result<Outcome> {
    let config = match &opt.config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = config.with_overrides(
        &ConfigOverrides {
            skip_users: opt.skip_users,
            api_url: opt.api_url,
        },
        &env,
    );
    let ctx = PullRequestContext::resolve(
        &ContextOverrides {
            repository: opt.repository,
            event_path: opt.event_path,
            pr_number: opt.pr_number,
            author: opt.author,
        },
        &env,
    )?;
    debug!("Verifying {:?} against {}", ctx, config.api_url);

    let mut store = GithubCommentStore::new(&config, ctx.repository.clone(), env.token)?;
    let outcome = verify::verify(&ctx, &mut store, &config, console)?;
    Ok(outcome)
}

fn main() {
    env_logger::init();
    let opt = Opt::from_args();
    let env = ActionEnv::from_env();
    let mut console = Console::stdout(env.in_actions, opt.verbose);

    match run(opt, env, &mut console) {
        Ok(outcome) if outcome.is_successful() => {}
        Ok(_) => process::exit(1),
        Err(err) => {
            console.error(&format!("{:#}", err));
            process::exit(1);
        }
    }
}
