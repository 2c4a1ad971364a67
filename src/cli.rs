use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Token;
use crate::config::Config;
use crate::groomer::Groomer;
use crate::grouping::parse_grouping;
use crate::providers::concourse::ConcourseClient;
use crate::providers::tracker::TrackerClient;

#[derive(Parser, Debug)]
#[command(name = "concourse-tracker-bot")]
#[command(
    author,
    version,
    about = "Files Pivotal Tracker stories for failing Concourse jobs",
    long_about = None
)]
pub struct Cli {
    /// Configuration file (defaults to ./tracker-bot.{toml,json,yaml,yml})
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Concourse base URL
    #[arg(long, env = "CONCOURSE_HOST")]
    concourse_host: Option<String>,

    /// Concourse team to watch
    #[arg(short, long, env = "CONCOURSE_TEAM")]
    team: Option<String>,

    #[arg(long, env = "CONCOURSE_TOKEN", hide_env_values = true)]
    concourse_token: Option<String>,

    #[arg(long, env = "TRACKER_API_TOKEN", hide_env_values = true)]
    tracker_token: Option<String>,

    #[arg(short = 'P', long, env = "TRACKER_PROJECT_ID")]
    project_id: Option<u64>,

    /// Pivotal Tracker API base URL
    #[arg(long, env = "TRACKER_API_URL")]
    tracker_url: Option<String>,

    /// Seconds to sleep between passes
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Stop after this many passes
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    max_passes: Option<usize>,

    /// Run a single pass and exit
    #[arg(long, default_value_t = false, conflicts_with = "max_passes")]
    once: bool,
}

/// Settings resolved from flags, environment and the config file.
#[derive(Debug)]
struct Settings {
    host: String,
    team: String,
    concourse_token: Option<Token>,
    tracker_url: String,
    tracker_token: Token,
    project_id: u64,
    interval: Duration,
    max_passes: Option<usize>,
}

impl Cli {
    fn resolve(&self, config: &Config) -> Result<Settings> {
        let host = self
            .concourse_host
            .clone()
            .or_else(|| config.concourse.host.clone())
            .context("Concourse host is required (--concourse-host or CONCOURSE_HOST)")?;

        let tracker_token = self
            .tracker_token
            .clone()
            .or_else(|| config.tracker.token.clone())
            .map(Token::from)
            .context("Tracker API token is required (--tracker-token or TRACKER_API_TOKEN)")?;

        let project_id = self
            .project_id
            .or(config.tracker.project_id)
            .context("Tracker project id is required (--project-id or TRACKER_PROJECT_ID)")?;

        let max_passes = if self.once {
            Some(1)
        } else {
            self.max_passes.or(config.schedule.max_passes)
        };

        Ok(Settings {
            host,
            team: self
                .team
                .clone()
                .unwrap_or_else(|| config.concourse.team.clone()),
            concourse_token: self
                .concourse_token
                .clone()
                .or_else(|| config.concourse.token.clone())
                .map(Token::from),
            tracker_url: self
                .tracker_url
                .clone()
                .unwrap_or_else(|| config.tracker.api_url.clone()),
            tracker_token,
            project_id,
            interval: Duration::from_secs(
                self.interval_secs.unwrap_or(config.schedule.interval_secs),
            ),
            max_passes,
        })
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let settings = self.resolve(&config)?;
        let policy = config.http.policy();

        let strategy = parse_grouping(&config.grouping);
        info!(
            "Watching team {} on {} with {} grouping rules",
            settings.team,
            settings.host,
            strategy.rules().len()
        );
        for rule in strategy.rules() {
            debug!("Grouping {} under {:?}", rule.pattern(), rule.label());
        }

        let jobs = ConcourseClient::new(
            &settings.host,
            &settings.team,
            settings.concourse_token.as_ref(),
            policy.clone(),
        )?;
        let tracker = TrackerClient::new(&settings.tracker_url, &settings.tracker_token, policy)?;

        let groomer = Groomer {
            strategy,
            host: settings.host,
            project_id: settings.project_id,
            jobs: Arc::new(jobs),
            tracker: Arc::new(tracker),
            interval: settings.interval,
            max_passes: settings.max_passes,
        };

        groomer.run().await;
        Ok(())
    }
}
