use async_trait::async_trait;
use indexmap::IndexSet;
use log::{debug, info, warn};
use reqwest::header::HeaderMap;
use url::Url;

use crate::auth::Token;
use crate::error::{Result, TrackerBotError};
use crate::providers::http::{HttpClient, HttpPolicy};
use crate::providers::JobSource;

use super::types::{BuildStatus, FailureObservation, Job, Pipeline};

/// Concourse API client for one team.
pub struct ConcourseClient {
    http: HttpClient,
    base_url: Url,
    team: String,
}

impl ConcourseClient {
    /// Creates a client for `team` on the Concourse server at `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not a valid base URL.
    pub fn new(host: &str, team: &str, token: Option<&Token>, policy: HttpPolicy) -> Result<Self> {
        let base_url = Url::parse(host)
            .map_err(|e| TrackerBotError::Config(format!("Invalid Concourse host: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TrackerBotError::Config(format!(
                "Invalid Concourse host: {host}"
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = format!("Bearer {}", token.as_str())
                .parse::<reqwest::header::HeaderValue>()
                .map_err(|e| TrackerBotError::Config(format!("Invalid Concourse token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        Ok(Self {
            http: HttpClient::new(policy, headers)?,
            base_url,
            team: team.to_string(),
        })
    }

    /// Builds `{host}/api/v1/teams/{team}/pipelines[/...]`, encoding each segment.
    fn pipelines_url(&self, rest: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1", "teams", self.team.as_str(), "pipelines"])
                .extend(rest);
        }
        url
    }

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        let url = self.pipelines_url(&[]);
        self.http.send_json(|c| c.get(url.clone())).await
    }

    async fn list_pipeline_jobs(&self, pipeline: &str) -> Result<Vec<Job>> {
        let url = self.pipelines_url(&[pipeline, "jobs"]);
        self.http.send_json(|c| c.get(url.clone())).await
    }

    /// Returns the job-status URL of every job in the team's unpaused pipelines.
    ///
    /// Jobs that appear in several groups are listed once, in first-seen order.
    /// A pipeline whose jobs cannot be listed is skipped.
    pub async fn job_urls(&self) -> Result<Vec<String>> {
        let pipelines = self.list_pipelines().await?;
        let mut urls = IndexSet::new();

        for pipeline in pipelines {
            if pipeline.paused {
                debug!("Skipping paused pipeline {}", pipeline.name);
                continue;
            }

            let groups = pipeline.groups.unwrap_or_default();
            let job_names: Vec<String> = if groups.is_empty() {
                match self.list_pipeline_jobs(&pipeline.name).await {
                    Ok(jobs) => jobs.into_iter().map(|job| job.name).collect(),
                    Err(e) => {
                        warn!("Skipping pipeline {}: {e}", pipeline.name);
                        continue;
                    }
                }
            } else {
                groups.into_iter().flat_map(|group| group.jobs).collect()
            };

            for job in job_names {
                urls.insert(
                    self.pipelines_url(&[pipeline.name.as_str(), "jobs", job.as_str()])
                        .to_string(),
                );
            }
        }

        Ok(urls.into_iter().collect())
    }

    async fn fetch_job(&self, url: &str) -> Result<Job> {
        self.http.send_json(|c| c.get(url)).await
    }
}

#[async_trait]
impl JobSource for ConcourseClient {
    async fn list_failing_observations(&self) -> Result<Vec<FailureObservation>> {
        info!("Retrieving jobs for team {}...", self.team);
        let urls = self.job_urls().await?;
        info!("Checking {} jobs for build failures...", urls.len());

        let mut observations = Vec::new();
        for url in urls {
            debug!("Checking {url}...");

            let job = match self.fetch_job(&url).await {
                Ok(job) => job,
                Err(e) => {
                    warn!("Skipping {url}: {e}");
                    continue;
                }
            };

            match job.finished_build {
                Some(build) if build.status == BuildStatus::Failed => {
                    debug!("{}/{} has failed", build.pipeline_name, build.job_name);
                    observations.push(FailureObservation {
                        job_url: url,
                        build,
                    });
                }
                Some(_) | None => {}
            }
        }

        Ok(observations)
    }
}
