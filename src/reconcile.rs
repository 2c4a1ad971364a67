use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::error::{Result, TrackerBotError};
use crate::grouping::{classify, GroupingStrategy};
use crate::providers::concourse::FailureObservation;
use crate::providers::tracker::{Story, BACKLOG_ANCHOR_FILTER, OPEN_BROKEN_BUILD_FILTER};
use crate::providers::IssueTracker;

/// What `reconcile` did to bring the tracker in line with one failed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No open story existed for the incident; one was filed.
    Created { story_id: Option<u64> },
    /// The build was added as a comment on the incident's open story.
    Commented { story_id: u64 },
    /// The open story already mentions this build.
    AlreadyReported { story_id: u64 },
}

/// Canonical reference to a build, used both as comment text and as the
/// "already reported" marker.
pub fn build_reference_url(host: &str, build_url: &str) -> String {
    format!("{host}/{build_url}")
}

/// Makes sure the open story for `incident_key` mentions `build_url`.
///
/// Every decision is taken from a fresh read of the tracker:
///
/// 1. Open broken-build stories are listed and the first one named
///    `incident_key` that carries an id is used.
/// 2. If it exists and already has a comment equal to `build_url`, nothing is
///    written. Otherwise the URL is added as a comment.
/// 3. If no story exists, a chore is created at the top of the backlog with
///    `build_url` as its first comment.
///
/// # Errors
///
/// Any tracker call failure is returned as is. When no unstarted non-release
/// story exists to place the new story in front of, returns
/// [`TrackerBotError::NoAnchorStory`].
pub async fn reconcile<T>(
    incident_key: &str,
    build_url: &str,
    tracker: &T,
    project_id: u64,
) -> Result<ReconcileOutcome>
where
    T: IssueTracker + ?Sized,
{
    debug!("Checking for a previously created story named {incident_key:?}...");
    let stories = tracker
        .list_stories(project_id, OPEN_BROKEN_BUILD_FILTER)
        .await?;

    if let Some(story_id) = stories
        .iter()
        .filter(|story| story.name == incident_key)
        .find_map(|story| story.id)
    {
        debug!("Found story {story_id}");
        return comment_once(build_url, tracker, project_id, story_id).await;
    }

    info!("Creating a new story {incident_key:?}...");
    let anchor_id = tracker
        .list_stories(project_id, BACKLOG_ANCHOR_FILTER)
        .await?
        .first()
        .and_then(|story| story.id)
        .ok_or(TrackerBotError::NoAnchorStory { project_id })?;
    debug!("Top of backlog is story {anchor_id}");

    let created = tracker
        .create_story(
            project_id,
            &Story::broken_build_chore(incident_key, build_url, anchor_id),
        )
        .await?;

    match created.id {
        Some(id) => info!("New story created {id}"),
        None => warn!("Tracker did not return an id for new story {incident_key:?}"),
    }

    Ok(ReconcileOutcome::Created {
        story_id: created.id,
    })
}

async fn comment_once<T>(
    build_url: &str,
    tracker: &T,
    project_id: u64,
    story_id: u64,
) -> Result<ReconcileOutcome>
where
    T: IssueTracker + ?Sized,
{
    let comments = tracker.list_comments(project_id, story_id).await?;
    if comments.iter().any(|comment| comment.text == build_url) {
        debug!("Story {story_id} already mentions {build_url}");
        return Ok(ReconcileOutcome::AlreadyReported { story_id });
    }

    info!("Commenting on story {story_id}...");
    tracker.add_comment(project_id, story_id, build_url).await?;
    Ok(ReconcileOutcome::Commented { story_id })
}

/// Result of reconciling a single failed build.
#[derive(Debug)]
pub struct ObservationResult {
    pub job_url: String,
    pub incident_key: String,
    pub build_url: String,
    pub result: Result<ReconcileOutcome>,
}

/// Per-observation results of one polling pass, in input order.
#[derive(Debug)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ObservationResult>,
}

impl PassReport {
    fn count(&self, predicate: impl Fn(&ReconcileOutcome) -> bool) -> usize {
        self.results
            .iter()
            .filter(|r| r.result.as_ref().is_ok_and(&predicate))
            .count()
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, ReconcileOutcome::Created { .. }))
    }

    pub fn commented(&self) -> usize {
        self.count(|o| matches!(o, ReconcileOutcome::Commented { .. }))
    }

    pub fn already_reported(&self) -> usize {
        self.count(|o| matches!(o, ReconcileOutcome::AlreadyReported { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &ObservationResult> {
        self.results.iter().filter(|r| r.result.is_err())
    }
}

/// Reconciles every observation in order.
///
/// A failing observation is logged and recorded in the report; it never stops
/// the remaining observations from being processed.
pub async fn run_pass<T>(
    observations: Vec<FailureObservation>,
    strategy: &GroupingStrategy,
    host: &str,
    tracker: &T,
    project_id: u64,
) -> PassReport
where
    T: IssueTracker + ?Sized,
{
    let started_at = Utc::now();
    let mut results = Vec::with_capacity(observations.len());

    for FailureObservation { job_url, build } in observations {
        let build_url = build_reference_url(host, &build.url);
        let incident_key = classify(
            &build.pipeline_name,
            &build.job_name,
            build.status.as_str(),
            strategy,
        );
        info!(
            "{}/{} failed, reporting under {incident_key:?}",
            build.pipeline_name, build.job_name
        );

        let result = reconcile(&incident_key, &build_url, tracker, project_id).await;
        if let Err(e) = &result {
            warn!("Failed to report {build_url} for {job_url}: {e}");
        }

        results.push(ObservationResult {
            job_url,
            incident_key,
            build_url,
            result,
        });
    }

    let report = PassReport {
        started_at,
        finished_at: Utc::now(),
        results,
    };

    info!(
        "Pass complete: {} created, {} commented, {} already reported, {} failed",
        report.created(),
        report.commented(),
        report.already_reported(),
        report.failures().count()
    );

    report
}
