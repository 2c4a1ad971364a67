use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::grouping::GroupingStrategy;
use crate::providers::{IssueTracker, JobSource};
use crate::reconcile::{run_pass, PassReport};

/// Polls the job source and keeps the tracker in line with failing builds.
pub struct Groomer {
    pub strategy: GroupingStrategy,
    /// Concourse host, prefixed to build URLs in story comments.
    pub host: String,
    pub project_id: u64,
    pub jobs: Arc<dyn JobSource>,
    pub tracker: Arc<dyn IssueTracker>,
    pub interval: Duration,
    /// Stop after this many passes. Runs forever when `None`.
    pub max_passes: Option<usize>,
}

impl Groomer {
    /// Runs a single pass.
    ///
    /// A job source failure is logged and yields an empty pass, so the next
    /// poll gets another chance.
    pub async fn pass(&self) -> PassReport {
        let observations = match self.jobs.list_failing_observations().await {
            Ok(observations) => observations,
            Err(e) => {
                warn!("Failed to retrieve jobs: {e}");
                Vec::new()
            }
        };

        run_pass(
            observations,
            &self.strategy,
            &self.host,
            self.tracker.as_ref(),
            self.project_id,
        )
        .await
    }

    /// Runs passes until `max_passes` is reached, sleeping `interval` in between.
    ///
    /// Returns the number of passes run.
    pub async fn run(&self) -> usize {
        let mut passes = 0;
        loop {
            self.pass().await;
            passes += 1;

            if self.max_passes.is_some_and(|max| passes >= max) {
                info!("Finished after {passes} passes");
                return passes;
            }

            info!("Sleeping for {:?}...", self.interval);
            tokio::time::sleep(self.interval).await;
        }
    }
}
