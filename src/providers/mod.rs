pub mod concourse;
pub mod http;
pub mod tracker;

use async_trait::async_trait;

use crate::error::Result;

use concourse::FailureObservation;
use tracker::{Comment, Story};

/// Source of failing builds, e.g. a Concourse team.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Failed most-recent builds of all jobs in active pipelines.
    async fn list_failing_observations(&self) -> Result<Vec<FailureObservation>>;
}

/// Issue tracker the bot files stories in.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Stories in `project_id` matching the tracker-specific `filter` expression.
    async fn list_stories(&self, project_id: u64, filter: &str) -> Result<Vec<Story>>;

    /// Creates `story` and returns it with its assigned id.
    async fn create_story(&self, project_id: u64, story: &Story) -> Result<Story>;

    async fn list_comments(&self, project_id: u64, story_id: u64) -> Result<Vec<Comment>>;

    async fn add_comment(&self, project_id: u64, story_id: u64, text: &str) -> Result<()>;
}
