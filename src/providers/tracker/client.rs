use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::auth::Token;
use crate::error::{Result, TrackerBotError};
use crate::providers::http::{HttpClient, HttpPolicy};
use crate::providers::IssueTracker;

use super::types::{Comment, Story};

pub const DEFAULT_TRACKER_API_URL: &str = "https://www.pivotaltracker.com/services/v5";

const TRACKER_TOKEN_HEADER: &str = "x-trackertoken";

/// Pivotal Tracker v5 REST client.
pub struct TrackerClient {
    http: HttpClient,
    api_url: Url,
}

impl TrackerClient {
    /// Creates a client for the Tracker API rooted at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the token is not a valid header value.
    pub fn new(api_url: &str, token: &Token, policy: HttpPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(token.as_str())
            .map_err(|e| TrackerBotError::Config(format!("Invalid Tracker token: {e}")))?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static(TRACKER_TOKEN_HEADER), value);

        // Trailing slash so that `join` appends instead of replacing the last segment
        let api_url = Url::parse(&format!("{}/", api_url.trim_end_matches('/')))
            .map_err(|e| TrackerBotError::Config(format!("Invalid Tracker API URL: {e}")))?;

        Ok(Self {
            http: HttpClient::new(policy, headers)?,
            api_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| TrackerBotError::Config(format!("Invalid Tracker URL {path}: {e}")))
    }
}

#[async_trait]
impl IssueTracker for TrackerClient {
    async fn list_stories(&self, project_id: u64, filter: &str) -> Result<Vec<Story>> {
        let mut url = self.endpoint(&format!("projects/{project_id}/stories"))?;
        if !filter.is_empty() {
            url.query_pairs_mut().append_pair("filter", filter);
        }
        debug!("Listing stories: {url}");

        self.http.send_json(|c| c.get(url.clone())).await
    }

    async fn create_story(&self, project_id: u64, story: &Story) -> Result<Story> {
        let url = self.endpoint(&format!("projects/{project_id}/stories"))?;
        debug!("Creating story {:?} in project {project_id}", story.name);

        self.http
            .send_json_write(|c| c.post(url.clone()).json(story))
            .await
    }

    async fn list_comments(&self, project_id: u64, story_id: u64) -> Result<Vec<Comment>> {
        let url = self.endpoint(&format!(
            "projects/{project_id}/stories/{story_id}/comments"
        ))?;

        self.http.send_json(|c| c.get(url.clone())).await
    }

    async fn add_comment(&self, project_id: u64, story_id: u64, text: &str) -> Result<()> {
        let url = self.endpoint(&format!(
            "projects/{project_id}/stories/{story_id}/comments"
        ))?;
        let comment = Comment {
            text: text.to_string(),
        };

        self.http
            .send_write(|c| c.post(url.clone()).json(&comment))
            .await?;
        Ok(())
    }
}
