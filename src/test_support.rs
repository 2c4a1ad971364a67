//! In-memory collaborators for exercising the reconciler and the polling loop.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, TrackerBotError};
use crate::providers::concourse::{Build, BuildStatus, FailureObservation};
use crate::providers::tracker::{
    Comment, Label, Story, BACKLOG_ANCHOR_FILTER, BROKEN_BUILD_LABEL, OPEN_BROKEN_BUILD_FILTER,
};
use crate::providers::{IssueTracker, JobSource};

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerCall {
    ListStories(String),
    CreateStory(Story),
    ListComments(u64),
    AddComment(u64, String),
}

#[derive(Default)]
struct TrackerState {
    stories: Vec<Story>,
    comments: HashMap<u64, Vec<Comment>>,
    next_id: u64,
    calls: Vec<TrackerCall>,
    failing_names: HashSet<String>,
}

/// Tracker backed by a story list, with a rough emulation of the two filters
/// the reconciler uses.
#[derive(Default)]
pub struct FakeTracker {
    state: Mutex<TrackerState>,
}

impl FakeTracker {
    pub fn with_stories(stories: Vec<Story>) -> Self {
        let tracker = Self::default();
        {
            let mut state = tracker.state.lock().unwrap();
            state.next_id = 1000;
            state.stories = stories;
        }
        tracker
    }

    /// Any mutating call touching a story with this name fails.
    pub fn fail_for(self, story_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_names
            .insert(story_name.to_string());
        self
    }

    pub fn with_comment(self, story_id: u64, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .comments
            .entry(story_id)
            .or_default()
            .push(Comment {
                text: text.to_string(),
            });
        self
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn created(&self) -> Vec<Story> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TrackerCall::CreateStory(story) => Some(story),
                _ => None,
            })
            .collect()
    }

    pub fn added_comments(&self) -> Vec<(u64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TrackerCall::AddComment(id, text) => Some((id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn stories(&self) -> Vec<Story> {
        self.state.lock().unwrap().stories.clone()
    }

    pub fn comments(&self, story_id: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .comments
            .get(&story_id)
            .map(|comments| comments.iter().map(|c| c.text.clone()).collect())
            .unwrap_or_default()
    }
}

fn injected_failure() -> TrackerBotError {
    TrackerBotError::Api {
        status: 500,
        message: "injected failure".to_string(),
    }
}

fn matches_filter(story: &Story, filter: &str) -> bool {
    let state = story.current_state.as_deref().unwrap_or_default();
    match filter {
        OPEN_BROKEN_BUILD_FILTER => {
            state != "accepted" && story.labels.iter().any(|l| l.name == BROKEN_BUILD_LABEL)
        }
        BACKLOG_ANCHOR_FILTER => {
            story.story_type.as_deref() != Some("release") && state == "unstarted"
        }
        _ => true,
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn list_stories(&self, _project_id: u64, filter: &str) -> Result<Vec<Story>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(TrackerCall::ListStories(filter.to_string()));
        Ok(state
            .stories
            .iter()
            .filter(|story| matches_filter(story, filter))
            .cloned()
            .collect())
    }

    async fn create_story(&self, _project_id: u64, story: &Story) -> Result<Story> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(TrackerCall::CreateStory(story.clone()));
        if state.failing_names.contains(&story.name) {
            return Err(injected_failure());
        }

        state.next_id += 1;
        let id = state.next_id;
        let created = Story {
            id: Some(id),
            before_id: None,
            comments: Vec::new(),
            ..story.clone()
        };
        state.comments.insert(id, story.comments.clone());

        let position = story
            .before_id
            .and_then(|before| state.stories.iter().position(|s| s.id == Some(before)))
            .unwrap_or(state.stories.len());
        state.stories.insert(position, created.clone());

        Ok(created)
    }

    async fn list_comments(&self, _project_id: u64, story_id: u64) -> Result<Vec<Comment>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(TrackerCall::ListComments(story_id));
        Ok(state.comments.get(&story_id).cloned().unwrap_or_default())
    }

    async fn add_comment(&self, _project_id: u64, story_id: u64, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(TrackerCall::AddComment(story_id, text.to_string()));

        let name = state
            .stories
            .iter()
            .find(|s| s.id == Some(story_id))
            .map(|s| s.name.clone());
        if name.is_some_and(|name| state.failing_names.contains(&name)) {
            return Err(injected_failure());
        }

        state.comments.entry(story_id).or_default().push(Comment {
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Job source that hands out one prepared batch per call.
#[derive(Default)]
pub struct FakeJobSource {
    batches: Mutex<VecDeque<Result<Vec<FailureObservation>>>>,
    calls: Mutex<usize>,
}

impl FakeJobSource {
    pub fn new(batches: Vec<Result<Vec<FailureObservation>>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl JobSource for FakeJobSource {
    async fn list_failing_observations(&self) -> Result<Vec<FailureObservation>> {
        *self.calls.lock().unwrap() += 1;
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn failed(pipeline: &str, job: &str, build_url: &str) -> FailureObservation {
    FailureObservation {
        job_url: format!("http://ci/api/v1/teams/main/pipelines/{pipeline}/jobs/{job}"),
        build: Build {
            status: BuildStatus::Failed,
            job_name: job.to_string(),
            pipeline_name: pipeline.to_string(),
            url: build_url.to_string(),
        },
    }
}

/// A story already sitting in the tracker.
pub fn story(id: u64, name: &str, state: &str, story_type: &str, labels: &[&str]) -> Story {
    Story {
        name: name.to_string(),
        id: Some(id),
        current_state: Some(state.to_string()),
        labels: labels
            .iter()
            .map(|name| Label {
                name: (*name).to_string(),
            })
            .collect(),
        story_type: Some(story_type.to_string()),
        before_id: None,
        comments: Vec::new(),
    }
}

/// The top-of-backlog feature new stories get placed in front of.
pub fn backlog_top() -> Story {
    story(2, "ship the thing", "unstarted", "feature", &[])
}
