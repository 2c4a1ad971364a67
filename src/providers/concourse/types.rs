use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a finished Concourse build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildStatus {
    Succeeded,
    Failed,
    Errored,
    Aborted,
    Pending,
    Started,
    /// Any status this version does not know about, kept verbatim.
    Other(String),
}

impl BuildStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Aborted => "aborted",
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for BuildStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "errored" => Self::Errored,
            "aborted" => Self::Aborted,
            "pending" => Self::Pending,
            "started" => Self::Started,
            _ => Self::Other(value),
        }
    }
}

impl From<BuildStatus> for String {
    fn from(value: BuildStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent finished build of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub status: BuildStatus,
    pub job_name: String,
    pub pipeline_name: String,
    /// Relative URL of this build in the Concourse web UI.
    pub url: String,
}

/// Job status document returned by `/api/v1/teams/{team}/pipelines/{pipeline}/jobs/{job}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub name: String,
    /// `null` for jobs that have never finished a build.
    #[serde(default)]
    pub finished_build: Option<Build>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub groups: Option<Vec<Group>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<String>,
}

/// A failed build together with the job-status URL it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureObservation {
    pub job_url: String,
    pub build: Build,
}
