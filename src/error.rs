use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerBotError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("API request failed with status {status} after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Malformed response: {0}")]
    Decoding(#[from] serde_json::Error),

    #[error("No unstarted non-release story in project {project_id} to place a new story before")]
    NoAnchorStory { project_id: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TrackerBotError>;
