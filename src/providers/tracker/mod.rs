mod client;
mod types;

pub use client::{TrackerClient, DEFAULT_TRACKER_API_URL};
pub use types::{
    Comment, Label, Story, BACKLOG_ANCHOR_FILTER, BROKEN_BUILD_LABEL, OPEN_BROKEN_BUILD_FILTER,
};
