use serde::{Deserialize, Serialize};

/// Label attached to every story the bot files.
pub const BROKEN_BUILD_LABEL: &str = "broken build";

/// Stories eligible for reuse: not yet accepted and labelled as a broken build.
pub const OPEN_BROKEN_BUILD_FILTER: &str = r#"-state:accepted label:"broken build""#;

/// Unstarted non-release stories, used to find the top of the backlog.
pub const BACKLOG_ANCHOR_FILTER: &str = "-type:release state:unstarted";

pub const STORY_TYPE_CHORE: &str = "chore";
pub const STATE_UNSTARTED: &str = "unstarted";

/// A Pivotal Tracker story.
///
/// The same shape is used for listing and for creation; empty fields are
/// left out of request bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_type: Option<String>,
    /// Story the new story is placed in front of. Only used on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

impl Story {
    /// The chore filed for a new incident, placed before `anchor_id`.
    pub fn broken_build_chore(name: &str, comment: &str, anchor_id: u64) -> Self {
        Self {
            name: name.to_string(),
            id: None,
            current_state: Some(STATE_UNSTARTED.to_string()),
            labels: vec![Label {
                name: BROKEN_BUILD_LABEL.to_string(),
            }],
            story_type: Some(STORY_TYPE_CHORE.to_string()),
            before_id: Some(anchor_id),
            comments: vec![Comment {
                text: comment.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}
