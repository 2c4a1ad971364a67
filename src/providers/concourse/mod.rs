mod client;
mod types;

pub use client::ConcourseClient;
pub use types::{Build, BuildStatus, FailureObservation};
