pub mod bluesky;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub author: String,
    /// Handle including the leading `@`.
    pub handle: String,
    pub text: String,
    pub created_at: DateTime<FixedOffset>,
    pub reposted_by: Option<String>,
}

/// Anything that can hand back the most recent raw timeline items,
/// newest first.
#[async_trait]
pub trait TimelineSource: Send + Sync {
    async fn fetch_timeline(&self, limit: u32) -> Result<Vec<serde_json::Value>>;
}
