use crate::feeds::Post;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Deserialize;

const REASON_REPOST: &str = "app.bsky.feed.defs#reasonRepost";

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: PostView,
    // Kept loose: a reason we can't read only costs the repost line.
    reason: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PostView {
    cid: String,
    author: Author,
    record: Record,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    handle: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    text: String,
    created_at: String,
    reply: Option<serde_json::Value>,
}

/// Turn raw `getTimeline` items into posts, keeping upstream order.
/// Replies and items that don't look like a post are dropped silently.
pub fn parse_feed(items: &[serde_json::Value]) -> Vec<Post> {
    items.iter().filter_map(parse_item).collect()
}

fn parse_item(item: &serde_json::Value) -> Option<Post> {
    let view = match FeedViewPost::deserialize(item) {
        Ok(view) => view,
        Err(e) => {
            tracing::trace!("skipping malformed feed item: {}", e);
            return None;
        }
    };

    let record = view.post.record;
    if record.reply.is_some() {
        return None;
    }

    let created_at = match parse_timestamp(&record.created_at) {
        Some(ts) => ts,
        None => {
            tracing::trace!("skipping item with bad createdAt {:?}", record.created_at);
            return None;
        }
    };

    let author = view.post.author;
    let reposted_by = view
        .reason
        .as_ref()
        .and_then(repost_handle)
        .filter(|by| *by != author.handle)
        .map(|by| format!("@{}", by));

    let handle = format!("@{}", author.handle);
    let display_name = author
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| handle.clone());

    Some(Post {
        id: view.post.cid,
        author: display_name,
        handle,
        text: record.text.trim().to_string(),
        created_at,
        reposted_by,
    })
}

/// Handle of the reposting account, if `reason` is a well-formed repost.
fn repost_handle(reason: &serde_json::Value) -> Option<String> {
    if reason.get("$type")?.as_str()? != REASON_REPOST {
        return None;
    }
    reason
        .pointer("/by/handle")?
        .as_str()
        .filter(|handle| !handle.is_empty())
        .map(str::to_string)
}

/// RFC 3339 timestamps pass through; offset-less ones are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}
