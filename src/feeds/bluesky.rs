use super::TimelineSource;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TIMELINE_ENDPOINT: &str = "app.bsky.feed.getTimeline";
const CREATE_SESSION_ENDPOINT: &str = "com.atproto.server.createSession";

/// An authenticated XRPC session. Logs in once; the access token is never
/// refreshed, so an expired token surfaces as ordinary fetch failures.
pub struct BskySession {
    base_url: String,
    handle: String,
    did: String,
    access_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    access_jwt: String,
    did: String,
    handle: String,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    feed: Vec<serde_json::Value>,
}

impl std::fmt::Debug for BskySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BskySession")
            .field("base_url", &self.base_url)
            .field("handle", &self.handle)
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

impl BskySession {
    pub async fn login(
        service: &str,
        handle: &str,
        app_password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skyfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Client)?;

        let base_url = format!("{}/xrpc", service.trim_end_matches('/'));
        let url = format!("{}/{}", base_url, CREATE_SESSION_ENDPOINT);

        let response = client
            .post(&url)
            .json(&CreateSessionRequest {
                identifier: handle,
                password: app_password,
            })
            .send()
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("{}: {}", status, body.trim())));
        }

        let session: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("unexpected session response: {}", e)))?;

        tracing::debug!(handle = %session.handle, did = %session.did, "session created");

        Ok(Self {
            base_url,
            handle: session.handle,
            did: session.did,
            access_token: session.access_jwt,
            client,
        })
    }

    /// Handle as reported by the server, which may differ in case or
    /// domain from the identifier used to log in.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    /// Authenticated GET of an XRPC query endpoint.
    pub async fn api_call(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "{} returned {}",
                endpoint,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))
    }
}

#[async_trait]
impl TimelineSource for BskySession {
    async fn fetch_timeline(&self, limit: u32) -> Result<Vec<serde_json::Value>> {
        let body = self
            .api_call(TIMELINE_ENDPOINT, &[("limit", limit.to_string())])
            .await?;
        let timeline: TimelineResponse =
            serde_json::from_value(body).map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(timeline.feed)
    }
}
