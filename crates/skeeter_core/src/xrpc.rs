/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use skeeter_protocol::{
    AtUri, CreateSessionRequest, CreateSessionResponse, DeleteRecordRequest, FeedResponse,
    GetLikesResponse, GetPostsResponse, ListBlobsResponse, PostView, NSID_LIKE, NSID_POST,
    NSID_REPOST,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use urlencoding::encode;

use crate::client::{ContentClient, Page, RepoSource, DETAIL_BATCH_MAX};
use crate::error::{Result, SkeeterError};
use crate::http_retry::send_with_retry;
use crate::run_metrics::RunMetrics;

const ATTEMPTS: u32 = 3;
const JSON: &str = "application/json";

/// Authenticated XRPC session against a PDS.
pub struct XrpcClient {
    http: reqwest::Client,
    service: String,
    session: CreateSessionResponse,
    metrics: Arc<RunMetrics>,
}

impl XrpcClient {
    pub async fn login(
        service: &str,
        identifier: &str,
        password: &str,
        timeout: Duration,
        metrics: Arc<RunMetrics>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        let service = service.trim().trim_end_matches('/').to_string();
        let url = format!("{service}/xrpc/com.atproto.server.createSession");
        let body = CreateSessionRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };
        let resp = send_with_retry(
            || with_agent(http.post(&url)).header(ACCEPT, JSON).json(&body),
            ATTEMPTS,
            &metrics,
        )
            .await
            .with_context(|| format!("login to {service}"))?
            .error_for_status()
            .with_context(|| format!("login rejected by {service}"))?;
        let session = resp
            .json::<CreateSessionResponse>()
            .await
            .context("parse session")?;
        debug!(did = %session.did, handle = %session.handle, "session created");
        Ok(Self {
            http,
            service,
            session,
            metrics,
        })
    }

    fn url(&self, nsid: &str, query: &[(&str, &str)]) -> String {
        let qs = query
            .iter()
            .map(|(k, v)| format!("{k}={}", encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        if qs.is_empty() {
            format!("{}/xrpc/{nsid}", self.service)
        } else {
            format!("{}/xrpc/{nsid}?{qs}", self.service)
        }
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        with_agent(req).bearer_auth(&self.session.access_jwt)
    }

    async fn get(&self, nsid: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = self.url(nsid, query);
        let accept = accept_for(nsid);
        let resp = send_with_retry(
            || self.authed(self.http.get(&url)).header(ACCEPT, accept),
            ATTEMPTS,
            &self.metrics,
        )
            .await
            .map_err(|e| SkeeterError::transport(nsid, e))?;
        check_status(nsid, resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, nsid: &str, query: &[(&str, &str)]) -> Result<T> {
        self.get(nsid, query)
            .await?
            .json::<T>()
            .await
            .map_err(|e| SkeeterError::transport(nsid, e))
    }

    async fn get_bytes(&self, nsid: &str, query: &[(&str, &str)]) -> Result<Bytes> {
        self.get(nsid, query)
            .await?
            .bytes()
            .await
            .map_err(|e| SkeeterError::transport(nsid, e))
    }

    /// Deletes the record named by `reference` from `collection`; the repo
    /// and rkey come from the reference URI.
    async fn delete_record(&self, reference: &str, collection: &str) -> Result<()> {
        let nsid = "com.atproto.repo.deleteRecord";
        let parsed = AtUri::parse(reference).ok_or_else(|| SkeeterError::MalformedRecord {
            uri: reference.to_string(),
            reason: "not an at:// uri".to_string(),
        })?;
        let rkey = parsed.rkey.ok_or_else(|| SkeeterError::MalformedRecord {
            uri: reference.to_string(),
            reason: "missing record key".to_string(),
        })?;
        let body = DeleteRecordRequest {
            repo: parsed.authority,
            collection: collection.to_string(),
            rkey,
        };
        let url = self.url(nsid, &[]);
        let resp = send_with_retry(
            || {
                self.authed(self.http.post(&url))
                    .header(ACCEPT, JSON)
                    .json(&body)
            },
            ATTEMPTS,
            &self.metrics,
        )
        .await
        .map_err(|e| SkeeterError::transport(nsid, e))?;
        check_status(nsid, resp).await?;
        Ok(())
    }

    async fn feed_page(
        &self,
        nsid: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<PostView>> {
        let limit = limit.to_string();
        let mut query = vec![("actor", self.session.did.as_str()), ("limit", limit.as_str())];
        if let Some(c) = cursor.filter(|c| !c.is_empty()) {
            query.push(("cursor", c));
        }
        let resp: FeedResponse = self.get_json(nsid, &query).await?;
        Ok(Page::new(
            resp.feed.into_iter().map(|f| f.post).collect(),
            resp.cursor,
        ))
    }
}

#[async_trait]
impl ContentClient for XrpcClient {
    fn actor_did(&self) -> &str {
        &self.session.did
    }

    fn actor_handle(&self) -> &str {
        &self.session.handle
    }

    async fn fetch_own_feed(&self, cursor: Option<&str>, limit: u32) -> Result<Page<PostView>> {
        self.feed_page("app.bsky.feed.getAuthorFeed", cursor, limit)
            .await
    }

    async fn fetch_own_likes(&self, cursor: Option<&str>, limit: u32) -> Result<Page<PostView>> {
        self.feed_page("app.bsky.feed.getActorLikes", cursor, limit)
            .await
    }

    async fn fetch_likes_of(
        &self,
        uri: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<String>> {
        let limit = limit.to_string();
        let mut query = vec![("uri", uri), ("limit", limit.as_str())];
        if let Some(c) = cursor.filter(|c| !c.is_empty()) {
            query.push(("cursor", c));
        }
        let resp: GetLikesResponse = self.get_json("app.bsky.feed.getLikes", &query).await?;
        Ok(Page::new(
            resp.likes.into_iter().map(|l| l.actor.did).collect(),
            resp.cursor,
        ))
    }

    async fn fetch_details(&self, uris: &[String]) -> Result<Vec<PostView>> {
        if uris.len() > DETAIL_BATCH_MAX {
            return Err(SkeeterError::BatchTooLarge {
                max: DETAIL_BATCH_MAX,
                got: uris.len(),
            });
        }
        if uris.is_empty() {
            return Ok(Vec::new());
        }
        let query = uris.iter().map(|u| ("uris", u.as_str())).collect::<Vec<_>>();
        let resp: GetPostsResponse = self.get_json("app.bsky.feed.getPosts", &query).await?;
        Ok(resp.posts)
    }

    async fn unlike(&self, like_ref: &str) -> Result<()> {
        self.delete_record(like_ref, NSID_LIKE).await
    }

    async fn unrepost(&self, repost_ref: &str) -> Result<()> {
        self.delete_record(repost_ref, NSID_REPOST).await
    }

    async fn delete_post(&self, uri: &str) -> Result<()> {
        self.delete_record(uri, NSID_POST).await
    }
}

#[async_trait]
impl RepoSource for XrpcClient {
    async fn fetch_repo(&self) -> Result<Bytes> {
        self.get_bytes("com.atproto.sync.getRepo", &[("did", self.session.did.as_str())])
            .await
    }

    async fn list_blobs(&self, cursor: Option<&str>) -> Result<Page<String>> {
        let mut query = vec![("did", self.session.did.as_str())];
        if let Some(c) = cursor.filter(|c| !c.is_empty()) {
            query.push(("cursor", c));
        }
        let resp: ListBlobsResponse = self.get_json("com.atproto.sync.listBlobs", &query).await?;
        Ok(Page::new(resp.cids, resp.cursor))
    }

    async fn fetch_blob(&self, cid: &str) -> Result<Bytes> {
        self.get_bytes(
            "com.atproto.sync.getBlob",
            &[("did", self.session.did.as_str()), ("cid", cid)],
        )
        .await
    }
}

fn with_agent(req: RequestBuilder) -> RequestBuilder {
    req.header(USER_AGENT, format!("skeeter/{}", env!("CARGO_PKG_VERSION")))
}

/// The sync endpoints answer with raw bytes, everything else with JSON.
fn accept_for(nsid: &str) -> &'static str {
    match nsid {
        "com.atproto.sync.getRepo" => "application/vnd.ipld.car",
        "com.atproto.sync.getBlob" => "*/*",
        _ => JSON,
    }
}

async fn check_status(nsid: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let body = body.chars().take(200).collect::<String>();
    Err(SkeeterError::transport(nsid, format!("http {status}: {body}")))
}
