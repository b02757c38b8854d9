/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NSID_POST: &str = "app.bsky.feed.post";
pub const NSID_LIKE: &str = "app.bsky.feed.like";
pub const NSID_REPOST: &str = "app.bsky.feed.repost";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProfileViewBasic {
    pub did: String,
    pub handle: String,
    #[serde(default, rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ViewerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repost: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExternalView {
    pub uri: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Only the `external` arm matters to us; every other embed kind
/// (images, quoted records, video) deserializes with `external: None`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct EmbedView {
    #[serde(default, rename = "$type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalView>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: ProfileViewBasic,
    /// Schema-agnostic record body; `createdAt` and `text` are read from it.
    pub record: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<EmbedView>,
    #[serde(default, rename = "repostCount")]
    pub repost_count: u64,
    #[serde(default)]
    pub viewer: ViewerState,
}

impl PostView {
    pub fn created_at(&self) -> Option<&str> {
        self.record.get("createdAt").and_then(|v| v.as_str())
    }

    pub fn text(&self) -> &str {
        self.record
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FeedViewPost {
    pub post: PostView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FeedResponse {
    #[serde(default)]
    pub cursor: Option<String>,
    pub feed: Vec<FeedViewPost>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LikeView {
    pub actor: ProfileViewBasic,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GetLikesResponse {
    pub uri: String,
    #[serde(default)]
    pub cursor: Option<String>,
    pub likes: Vec<LikeView>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GetPostsResponse {
    pub posts: Vec<PostView>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ListBlobsResponse {
    #[serde(default)]
    pub cursor: Option<String>,
    pub cids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateSessionRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateSessionResponse {
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    #[serde(rename = "refreshJwt")]
    pub refresh_jwt: String,
    pub handle: String,
    pub did: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeleteRecordRequest {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
}

/// `at://<authority>/<collection>/<rkey>`; collection and rkey are optional
/// so that bare repo URIs still parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub authority: String,
    pub collection: Option<String>,
    pub rkey: Option<String>,
}

impl AtUri {
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.trim().strip_prefix("at://")?;
        let mut parts = rest.splitn(3, '/');
        let authority = parts.next().filter(|v| !v.is_empty())?.to_string();
        let collection = parts.next().filter(|v| !v.is_empty()).map(str::to_string);
        let rkey = parts
            .next()
            .map(|v| v.trim_end_matches('/'))
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Some(Self {
            authority,
            collection,
            rkey,
        })
    }
}

impl std::fmt::Display for AtUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "at://{}", self.authority)?;
        if let Some(c) = &self.collection {
            write!(f, "/{c}")?;
            if let Some(r) = &self.rkey {
                write!(f, "/{r}")?;
            }
        }
        Ok(())
    }
}
