/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use bytes::Bytes;
use skeeter_protocol::PostView;

use crate::error::Result;

/// Upper bound on uris per `fetch_details` call.
pub const DETAIL_BATCH_MAX: usize = 25;
/// Page size used for feed, likes and liker listings.
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque server cursor; `None` or empty means no further pages.
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, cursor: Option<String>) -> Self {
        Self { items, cursor }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }
}

/// What the retention engine needs from the social network. Every
/// operation fails with `SkeeterError::Transport` on network or non-2xx
/// failure.
#[async_trait]
pub trait ContentClient: Send + Sync {
    fn actor_did(&self) -> &str;

    fn actor_handle(&self) -> &str;

    /// Posts and reposts on the actor's own feed.
    async fn fetch_own_feed(&self, cursor: Option<&str>, limit: u32) -> Result<Page<PostView>>;

    /// Posts the actor has liked.
    async fn fetch_own_likes(&self, cursor: Option<&str>, limit: u32) -> Result<Page<PostView>>;

    /// DIDs of the accounts that liked `uri`.
    async fn fetch_likes_of(
        &self,
        uri: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<String>>;

    /// Current views of up to [`DETAIL_BATCH_MAX`] posts. Posts that no
    /// longer exist are absent from the result.
    async fn fetch_details(&self, uris: &[String]) -> Result<Vec<PostView>>;

    async fn unlike(&self, like_ref: &str) -> Result<()>;

    async fn unrepost(&self, repost_ref: &str) -> Result<()>;

    async fn delete_post(&self, uri: &str) -> Result<()>;
}

/// Export endpoints used only for archival.
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn fetch_repo(&self) -> Result<Bytes>;

    async fn list_blobs(&self, cursor: Option<&str>) -> Result<Page<String>>;

    async fn fetch_blob(&self, cid: &str) -> Result<Bytes>;
}
