/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use skeeter_protocol::PostView;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::archive::{ArchivedRecord, RepositoryArchive};
use crate::client::{ContentClient, PAGE_SIZE};
use crate::error::Result;
use crate::pagination::CursorWalk;

/// Answers "has the authenticated actor liked their own post?".
#[async_trait]
pub trait SelfLikeResolver: Send + Sync {
    async fn is_self_liked(&self, post: &PostView) -> Result<bool>;
}

/// Subject URIs of the actor's likes on their own posts, read once from the
/// repository archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveSelfLikes {
    subjects: HashSet<String>,
}

impl ArchiveSelfLikes {
    pub fn from_uris(uris: impl IntoIterator<Item = String>) -> Self {
        Self {
            subjects: uris.into_iter().collect(),
        }
    }

    /// Keeps like records whose subject lives in `actor_did`'s repository
    /// and whose subject CID still resolves inside the archive; a like that
    /// outlived an edited or deleted post is dropped.
    pub fn from_records(
        archive: &RepositoryArchive,
        records: &[ArchivedRecord<'_>],
        actor_did: &str,
    ) -> Self {
        let mut subjects = HashSet::new();
        for record in records {
            if !record.subject_authored_by(actor_did) {
                continue;
            }
            let subject = match record.subject() {
                Ok(s) => s,
                Err(e) => {
                    warn!("excluding like record: {e}");
                    continue;
                }
            };
            if !archive.contains_cid(&subject.cid) {
                debug!(uri = %subject.uri, "self-like subject no longer in archive");
                continue;
            }
            subjects.insert(subject.uri);
        }
        Self { subjects }
    }

    pub fn from_archive(archive: &RepositoryArchive, actor_did: &str) -> Self {
        let scan = archive.like_records();
        Self::from_records(archive, &scan.records, actor_did)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.subjects.contains(uri)
    }
}

#[async_trait]
impl SelfLikeResolver for ArchiveSelfLikes {
    async fn is_self_liked(&self, post: &PostView) -> Result<bool> {
        Ok(self.contains(&post.uri))
    }
}

/// Pages through a post's likers until the actor shows up. Only the
/// actor's own posts can match.
pub struct LiveSelfLikes {
    client: Arc<dyn ContentClient>,
    max_retries: u32,
}

impl LiveSelfLikes {
    pub fn new(client: Arc<dyn ContentClient>, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
        }
    }
}

#[async_trait]
impl SelfLikeResolver for LiveSelfLikes {
    async fn is_self_liked(&self, post: &PostView) -> Result<bool> {
        let me = self.client.actor_did();
        if post.author.did != me {
            return Ok(false);
        }
        let client = self.client.as_ref();
        let uri = post.uri.as_str();
        let mut walk = CursorWalk::new("likers", self.max_retries);
        while let Some(likers) = walk
            .next_page(|cursor| async move {
                client.fetch_likes_of(uri, cursor.as_deref(), PAGE_SIZE).await
            })
            .await?
        {
            if likers.iter().any(|did| did == me) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
