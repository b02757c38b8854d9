/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Candidate collection: likes to undo, reposts to undo, own posts to delete.
//!
//! Each flow drains its source completely before returning. Transport errors
//! on a detail batch skip that batch; a page that keeps failing ends the flow
//! with `ExhaustedRetries`. Items whose timestamp or structure cannot be read
//! are excluded with a warning rather than guessed at.

use skeeter_protocol::PostView;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::archive::RepositoryArchive;
use crate::client::{ContentClient, DETAIL_BATCH_MAX, PAGE_SIZE};
use crate::config::RetentionPolicy;
use crate::error::Result;
use crate::pagination::CursorWalk;
use crate::qualifier::PostQualifier;
use crate::run_metrics::RunMetrics;
use crate::self_likes::{ArchiveSelfLikes, SelfLikeResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Unlike,
    Delete,
}

pub struct LikeCollection {
    pub self_likes: ArchiveSelfLikes,
    pub to_unlike: Vec<PostQualifier>,
}

/// The two decision sets handed to the executor.
#[derive(Debug, Default)]
pub struct DecisionSets {
    pub to_unlike: Vec<PostQualifier>,
    pub to_delete: Vec<PostQualifier>,
}

impl DecisionSets {
    /// Own-feed deletions come first, then archive reposts not already
    /// found on the feed.
    pub fn new(
        to_unlike: Vec<PostQualifier>,
        posts: Vec<PostQualifier>,
        reposts: Vec<PostQualifier>,
    ) -> Self {
        Self {
            to_unlike: dedup_by_uri(to_unlike),
            to_delete: dedup_by_uri(posts.into_iter().chain(reposts).collect()),
        }
    }
}

pub fn dedup_by_uri(items: Vec<PostQualifier>) -> Vec<PostQualifier> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|q| seen.insert(q.uri().to_string()))
        .collect()
}

pub struct CollectionPipeline {
    client: Arc<dyn ContentClient>,
    policy: RetentionPolicy,
    max_retries: u32,
    metrics: Arc<RunMetrics>,
}

impl CollectionPipeline {
    pub fn new(
        client: Arc<dyn ContentClient>,
        policy: RetentionPolicy,
        max_retries: u32,
        metrics: Arc<RunMetrics>,
    ) -> Self {
        Self {
            client,
            policy,
            max_retries,
            metrics,
        }
    }

    /// Stale likes from the archive. Likes on the actor's own posts become
    /// the self-like set; the rest are looked up in detail batches, which
    /// also drops posts that no longer exist.
    pub async fn gather_likes(&self, archive: &RepositoryArchive) -> Result<LikeCollection> {
        let me = self.client.actor_did();
        let scan = archive.like_records();
        for _ in 0..scan.dereference_misses {
            self.metrics.dereference_miss();
        }
        let self_likes = ArchiveSelfLikes::from_records(archive, &scan.records, me);

        let mut others = Vec::new();
        for record in &scan.records {
            if record.subject_authored_by(me) {
                continue;
            }
            match record.subject() {
                Ok(subject) => others.push(subject.uri),
                Err(e) => {
                    warn!("excluding like record: {e}");
                    self.metrics.item_excluded();
                }
            }
        }
        info!(
            likes = scan.records.len(),
            self_likes = self_likes.len(),
            others = others.len(),
            "archive likes scanned"
        );

        let to_unlike = self
            .resolve_in_batches("likes", others, Rule::Unlike, &self_likes)
            .await;
        Ok(LikeCollection {
            self_likes,
            to_unlike,
        })
    }

    /// Stale likes from `getActorLikes`, stopping at the configured floor
    /// cursor.
    pub async fn gather_likes_live(
        &self,
        resolver: &dyn SelfLikeResolver,
    ) -> Result<Vec<PostQualifier>> {
        let client = self.client.as_ref();
        let mut walk = CursorWalk::new("likes", self.max_retries)
            .with_floor(self.policy.thresholds.likes_floor_cursor.clone())
            .with_metrics(self.metrics.clone());
        let mut out = Vec::new();
        while let Some(posts) = walk
            .next_page(|cursor| async move {
                client.fetch_own_likes(cursor.as_deref(), PAGE_SIZE).await
            })
            .await?
        {
            out.extend(self.evaluate_all(posts, Rule::Unlike, resolver).await);
        }
        info!(pages = walk.pages(), found = out.len(), "live likes scanned");
        Ok(out)
    }

    /// Reposts recorded in the archive, judged on the reposted post with the
    /// full delete rule.
    pub async fn gather_reposts(
        &self,
        archive: &RepositoryArchive,
        resolver: &dyn SelfLikeResolver,
    ) -> Result<Vec<PostQualifier>> {
        let scan = archive.repost_records();
        for _ in 0..scan.dereference_misses {
            self.metrics.dereference_miss();
        }
        let mut subjects = Vec::new();
        for record in &scan.records {
            match record.subject() {
                Ok(subject) => subjects.push(subject.uri),
                Err(e) => {
                    warn!("excluding repost record: {e}");
                    self.metrics.item_excluded();
                }
            }
        }
        info!(reposts = subjects.len(), "archive reposts scanned");
        Ok(self
            .resolve_in_batches("reposts", subjects, Rule::Delete, resolver)
            .await)
    }

    /// Own feed, 100 posts a page, until the cursor runs out.
    pub async fn gather_posts_to_delete(
        &self,
        resolver: &dyn SelfLikeResolver,
    ) -> Result<Vec<PostQualifier>> {
        let client = self.client.as_ref();
        let mut walk =
            CursorWalk::new("feed", self.max_retries).with_metrics(self.metrics.clone());
        let mut out = Vec::new();
        while let Some(posts) = walk
            .next_page(|cursor| async move {
                client.fetch_own_feed(cursor.as_deref(), PAGE_SIZE).await
            })
            .await?
        {
            out.extend(self.evaluate_all(posts, Rule::Delete, resolver).await);
        }
        info!(pages = walk.pages(), found = out.len(), "own feed scanned");
        Ok(out)
    }

    async fn resolve_in_batches(
        &self,
        label: &str,
        uris: Vec<String>,
        rule: Rule,
        resolver: &dyn SelfLikeResolver,
    ) -> Vec<PostQualifier> {
        let mut seen = HashSet::new();
        let uris = uris
            .into_iter()
            .filter(|u| seen.insert(u.clone()))
            .collect::<Vec<_>>();
        let mut out = Vec::new();
        for batch in uris.chunks(DETAIL_BATCH_MAX) {
            self.metrics.detail_batch();
            let posts = match self.client.fetch_details(batch).await {
                Ok(p) => p,
                Err(e) => {
                    warn!("error while fetching {label}: {e}");
                    self.metrics.batch_error(&e.to_string());
                    continue;
                }
            };
            debug!(label, requested = batch.len(), returned = posts.len(), "detail batch");
            out.extend(self.evaluate_all(posts, rule, resolver).await);
        }
        out
    }

    async fn evaluate_all(
        &self,
        posts: Vec<PostView>,
        rule: Rule,
        resolver: &dyn SelfLikeResolver,
    ) -> Vec<PostQualifier> {
        let mut out = Vec::new();
        for post in posts {
            let q = PostQualifier::new(self.client.clone(), post);
            let verdict = match rule {
                Rule::Unlike => q.should_unlike(&self.policy, resolver).await,
                Rule::Delete => q.should_delete(&self.policy, resolver).await,
            };
            match verdict {
                Ok(true) => out.push(q),
                Ok(false) => {}
                Err(e) => {
                    warn!("excluding {}: {e}", q.uri());
                    self.metrics.item_excluded();
                }
            }
        }
        out
    }
}
