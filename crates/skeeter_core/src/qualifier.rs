/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Retention predicates over a single post.
//!
//! `PostQualifier` wraps the decoded `PostView` together with the client that
//! produced it, so a post routed into a decision set can later undo itself
//! without the caller threading the client through.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use skeeter_protocol::PostView;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::ContentClient;
use crate::config::RetentionPolicy;
use crate::error::{Result, SkeeterError};
use crate::self_likes::SelfLikeResolver;

// Far beyond any real account age; keeps the day arithmetic in range.
const MAX_STALE_DAYS: u64 = 3_650_000;

#[derive(Clone)]
pub struct PostQualifier {
    post: PostView,
    client: Arc<dyn ContentClient>,
}

impl std::fmt::Debug for PostQualifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostQualifier")
            .field("uri", &self.post.uri)
            .field("cid", &self.post.cid)
            .finish()
    }
}

impl PostQualifier {
    pub fn new(client: Arc<dyn ContentClient>, post: PostView) -> Self {
        Self { post, client }
    }

    pub fn post(&self) -> &PostView {
        &self.post
    }

    pub fn uri(&self) -> &str {
        &self.post.uri
    }

    /// True when the authenticated actor wrote the post.
    pub fn is_own(&self) -> bool {
        self.post.author.did == self.client.actor_did()
    }

    pub fn is_viral(&self, threshold: u64) -> bool {
        if threshold == 0 {
            return false;
        }
        self.post.repost_count >= threshold
    }

    pub fn is_stale(&self, stale_days: u64, now: DateTime<Utc>) -> Result<bool> {
        if stale_days == 0 {
            return Ok(false);
        }
        let raw = self
            .post
            .created_at()
            .ok_or_else(|| SkeeterError::MalformedRecord {
                uri: self.post.uri.clone(),
                reason: "missing record.createdAt".to_string(),
            })?;
        let created = parse_created_at(raw).ok_or_else(|| SkeeterError::MalformedTimestamp {
            uri: self.post.uri.clone(),
            value: raw.to_string(),
        })?;
        let age = chrono::Duration::days(stale_days.min(MAX_STALE_DAYS) as i64);
        Ok(match now.checked_sub_signed(age) {
            Some(cutoff) => created <= cutoff,
            None => false,
        })
    }

    /// Case-sensitive substring match of each domain against the external
    /// link embed's URL. Posts without an external embed are never protected.
    pub fn is_protected_domain(&self, domains: &[String]) -> bool {
        let Some(external) = self.post.embed.as_ref().and_then(|e| e.external.as_ref()) else {
            return false;
        };
        domains.iter().any(|d| external.uri.contains(d.as_str()))
    }

    pub async fn is_self_liked(&self, resolver: &dyn SelfLikeResolver) -> Result<bool> {
        resolver.is_self_liked(&self.post).await
    }

    /// `(viral ∨ stale) ∧ ¬protected ∧ ¬self_liked`. The self-like lookup
    /// only runs for posts that would otherwise be deleted.
    pub async fn should_delete(
        &self,
        policy: &RetentionPolicy,
        resolver: &dyn SelfLikeResolver,
    ) -> Result<bool> {
        let t = &policy.thresholds;
        let triggered = self.is_viral(t.viral_threshold) || self.is_stale(t.stale_days, policy.now)?;
        if !triggered || self.is_protected_domain(&t.domains_to_protect) {
            return Ok(false);
        }
        Ok(!self.is_self_liked(resolver).await?)
    }

    /// `stale ∧ ¬self_liked`; virality and protection do not apply to likes.
    pub async fn should_unlike(
        &self,
        policy: &RetentionPolicy,
        resolver: &dyn SelfLikeResolver,
    ) -> Result<bool> {
        if !self.is_stale(policy.thresholds.stale_days, policy.now)? {
            return Ok(false);
        }
        Ok(!self.is_self_liked(resolver).await?)
    }

    /// Removes the actor's like. The viewer's like reference is tried first;
    /// some views carry a reference the server no longer accepts, so the
    /// post URI is tried once as a fallback.
    pub async fn unlike(&self) -> Result<()> {
        let primary = match self.post.viewer.like.as_deref() {
            Some(like_ref) => {
                info!("removing like: {like_ref}");
                self.client.unlike(like_ref).await
            }
            None => Err(SkeeterError::MalformedRecord {
                uri: self.post.uri.clone(),
                reason: "no viewer like reference".to_string(),
            }),
        };
        let Err(e) = primary else {
            return Ok(());
        };
        warn!("unlike failed, retrying via uri {}: {e}", self.post.uri);
        self.client.unlike(&self.post.uri).await.map_err(|e| {
            warn!("unlike via uri failed: {e}");
            SkeeterError::ExhaustedRetries {
                what: format!("unlike {}", self.post.uri),
                attempts: 2,
            }
        })
    }

    /// Undoes a repost of someone else's post, or deletes the actor's own post.
    pub async fn remove(&self) -> Result<()> {
        if !self.is_own() {
            let repost_ref =
                self.post
                    .viewer
                    .repost
                    .as_deref()
                    .ok_or_else(|| SkeeterError::MalformedRecord {
                        uri: self.post.uri.clone(),
                        reason: "no viewer repost reference".to_string(),
                    })?;
            info!("removing repost: {repost_ref}");
            self.client.unrepost(repost_ref).await
        } else {
            info!("removing post: {}", self.post.uri);
            self.client.delete_post(&self.post.uri).await
        }
    }
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS[.fff]` read as UTC.
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
