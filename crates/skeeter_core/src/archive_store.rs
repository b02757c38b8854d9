/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! On-disk backup written before anything is deleted:
//! `<root>/<did with ':' as '_'>/bsky-archive-<timestamp>.car` plus every
//! blob under `_blob/<cid><ext>`.

use anyhow::{Context as _, Result};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::client::RepoSource;
use crate::pagination::CursorWalk;
use crate::run_metrics::RunMetrics;

pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn account_dir(&self, did: &str) -> PathBuf {
        self.root.join(did.replace(':', "_"))
    }

    pub fn blob_dir(&self, did: &str) -> PathBuf {
        self.account_dir(did).join("_blob")
    }

    pub fn write_repo(&self, did: &str, now: DateTime<Utc>, car: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(self.blob_dir(did)).context("create archive dir")?;
        let stamp = now
            .to_rfc3339_opts(SecondsFormat::Micros, false)
            .replace(':', "_");
        let path = self
            .account_dir(did)
            .join(format!("bsky-archive-{stamp}.car"));
        std::fs::write(&path, car).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_blob(&self, did: &str, cid: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.blob_dir(did);
        std::fs::create_dir_all(&dir).context("create blob dir")?;
        let path = dir.join(format!("{cid}{}", sniff_extension(bytes)));
        std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// File extension from the leading magic bytes; empty when unrecognised.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
        return ".jpeg";
    }
    if bytes.len() >= 8 && &bytes[0..8] == b"\x89PNG\r\n\x1a\n" {
        return ".png";
    }
    if bytes.len() >= 6 && (&bytes[0..6] == b"GIF87a" || &bytes[0..6] == b"GIF89a") {
        return ".gif";
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return ".webp";
    }
    ""
}

/// Downloads the repository export and every blob, writes them under
/// `store`, and returns the export for in-memory decoding. The export must
/// be saved; a blob that cannot be fetched or written is skipped.
pub async fn archive_account(
    source: &dyn RepoSource,
    store: &ArchiveStore,
    did: &str,
    now: DateTime<Utc>,
    max_retries: u32,
    metrics: &RunMetrics,
) -> Result<Bytes> {
    println!("Archiving posts...");
    let car = source.fetch_repo().await.context("download repository")?;
    let path = store.write_repo(did, now, &car)?;
    info!(path = %path.display(), bytes = car.len(), "repository archived");

    let mut walk = CursorWalk::new("blobs", max_retries);
    let mut cids = Vec::new();
    while let Some(page) = walk
        .next_page(|cursor| async move { source.list_blobs(cursor.as_deref()).await })
        .await
        .context("list blobs")?
    {
        cids.extend(page);
    }

    println!("Downloading and archiving media...");
    for cid in &cids {
        let blob = match source.fetch_blob(cid).await {
            Ok(b) => b,
            Err(e) => {
                warn!("blob {cid} not archived: {e}");
                continue;
            }
        };
        match store.write_blob(did, cid, &blob) {
            Ok(p) => {
                debug!("Saving {}", p.display());
                metrics.blob_archived();
            }
            Err(e) => warn!("blob {cid} not archived: {e:#}"),
        }
    }
    info!(blobs = cids.len(), "media archived");
    Ok(car)
}
