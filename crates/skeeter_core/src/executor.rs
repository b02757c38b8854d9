/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::Serialize;
use skeeter_protocol::PostView;
use std::sync::Arc;
use tracing::{info, warn};

use crate::qualifier::PostQualifier;
use crate::run_metrics::RunMetrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Applies a decision set one item at a time. A failing item is logged and
/// counted; the rest of the set still runs.
pub struct BatchExecutor {
    metrics: Arc<RunMetrics>,
}

impl BatchExecutor {
    pub fn new(metrics: Arc<RunMetrics>) -> Self {
        Self { metrics }
    }

    pub async fn unlike_all(&self, items: &[PostQualifier]) -> BatchReport {
        let mut report = BatchReport::default();
        for item in items {
            report.attempted += 1;
            info!("{}", unlike_line(item.post()));
            match item.unlike().await {
                Ok(()) => self.ok(&mut report),
                Err(e) => self.failed(&mut report, "unlike", item.uri(), &e),
            }
        }
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "unlike batch done"
        );
        report
    }

    pub async fn remove_all(&self, items: &[PostQualifier]) -> BatchReport {
        let mut report = BatchReport::default();
        for item in items {
            report.attempted += 1;
            info!("{}", delete_line(item.post()));
            match item.remove().await {
                Ok(()) => self.ok(&mut report),
                Err(e) => self.failed(&mut report, "remove", item.uri(), &e),
            }
        }
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "remove batch done"
        );
        report
    }

    fn ok(&self, report: &mut BatchReport) {
        report.succeeded += 1;
        self.metrics.mutation_ok();
    }

    fn failed(
        &self,
        report: &mut BatchReport,
        op: &str,
        uri: &str,
        err: &dyn std::fmt::Display,
    ) {
        report.failed += 1;
        warn!("{op} failed for {uri}: {err}");
        self.metrics.mutation_failed(&format!("{op} {uri}: {err}"));
    }
}

/// Audit line logged before a like is removed.
pub fn unlike_line(post: &PostView) -> String {
    format!(
        "Unliking: {} by {}, CID: {}",
        post.uri, post.author.handle, post.cid
    )
}

/// Audit line logged before a post is deleted or a repost undone.
pub fn delete_line(post: &PostView) -> String {
    format!(
        "Deleting: {} on {}, CID: {}",
        post.text(),
        post.created_at().unwrap_or("unknown date"),
        post.cid
    )
}
