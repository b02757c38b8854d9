/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Default)]
pub struct RunMetrics {
    pub pages_fetched: AtomicU64,
    pub page_errors: AtomicU64,
    pub detail_batches: AtomicU64,
    pub batch_errors: AtomicU64,
    pub items_excluded: AtomicU64,
    pub dereference_misses: AtomicU64,

    pub mutations_ok: AtomicU64,
    pub mutations_failed: AtomicU64,
    pub blobs_archived: AtomicU64,

    pub http_timeouts: AtomicU64,
    pub http_errors: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn page_error(&self, err: &str) {
        self.page_errors.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(err);
    }

    pub fn detail_batch(&self) {
        self.detail_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_error(&self, err: &str) {
        self.batch_errors.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(err);
    }

    pub fn item_excluded(&self) {
        self.items_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dereference_miss(&self) {
        self.dereference_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mutation_ok(&self) {
        self.mutations_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mutation_failed(&self, err: &str) {
        self.mutations_failed.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(err);
    }

    pub fn blob_archived(&self) {
        self.blobs_archived.fetch_add(1, Ordering::Relaxed);
    }

    pub fn http_timeout(&self) {
        self.http_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn http_error(&self) {
        self.http_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn set_last_error(&self, err: &str) {
        if let Ok(mut g) = self.last_error.lock() {
            *g = Some(err.to_string());
        }
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        let last_error = self.last_error.lock().ok().and_then(|g| g.clone());
        serde_json::json!({
            "ts_ms": now_ms(),
            "collect": {
                "pages_fetched": self.pages_fetched.load(Ordering::Relaxed),
                "page_errors": self.page_errors.load(Ordering::Relaxed),
                "detail_batches": self.detail_batches.load(Ordering::Relaxed),
                "batch_errors": self.batch_errors.load(Ordering::Relaxed),
                "items_excluded": self.items_excluded.load(Ordering::Relaxed),
                "dereference_misses": self.dereference_misses.load(Ordering::Relaxed),
            },
            "apply": {
                "mutations_ok": self.mutations_ok.load(Ordering::Relaxed),
                "mutations_failed": self.mutations_failed.load(Ordering::Relaxed),
                "blobs_archived": self.blobs_archived.load(Ordering::Relaxed),
            },
            "errors": {
                "http_timeouts": self.http_timeouts.load(Ordering::Relaxed),
                "http_errors": self.http_errors.load(Ordering::Relaxed),
                "last_error": last_error,
            },
        })
    }
}
