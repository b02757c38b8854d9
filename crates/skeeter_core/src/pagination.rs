/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::Page;
use crate::error::{Result, SkeeterError};
use crate::run_metrics::RunMetrics;

/// Drives a cursor-paged source to exhaustion.
///
/// The walk ends when the server returns no cursor (or an empty one), when
/// it hands back the cursor that was just requested, or when a floor is set
/// and the new cursor sorts below it. A page that fails is requested again
/// at the same cursor, at most `max_attempts` times in a row; after that the
/// walk fails with `ExhaustedRetries` instead of spinning.
pub struct CursorWalk {
    label: &'static str,
    cursor: Option<String>,
    floor: Option<String>,
    max_attempts: u32,
    metrics: Option<Arc<RunMetrics>>,
    pages: usize,
    done: bool,
}

impl CursorWalk {
    pub fn new(label: &'static str, max_attempts: u32) -> Self {
        Self {
            label,
            cursor: None,
            floor: None,
            max_attempts: max_attempts.max(1),
            metrics: None,
            pages: 0,
            done: false,
        }
    }

    pub fn with_floor(mut self, floor: Option<String>) -> Self {
        self.floor = floor.filter(|f| !f.is_empty());
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RunMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Fetches the next page, or `None` once the walk has ended.
    pub async fn next_page<T, F, Fut>(&mut self, mut fetch: F) -> Result<Option<Vec<T>>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        if self.done {
            return Ok(None);
        }
        let mut attempt = 0;
        loop {
            attempt += 1;
            match fetch(self.cursor.clone()).await {
                Ok(page) => {
                    self.pages += 1;
                    if let Some(m) = &self.metrics {
                        m.page_fetched();
                    }
                    self.advance(page.cursor);
                    return Ok(Some(page.items));
                }
                Err(e) => {
                    if let Some(m) = &self.metrics {
                        m.page_error(&e.to_string());
                    }
                    warn!(
                        label = self.label,
                        cursor = ?self.cursor,
                        attempt,
                        "page fetch failed: {e}"
                    );
                    if attempt >= self.max_attempts {
                        self.done = true;
                        return Err(SkeeterError::ExhaustedRetries {
                            what: format!("{} at cursor {:?}", self.label, self.cursor),
                            attempts: attempt,
                        });
                    }
                }
            }
        }
    }

    fn advance(&mut self, next: Option<String>) {
        let Some(next) = next.filter(|c| !c.is_empty()) else {
            debug!(label = self.label, pages = self.pages, "cursor exhausted");
            self.done = true;
            return;
        };
        if self.cursor.as_deref() == Some(next.as_str()) {
            warn!(label = self.label, cursor = %next, "server repeated cursor, stopping");
            self.done = true;
            return;
        }
        if let Some(floor) = &self.floor {
            if next.as_str() < floor.as_str() {
                info!(label = self.label, cursor = %next, floor = %floor, "floor cursor reached");
                self.done = true;
                return;
            }
        }
        debug!(label = self.label, cursor = %next, "cursor at");
        self.cursor = Some(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves pages keyed by cursor; `fails` maps a cursor to how many
    /// requests at it fail first.
    struct Script {
        pages: HashMap<String, Page<u32>>,
        fails: Mutex<HashMap<String, u32>>,
        calls: Mutex<u32>,
    }

    impl Script {
        fn new(pages: Vec<(&str, Vec<u32>, Option<&str>)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(k, items, next)| {
                        (k.to_string(), Page::new(items, next.map(str::to_string)))
                    })
                    .collect(),
                fails: Mutex::new(HashMap::new()),
                calls: Mutex::new(0),
            }
        }

        async fn fetch(&self, cursor: Option<String>) -> Result<Page<u32>> {
            *self.calls.lock().unwrap() += 1;
            let key = cursor.unwrap_or_default();
            if let Some(left) = self.fails.lock().unwrap().get_mut(&key) {
                if *left > 0 {
                    *left -= 1;
                    return Err(SkeeterError::Transport("boom".to_string()));
                }
            }
            Ok(self.pages[&key].clone())
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    async fn drain(script: &Script, mut walk: CursorWalk) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        while let Some(items) = walk.next_page(|c| script.fetch(c)).await? {
            out.extend(items);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn drains_until_cursor_is_empty() {
        let script = Script::new(vec![
            ("", vec![1, 2], Some("c2")),
            ("c2", vec![3], Some("c3")),
            ("c3", vec![4], Some("")),
        ]);
        let items = drain(&script, CursorWalk::new("t", 3)).await.unwrap();
        assert_eq!(items, vec![1, 2, 3, 4]);
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test]
    async fn repeated_cursor_ends_walk() {
        let script = Script::new(vec![("", vec![1], Some("c2")), ("c2", vec![], Some("c2"))]);
        let items = drain(&script, CursorWalk::new("t", 3)).await.unwrap();
        assert_eq!(items, vec![1]);
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test]
    async fn floor_trips_after_first_page() {
        let script = Script::new(vec![("", vec![1, 2], Some("3k100")), ("3k100", vec![3], None)]);
        let walk = CursorWalk::new("likes", 3).with_floor(Some("3k500".to_string()));
        let items = drain(&script, walk).await.unwrap();
        assert_eq!(items, vec![1, 2]);
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn floor_above_cursor_keeps_going() {
        let script = Script::new(vec![("", vec![1], Some("3k900")), ("3k900", vec![2], None)]);
        let walk = CursorWalk::new("likes", 3).with_floor(Some("3k500".to_string()));
        assert_eq!(drain(&script, walk).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_at_same_cursor() {
        let script = Script::new(vec![("", vec![1], Some("c2")), ("c2", vec![2], None)]);
        script.fails.lock().unwrap().insert("c2".to_string(), 2);
        let metrics = Arc::new(RunMetrics::new());
        let walk = CursorWalk::new("t", 3).with_metrics(metrics.clone());
        assert_eq!(drain(&script, walk).await.unwrap(), vec![1, 2]);
        assert_eq!(script.calls(), 4);
        let snap = metrics.snapshot_json();
        assert_eq!(snap["collect"]["page_errors"], 2);
        assert_eq!(snap["collect"]["pages_fetched"], 2);
    }

    #[tokio::test]
    async fn persistent_failure_fails_loudly() {
        let script = Script::new(vec![("", vec![1], Some("c2"))]);
        script.fails.lock().unwrap().insert("c2".to_string(), u32::MAX);
        let err = drain(&script, CursorWalk::new("feed", 3)).await.unwrap_err();
        assert!(matches!(err, SkeeterError::ExhaustedRetries { attempts: 3, .. }));
        assert_eq!(script.calls(), 4);
    }

    #[tokio::test]
    async fn terminates_within_page_count() {
        // 20 chained pages, each cursor strictly new.
        let keys = (0..20).map(|i| format!("c{i:02}")).collect::<Vec<_>>();
        let mut pages = vec![("".to_string(), Page::new(vec![0], Some(keys[0].clone())))];
        for (i, k) in keys.iter().enumerate() {
            let next = keys.get(i + 1).cloned();
            pages.push((k.clone(), Page::new(vec![i as u32 + 1], next)));
        }
        let script = Script {
            pages: pages.into_iter().collect(),
            fails: Mutex::new(HashMap::new()),
            calls: Mutex::new(0),
        };
        let mut walk = CursorWalk::new("t", 1);
        let mut n = 0;
        while walk.next_page(|c| script.fetch(c)).await.unwrap().is_some() {
            n += 1;
            assert!(n <= 21);
        }
        assert_eq!(n, 21);
        assert_eq!(walk.pages(), 21);
        assert!(walk.next_page(|c| script.fetch(c)).await.unwrap().is_none());
    }
}
