/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use rand::{thread_rng, Rng};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;

use crate::run_metrics::RunMetrics;

pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Sends the request built by `build`, retrying transport failures, 429 and
/// 5xx with exponential backoff. A 429 carrying `Retry-After` in seconds
/// waits that long instead, capped at [`MAX_RETRY_AFTER`]. The last response
/// is returned as-is, so callers still check the status.
pub async fn send_with_retry<F>(
    mut build: F,
    attempts: u32,
    metrics: &RunMetrics,
) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> RequestBuilder,
{
    let max_attempts = attempts.clamp(1, 5);
    let mut backoff = Duration::from_millis(200);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match build().send().await {
            Ok(resp) => {
                let status = resp.status();
                if should_retry_status(status) {
                    metrics.http_error();
                    if attempt < max_attempts {
                        match retry_after(resp.headers()) {
                            Some(wait) if status == StatusCode::TOO_MANY_REQUESTS => {
                                tokio::time::sleep(wait).await
                            }
                            _ => sleep_with_jitter(backoff).await,
                        }
                        backoff = backoff.saturating_mul(2).min(Duration::from_secs(5));
                        continue;
                    }
                }
                return Ok(resp);
            }
            Err(e) => {
                if e.is_timeout() {
                    metrics.http_timeout();
                } else {
                    metrics.http_error();
                }
                if attempt >= max_attempts {
                    return Err(e);
                }
                sleep_with_jitter(backoff).await;
                backoff = backoff.saturating_mul(2).min(Duration::from_secs(5));
            }
        }
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delta-seconds form only; HTTP dates fall back to the regular backoff.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

async fn sleep_with_jitter(base: Duration) {
    let jitter_ms: u64 = thread_rng().gen_range(0..=200);
    tokio::time::sleep(base + Duration::from_millis(jitter_ms)).await;
}
