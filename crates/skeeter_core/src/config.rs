/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";

/// Where candidate likes are enumerated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikesSource {
    /// Like records from the downloaded repository, resolved in detail batches.
    Archive,
    /// `getActorLikes` pagination, honouring the floor cursor.
    Live,
}

impl FromStr for LikesSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "archive" => Ok(Self::Archive),
            "live" => Ok(Self::Live),
            other => Err(anyhow::anyhow!("unknown likes source {other:?} (archive|live)")),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RunConfig {
    /// Repost count at which a post is considered viral. 0 disables the rule.
    pub viral_threshold: Option<u64>,
    /// Age in days after which content is stale. 0 disables the rule.
    pub stale_days: Option<u64>,
    pub domains_to_protect: Option<Vec<String>>,
    /// Likes pagination stops once the server cursor sorts below this value.
    pub fixed_likes_cursor: Option<String>,
    pub auto_confirm: Option<bool>,
    pub likes_source: Option<LikesSource>,
    pub service_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries_per_cursor: Option<u32>,
    pub archive_dir: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            viral_threshold: Some(0),
            stale_days: Some(0),
            domains_to_protect: Some(Vec::new()),
            fixed_likes_cursor: None,
            auto_confirm: Some(false),
            likes_source: Some(LikesSource::Archive),
            service_url: Some(DEFAULT_SERVICE_URL.to_string()),
            request_timeout_secs: Some(120),
            max_retries_per_cursor: Some(3),
            archive_dir: Some("archive".to_string()),
        }
    }
}

impl RunConfig {
    /// Fields set in `other` win.
    pub fn overlay(self, other: RunConfig) -> RunConfig {
        RunConfig {
            viral_threshold: other.viral_threshold.or(self.viral_threshold),
            stale_days: other.stale_days.or(self.stale_days),
            domains_to_protect: other.domains_to_protect.or(self.domains_to_protect),
            fixed_likes_cursor: other.fixed_likes_cursor.or(self.fixed_likes_cursor),
            auto_confirm: other.auto_confirm.or(self.auto_confirm),
            likes_source: other.likes_source.or(self.likes_source),
            service_url: other.service_url.or(self.service_url),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            max_retries_per_cursor: other.max_retries_per_cursor.or(self.max_retries_per_cursor),
            archive_dir: other.archive_dir.or(self.archive_dir),
        }
    }

    pub fn thresholds(&self) -> RetentionThresholds {
        RetentionThresholds {
            viral_threshold: self.viral_threshold.unwrap_or(0),
            stale_days: self.stale_days.unwrap_or(0),
            domains_to_protect: self
                .domains_to_protect
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
            likes_floor_cursor: self
                .fixed_likes_cursor
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }

    pub fn auto_confirm(&self) -> bool {
        self.auto_confirm.unwrap_or(false)
    }

    pub fn likes_source(&self) -> LikesSource {
        self.likes_source.unwrap_or(LikesSource::Archive)
    }

    pub fn service_url(&self) -> &str {
        self.service_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVICE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(120).max(1))
    }

    pub fn max_retries_per_cursor(&self) -> u32 {
        self.max_retries_per_cursor.unwrap_or(3).clamp(1, 10)
    }

    pub fn archive_dir(&self) -> PathBuf {
        PathBuf::from(self.archive_dir.as_deref().unwrap_or("archive"))
    }
}

/// Read-only after startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionThresholds {
    pub viral_threshold: u64,
    pub stale_days: u64,
    pub domains_to_protect: Vec<String>,
    pub likes_floor_cursor: Option<String>,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Thresholds plus the instant the run started; every staleness check in a
/// run compares against the same `now`.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub thresholds: RetentionThresholds,
    pub now: DateTime<Utc>,
}

impl RetentionPolicy {
    pub fn new(thresholds: RetentionThresholds, clock: &dyn Clock) -> Self {
        Self {
            thresholds,
            now: clock.now(),
        }
    }
}

/// Comma separated, trimmed, empty entries dropped.
pub fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(v) = std::env::var("SKEETER_CONFIG") {
        if !v.trim().is_empty() {
            return Some(PathBuf::from(v));
        }
    }
    let proj = ProjectDirs::from("social", "skeeter", "Skeeter")?;
    Some(proj.config_dir().join("config.json"))
}

pub fn load_config(path: &Path) -> Result<RunConfig> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunConfig = serde_json::from_str(&text).context("decode RunConfig")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_list_drops_blanks() {
        assert_eq!(
            parse_domain_list(" news.example.com, ,blog.example.org,"),
            vec!["news.example.com".to_string(), "blog.example.org".to_string()]
        );
        assert!(parse_domain_list("").is_empty());
    }

    #[test]
    fn overlay_prefers_explicit_values() {
        let file: RunConfig = serde_json::from_str(
            r#"{"viral_threshold": 50, "stale_days": 30, "likes_source": "live"}"#,
        )
        .unwrap();
        let cli = RunConfig {
            viral_threshold: None,
            stale_days: Some(7),
            domains_to_protect: None,
            fixed_likes_cursor: Some("  ".to_string()),
            auto_confirm: Some(true),
            likes_source: None,
            service_url: None,
            request_timeout_secs: None,
            max_retries_per_cursor: None,
            archive_dir: None,
        };
        let cfg = RunConfig::default().overlay(file).overlay(cli);
        let t = cfg.thresholds();
        assert_eq!(t.viral_threshold, 50);
        assert_eq!(t.stale_days, 7);
        assert_eq!(t.likes_floor_cursor, None);
        assert!(cfg.auto_confirm());
        assert_eq!(cfg.likes_source(), LikesSource::Live);
        assert_eq!(cfg.service_url(), DEFAULT_SERVICE_URL);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn load_config_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"domains_to_protect": ["news.example.com"], "fixed_likes_cursor": "3kabc"}"#,
        )
        .unwrap();
        let t = load_config(&path).unwrap().thresholds();
        assert_eq!(t.domains_to_protect, vec!["news.example.com".to_string()]);
        assert_eq!(t.likes_floor_cursor.as_deref(), Some("3kabc"));
    }

    #[test]
    fn likes_source_parses_case_insensitively() {
        assert_eq!("LIVE".parse::<LikesSource>().unwrap(), LikesSource::Live);
        assert!("feed".parse::<LikesSource>().is_err());
    }
}
