/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use skeeter_core::archive::RepositoryArchive;
use skeeter_core::archive_store::{archive_account, ArchiveStore};
use skeeter_core::client::ContentClient;
use skeeter_core::config::{
    default_config_path, load_config, parse_domain_list, LikesSource, RetentionPolicy, RunConfig,
    SystemClock,
};
use skeeter_core::executor::BatchExecutor;
use skeeter_core::gate::{confirm_on_terminal, found_summary};
use skeeter_core::pipeline::{CollectionPipeline, DecisionSets};
use skeeter_core::run_metrics::RunMetrics;
use skeeter_core::self_likes::{LiveSelfLikes, SelfLikeResolver};
use skeeter_core::xrpc::XrpcClient;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Deletes or undoes your own Bluesky posts, reposts and likes that have
/// gone viral or stale. A full backup of the account is written first.
#[derive(Debug, Parser)]
#[command(name = "skeeter_deleter")]
struct Args {
    /// Repost count at which a post is deleted. 0 disables the limit.
    #[arg(short = 'l', long, allow_negative_numbers = true)]
    max_reposts: Option<i64>,

    /// Age in days at which posts are deleted and likes removed. 0 disables the limit.
    #[arg(short = 's', long, allow_negative_numbers = true)]
    stale_limit: Option<i64>,

    /// Comma separated domains; posts linking to them are never deleted.
    #[arg(short = 'd', long)]
    domains_to_protect: Option<String>,

    /// Stop paging likes once the cursor sorts below this value. Cursors are
    /// printed at -vv.
    #[arg(short = 'c', long)]
    fixed_likes_cursor: Option<String>,

    /// Mirror the log to stderr; repeat (-vv) for debug detail.
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Same as -vv.
    #[arg(short = 'V', long)]
    very_verbose: bool,

    /// Skip the confirmation prompts.
    #[arg(short = 'y', long)]
    yes: bool,

    /// Where likes are read from: archive or live.
    #[arg(long)]
    likes_source: Option<LikesSource>,

    /// JSON config file; flags given on the command line win.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    archive_dir: Option<String>,

    /// PDS base url.
    #[arg(long)]
    service: Option<String>,

    #[arg(long, default_value = "skeeter_deleter.log")]
    log_file: PathBuf,

    #[arg(long, env = "BLUESKY_USERNAME", hide = true)]
    username: String,

    #[arg(long, env = "BLUESKY_PASSWORD", hide_env_values = true, hide = true)]
    password: String,
}

impl Args {
    fn overrides(&self) -> RunConfig {
        RunConfig {
            viral_threshold: self.max_reposts.map(|n| n.max(0) as u64),
            stale_days: self.stale_limit.map(|n| n.max(0) as u64),
            domains_to_protect: self.domains_to_protect.as_deref().map(parse_domain_list),
            fixed_likes_cursor: self.fixed_likes_cursor.clone(),
            auto_confirm: self.yes.then_some(true),
            likes_source: self.likes_source,
            service_url: self.service.clone(),
            request_timeout_secs: None,
            max_retries_per_cursor: None,
            archive_dir: self.archive_dir.clone(),
        }
    }

    fn stderr_level(&self) -> Option<LevelFilter> {
        if self.very_verbose || self.verbose >= 2 {
            Some(LevelFilter::DEBUG)
        } else if self.verbose == 1 {
            Some(LevelFilter::INFO)
        } else {
            None
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)
        .with_context(|| format!("open log file {}", args.log_file.display()))?;
    let default = if args.stderr_level() == Some(LevelFilter::DEBUG) {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let to_file = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
    let to_stderr = args.stderr_level().map(|level| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(level)
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(to_file)
        .with(to_stderr)
        .init();
    Ok(())
}

fn resolve_config(args: &Args) -> Result<RunConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let file_cfg = match path {
        Some(p) if p.exists() => {
            info!("config: {}", p.display());
            load_config(&p)?
        }
        Some(p) if args.config.is_some() => {
            anyhow::bail!("config file {} not found", p.display())
        }
        _ => RunConfig::default(),
    };
    Ok(RunConfig::default()
        .overlay(file_cfg)
        .overlay(args.overrides()))
}

async fn run(args: Args) -> Result<()> {
    let cfg = resolve_config(&args)?;
    let metrics = Arc::new(RunMetrics::new());
    let retries = cfg.max_retries_per_cursor();

    let client = Arc::new(
        XrpcClient::login(
            cfg.service_url(),
            &args.username,
            &args.password,
            cfg.request_timeout(),
            metrics.clone(),
        )
        .await?,
    );
    let did = client.actor_did().to_string();
    info!(did = %did, handle = %client.actor_handle(), "logged in");

    let policy = RetentionPolicy::new(cfg.thresholds(), &SystemClock);
    let store = ArchiveStore::new(cfg.archive_dir());
    let car = archive_account(client.as_ref(), &store, &did, policy.now, retries, &metrics)
        .await
        .context("archive account")?;
    let archive = RepositoryArchive::from_bytes(&car).context("decode repository archive")?;
    info!(blocks = archive.len(), "repository decoded");

    let pipeline = CollectionPipeline::new(client.clone(), policy, retries, metrics.clone());
    let (resolver, to_unlike) = match cfg.likes_source() {
        LikesSource::Archive => {
            let likes = pipeline.gather_likes(&archive).await?;
            (
                Box::new(likes.self_likes) as Box<dyn SelfLikeResolver>,
                likes.to_unlike,
            )
        }
        LikesSource::Live => {
            let live = LiveSelfLikes::new(client.clone(), retries);
            let to_unlike = pipeline.gather_likes_live(&live).await?;
            (Box::new(live) as Box<dyn SelfLikeResolver>, to_unlike)
        }
    };
    println!("{}", found_summary(to_unlike.len(), "unlike"));

    let reposts = pipeline.gather_reposts(&archive, resolver.as_ref()).await?;
    println!("{}", found_summary(reposts.len(), "unrepost"));

    let posts = pipeline.gather_posts_to_delete(resolver.as_ref()).await?;
    println!("{}", found_summary(posts.len(), "delete"));

    let sets = DecisionSets::new(to_unlike, posts, reposts);
    let executor = BatchExecutor::new(metrics.clone());
    if confirm_on_terminal("unlike", sets.to_unlike.len(), cfg.auto_confirm()).await? {
        let report = executor.unlike_all(&sets.to_unlike).await;
        info!(?report, "likes removed");
    }
    if confirm_on_terminal("delete", sets.to_delete.len(), cfg.auto_confirm()).await? {
        let report = executor.remove_all(&sets.to_delete).await;
        info!(?report, "posts removed");
    }

    info!(metrics = %metrics.snapshot_json(), "run finished");
    Ok(())
}

/// SIGINT keeps its default disposition: an interrupted run, including one
/// waiting at a prompt, ends the process with a non-zero status.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;
    info!("skeeter deleter starting");

    let res = run(args).await;
    if let Err(e) = &res {
        warn!("run failed: {e:#}");
    }
    res
}
