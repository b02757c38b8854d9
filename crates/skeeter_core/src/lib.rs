/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod archive;
pub mod archive_store;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod gate;
pub mod http_retry;
pub mod pagination;
pub mod pipeline;
pub mod qualifier;
pub mod run_metrics;
pub mod self_likes;
pub mod xrpc;

#[cfg(test)]
mod test_support;
