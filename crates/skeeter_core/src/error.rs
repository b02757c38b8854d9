/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkeeterError {
    /// Network failure or non-2xx response. Recovered per page, batch or item.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed timestamp {value:?} on {uri}")]
    MalformedTimestamp { uri: String, value: String },

    #[error("malformed record {uri}: {reason}")]
    MalformedRecord { uri: String, reason: String },

    #[error("block {0} not found in archive")]
    DereferenceMiss(String),

    #[error("{what}: gave up after {attempts} attempts")]
    ExhaustedRetries { what: String, attempts: u32 },

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("detail lookup takes at most {max} uris, got {got}")]
    BatchTooLarge { max: usize, got: usize },
}

impl SkeeterError {
    pub fn transport(endpoint: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport(format!("{endpoint}: {err}"))
    }
}

pub type Result<T, E = SkeeterError> = std::result::Result<T, E>;
