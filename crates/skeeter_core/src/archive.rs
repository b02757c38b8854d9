/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! In-memory reader for a repository export (CAR v1).
//!
//! The file is a varint-framed DAG-CBOR header followed by
//! `varint(len) | CID | DAG-CBOR block` sections. Records are either stored
//! directly (they carry a `$type`) or reached through tree nodes whose first
//! entry's `v` link points at the record block.

use cid::Cid;
use ipld_core::ipld::Ipld;
use skeeter_protocol::{AtUri, StrongRef, NSID_LIKE, NSID_REPOST};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{Result, SkeeterError};

pub struct RepositoryArchive {
    roots: Vec<Cid>,
    order: Vec<Cid>,
    blocks: HashMap<Cid, Ipld>,
    skipped: usize,
}

/// A decoded record together with the CID of the block it was read from.
#[derive(Debug, Clone, Copy)]
pub struct ArchivedRecord<'a> {
    pub cid: &'a Cid,
    pub value: &'a Ipld,
}

#[derive(Debug, Default)]
pub struct RecordScan<'a> {
    pub records: Vec<ArchivedRecord<'a>>,
    /// Tree entries whose target block is absent from the archive.
    pub dereference_misses: usize,
}

impl RepositoryArchive {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (header_len, rest) = unsigned_varint::decode::u64(bytes)
            .map_err(|e| SkeeterError::InvalidArchive(format!("header length: {e}")))?;
        let header_len = usize::try_from(header_len)
            .map_err(|_| SkeeterError::InvalidArchive("header length overflow".to_string()))?;
        if rest.len() < header_len {
            return Err(SkeeterError::InvalidArchive("truncated header".to_string()));
        }
        let header: Ipld = serde_ipld_dagcbor::from_slice(&rest[..header_len])
            .map_err(|e| SkeeterError::InvalidArchive(format!("header: {e}")))?;
        match ipld_get(&header, "version") {
            Some(Ipld::Integer(1)) => {}
            other => {
                return Err(SkeeterError::InvalidArchive(format!(
                    "unsupported car version {other:?}"
                )))
            }
        }
        let roots = match ipld_get(&header, "roots") {
            Some(Ipld::List(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Ipld::Link(c) => Some(*c),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let mut archive = Self {
            roots,
            order: Vec::new(),
            blocks: HashMap::new(),
            skipped: 0,
        };
        let mut cursor = &rest[header_len..];
        while !cursor.is_empty() {
            let (len, after) = unsigned_varint::decode::u64(cursor)
                .map_err(|e| SkeeterError::InvalidArchive(format!("section length: {e}")))?;
            let len = usize::try_from(len)
                .map_err(|_| SkeeterError::InvalidArchive("section length overflow".to_string()))?;
            if after.len() < len {
                return Err(SkeeterError::InvalidArchive("truncated section".to_string()));
            }
            let (section, next) = after.split_at(len);
            cursor = next;
            archive.insert_section(section);
        }
        if archive.skipped > 0 {
            warn!(skipped = archive.skipped, "archive blocks could not be decoded");
        }
        debug!(blocks = archive.order.len(), roots = archive.roots.len(), "archive loaded");
        Ok(archive)
    }

    fn insert_section(&mut self, section: &[u8]) {
        let mut data = section;
        let cid = match Cid::read_bytes(&mut data) {
            Ok(c) => c,
            Err(e) => {
                debug!("skip section with unreadable cid: {e}");
                self.skipped += 1;
                return;
            }
        };
        match serde_ipld_dagcbor::from_slice::<Ipld>(data) {
            Ok(value) => {
                if self.blocks.insert(cid, value).is_none() {
                    self.order.push(cid);
                }
            }
            Err(e) => {
                debug!(%cid, "skip undecodable block: {e}");
                self.skipped += 1;
            }
        }
    }

    pub fn roots(&self) -> &[Cid] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// True when `cid` (string form, as stored in strong refs) names a block
    /// present in the archive.
    pub fn contains_cid(&self, cid: &str) -> bool {
        Cid::try_from(cid)
            .map(|c| self.blocks.contains_key(&c))
            .unwrap_or(false)
    }

    /// Blocks in archive order.
    pub fn iter(&self) -> impl Iterator<Item = (&Cid, &Ipld)> {
        self.order
            .iter()
            .filter_map(|cid| self.blocks.get(cid).map(|b| (cid, b)))
    }

    /// Resolves tree indirection: a block with `$type` is its own record; a
    /// node with a non-empty `e` list stands for the block its first entry's
    /// `v` links to; anything else is returned unchanged.
    pub fn project<'a>(&'a self, cid: &'a Cid, block: &'a Ipld) -> Result<ArchivedRecord<'a>> {
        if ipld_get(block, "$type").is_some() {
            return Ok(ArchivedRecord { cid, value: block });
        }
        let target = match ipld_get(block, "e") {
            Some(Ipld::List(entries)) => entries.first().and_then(|e| match ipld_get(e, "v") {
                Some(Ipld::Link(c)) => Some(c),
                _ => None,
            }),
            _ => None,
        };
        let Some(target) = target else {
            return Ok(ArchivedRecord { cid, value: block });
        };
        match self.blocks.get_key_value(target) {
            Some((cid, value)) => Ok(ArchivedRecord { cid, value }),
            None => Err(SkeeterError::DereferenceMiss(target.to_string())),
        }
    }

    /// Every record of type `nsid`, each listed once even when reachable
    /// both directly and through a tree node.
    pub fn records_of_type(&self, nsid: &str) -> RecordScan<'_> {
        let mut scan = RecordScan::default();
        let mut seen = HashSet::new();
        for (cid, block) in self.iter() {
            let record = match self.project(cid, block) {
                Ok(r) => r,
                Err(e) => {
                    debug!("skip block {cid}: {e}");
                    scan.dereference_misses += 1;
                    continue;
                }
            };
            if record.type_tag() != Some(nsid) {
                continue;
            }
            if seen.insert(*record.cid) {
                scan.records.push(record);
            }
        }
        scan
    }

    pub fn like_records(&self) -> RecordScan<'_> {
        self.records_of_type(NSID_LIKE)
    }

    pub fn repost_records(&self) -> RecordScan<'_> {
        self.records_of_type(NSID_REPOST)
    }
}

impl<'a> ArchivedRecord<'a> {
    pub fn type_tag(&self) -> Option<&'a str> {
        ipld_str(self.value, "$type")
    }

    /// The strong ref of a like or repost. The cid may be absent on
    /// malformed records, the uri may not.
    pub fn subject(&self) -> Result<StrongRef> {
        let subject = ipld_get(self.value, "subject");
        let uri = subject.and_then(|s| ipld_str(s, "uri"));
        let Some(uri) = uri else {
            return Err(SkeeterError::MalformedRecord {
                uri: self.cid.to_string(),
                reason: "missing subject.uri".to_string(),
            });
        };
        let cid = subject
            .and_then(|s| ipld_get(s, "cid"))
            .and_then(|c| match c {
                Ipld::String(s) => Some(s.clone()),
                Ipld::Link(l) => Some(l.to_string()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(StrongRef {
            uri: uri.to_string(),
            cid,
        })
    }

    /// True when the subject lives in `did`'s repository.
    pub fn subject_authored_by(&self, did: &str) -> bool {
        self.subject()
            .ok()
            .and_then(|s| AtUri::parse(&s.uri))
            .map(|u| u.authority == did)
            .unwrap_or(false)
    }
}

fn ipld_get<'a>(v: &'a Ipld, key: &str) -> Option<&'a Ipld> {
    match v {
        Ipld::Map(m) => m.get(key),
        _ => None,
    }
}

fn ipld_str<'a>(v: &'a Ipld, key: &str) -> Option<&'a str> {
    match ipld_get(v, key) {
        Some(Ipld::String(s)) => Some(s.as_str()),
        _ => None,
    }
}
