/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Fixtures shared by the unit tests: a CAR writer and a scripted client.

use async_trait::async_trait;
use bytes::Bytes;
use cid::multihash::Multihash;
use cid::Cid;
use ipld_core::ipld::Ipld;
use sha2::{Digest as _, Sha256};
use skeeter_protocol::{
    EmbedView, ExternalView, PostView, ProfileViewBasic, ViewerState, NSID_LIKE, NSID_REPOST,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::client::{ContentClient, Page, RepoSource};
use crate::error::{Result, SkeeterError};

const DAG_CBOR: u64 = 0x71;
const SHA2_256: u64 = 0x12;

pub struct CarBuilder {
    version: i128,
    roots: Vec<Cid>,
    blocks: Vec<(Cid, Vec<u8>)>,
}

impl CarBuilder {
    pub fn new() -> Self {
        Self::with_version(1)
    }

    pub fn with_version(version: i128) -> Self {
        Self {
            version,
            roots: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn cid_for(value: &Ipld) -> Cid {
        let bytes = serde_ipld_dagcbor::to_vec(value).unwrap();
        let digest = Sha256::digest(&bytes);
        Cid::new_v1(DAG_CBOR, Multihash::<64>::wrap(SHA2_256, &digest).unwrap())
    }

    pub fn add(&mut self, value: Ipld) -> Cid {
        let bytes = serde_ipld_dagcbor::to_vec(&value).unwrap();
        let cid = Self::cid_for(&value);
        self.blocks.push((cid, bytes));
        cid
    }

    pub fn root(&mut self, cid: Cid) {
        self.roots.push(cid);
    }

    pub fn finish(&self) -> Vec<u8> {
        let header = Ipld::Map(BTreeMap::from([
            ("version".to_string(), Ipld::Integer(self.version)),
            (
                "roots".to_string(),
                Ipld::List(self.roots.iter().map(|c| Ipld::Link(*c)).collect()),
            ),
        ]));
        let header = serde_ipld_dagcbor::to_vec(&header).unwrap();
        let mut out = Vec::new();
        push_varint(&mut out, header.len());
        out.extend_from_slice(&header);
        for (cid, data) in &self.blocks {
            let cid_bytes = cid.to_bytes();
            push_varint(&mut out, cid_bytes.len() + data.len());
            out.extend_from_slice(&cid_bytes);
            out.extend_from_slice(data);
        }
        out
    }
}

fn push_varint(out: &mut Vec<u8>, n: usize) {
    let mut buf = unsigned_varint::encode::u64_buffer();
    out.extend_from_slice(unsigned_varint::encode::u64(n as u64, &mut buf));
}

fn strong_ref(uri: &str, cid: &str) -> Ipld {
    Ipld::Map(BTreeMap::from([
        ("uri".to_string(), Ipld::String(uri.to_string())),
        ("cid".to_string(), Ipld::String(cid.to_string())),
    ]))
}

fn subject_record(nsid: &str, uri: &str, cid: &str) -> Ipld {
    Ipld::Map(BTreeMap::from([
        ("$type".to_string(), Ipld::String(nsid.to_string())),
        ("subject".to_string(), strong_ref(uri, cid)),
        (
            "createdAt".to_string(),
            Ipld::String("2024-01-01T00:00:00.000Z".to_string()),
        ),
    ]))
}

pub fn like_record(uri: &str, cid: &str) -> Ipld {
    subject_record(NSID_LIKE, uri, cid)
}

pub fn repost_record(uri: &str, cid: &str) -> Ipld {
    subject_record(NSID_REPOST, uri, cid)
}

pub fn post_record(text: &str) -> Ipld {
    Ipld::Map(BTreeMap::from([
        (
            "$type".to_string(),
            Ipld::String(skeeter_protocol::NSID_POST.to_string()),
        ),
        ("text".to_string(), Ipld::String(text.to_string())),
    ]))
}

/// A repository tree node whose entries point at `targets`.
pub fn tree_node(targets: &[Cid]) -> Ipld {
    let entries = targets
        .iter()
        .enumerate()
        .map(|(i, c)| {
            Ipld::Map(BTreeMap::from([
                ("p".to_string(), Ipld::Integer(0)),
                ("k".to_string(), Ipld::Bytes(format!("key{i}").into_bytes())),
                ("v".to_string(), Ipld::Link(*c)),
                ("t".to_string(), Ipld::Null),
            ]))
        })
        .collect();
    Ipld::Map(BTreeMap::from([
        ("l".to_string(), Ipld::Null),
        ("e".to_string(), Ipld::List(entries)),
    ]))
}

pub struct PostBuilder {
    post: PostView,
}

pub fn post(author: &str, rkey: &str) -> PostBuilder {
    PostBuilder {
        post: PostView {
            uri: format!("at://{author}/app.bsky.feed.post/{rkey}"),
            cid: format!("bafy{rkey}"),
            author: ProfileViewBasic {
                did: author.to_string(),
                handle: format!("{}.test", author.trim_start_matches("did:plc:")),
                display_name: None,
            },
            record: serde_json::json!({
                "text": format!("post {rkey}"),
                "createdAt": "2024-01-01T00:00:00.000Z",
            }),
            embed: None,
            repost_count: 0,
            viewer: ViewerState::default(),
        },
    }
}

impl PostBuilder {
    pub fn created_at(mut self, ts: &str) -> Self {
        self.post.record["createdAt"] = serde_json::Value::String(ts.to_string());
        self
    }

    pub fn without_created_at(mut self) -> Self {
        if let Some(obj) = self.post.record.as_object_mut() {
            obj.remove("createdAt");
        }
        self
    }

    pub fn reposts(mut self, n: u64) -> Self {
        self.post.repost_count = n;
        self
    }

    pub fn external(mut self, url: &str) -> Self {
        self.post.embed = Some(EmbedView {
            kind: Some("app.bsky.embed.external#view".to_string()),
            external: Some(ExternalView {
                uri: url.to_string(),
                title: String::new(),
                description: String::new(),
            }),
        });
        self
    }

    pub fn liked_via(mut self, like_ref: &str) -> Self {
        self.post.viewer.like = Some(like_ref.to_string());
        self
    }

    pub fn reposted_via(mut self, repost_ref: &str) -> Self {
        self.post.viewer.repost = Some(repost_ref.to_string());
        self
    }

    pub fn build(self) -> PostView {
        self.post
    }
}

/// Scripted in-memory client. Pages are keyed by the cursor that requests
/// them ("" for the first page).
#[derive(Default)]
pub struct FakeClient {
    pub did: String,
    pub handle: String,
    pub feed_pages: HashMap<String, Page<PostView>>,
    pub like_pages: HashMap<String, Page<PostView>>,
    /// (subject uri, cursor) -> page of liker DIDs.
    pub likers: HashMap<(String, String), Page<String>>,
    pub posts: HashMap<String, PostView>,
    /// Cursors that fail this many more times before succeeding.
    pub failing_cursors: Mutex<HashMap<String, u32>>,
    /// Zero-based detail call indices that fail.
    pub failing_detail_calls: HashSet<usize>,
    /// References whose mutation fails.
    pub failing_refs: HashSet<String>,
    pub detail_calls: Mutex<Vec<usize>>,
    pub requested_cursors: Mutex<Vec<String>>,
    pub mutations: Mutex<Vec<String>>,
    pub blobs: Vec<(String, Vec<u8>)>,
    pub repo: Vec<u8>,
}

impl FakeClient {
    pub fn new(did: &str) -> Self {
        Self {
            did: did.to_string(),
            handle: "me.test".to_string(),
            ..Default::default()
        }
    }

    pub fn with_posts(mut self, posts: impl IntoIterator<Item = PostView>) -> Self {
        for p in posts {
            self.posts.insert(p.uri.clone(), p);
        }
        self
    }

    pub fn fail_cursor(&self, cursor: &str, times: u32) {
        self.failing_cursors
            .lock()
            .unwrap()
            .insert(cursor.to_string(), times);
    }

    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }

    fn page_for<T: Clone>(
        &self,
        pages: &HashMap<String, Page<T>>,
        cursor: Option<&str>,
    ) -> Result<Page<T>> {
        let key = cursor.unwrap_or("").to_string();
        self.requested_cursors.lock().unwrap().push(key.clone());
        if let Some(left) = self.failing_cursors.lock().unwrap().get_mut(&key) {
            if *left > 0 {
                *left -= 1;
                return Err(SkeeterError::Transport(format!("scripted failure at {key:?}")));
            }
        }
        Ok(pages
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Page::last(Vec::new())))
    }

    fn mutate(&self, op: &str, reference: &str) -> Result<()> {
        self.mutations
            .lock()
            .unwrap()
            .push(format!("{op}:{reference}"));
        if self.failing_refs.contains(reference) {
            return Err(SkeeterError::Transport(format!("{op} {reference}: 400")));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentClient for FakeClient {
    fn actor_did(&self) -> &str {
        &self.did
    }

    fn actor_handle(&self) -> &str {
        &self.handle
    }

    async fn fetch_own_feed(&self, cursor: Option<&str>, _limit: u32) -> Result<Page<PostView>> {
        self.page_for(&self.feed_pages, cursor)
    }

    async fn fetch_own_likes(&self, cursor: Option<&str>, _limit: u32) -> Result<Page<PostView>> {
        self.page_for(&self.like_pages, cursor)
    }

    async fn fetch_likes_of(
        &self,
        uri: &str,
        cursor: Option<&str>,
        _limit: u32,
    ) -> Result<Page<String>> {
        let key = cursor.unwrap_or("").to_string();
        if let Some(left) = self.failing_cursors.lock().unwrap().get_mut(&key) {
            if *left > 0 {
                *left -= 1;
                return Err(SkeeterError::Transport(format!("scripted failure at {key:?}")));
            }
        }
        Ok(self
            .likers
            .get(&(uri.to_string(), key))
            .cloned()
            .unwrap_or_else(|| Page::last(Vec::new())))
    }

    async fn fetch_details(&self, uris: &[String]) -> Result<Vec<PostView>> {
        let call = {
            let mut calls = self.detail_calls.lock().unwrap();
            calls.push(uris.len());
            calls.len() - 1
        };
        if self.failing_detail_calls.contains(&call) {
            return Err(SkeeterError::Transport(format!("getPosts call {call}: 502")));
        }
        Ok(uris
            .iter()
            .filter_map(|u| self.posts.get(u).cloned())
            .collect())
    }

    async fn unlike(&self, like_ref: &str) -> Result<()> {
        self.mutate("unlike", like_ref)
    }

    async fn unrepost(&self, repost_ref: &str) -> Result<()> {
        self.mutate("unrepost", repost_ref)
    }

    async fn delete_post(&self, uri: &str) -> Result<()> {
        self.mutate("delete", uri)
    }
}

#[async_trait]
impl RepoSource for FakeClient {
    async fn fetch_repo(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.repo.clone()))
    }

    async fn list_blobs(&self, cursor: Option<&str>) -> Result<Page<String>> {
        // Two blobs per page; the cursor is the index of the next blob.
        let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + 2).min(self.blobs.len());
        let items = self.blobs[start..end]
            .iter()
            .map(|(cid, _)| cid.clone())
            .collect();
        let next = (end < self.blobs.len()).then(|| end.to_string());
        Ok(Page::new(items, next))
    }

    async fn fetch_blob(&self, cid: &str) -> Result<Bytes> {
        self.blobs
            .iter()
            .find(|(c, _)| c == cid)
            .map(|(_, b)| Bytes::from(b.clone()))
            .ok_or_else(|| SkeeterError::Transport(format!("getBlob {cid}: 404")))
    }
}
