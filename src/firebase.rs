//! Firebase Realtime Database backend.
//!
//! Talks to the database over its REST interface:
//!
//! - **replace**: `PUT {database_url}/{root_path}.json` with the full tree.
//! - **subscribe**: `GET` the same URL with `Accept: text/event-stream`.
//!   The server streams `put` and `patch` events, each carrying a `path`
//!   relative to the subscribed node and the new `data` at that path. The
//!   events are applied to a locally cached tree and the whole tree is
//!   emitted after each one.
//!
//! `keep-alive` events are ignored. `cancel` (security rules no longer
//! allow the read) and `auth_revoked` (token expired) end the stream with
//! an error, as does any transport failure or the server closing the
//! connection.

use std::collections::VecDeque;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::StoreConfig;
use crate::sse::{SseDecoder, SseEvent};
use talctrack_core::store::{RemoteStore, SnapshotStream};

pub struct FirebaseRemote {
    url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl FirebaseRemote {
    /// # Errors
    ///
    /// Fails when `database_url` is missing or `auth_token_env` names an
    /// unset variable.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow!("store.database_url is required for the firebase backend"))?;

        let auth_token = match &config.auth_token_env {
            Some(var) => Some(
                std::env::var(var)
                    .ok()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| anyhow!("{} environment variable not set", var))?,
            ),
            None => None,
        };

        Self::new(database_url, &config.root_path, auth_token)
    }

    pub fn new(database_url: &str, root_path: &str, auth_token: Option<String>) -> Result<Self> {
        // No request timeout: the subscription is a long-lived response.
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            url: document_url(database_url, root_path),
            auth_token,
            client,
        })
    }

    /// REST URL of the ledger document.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, &self.url);
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }
}

fn document_url(database_url: &str, root_path: &str) -> String {
    format!(
        "{}/{}.json",
        database_url.trim_end_matches('/'),
        root_path.trim_matches('/')
    )
}

#[async_trait]
impl RemoteStore for FirebaseRemote {
    fn backend(&self) -> &str {
        "firebase"
    }

    async fn subscribe(&self) -> Result<SnapshotStream> {
        let response = self
            .request(reqwest::Method::GET)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .context("Firebase subscription request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Firebase subscription rejected {}: {}", status, body.trim());
        }

        tracing::info!(url = %self.url, "firebase subscription open");

        let state = EventState {
            bytes: response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()))
                .boxed(),
            decoder: SseDecoder::new(),
            tree: TreeCache::default(),
            pending: VecDeque::new(),
            done: false,
        };
        Ok(futures::stream::unfold(state, EventState::next).boxed())
    }

    async fn replace(&self, document: &Value) -> Result<()> {
        let response = self
            .request(reqwest::Method::PUT)
            .json(document)
            .send()
            .await
            .context("Firebase write request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Firebase write rejected {}: {}", status, body.trim());
        }
        tracing::debug!(url = %self.url, "firebase document replaced");
        Ok(())
    }
}

struct EventState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    tree: TreeCache,
    pending: VecDeque<Result<Value>>,
    done: bool,
}

impl EventState {
    async fn next(mut self) -> Option<(Result<Value>, Self)> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some((item, self));
            }
            if self.done {
                return None;
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in self.decoder.push(&chunk) {
                        match self.tree.apply(&event) {
                            Ok(Some(tree)) => self.pending.push_back(Ok(tree)),
                            Ok(None) => {}
                            Err(e) => {
                                self.pending.push_back(Err(e));
                                self.done = true;
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some((Err(anyhow!("Firebase event stream failed: {}", e)), self));
                }
                None => {
                    self.done = true;
                    return Some((Err(anyhow!("Firebase closed the event stream")), self));
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

/// Local copy of the subscribed node, kept current from stream events.
#[derive(Debug, Default)]
pub(crate) struct TreeCache {
    tree: Value,
}

impl TreeCache {
    /// Apply one event. Returns the full tree after `put`/`patch`, `None`
    /// for events that carry no data change.
    pub(crate) fn apply(&mut self, event: &SseEvent) -> Result<Option<Value>> {
        match event.event.as_str() {
            "put" => {
                let PathData { path, data } = parse_payload(event)?;
                set_at(&mut self.tree, &path, data);
                Ok(Some(self.tree.clone()))
            }
            "patch" => {
                let PathData { path, data } = parse_payload(event)?;
                let Value::Object(children) = data else {
                    bail!("Firebase patch at {} is not an object", path);
                };
                for (key, value) in children {
                    set_at(&mut self.tree, &format!("{}/{}", path, key), value);
                }
                Ok(Some(self.tree.clone()))
            }
            "keep-alive" => Ok(None),
            "cancel" => {
                tracing::warn!(reason = %event.data, "firebase subscription cancelled");
                bail!("Firebase cancelled the subscription: {}", event.data)
            }
            "auth_revoked" => bail!("Firebase auth token revoked; re-authenticate and retry"),
            other => {
                tracing::debug!(event = other, "ignoring firebase event");
                Ok(None)
            }
        }
    }
}

fn parse_payload(event: &SseEvent) -> Result<PathData> {
    serde_json::from_str(&event.data)
        .with_context(|| format!("malformed Firebase {} event", event.event))
}

/// Replace the node at `path` (slash separated) with `value`. A `null`
/// value deletes the node.
fn set_at(tree: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *tree = value;
        return;
    };

    let mut node = tree;
    for segment in parents {
        node = as_object(node)
            .entry(segment.to_string())
            .or_insert(Value::Null);
    }

    let map = as_object(node);
    if value.is_null() {
        map.remove(*last);
    } else {
        map.insert(last.to_string(), value);
    }
}

/// View a node as an object, re-keying arrays by index the way the
/// database addresses their children.
fn as_object(node: &mut Value) -> &mut Map<String, Value> {
    if let Value::Array(items) = node {
        let map = std::mem::take(items)
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *node = Value::Object(map);
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        unreachable!("node was just made an object")
    };
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, data: Value) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn document_urls() {
        assert_eq!(
            document_url("https://talc.firebaseio.com/", "/"),
            "https://talc.firebaseio.com/.json"
        );
        assert_eq!(
            document_url("https://talc.firebaseio.com", "/shops/main/"),
            "https://talc.firebaseio.com/shops/main.json"
        );
    }

    #[test]
    fn initial_put_replaces_tree() {
        let mut cache = TreeCache::default();
        let tree = cache
            .apply(&event("put", json!({"path": "/", "data": {"receivables": []}})))
            .unwrap()
            .unwrap();
        assert_eq!(tree, json!({"receivables": []}));
    }

    #[test]
    fn nested_put_and_delete() {
        let mut cache = TreeCache::default();
        cache
            .apply(&event(
                "put",
                json!({"path": "/", "data": {"receivables": [{"id": "a"}, {"id": "b"}]}}),
            ))
            .unwrap();

        let tree = cache
            .apply(&event("put", json!({"path": "/receivables/1", "data": null})))
            .unwrap()
            .unwrap();
        assert_eq!(tree, json!({"receivables": {"0": {"id": "a"}}}));

        let tree = cache
            .apply(&event("put", json!({"path": "/payables", "data": [{"id": "p"}]})))
            .unwrap()
            .unwrap();
        assert_eq!(tree["payables"], json!([{"id": "p"}]));
    }

    #[test]
    fn patch_merges_children() {
        let mut cache = TreeCache::default();
        cache
            .apply(&event("put", json!({"path": "/", "data": {"a": 1, "b": 2}})))
            .unwrap();
        let tree = cache
            .apply(&event("patch", json!({"path": "/", "data": {"b": 3, "c": 4}})))
            .unwrap()
            .unwrap();
        assert_eq!(tree, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn keep_alive_is_silent_and_cancel_fails() {
        let mut cache = TreeCache::default();
        assert!(cache.apply(&event("keep-alive", Value::Null)).unwrap().is_none());
        assert!(cache
            .apply(&SseEvent {
                event: "cancel".into(),
                data: "Permission denied".into()
            })
            .is_err());
        assert!(cache.apply(&event("auth_revoked", json!("expired"))).is_err());
    }
}
