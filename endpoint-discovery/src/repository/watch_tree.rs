/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Recursive watch over one store subtree, mirrored into a path → descriptor cache.
//!
//! Store watches are one-shot, so every notification re-reads the node and re-arms its
//! watches. Watch callbacks never touch the store; they push a [`WorkItem`] onto the tree's
//! channel and a single worker task drains it. Paths discovered while refreshing a node go
//! onto the worker's local queue, which turns the recursion into a breadth-first walk.
//!
//! Every item carries the generation of the session it was produced under. After a session
//! is restored the generation moves on and anything queued earlier is dropped. Replays to a
//! late subscriber run on the same worker, so they are ordered with the live events.

use crate::codec::DescriptionCodec;
use crate::coordination::paths::{child_path, is_within};
use crate::coordination::{
    CoordinationSession, CoordinationStore, NodeEvent, NodeEventKind, NodeWatcher, SessionAware,
};
use crate::description::EndpointDescription;
use crate::error::{FailureClass, StoreError};
use crate::event::{EndpointEvent, EndpointEventKind, EndpointEventSink};
use crate::observability::{events, fields};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

const COMPONENT: &str = "watch_tree";

enum WorkItem {
    /// Re-read a node, re-arm its watches and queue unseen children.
    Refresh { path: String, generation: u64 },
    /// The node is gone; drop it and everything below it.
    Deleted { path: String, generation: u64 },
    /// Walk the whole subtree and replace the cache with what was found.
    Resync { generation: u64 },
    /// Send an ADDED for every cached descriptor to `sink`. Valid in any generation.
    Replay { sink: Arc<dyn EndpointEventSink> },
}

impl WorkItem {
    fn generation(&self) -> Option<u64> {
        match self {
            WorkItem::Refresh { generation, .. }
            | WorkItem::Deleted { generation, .. }
            | WorkItem::Resync { generation } => Some(*generation),
            WorkItem::Replay { .. } => None,
        }
    }
}

struct TreeWatcher {
    tree: Weak<WatchTree>,
    generation: u64,
}

#[async_trait]
impl NodeWatcher for TreeWatcher {
    async fn on_node_event(&self, event: NodeEvent) {
        let Some(tree) = self.tree.upgrade() else {
            return;
        };
        let item = match event.kind {
            NodeEventKind::NodeDeleted => WorkItem::Deleted {
                path: event.path,
                generation: self.generation,
            },
            NodeEventKind::NodeCreated
            | NodeEventKind::NodeDataChanged
            | NodeEventKind::NodeChildrenChanged => WorkItem::Refresh {
                path: event.path,
                generation: self.generation,
            },
        };
        tree.enqueue(item);
    }
}

enum NodeRead {
    Present {
        children: Vec<String>,
        data: Vec<u8>,
    },
    Missing,
    Failed,
}

/// Mirror of one store subtree.
pub(crate) struct WatchTree {
    this: Weak<WatchTree>,
    label: String,
    root: String,
    session: Arc<CoordinationSession>,
    codec: Arc<dyn DescriptionCodec>,
    sink: Arc<dyn EndpointEventSink>,
    cache: Mutex<HashMap<String, EndpointDescription>>,
    watched: Mutex<HashSet<String>>,
    watcher: StdMutex<Option<Arc<TreeWatcher>>>,
    work: StdMutex<Option<mpsc::UnboundedSender<WorkItem>>>,
    generation: AtomicU64,
    stopped: AtomicBool,
}

impl WatchTree {
    pub(crate) fn new(
        label: &str,
        root: &str,
        session: Arc<CoordinationSession>,
        codec: Arc<dyn DescriptionCodec>,
        sink: Arc<dyn EndpointEventSink>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            label: label.to_string(),
            root: root.to_string(),
            session,
            codec,
            sink,
            cache: Mutex::new(HashMap::new()),
            watched: Mutex::new(HashSet::new()),
            watcher: StdMutex::new(None),
            work: StdMutex::new(None),
            generation: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        })
    }

    pub(crate) fn root(&self) -> &str {
        &self.root
    }

    /// Spawns the worker and queues the initial walk. Later calls are no-ops.
    pub(crate) fn start(&self) {
        let receiver = {
            let mut work = self.work.lock().unwrap_or_else(PoisonError::into_inner);
            if work.is_some() || self.stopped.load(Ordering::SeqCst) {
                return;
            }
            let (sender, receiver) = mpsc::unbounded_channel();
            *work = Some(sender);
            receiver
        };

        info!(
            event = events::WATCH_TREE_START,
            component = COMPONENT,
            label = %self.label,
            path = %self.root,
            "starting recursive watch"
        );
        tokio::spawn(Self::run(self.this.clone(), receiver));
        let generation = self.advance_generation();
        self.enqueue(WorkItem::Resync { generation });
    }

    /// Stops the worker. Events still queued are dropped; the cache keeps its last state.
    pub(crate) fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.work
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        info!(
            event = events::WATCH_TREE_STOP,
            component = COMPONENT,
            label = %self.label,
            path = %self.root,
            "stopped recursive watch"
        );
    }

    /// Discards every armed watch and queued item and re-walks the subtree.
    pub(crate) async fn resync(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let generation = self.advance_generation();
        self.watched.lock().await.clear();
        self.enqueue(WorkItem::Resync { generation });
    }

    /// Queues an ADDED for every cached descriptor, in path order, to `sink`.
    ///
    /// The replay runs on the worker between live events: an endpoint removed before it runs
    /// is not replayed, and one removed after it gets its REMOVED through the regular sink.
    pub(crate) fn replay(&self, sink: Arc<dyn EndpointEventSink>) {
        self.enqueue(WorkItem::Replay { sink });
    }

    /// Cached descriptors ordered by store path.
    pub(crate) async fn descriptions(&self) -> Vec<EndpointDescription> {
        let cache = self.cache.lock().await;
        let ordered: BTreeMap<&String, &EndpointDescription> = cache.iter().collect();
        ordered.into_values().cloned().collect()
    }

    pub(crate) async fn description_at(&self, path: &str) -> Option<EndpointDescription> {
        self.cache.lock().await.get(path).cloned()
    }

    pub(crate) async fn cached_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.cache.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn advance_generation(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.watcher.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(TreeWatcher {
                tree: self.this.clone(),
                generation,
            }));
        generation
    }

    fn current_watcher(&self) -> Option<Arc<dyn NodeWatcher>> {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .map(|watcher| watcher as Arc<dyn NodeWatcher>)
    }

    fn enqueue(&self, item: WorkItem) {
        if let Some(sender) = self
            .work
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            let _ = sender.send(item);
        }
    }

    async fn run(tree: Weak<WatchTree>, mut receiver: mpsc::UnboundedReceiver<WorkItem>) {
        let mut pending = VecDeque::new();
        while let Some(item) = receiver.recv().await {
            let Some(tree) = tree.upgrade() else {
                return;
            };
            pending.push_back(item);
            while let Some(item) = pending.pop_front() {
                if tree.stopped.load(Ordering::SeqCst) {
                    return;
                }
                tree.process(item, &mut pending).await;
            }
        }
    }

    async fn process(&self, item: WorkItem, pending: &mut VecDeque<WorkItem>) {
        let current = self.generation.load(Ordering::SeqCst);
        if let Some(generation) = item.generation().filter(|generation| *generation != current) {
            debug!(
                event = events::WATCH_STALE_GENERATION,
                component = COMPONENT,
                label = %self.label,
                generation,
                current,
                "dropping work item from a superseded session"
            );
            return;
        }

        match item {
            WorkItem::Refresh { path, generation } => {
                self.refresh(path, generation, pending).await
            }
            WorkItem::Deleted { path, generation } => self.vanished(&path, generation).await,
            WorkItem::Resync { generation } => self.full_resync(generation).await,
            WorkItem::Replay { sink } => self.replay_cached(sink.as_ref()).await,
        }
    }

    async fn replay_cached(&self, sink: &dyn EndpointEventSink) {
        let known = self.descriptions().await;
        debug!(
            event = events::WATCH_REPLAY,
            component = COMPONENT,
            label = %self.label,
            path = %self.root,
            replayed = known.len(),
            "replaying cached endpoints"
        );
        for description in known {
            sink.endpoint_event(EndpointEvent::added(description)).await;
        }
    }

    fn live_store(&self) -> Option<Arc<dyn CoordinationStore>> {
        match self.session.store() {
            Ok(store) => Some(store),
            Err(err) => {
                debug!(
                    event = events::WATCH_REFRESH_FAILED,
                    component = COMPONENT,
                    label = %self.label,
                    reason = fields::REASON_NO_SESSION,
                    err = %err,
                    "no live session; waiting for resync"
                );
                None
            }
        }
    }

    async fn read_node(
        &self,
        store: &Arc<dyn CoordinationStore>,
        path: &str,
        watcher: &Arc<dyn NodeWatcher>,
    ) -> NodeRead {
        let read = async {
            let children = store.get_children(path, Some(watcher.clone())).await?;
            let data = store.get_data(path, Some(watcher.clone())).await?;
            Ok::<_, StoreError>(NodeRead::Present { children, data })
        };

        match read.await {
            Ok(node) => node,
            Err(err) if err.is_no_node() => NodeRead::Missing,
            Err(err) => {
                let reason = match err.class() {
                    FailureClass::Transient => fields::REASON_TRANSIENT,
                    FailureClass::SessionExpired => fields::REASON_SESSION_EXPIRED,
                    FailureClass::Race | FailureClass::Fatal => fields::NONE,
                };
                warn!(
                    event = events::WATCH_REFRESH_FAILED,
                    component = COMPONENT,
                    label = %self.label,
                    path,
                    reason,
                    err = %err,
                    "unable to refresh watched node"
                );
                NodeRead::Failed
            }
        }
    }

    fn decode(&self, path: &str, data: &[u8]) -> Option<EndpointDescription> {
        match self.codec.decode(data) {
            Ok(description) => Some(description),
            Err(err) => {
                warn!(
                    event = events::WATCH_DECODE_FAILED,
                    component = COMPONENT,
                    label = %self.label,
                    path,
                    err = %err,
                    "ignoring node payload that does not decode"
                );
                None
            }
        }
    }

    async fn refresh(&self, path: String, generation: u64, pending: &mut VecDeque<WorkItem>) {
        let (Some(store), Some(watcher)) = (self.live_store(), self.current_watcher()) else {
            return;
        };

        let (children, data) = match self.read_node(&store, &path, &watcher).await {
            NodeRead::Present { children, data } => (children, data),
            NodeRead::Missing => {
                self.vanished(&path, generation).await;
                return;
            }
            NodeRead::Failed => {
                self.watched.lock().await.remove(&path);
                return;
            }
        };

        self.watched.lock().await.insert(path.clone());

        if data.is_empty() {
            let removed = self.cache.lock().await.remove(&path);
            if let Some(previous) = removed {
                self.emit(&path, EndpointEvent::removed(previous)).await;
            }
        } else if let Some(description) = self.decode(&path, &data) {
            let event = {
                let mut cache = self.cache.lock().await;
                match cache.insert(path.clone(), description.clone()) {
                    None => Some(EndpointEvent::added(description)),
                    Some(previous) if previous != description => {
                        Some(EndpointEvent::modified(description))
                    }
                    Some(_) => None,
                }
            };
            if let Some(event) = event {
                self.emit(&path, event).await;
            }
        }

        let watched = self.watched.lock().await;
        for child in children {
            let child = child_path(&path, &child);
            if !watched.contains(&child) {
                pending.push_back(WorkItem::Refresh {
                    path: child,
                    generation,
                });
            }
        }
    }

    async fn vanished(&self, path: &str, generation: u64) {
        let removed: BTreeMap<String, EndpointDescription> = {
            let mut cache = self.cache.lock().await;
            let gone: Vec<String> = cache
                .keys()
                .filter(|cached| is_within(cached, path))
                .cloned()
                .collect();
            gone.into_iter()
                .filter_map(|gone| cache.remove(&gone).map(|description| (gone, description)))
                .collect()
        };
        self.watched
            .lock()
            .await
            .retain(|watched| !is_within(watched, path));

        debug!(
            event = events::WATCH_NODE_VANISHED,
            component = COMPONENT,
            label = %self.label,
            path,
            removed = removed.len(),
            reason = fields::REASON_NODE_VANISHED,
            "node vanished from watched subtree"
        );
        for (removed_path, description) in removed {
            self.emit(&removed_path, EndpointEvent::removed(description))
                .await;
        }

        if path == self.root {
            self.await_root(generation).await;
        }
    }

    /// Arms an existence watch on the missing root so its creation restarts the walk.
    async fn await_root(&self, generation: u64) {
        let (Some(store), Some(watcher)) = (self.live_store(), self.current_watcher()) else {
            return;
        };
        match store.exists(&self.root, Some(watcher)).await {
            Ok(true) => self.enqueue(WorkItem::Refresh {
                path: self.root.clone(),
                generation,
            }),
            Ok(false) => debug!(
                event = events::WATCH_ROOT_MISSING,
                component = COMPONENT,
                label = %self.label,
                path = %self.root,
                "watch root does not exist yet; waiting for its creation"
            ),
            Err(err) => warn!(
                event = events::WATCH_REFRESH_FAILED,
                component = COMPONENT,
                label = %self.label,
                path = %self.root,
                err = %err,
                "unable to arm existence watch on watch root"
            ),
        }
    }

    async fn full_resync(&self, generation: u64) {
        let (Some(store), Some(watcher)) = (self.live_store(), self.current_watcher()) else {
            return;
        };
        debug!(
            event = events::WATCH_RESYNC_START,
            component = COMPONENT,
            label = %self.label,
            path = %self.root,
            generation,
            "walking watched subtree"
        );

        let mut snapshot = BTreeMap::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([self.root.clone()]);
        while let Some(path) = queue.pop_front() {
            match self.read_node(&store, &path, &watcher).await {
                NodeRead::Present { children, data } => {
                    if !data.is_empty() {
                        if let Some(description) = self.decode(&path, &data) {
                            snapshot.insert(path.clone(), description);
                        }
                    }
                    queue.extend(children.iter().map(|child| child_path(&path, child)));
                    visited.insert(path);
                }
                NodeRead::Missing if path == self.root => {
                    self.await_root(generation).await;
                }
                NodeRead::Missing => {}
                NodeRead::Failed => {
                    warn!(
                        event = events::WATCH_REFRESH_FAILED,
                        component = COMPONENT,
                        label = %self.label,
                        path = %self.root,
                        generation,
                        "abandoning resync; cache left unchanged"
                    );
                    return;
                }
            }
        }

        let diff = {
            let mut cache = self.cache.lock().await;
            let mut diff: BTreeMap<String, EndpointEvent> = BTreeMap::new();
            for (path, previous) in cache.iter() {
                if !snapshot.contains_key(path) {
                    diff.insert(path.clone(), EndpointEvent::removed(previous.clone()));
                }
            }
            for (path, description) in &snapshot {
                match cache.get(path) {
                    None => {
                        diff.insert(path.clone(), EndpointEvent::added(description.clone()));
                    }
                    Some(previous) if previous != description => {
                        diff.insert(path.clone(), EndpointEvent::modified(description.clone()));
                    }
                    Some(_) => {}
                }
            }
            *cache = snapshot.into_iter().collect();
            diff
        };
        *self.watched.lock().await = visited;

        info!(
            event = events::WATCH_RESYNC_OK,
            component = COMPONENT,
            label = %self.label,
            path = %self.root,
            generation,
            changes = diff.len(),
            "watched subtree resynchronized"
        );
        for (path, event) in diff {
            self.emit(&path, event).await;
        }
    }

    async fn emit(&self, path: &str, event: EndpointEvent) {
        let name = match event.kind {
            EndpointEventKind::Added => events::ENDPOINT_ADDED,
            EndpointEventKind::Modified => events::ENDPOINT_MODIFIED,
            EndpointEventKind::Removed => events::ENDPOINT_REMOVED,
        };
        debug!(
            event = name,
            component = COMPONENT,
            label = %self.label,
            path,
            endpoint_id = event.description.id(),
            kind = fields::format_event_kind(event.kind),
            "endpoint change observed"
        );
        self.sink.endpoint_event(event).await;
    }
}

#[async_trait]
impl SessionAware for WatchTree {
    async fn session_restored(&self) {
        self.resync().await;
    }

    async fn connection_restored(&self) {
        self.resync().await;
    }
}

#[cfg(test)]
mod tests {
    use super::WatchTree;
    use crate::codec::{DescriptionCodec, JsonDescriptionCodec};
    use crate::coordination::{
        CoordinationSession, CoordinationStore, CreateMode, InMemoryEnsemble, SessionAware,
    };
    use crate::description::EndpointDescription;
    use crate::event::{EndpointEvent, EndpointEventKind, EndpointEventSink};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<EndpointEvent>>,
    }

    #[async_trait]
    impl EndpointEventSink for RecordingSink {
        async fn endpoint_event(&self, event: EndpointEvent) {
            self.events.lock().await.push(event);
        }
    }

    impl RecordingSink {
        async fn kinds(&self) -> Vec<(EndpointEventKind, String)> {
            self.events
                .lock()
                .await
                .iter()
                .map(|event| (event.kind, event.description.id().to_string()))
                .collect()
        }
    }

    fn description(id: &str, version: i64) -> EndpointDescription {
        EndpointDescription::builder(id)
            .interface("org.example.A")
            .property("version", version)
            .build()
            .expect("description should build")
    }

    fn payload(id: &str, version: i64) -> Vec<u8> {
        JsonDescriptionCodec
            .encode(&description(id, version))
            .expect("encode")
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    async fn tree_over(
        ensemble: &InMemoryEnsemble,
        root: &str,
    ) -> (Arc<WatchTree>, Arc<RecordingSink>, Arc<CoordinationSession>) {
        let session = CoordinationSession::connect(Arc::new(ensemble.clone()), true)
            .await
            .expect("connect");
        let sink = Arc::new(RecordingSink::default());
        let tree = WatchTree::new(
            "test",
            root,
            session.clone(),
            Arc::new(JsonDescriptionCodec),
            sink.clone(),
        );
        (tree, sink, session)
    }

    #[tokio::test]
    async fn initial_walk_picks_up_nested_endpoints() {
        let ensemble = InMemoryEnsemble::new();
        let writer = ensemble.open_session(None);
        writer.create("/r", b"", CreateMode::Persistent).await.unwrap();
        writer.create("/r/a", b"", CreateMode::Persistent).await.unwrap();
        writer
            .create("/r/a/one", &payload("one", 1), CreateMode::Ephemeral)
            .await
            .unwrap();

        let (tree, sink, _session) = tree_over(&ensemble, "/r").await;
        tree.start();
        settle().await;

        assert_eq!(
            sink.kinds().await,
            vec![(EndpointEventKind::Added, "one".to_string())]
        );
        assert_eq!(tree.cached_paths().await, vec!["/r/a/one"]);
    }

    #[tokio::test]
    async fn changes_after_start_emit_added_modified_removed() {
        let ensemble = InMemoryEnsemble::new();
        let writer = ensemble.open_session(None);
        writer.create("/r", b"", CreateMode::Persistent).await.unwrap();

        let (tree, sink, _session) = tree_over(&ensemble, "/r").await;
        tree.start();
        settle().await;

        writer.create("/r/b", b"", CreateMode::Persistent).await.unwrap();
        writer
            .create("/r/b/x", &payload("x", 1), CreateMode::Ephemeral)
            .await
            .unwrap();
        settle().await;
        writer.set_data("/r/b/x", &payload("x", 1)).await.unwrap();
        settle().await;
        writer.set_data("/r/b/x", &payload("x", 2)).await.unwrap();
        settle().await;
        writer.delete("/r/b/x").await.unwrap();
        settle().await;

        assert_eq!(
            sink.kinds().await,
            vec![
                (EndpointEventKind::Added, "x".to_string()),
                (EndpointEventKind::Modified, "x".to_string()),
                (EndpointEventKind::Removed, "x".to_string()),
            ]
        );
        assert!(tree.descriptions().await.is_empty());
    }

    #[tokio::test]
    async fn missing_root_is_picked_up_once_created() {
        let ensemble = InMemoryEnsemble::new();
        let writer = ensemble.open_session(None);

        let (tree, sink, _session) = tree_over(&ensemble, "/late").await;
        tree.start();
        settle().await;
        assert!(sink.kinds().await.is_empty());

        writer.create("/late", b"", CreateMode::Persistent).await.unwrap();
        writer
            .create("/late/e", &payload("e", 1), CreateMode::Ephemeral)
            .await
            .unwrap();
        settle().await;

        assert_eq!(
            sink.kinds().await,
            vec![(EndpointEventKind::Added, "e".to_string())]
        );
    }

    #[tokio::test]
    async fn undecodable_payloads_are_skipped() {
        let ensemble = InMemoryEnsemble::new();
        let writer = ensemble.open_session(None);
        writer.create("/r", b"", CreateMode::Persistent).await.unwrap();
        writer
            .create("/r/bad", b"not json", CreateMode::Ephemeral)
            .await
            .unwrap();

        let (tree, sink, _session) = tree_over(&ensemble, "/r").await;
        tree.start();
        settle().await;

        assert!(sink.kinds().await.is_empty());
        assert!(tree.description_at("/r/bad").await.is_none());
    }

    #[tokio::test]
    async fn resync_emits_only_the_difference() {
        let ensemble = InMemoryEnsemble::new();
        let writer = ensemble.open_session(None);
        writer.create("/r", b"", CreateMode::Persistent).await.unwrap();
        writer
            .create("/r/keep", &payload("keep", 1), CreateMode::Persistent)
            .await
            .unwrap();
        writer
            .create("/r/gone", &payload("gone", 1), CreateMode::Persistent)
            .await
            .unwrap();

        let (tree, sink, session) = tree_over(&ensemble, "/r").await;
        let listener: Arc<dyn SessionAware> = tree.clone();
        session.add_session_listener(Arc::downgrade(&listener));
        tree.start();
        settle().await;
        sink.events.lock().await.clear();

        // Reads fail while the connection is down; only the resync sees these changes.
        let session_id = session.session_id().expect("active session");
        ensemble.inject_fault(
            session_id,
            Some(crate::error::StoreError::ConnectionLoss),
        );
        writer.delete("/r/gone").await.unwrap();
        writer.set_data("/r/keep", &payload("keep", 2)).await.unwrap();
        writer
            .create("/r/new", &payload("new", 1), CreateMode::Persistent)
            .await
            .unwrap();
        settle().await;
        ensemble.expire_session(session_id);
        settle().await;

        let mut kinds = sink.kinds().await;
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                (EndpointEventKind::Added, "new".to_string()),
                (EndpointEventKind::Modified, "keep".to_string()),
                (EndpointEventKind::Removed, "gone".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn recovered_connection_rearms_watches() {
        let ensemble = InMemoryEnsemble::new();
        let writer = ensemble.open_session(None);
        writer.create("/r", b"", CreateMode::Persistent).await.unwrap();
        writer
            .create("/r/x", &payload("x", 1), CreateMode::Persistent)
            .await
            .unwrap();

        let (tree, sink, session) = tree_over(&ensemble, "/r").await;
        let listener: Arc<dyn SessionAware> = tree.clone();
        session.add_session_listener(Arc::downgrade(&listener));
        tree.start();
        settle().await;

        // The data watch fires while reads fail, so nothing re-arms it until recovery.
        let session_id = session.session_id().expect("active session");
        ensemble.inject_fault(
            session_id,
            Some(crate::error::StoreError::ConnectionLoss),
        );
        writer.set_data("/r/x", &payload("x", 2)).await.unwrap();
        settle().await;
        assert_eq!(tree.description_at("/r/x").await, Some(description("x", 1)));

        ensemble.inject_fault(session_id, None);
        settle().await;
        assert_eq!(tree.description_at("/r/x").await, Some(description("x", 2)));

        writer.set_data("/r/x", &payload("x", 3)).await.unwrap();
        settle().await;
        assert_eq!(tree.description_at("/r/x").await, Some(description("x", 3)));
        assert_eq!(session.session_id(), Some(session_id));
        assert_eq!(
            sink.kinds().await,
            vec![
                (EndpointEventKind::Added, "x".to_string()),
                (EndpointEventKind::Modified, "x".to_string()),
                (EndpointEventKind::Modified, "x".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn replay_sends_cached_endpoints_in_path_order() {
        let ensemble = InMemoryEnsemble::new();
        let writer = ensemble.open_session(None);
        writer.create("/r", b"", CreateMode::Persistent).await.unwrap();
        writer
            .create("/r/b", &payload("b", 1), CreateMode::Ephemeral)
            .await
            .unwrap();
        writer
            .create("/r/a", &payload("a", 1), CreateMode::Ephemeral)
            .await
            .unwrap();

        let (tree, _sink, _session) = tree_over(&ensemble, "/r").await;
        tree.start();
        let late = Arc::new(RecordingSink::default());
        tree.replay(late.clone());
        settle().await;

        // Queued behind the initial walk, so the replay already sees both endpoints.
        assert_eq!(
            late.kinds().await,
            vec![
                (EndpointEventKind::Added, "a".to_string()),
                (EndpointEventKind::Added, "b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn stopped_tree_ignores_further_changes() {
        let ensemble = InMemoryEnsemble::new();
        let writer = ensemble.open_session(None);
        writer.create("/r", b"", CreateMode::Persistent).await.unwrap();

        let (tree, sink, _session) = tree_over(&ensemble, "/r").await;
        tree.start();
        settle().await;
        tree.stop();

        writer
            .create("/r/x", &payload("x", 1), CreateMode::Ephemeral)
            .await
            .unwrap();
        settle().await;

        assert!(sink.kinds().await.is_empty());
    }
}
