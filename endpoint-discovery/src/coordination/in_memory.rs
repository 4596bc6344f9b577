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

//! In-process coordination store with ZooKeeper node, watch and session semantics.
//!
//! Used for single-process deployments and as the store behind the test suite. Sessions
//! can be expired and operations can be failed on demand to exercise recovery paths.

use crate::coordination::paths::{child_path, parent_path};
use crate::coordination::{
    CoordinationStore, CreateMode, NodeEvent, NodeEventKind, NodeWatcher, SessionState,
    SessionStateListener, StoreConnector,
};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

struct Node {
    data: Vec<u8>,
    ephemeral_owner: Option<u64>,
}

#[derive(Clone)]
struct WatchRegistration {
    session_id: u64,
    watcher: Arc<dyn NodeWatcher>,
}

impl WatchRegistration {
    fn same_as(&self, other: &WatchRegistration) -> bool {
        self.session_id == other.session_id && same_watcher(&self.watcher, &other.watcher)
    }
}

fn same_watcher(left: &Arc<dyn NodeWatcher>, right: &Arc<dyn NodeWatcher>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}

enum Delivery {
    Node(Arc<dyn NodeWatcher>, NodeEvent),
    State(SessionState),
}

struct SessionEntry {
    deliveries: mpsc::UnboundedSender<Delivery>,
    fault: Option<StoreError>,
}

struct EnsembleState {
    nodes: BTreeMap<String, Node>,
    sessions: HashMap<u64, SessionEntry>,
    data_watches: HashMap<String, Vec<WatchRegistration>>,
    child_watches: HashMap<String, Vec<WatchRegistration>>,
    next_session_id: u64,
}

impl EnsembleState {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node {
                data: Vec::new(),
                ephemeral_owner: None,
            },
        );
        Self {
            nodes,
            sessions: HashMap::new(),
            data_watches: HashMap::new(),
            child_watches: HashMap::new(),
            next_session_id: 1,
        }
    }

    fn check_session(&self, session_id: u64) -> Result<(), StoreError> {
        match self.sessions.get(&session_id) {
            None => Err(StoreError::SessionExpired),
            Some(SessionEntry {
                fault: Some(fault), ..
            }) => Err(fault.clone()),
            Some(_) => Ok(()),
        }
    }

    fn children(&self, path: &str) -> Vec<String> {
        let prefix = child_path(path, "");
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let rest = &key[prefix.len()..];
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
            })
            .collect()
    }

    fn register(
        watches: &mut HashMap<String, Vec<WatchRegistration>>,
        path: &str,
        registration: WatchRegistration,
    ) {
        let registrations = watches.entry(path.to_string()).or_default();
        if !registrations
            .iter()
            .any(|existing| existing.same_as(&registration))
        {
            registrations.push(registration);
        }
    }

    fn fire(&mut self, fired: Vec<WatchRegistration>, event: NodeEvent) {
        let mut delivered: Vec<WatchRegistration> = Vec::new();
        for registration in fired {
            if delivered.iter().any(|done| done.same_as(&registration)) {
                continue;
            }
            if let Some(session) = self.sessions.get(&registration.session_id) {
                let _ = session.deliveries.send(Delivery::Node(
                    registration.watcher.clone(),
                    event.clone(),
                ));
            }
            delivered.push(registration);
        }
    }

    fn create_node(
        &mut self,
        path: &str,
        data: &[u8],
        ephemeral_owner: Option<u64>,
    ) -> Result<(), StoreError> {
        let Some(parent) = parent_path(path) else {
            return Err(StoreError::NodeExists(path.to_string()));
        };
        if self.nodes.contains_key(path) {
            return Err(StoreError::NodeExists(path.to_string()));
        }
        match self.nodes.get(parent) {
            None => return Err(StoreError::NoNode(parent.to_string())),
            Some(node) if node.ephemeral_owner.is_some() => {
                return Err(StoreError::Other(format!(
                    "ephemeral node {parent} cannot have children"
                )))
            }
            Some(_) => {}
        }

        self.nodes.insert(
            path.to_string(),
            Node {
                data: data.to_vec(),
                ephemeral_owner,
            },
        );

        let fired = self.data_watches.remove(path).unwrap_or_default();
        self.fire(
            fired,
            NodeEvent {
                kind: NodeEventKind::NodeCreated,
                path: path.to_string(),
            },
        );
        let fired = self.child_watches.remove(parent).unwrap_or_default();
        self.fire(
            fired,
            NodeEvent {
                kind: NodeEventKind::NodeChildrenChanged,
                path: parent.to_string(),
            },
        );
        Ok(())
    }

    fn delete_node(&mut self, path: &str) -> Result<(), StoreError> {
        if !self.nodes.contains_key(path) {
            return Err(StoreError::NoNode(path.to_string()));
        }
        if !self.children(path).is_empty() {
            return Err(StoreError::NotEmpty(path.to_string()));
        }
        let Some(parent) = parent_path(path).map(str::to_string) else {
            return Err(StoreError::Other("the root node cannot be deleted".to_string()));
        };

        self.nodes.remove(path);

        let mut fired = self.data_watches.remove(path).unwrap_or_default();
        fired.extend(self.child_watches.remove(path).unwrap_or_default());
        self.fire(
            fired,
            NodeEvent {
                kind: NodeEventKind::NodeDeleted,
                path: path.to_string(),
            },
        );
        let fired = self.child_watches.remove(&parent).unwrap_or_default();
        self.fire(
            fired,
            NodeEvent {
                kind: NodeEventKind::NodeChildrenChanged,
                path: parent,
            },
        );
        Ok(())
    }

    /// Drops the session, its watches and its ephemeral nodes.
    fn end_session(&mut self, session_id: u64) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&session_id)?;

        for watches in [&mut self.data_watches, &mut self.child_watches] {
            watches.retain(|_, registrations| {
                registrations.retain(|registration| registration.session_id != session_id);
                !registrations.is_empty()
            });
        }

        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner == Some(session_id))
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned.iter().rev() {
            let _ = self.delete_node(path);
        }

        Some(entry)
    }
}

struct Shared {
    state: Mutex<EnsembleState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EnsembleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The shared store state. Cloning yields another handle to the same ensemble.
#[derive(Clone)]
pub struct InMemoryEnsemble {
    shared: Arc<Shared>,
}

impl Default for InMemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEnsemble {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EnsembleState::new()),
            }),
        }
    }

    /// Opens a session whose callbacks run on a dedicated dispatcher task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_session(
        &self,
        state_listener: Option<Arc<dyn SessionStateListener>>,
    ) -> Arc<InMemoryClient> {
        let (deliveries, mut receiver) = mpsc::unbounded_channel::<Delivery>();
        let session_id = {
            let mut state = self.shared.lock();
            let session_id = state.next_session_id;
            state.next_session_id += 1;
            state.sessions.insert(
                session_id,
                SessionEntry {
                    deliveries: deliveries.clone(),
                    fault: None,
                },
            );
            session_id
        };

        tokio::spawn(async move {
            while let Some(delivery) = receiver.recv().await {
                match delivery {
                    Delivery::Node(watcher, event) => watcher.on_node_event(event).await,
                    Delivery::State(state) => {
                        if let Some(listener) = state_listener.as_ref() {
                            listener.on_session_state(state).await;
                        }
                    }
                }
            }
        });
        let _ = deliveries.send(Delivery::State(SessionState::Connected));

        Arc::new(InMemoryClient {
            session_id,
            shared: self.shared.clone(),
        })
    }

    /// Simulates the store expiring a session: ephemeral nodes go away, watchers of other
    /// sessions fire, and the expired session is told so before its dispatcher stops.
    pub fn expire_session(&self, session_id: u64) -> bool {
        let mut state = self.shared.lock();
        match state.end_session(session_id) {
            Some(entry) => {
                let _ = entry
                    .deliveries
                    .send(Delivery::State(SessionState::Expired));
                true
            }
            None => false,
        }
    }

    /// Makes every operation of `session_id` fail with `fault` until cleared with `None`.
    pub fn inject_fault(&self, session_id: u64, fault: Option<StoreError>) {
        let mut state = self.shared.lock();
        if let Some(session) = state.sessions.get_mut(&session_id) {
            let notify = match (&session.fault, &fault) {
                (None, Some(StoreError::ConnectionLoss)) => Some(SessionState::Disconnected),
                (Some(StoreError::ConnectionLoss), None) => Some(SessionState::Connected),
                _ => None,
            };
            session.fault = fault;
            if let Some(notify) = notify {
                let _ = session.deliveries.send(Delivery::State(notify));
            }
        }
    }

    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.shared.lock().nodes.get(path).map(|node| node.data.clone())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.shared.lock().nodes.contains_key(path)
    }

    pub fn children(&self, path: &str) -> Vec<String> {
        self.shared.lock().children(path)
    }

    pub fn ephemeral_owner(&self, path: &str) -> Option<u64> {
        self.shared
            .lock()
            .nodes
            .get(path)
            .and_then(|node| node.ephemeral_owner)
    }

    pub fn live_sessions(&self) -> Vec<u64> {
        let mut sessions: Vec<u64> = self.shared.lock().sessions.keys().copied().collect();
        sessions.sort_unstable();
        sessions
    }

    /// Armed (data, child) watch registrations at `path`.
    pub fn watch_counts(&self, path: &str) -> (usize, usize) {
        let state = self.shared.lock();
        (
            state.data_watches.get(path).map_or(0, Vec::len),
            state.child_watches.get(path).map_or(0, Vec::len),
        )
    }
}

#[async_trait]
impl StoreConnector for InMemoryEnsemble {
    async fn connect(
        &self,
        state_listener: Arc<dyn SessionStateListener>,
    ) -> Result<Arc<dyn CoordinationStore>, StoreError> {
        let client: Arc<dyn CoordinationStore> = self.open_session(Some(state_listener));
        Ok(client)
    }
}

/// One session against an [`InMemoryEnsemble`].
pub struct InMemoryClient {
    session_id: u64,
    shared: Arc<Shared>,
}

#[async_trait]
impl CoordinationStore for InMemoryClient {
    fn session_id(&self) -> u64 {
        self.session_id
    }

    async fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> Result<(), StoreError> {
        let mut state = self.shared.lock();
        state.check_session(self.session_id)?;
        let owner = match mode {
            CreateMode::Persistent => None,
            CreateMode::Ephemeral => Some(self.session_id),
        };
        state.create_node(path, data, owner)
    }

    async fn set_data(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut state = self.shared.lock();
        state.check_session(self.session_id)?;
        let Some(node) = state.nodes.get_mut(path) else {
            return Err(StoreError::NoNode(path.to_string()));
        };
        node.data = data.to_vec();

        let fired = state.data_watches.remove(path).unwrap_or_default();
        state.fire(
            fired,
            NodeEvent {
                kind: NodeEventKind::NodeDataChanged,
                path: path.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let mut state = self.shared.lock();
        state.check_session(self.session_id)?;
        state.delete_node(path)
    }

    async fn exists(
        &self,
        path: &str,
        watcher: Option<Arc<dyn NodeWatcher>>,
    ) -> Result<bool, StoreError> {
        let mut state = self.shared.lock();
        state.check_session(self.session_id)?;
        if let Some(watcher) = watcher {
            EnsembleState::register(
                &mut state.data_watches,
                path,
                WatchRegistration {
                    session_id: self.session_id,
                    watcher,
                },
            );
        }
        Ok(state.nodes.contains_key(path))
    }

    async fn get_data(
        &self,
        path: &str,
        watcher: Option<Arc<dyn NodeWatcher>>,
    ) -> Result<Vec<u8>, StoreError> {
        let mut state = self.shared.lock();
        state.check_session(self.session_id)?;
        let Some(data) = state.nodes.get(path).map(|node| node.data.clone()) else {
            return Err(StoreError::NoNode(path.to_string()));
        };
        if let Some(watcher) = watcher {
            EnsembleState::register(
                &mut state.data_watches,
                path,
                WatchRegistration {
                    session_id: self.session_id,
                    watcher,
                },
            );
        }
        Ok(data)
    }

    async fn get_children(
        &self,
        path: &str,
        watcher: Option<Arc<dyn NodeWatcher>>,
    ) -> Result<Vec<String>, StoreError> {
        let mut state = self.shared.lock();
        state.check_session(self.session_id)?;
        if !state.nodes.contains_key(path) {
            return Err(StoreError::NoNode(path.to_string()));
        }
        if let Some(watcher) = watcher {
            EnsembleState::register(
                &mut state.child_watches,
                path,
                WatchRegistration {
                    session_id: self.session_id,
                    watcher,
                },
            );
        }
        Ok(state.children(path))
    }

    async fn close(&self) {
        let mut state = self.shared.lock();
        state.end_session(self.session_id);
    }
}
