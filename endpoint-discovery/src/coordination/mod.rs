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

//! Coordination-store layer.
//!
//! Defines the contract of a ZooKeeper-like store (hierarchical nodes, persistent and
//! ephemeral lifetimes, one-shot watches), owns the session built on it, and maps
//! interfaces and endpoint ids to store paths.
//!
//! Watches registered through `get_data`, `get_children` and `exists` fire at most once.
//! A session delivers all of its watch and state callbacks on one dispatcher, in the order
//! the store applied the triggering changes.

mod in_memory;
pub(crate) mod paths;
mod session;

pub use in_memory::{InMemoryClient, InMemoryEnsemble};
pub use paths::{escape_endpoint_id, RegistryPaths, DEFAULT_REGISTRY_ROOT, ENDPOINT_ID_ESCAPE};
pub use session::{CoordinationSession, SessionAware};

use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;

/// Node lifetime.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CreateMode {
    /// Survives the creating session. Used for interface directories.
    Persistent,
    /// Removed by the store when the creating session ends. Used for endpoint leaves.
    Ephemeral,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeEventKind {
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

/// A fired one-shot watch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeEvent {
    pub kind: NodeEventKind,
    pub path: String,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SessionState {
    Connected,
    /// Connection dropped; the session and its watches may still survive.
    Disconnected,
    /// The store discarded the session, its ephemeral nodes and all of its watches.
    Expired,
}

#[async_trait]
pub trait NodeWatcher: Send + Sync {
    async fn on_node_event(&self, event: NodeEvent);
}

#[async_trait]
pub trait SessionStateListener: Send + Sync {
    async fn on_session_state(&self, state: SessionState);
}

/// One client session against the coordination store.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    fn session_id(&self) -> u64;

    async fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> Result<(), StoreError>;

    /// Overwrites the payload regardless of the node's current version.
    async fn set_data(&self, path: &str, data: &[u8]) -> Result<(), StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Arms a watch that fires on creation, deletion or data change of `path`, whether or
    /// not the node exists yet.
    async fn exists(
        &self,
        path: &str,
        watcher: Option<Arc<dyn NodeWatcher>>,
    ) -> Result<bool, StoreError>;

    /// Arms a data watch only when the node exists.
    async fn get_data(
        &self,
        path: &str,
        watcher: Option<Arc<dyn NodeWatcher>>,
    ) -> Result<Vec<u8>, StoreError>;

    /// Child names (not full paths), sorted. Arms a child watch only when the node exists.
    async fn get_children(
        &self,
        path: &str,
        watcher: Option<Arc<dyn NodeWatcher>>,
    ) -> Result<Vec<String>, StoreError>;

    /// Ends the session. Its ephemeral nodes are removed.
    async fn close(&self);
}

/// Opens sessions. `state_listener` receives every state change of the new session.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(
        &self,
        state_listener: Arc<dyn SessionStateListener>,
    ) -> Result<Arc<dyn CoordinationStore>, StoreError>;
}
