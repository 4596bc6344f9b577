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

//! Publication of local endpoints and the mirror of every endpoint in the registry.

use crate::codec::DescriptionCodec;
use crate::coordination::paths::{parent_path, path_chain};
use crate::coordination::{
    CoordinationSession, CoordinationStore, CreateMode, RegistryPaths, SessionAware,
};
use crate::description::EndpointDescription;
use crate::error::{FailureClass, PublishError, StoreError};
use crate::event::EndpointEventSink;
use crate::observability::{events, fields};
use crate::repository::watch_tree::WatchTree;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const COMPONENT: &str = "endpoint_repository";

/// Writes local descriptors as ephemeral leaves and mirrors the whole registry subtree.
///
/// A descriptor exporting K interfaces is stored under K leaves with the same payload, and
/// the mirror reports it once per leaf. The mirror only changes through store watches, so a
/// local publish shows up in [`descriptions`](Self::descriptions) once the store has
/// notified it, exactly like a remote one.
pub struct EndpointRepository {
    paths: RegistryPaths,
    session: Arc<CoordinationSession>,
    codec: Arc<dyn DescriptionCodec>,
    tree: Arc<WatchTree>,
    published: Mutex<HashMap<String, EndpointDescription>>,
}

impl EndpointRepository {
    /// Creates the repository and registers it for session restore. Call
    /// [`start`](Self::start) to begin mirroring.
    pub fn new(
        paths: RegistryPaths,
        session: Arc<CoordinationSession>,
        codec: Arc<dyn DescriptionCodec>,
        sink: Arc<dyn EndpointEventSink>,
    ) -> Arc<Self> {
        let tree = WatchTree::new(
            "repository",
            paths.root(),
            session.clone(),
            codec.clone(),
            sink,
        );
        let repository = Arc::new(Self {
            paths,
            session: session.clone(),
            codec,
            tree,
            published: Mutex::new(HashMap::new()),
        });

        let listener: Arc<dyn SessionAware> = repository.clone();
        session.add_session_listener(Arc::downgrade(&listener));
        repository
    }

    pub fn start(&self) {
        self.tree.start();
    }

    pub fn paths(&self) -> &RegistryPaths {
        &self.paths
    }

    /// Writes one ephemeral leaf per exported interface.
    ///
    /// Only encoding failures and store rejections that are neither races nor connectivity
    /// problems are returned. A publish that could not reach the store is remembered and
    /// written again once the session is restored.
    pub async fn publish(&self, description: &EndpointDescription) -> Result<(), PublishError> {
        let payload = self.codec.encode(description)?;
        self.published
            .lock()
            .await
            .insert(description.id().to_string(), description.clone());

        info!(
            event = events::PUBLISH_START,
            component = COMPONENT,
            endpoint_id = description.id(),
            interfaces = %fields::format_interfaces(description),
            "publishing endpoint"
        );
        let Some(store) = self.live_store(events::PUBLISH_FAILED, description) else {
            return Ok(());
        };

        for interface in description.interfaces() {
            let path = self.paths.endpoint_path(interface, description.id());
            self.publish_leaf_logged(&store, &path, &payload, description)
                .await?;
        }
        Ok(())
    }

    /// Overwrites the payload of every leaf of an already published endpoint.
    ///
    /// Leaves of interfaces the endpoint no longer exports are removed and leaves of newly
    /// exported interfaces are created. Store failures are logged, never returned.
    pub async fn update(&self, description: &EndpointDescription) -> Result<(), PublishError> {
        let payload = self.codec.encode(description)?;
        let previous = {
            let mut published = self.published.lock().await;
            published
                .get_mut(description.id())
                .map(|entry| std::mem::replace(entry, description.clone()))
        };
        let Some(store) = self.live_store(events::UPDATE_FAILED, description) else {
            return Ok(());
        };

        let known = |interface: &String| {
            previous
                .as_ref()
                .map_or(true, |previous| previous.interfaces().contains(interface))
        };

        for interface in description.interfaces() {
            let path = self.paths.endpoint_path(interface, description.id());
            if !known(interface) {
                let _ = self
                    .publish_leaf_logged(&store, &path, &payload, description)
                    .await;
                continue;
            }

            match store.set_data(&path, &payload).await {
                Ok(()) => debug!(
                    event = events::UPDATE_OK,
                    component = COMPONENT,
                    endpoint_id = description.id(),
                    path,
                    "endpoint leaf updated"
                ),
                Err(err) if err.is_no_node() => debug!(
                    event = events::UPDATE_MISSING_NODE,
                    component = COMPONENT,
                    endpoint_id = description.id(),
                    path,
                    "no leaf to update; skipping"
                ),
                Err(err) => warn!(
                    event = events::UPDATE_FAILED,
                    component = COMPONENT,
                    endpoint_id = description.id(),
                    path,
                    err = %err,
                    "unable to update endpoint leaf"
                ),
            }
        }

        if let Some(previous) = previous {
            for interface in previous
                .interfaces()
                .iter()
                .filter(|interface| !description.interfaces().contains(interface))
            {
                let path = self.paths.endpoint_path(interface, description.id());
                self.delete_leaf(&store, &path, description.id()).await;
            }
        }
        Ok(())
    }

    /// Deletes every leaf of the endpoint. Failures are logged only.
    pub async fn unpublish(&self, description: &EndpointDescription) {
        let previous = self.published.lock().await.remove(description.id());
        let Some(store) = self.live_store(events::UNPUBLISH_FAILED, description) else {
            return;
        };

        let mut interfaces: Vec<&String> = description.interfaces().iter().collect();
        if let Some(previous) = previous.as_ref() {
            interfaces.extend(
                previous
                    .interfaces()
                    .iter()
                    .filter(|interface| !description.interfaces().contains(interface)),
            );
        }
        for interface in interfaces {
            let path = self.paths.endpoint_path(interface, description.id());
            self.delete_leaf(&store, &path, description.id()).await;
        }
    }

    /// Descriptors currently in the mirror, one per store leaf, ordered by path.
    pub async fn descriptions(&self) -> Vec<EndpointDescription> {
        self.tree.descriptions().await
    }

    /// Descriptors currently in the mirror, one per endpoint id.
    pub async fn endpoints(&self) -> Vec<EndpointDescription> {
        let unique: BTreeMap<String, EndpointDescription> = self
            .tree
            .descriptions()
            .await
            .into_iter()
            .map(|description| (description.id().to_string(), description))
            .collect();
        unique.into_values().collect()
    }

    pub async fn description_at(&self, path: &str) -> Option<EndpointDescription> {
        self.tree.description_at(path).await
    }

    /// Endpoints published through this repository and not yet unpublished.
    pub async fn published(&self) -> Vec<EndpointDescription> {
        let published = self.published.lock().await;
        let ordered: BTreeMap<&String, &EndpointDescription> = published.iter().collect();
        ordered.into_values().cloned().collect()
    }

    /// Unpublishes every local endpoint and stops mirroring.
    pub async fn close(&self) {
        let published: Vec<EndpointDescription> = self
            .published
            .lock()
            .await
            .drain()
            .map(|(_, description)| description)
            .collect();
        if let Ok(store) = self.session.store() {
            for description in &published {
                for interface in description.interfaces() {
                    let path = self.paths.endpoint_path(interface, description.id());
                    self.delete_leaf(&store, &path, description.id()).await;
                }
            }
        }
        self.tree.stop();
    }

    fn live_store(
        &self,
        event: &'static str,
        description: &EndpointDescription,
    ) -> Option<Arc<dyn CoordinationStore>> {
        match self.session.store() {
            Ok(store) => Some(store),
            Err(err) => {
                warn!(
                    event,
                    component = COMPONENT,
                    endpoint_id = description.id(),
                    reason = fields::REASON_NO_SESSION,
                    err = %err,
                    "no live coordination session; deferring to session restore"
                );
                None
            }
        }
    }

    async fn publish_leaf_logged(
        &self,
        store: &Arc<dyn CoordinationStore>,
        path: &str,
        payload: &[u8],
        description: &EndpointDescription,
    ) -> Result<(), PublishError> {
        let Err(err) = self.publish_leaf(store, path, payload).await else {
            info!(
                event = events::PUBLISH_OK,
                component = COMPONENT,
                endpoint_id = description.id(),
                path,
                "endpoint leaf written"
            );
            return Ok(());
        };

        match err.class() {
            FailureClass::Race => {
                debug!(
                    event = events::PUBLISH_FAILED,
                    component = COMPONENT,
                    endpoint_id = description.id(),
                    path,
                    err = %err,
                    "lost publication race; leaving the node to its new owner"
                );
                Ok(())
            }
            FailureClass::Transient | FailureClass::SessionExpired => {
                warn!(
                    event = events::PUBLISH_FAILED,
                    component = COMPONENT,
                    endpoint_id = description.id(),
                    path,
                    reason = fields::REASON_TRANSIENT,
                    err = %err,
                    "unable to write endpoint leaf; abandoning"
                );
                Ok(())
            }
            FailureClass::Fatal => {
                warn!(
                    event = events::PUBLISH_FAILED,
                    component = COMPONENT,
                    endpoint_id = description.id(),
                    path,
                    err = %err,
                    "coordination store rejected endpoint leaf"
                );
                Err(PublishError::Rejected {
                    path: path.to_string(),
                    source: err,
                })
            }
        }
    }

    /// Ensures the persistent directory chain and creates the ephemeral leaf. A leaf left
    /// over from a dead session is deleted and the create retried once.
    async fn publish_leaf(
        &self,
        store: &Arc<dyn CoordinationStore>,
        path: &str,
        payload: &[u8],
    ) -> Result<(), StoreError> {
        if let Some(parent) = parent_path(path) {
            for directory in path_chain(parent) {
                match store.create(&directory, &[], CreateMode::Persistent).await {
                    Ok(()) => {}
                    Err(err) if err.is_node_exists() => {}
                    Err(err) => return Err(err),
                }
            }
        }

        match store.create(path, payload, CreateMode::Ephemeral).await {
            Err(err) if err.is_node_exists() => {}
            other => return other,
        }

        match store.delete(path).await {
            Ok(()) => {}
            Err(err) if err.is_no_node() => {}
            Err(err) => return Err(err),
        }
        debug!(
            event = events::PUBLISH_STALE_NODE_REPLACED,
            component = COMPONENT,
            path,
            "deleted stale endpoint leaf; retrying create"
        );

        let retried = store.create(path, payload, CreateMode::Ephemeral).await;
        if let Err(err) = retried.as_ref() {
            if err.is_node_exists() {
                debug!(
                    event = events::PUBLISH_STALE_NODE_RACE_LOST,
                    component = COMPONENT,
                    path,
                    "endpoint leaf recreated by another session before the retry"
                );
            }
        }
        retried
    }

    async fn delete_leaf(&self, store: &Arc<dyn CoordinationStore>, path: &str, endpoint_id: &str) {
        match store.delete(path).await {
            Ok(()) => info!(
                event = events::UNPUBLISH_OK,
                component = COMPONENT,
                endpoint_id,
                path,
                "endpoint leaf deleted"
            ),
            Err(err) if err.is_no_node() => debug!(
                event = events::UNPUBLISH_OK,
                component = COMPONENT,
                endpoint_id,
                path,
                reason = fields::REASON_NODE_VANISHED,
                "endpoint leaf already gone"
            ),
            Err(err) => warn!(
                event = events::UNPUBLISH_FAILED,
                component = COMPONENT,
                endpoint_id,
                path,
                err = %err,
                "unable to delete endpoint leaf"
            ),
        }
    }
}

#[async_trait]
impl SessionAware for EndpointRepository {
    async fn session_restored(&self) {
        let published: Vec<EndpointDescription> =
            self.published.lock().await.values().cloned().collect();
        info!(
            event = events::REPUBLISH_AFTER_SESSION_RESTORE,
            component = COMPONENT,
            endpoints = published.len(),
            "re-publishing local endpoints on the new session"
        );

        if let Ok(store) = self.session.store() {
            for description in &published {
                let Ok(payload) = self.codec.encode(description) else {
                    continue;
                };
                for interface in description.interfaces() {
                    let path = self.paths.endpoint_path(interface, description.id());
                    let _ = self
                        .publish_leaf_logged(&store, &path, &payload, description)
                        .await;
                }
            }
        }

        self.tree.resync().await;
    }

    /// Leaves survived on the same session; only the mirror may have missed changes.
    async fn connection_restored(&self) {
        self.tree.resync().await;
    }
}

#[cfg(test)]
mod tests {
    use super::EndpointRepository;
    use crate::codec::{DescriptionCodec, JsonDescriptionCodec};
    use crate::coordination::{
        CoordinationSession, CoordinationStore, CreateMode, InMemoryEnsemble, RegistryPaths,
    };
    use crate::description::EndpointDescription;
    use crate::error::{PublishError, StoreError};
    use crate::event::DiscardingSink;
    use std::sync::Arc;
    use std::time::Duration;

    const LEAF_A: &str = "/osgi/service_registry/org/example/A/tcp:##h:1#svc";
    const LEAF_B: &str = "/osgi/service_registry/org/example/B/tcp:##h:1#svc";

    fn description(interfaces: &[&str], version: i64) -> EndpointDescription {
        interfaces
            .iter()
            .fold(EndpointDescription::builder("tcp://h:1/svc"), |builder, name| {
                builder.interface(name)
            })
            .property("version", version)
            .build()
            .expect("description should build")
    }

    async fn repository(ensemble: &InMemoryEnsemble) -> Arc<EndpointRepository> {
        let session = CoordinationSession::connect(Arc::new(ensemble.clone()), true)
            .await
            .expect("connect");
        let repository = EndpointRepository::new(
            RegistryPaths::default(),
            session,
            Arc::new(JsonDescriptionCodec),
            Arc::new(DiscardingSink),
        );
        repository.start();
        repository
    }

    fn stored(ensemble: &InMemoryEnsemble, path: &str) -> Option<EndpointDescription> {
        ensemble
            .data(path)
            .map(|payload| JsonDescriptionCodec.decode(&payload).expect("decode"))
    }

    #[tokio::test]
    async fn publish_writes_one_ephemeral_leaf_per_interface() {
        let ensemble = InMemoryEnsemble::new();
        let repository = repository(&ensemble).await;
        let endpoint = description(&["org.example.A", "org.example.B"], 1);

        repository.publish(&endpoint).await.expect("publish");

        assert_eq!(stored(&ensemble, LEAF_A), Some(endpoint.clone()));
        assert_eq!(stored(&ensemble, LEAF_B), Some(endpoint));
        assert!(ensemble.ephemeral_owner(LEAF_A).is_some());
        assert!(ensemble.ephemeral_owner("/osgi/service_registry/org").is_none());
    }

    #[tokio::test]
    async fn update_moves_leaves_when_interfaces_change() {
        let ensemble = InMemoryEnsemble::new();
        let repository = repository(&ensemble).await;

        repository
            .publish(&description(&["org.example.A"], 1))
            .await
            .expect("publish");
        let updated = description(&["org.example.B"], 2);
        repository.update(&updated).await.expect("update");

        assert!(!ensemble.contains(LEAF_A));
        assert_eq!(stored(&ensemble, LEAF_B), Some(updated.clone()));
        assert_eq!(repository.published().await, vec![updated]);
    }

    #[tokio::test]
    async fn update_of_unknown_endpoint_skips_missing_leaves() {
        let ensemble = InMemoryEnsemble::new();
        let repository = repository(&ensemble).await;

        repository
            .update(&description(&["org.example.A"], 1))
            .await
            .expect("update");

        assert!(!ensemble.contains(LEAF_A));
        assert!(repository.published().await.is_empty());
    }

    #[tokio::test]
    async fn unpublish_deletes_leaves_and_tolerates_missing_ones() {
        let ensemble = InMemoryEnsemble::new();
        let repository = repository(&ensemble).await;
        let endpoint = description(&["org.example.A", "org.example.B"], 1);

        repository.publish(&endpoint).await.expect("publish");
        ensemble
            .open_session(None)
            .delete(LEAF_B)
            .await
            .expect("external delete");
        repository.unpublish(&endpoint).await;

        assert!(!ensemble.contains(LEAF_A));
        assert!(ensemble.contains("/osgi/service_registry/org/example/A"));
    }

    #[tokio::test]
    async fn fatal_store_errors_are_returned() {
        let ensemble = InMemoryEnsemble::new();
        let repository = repository(&ensemble).await;
        let session_id = ensemble.live_sessions()[0];
        ensemble.inject_fault(session_id, Some(StoreError::Other("quota exceeded".into())));

        let result = repository
            .publish(&description(&["org.example.A"], 1))
            .await;
        assert!(matches!(result, Err(PublishError::Rejected { .. })));
    }

    #[tokio::test]
    async fn transient_store_errors_are_swallowed() {
        let ensemble = InMemoryEnsemble::new();
        let repository = repository(&ensemble).await;
        let session_id = ensemble.live_sessions()[0];
        ensemble.inject_fault(session_id, Some(StoreError::ConnectionLoss));

        let endpoint = description(&["org.example.A"], 1);
        assert!(repository.publish(&endpoint).await.is_ok());
        assert!(!ensemble.contains(LEAF_A));
        assert_eq!(repository.published().await, vec![endpoint]);
    }

    #[tokio::test]
    async fn close_removes_local_leaves() {
        let ensemble = InMemoryEnsemble::new();
        let repository = repository(&ensemble).await;
        repository
            .publish(&description(&["org.example.A"], 1))
            .await
            .expect("publish");

        repository.close().await;

        assert!(!ensemble.contains(LEAF_A));
        assert!(repository.published().await.is_empty());
    }

    #[tokio::test]
    async fn mirror_reports_each_endpoint_once_per_leaf() {
        let ensemble = InMemoryEnsemble::new();
        let repository = repository(&ensemble).await;
        repository
            .publish(&description(&["org.example.A", "org.example.B"], 1))
            .await
            .expect("publish");

        for _ in 0..200 {
            if repository.descriptions().await.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(repository.descriptions().await.len(), 2);
        assert_eq!(repository.endpoints().await.len(), 1);
        assert!(repository.description_at(LEAF_A).await.is_some());
    }

    #[tokio::test]
    async fn leftover_leaf_from_another_session_is_replaced() {
        let ensemble = InMemoryEnsemble::new();
        let stale = ensemble.open_session(None);
        for directory in [
            "/osgi",
            "/osgi/service_registry",
            "/osgi/service_registry/org",
            "/osgi/service_registry/org/example",
            "/osgi/service_registry/org/example/A",
        ] {
            stale
                .create(directory, b"", CreateMode::Persistent)
                .await
                .expect("directory");
        }
        stale
            .create(LEAF_A, b"stale", CreateMode::Ephemeral)
            .await
            .expect("stale leaf");

        let repository = repository(&ensemble).await;
        let endpoint = description(&["org.example.A"], 1);
        repository.publish(&endpoint).await.expect("publish");

        assert_eq!(stored(&ensemble, LEAF_A), Some(endpoint));
        assert_ne!(ensemble.ephemeral_owner(LEAF_A), Some(stale.session_id()));
    }
}
