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

//! API facade wiring session, repository and interest engine together.

use crate::codec::{DescriptionCodec, JsonDescriptionCodec};
use crate::config::DiscoveryConfig;
use crate::coordination::{CoordinationSession, StoreConnector};
use crate::description::EndpointDescription;
use crate::error::{DiscoveryError, PublishError, SubscribeError};
use crate::event::{DiscardingSink, EndpointEventSink};
use crate::filter::FilterCache;
use crate::interest::{InterestManager, Subscriber};
use crate::observability::events;
use crate::repository::EndpointRepository;
use std::sync::Arc;
use tracing::info;

const COMPONENT: &str = "endpoint_discovery";

/// One participant in the shared endpoint registry.
pub struct EndpointDiscovery {
    name: String,
    config: DiscoveryConfig,
    session: Arc<CoordinationSession>,
    filters: Arc<FilterCache>,
    repository: Arc<EndpointRepository>,
    interests: Arc<InterestManager>,
}

impl EndpointDiscovery {
    /// Opens a session through `connector` and starts mirroring the registry.
    ///
    /// `sink` receives every repository change (one event per store leaf); pass `None` when
    /// only subscriptions are of interest.
    pub async fn new(
        name: &str,
        config: DiscoveryConfig,
        connector: Arc<dyn StoreConnector>,
        codec: Arc<dyn DescriptionCodec>,
        sink: Option<Arc<dyn EndpointEventSink>>,
    ) -> Result<Self, DiscoveryError> {
        let paths = config.registry_paths()?;
        let session = CoordinationSession::connect(connector, config.reconnect_on_session_expiry)
            .await
            .map_err(DiscoveryError::Connect)?;

        let filters = Arc::new(FilterCache::default());
        let repository = EndpointRepository::new(
            paths.clone(),
            session.clone(),
            codec.clone(),
            sink.unwrap_or_else(|| Arc::new(DiscardingSink)),
        );
        let interests = InterestManager::new(paths, session.clone(), codec, filters.clone());
        repository.start();

        info!(
            event = events::SESSION_CONNECTED,
            component = COMPONENT,
            name,
            registry_root = %config.registry_root,
            "endpoint discovery started"
        );
        Ok(Self {
            name: name.to_string(),
            config,
            session,
            filters,
            repository,
            interests,
        })
    }

    /// [`new`](Self::new) with default configuration, the JSON codec and no repository sink.
    pub async fn with_defaults(
        name: &str,
        connector: Arc<dyn StoreConnector>,
    ) -> Result<Self, DiscoveryError> {
        Self::new(
            name,
            DiscoveryConfig::default(),
            connector,
            Arc::new(JsonDescriptionCodec),
            None,
        )
        .await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<CoordinationSession> {
        &self.session
    }

    pub fn repository(&self) -> &Arc<EndpointRepository> {
        &self.repository
    }

    pub fn interests(&self) -> &Arc<InterestManager> {
        &self.interests
    }

    pub fn filters(&self) -> &FilterCache {
        &self.filters
    }

    pub async fn publish(&self, description: &EndpointDescription) -> Result<(), PublishError> {
        self.repository.publish(description).await
    }

    pub async fn update(&self, description: &EndpointDescription) -> Result<(), PublishError> {
        self.repository.update(description).await
    }

    pub async fn unpublish(&self, description: &EndpointDescription) {
        self.repository.unpublish(description).await
    }

    pub async fn subscribe(
        &self,
        filter: &str,
        subscriber: Subscriber,
    ) -> Result<(), SubscribeError> {
        self.interests.subscribe(filter, subscriber).await
    }

    pub async fn unsubscribe(&self, subscriber: &Subscriber) {
        self.interests.unsubscribe(subscriber).await
    }

    /// Every endpoint currently in the registry, one per endpoint id.
    pub async fn endpoints(&self) -> Vec<EndpointDescription> {
        self.repository.endpoints().await
    }

    /// Unpublishes local endpoints, stops every monitor and closes the session.
    pub async fn shutdown(&self) {
        self.interests.close().await;
        self.repository.close().await;
        self.session.close().await;
        info!(
            event = events::SESSION_DISCONNECTED,
            component = COMPONENT,
            name = %self.name,
            reason = "shutdown",
            "endpoint discovery stopped"
        );
    }
}
