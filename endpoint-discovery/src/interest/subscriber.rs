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

//! Subscriber contracts and the bridge between them.

use crate::description::{EndpointDescription, PropertyMap, PropertyValue};
use crate::event::{EndpointEvent, EndpointEventKind};
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Listener property marking listeners that belong to the discovery layer itself. Such
/// listeners are never registered as subscribers.
pub const DISCOVERY_INTERNAL_LISTENER: &str = "endpoint.listener.discovery.internal";

/// Receives every change of a matching endpoint as one event.
#[async_trait]
pub trait EndpointEventListener: Send + Sync {
    async fn endpoint_changed(&self, event: EndpointEvent, matched_filter: &str);

    fn listener_properties(&self) -> PropertyMap {
        PropertyMap::new()
    }
}

/// Older two-callback contract with no notion of modification.
#[async_trait]
pub trait EndpointListener: Send + Sync {
    async fn endpoint_added(&self, description: EndpointDescription, matched_filter: &str);
    async fn endpoint_removed(&self, description: EndpointDescription, matched_filter: &str);

    fn listener_properties(&self) -> PropertyMap {
        PropertyMap::new()
    }
}

/// A registered listener of either contract.
#[derive(Clone)]
pub enum Subscriber {
    Unified(Arc<dyn EndpointEventListener>),
    Legacy(Arc<dyn EndpointListener>),
}

impl Subscriber {
    pub fn listener_properties(&self) -> PropertyMap {
        match self {
            Subscriber::Unified(listener) => listener.listener_properties(),
            Subscriber::Legacy(listener) => listener.listener_properties(),
        }
    }

    pub fn is_discovery_internal(&self) -> bool {
        matches!(
            self.listener_properties().get(DISCOVERY_INTERNAL_LISTENER),
            Some(PropertyValue::Bool(true))
        )
    }

    /// Hands `event` to the listener in the shape its contract expects.
    ///
    /// Legacy listeners see MODIFIED as `endpoint_added` followed by `endpoint_removed`, both
    /// with the post-change descriptor.
    pub async fn deliver(&self, event: &EndpointEvent, matched_filter: &str) {
        match self {
            Subscriber::Unified(listener) => {
                listener
                    .endpoint_changed(event.clone(), matched_filter)
                    .await
            }
            Subscriber::Legacy(listener) => match event.kind {
                EndpointEventKind::Added => {
                    listener
                        .endpoint_added(event.description.clone(), matched_filter)
                        .await
                }
                EndpointEventKind::Removed => {
                    listener
                        .endpoint_removed(event.description.clone(), matched_filter)
                        .await
                }
                EndpointEventKind::Modified => {
                    listener
                        .endpoint_added(event.description.clone(), matched_filter)
                        .await;
                    listener
                        .endpoint_removed(event.description.clone(), matched_filter)
                        .await;
                }
            },
        }
    }

    pub(crate) fn key(&self) -> SubscriberKey {
        SubscriberKey {
            subscriber: self.clone(),
        }
    }

    fn identity(&self) -> (u8, *const ()) {
        match self {
            Subscriber::Unified(listener) => (0, Arc::as_ptr(listener) as *const ()),
            Subscriber::Legacy(listener) => (1, Arc::as_ptr(listener) as *const ()),
        }
    }
}

impl Debug for Subscriber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscriber::Unified(_) => f.write_str("Subscriber::Unified(..)"),
            Subscriber::Legacy(_) => f.write_str("Subscriber::Legacy(..)"),
        }
    }
}

/// Listener identity: the contract plus the address of the shared listener.
#[derive(Clone)]
pub(crate) struct SubscriberKey {
    subscriber: Subscriber,
}

impl Hash for SubscriberKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subscriber.identity().hash(state);
    }
}

impl PartialEq for SubscriberKey {
    fn eq(&self, other: &Self) -> bool {
        self.subscriber.identity() == other.subscriber.identity()
    }
}

impl Eq for SubscriberKey {}

impl Debug for SubscriberKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberKey").finish_non_exhaustive()
    }
}
