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

//! Descriptor change events and the sink they are emitted to.

use crate::description::EndpointDescription;
use async_trait::async_trait;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum EndpointEventKind {
    Added,
    Modified,
    Removed,
}

/// One observed change of a descriptor at one store path.
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointEvent {
    pub kind: EndpointEventKind,
    pub description: EndpointDescription,
}

impl EndpointEvent {
    pub fn added(description: EndpointDescription) -> Self {
        Self {
            kind: EndpointEventKind::Added,
            description,
        }
    }

    pub fn modified(description: EndpointDescription) -> Self {
        Self {
            kind: EndpointEventKind::Modified,
            description,
        }
    }

    pub fn removed(description: EndpointDescription) -> Self {
        Self {
            kind: EndpointEventKind::Removed,
            description,
        }
    }
}

/// Downstream consumer of the events a watch tree produces.
#[async_trait]
pub trait EndpointEventSink: Send + Sync {
    async fn endpoint_event(&self, event: EndpointEvent);
}

/// Sink for callers that only want the repository cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardingSink;

#[async_trait]
impl EndpointEventSink for DiscardingSink {
    async fn endpoint_event(&self, _event: EndpointEvent) {}
}
