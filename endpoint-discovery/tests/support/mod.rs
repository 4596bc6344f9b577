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

#![allow(dead_code)]

use async_trait::async_trait;
use endpoint_discovery::coordination::InMemoryEnsemble;
use endpoint_discovery::interest::{EndpointEventListener, EndpointListener};
use endpoint_discovery::{
    EndpointDescription, EndpointDiscovery, EndpointEvent, EndpointEventKind, EndpointEventSink,
    PropertyValue,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(5);
const EVENTUALLY_POLL: Duration = Duration::from_millis(10);
const SETTLE: Duration = Duration::from_millis(200);

pub(crate) const GREETER: &str = "org.example.Greeter";
pub(crate) const ADMIN: &str = "org.example.Admin";

pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Polls `check` until it holds, failing the test after a few seconds.
pub(crate) async fn eventually<F, Fut>(what: &str, check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + EVENTUALLY_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(EVENTUALLY_POLL).await;
    }
    panic!("timed out waiting for: {what}");
}

/// Gives in-flight watch callbacks time to drain before asserting that nothing happened.
pub(crate) async fn settle() {
    tokio::time::sleep(SETTLE).await;
}

pub(crate) fn endpoint(id: &str, interfaces: &[&str]) -> EndpointDescription {
    endpoint_with(id, interfaces, &[])
}

pub(crate) fn endpoint_with(
    id: &str,
    interfaces: &[&str],
    properties: &[(&str, PropertyValue)],
) -> EndpointDescription {
    let builder = interfaces
        .iter()
        .fold(EndpointDescription::builder(id), |builder, interface| {
            builder.interface(interface)
        });
    properties
        .iter()
        .fold(builder, |builder, (key, value)| {
            builder.property(key, value.clone())
        })
        .build()
        .expect("test endpoint should build")
}

pub(crate) async fn discovery(name: &str, ensemble: &InMemoryEnsemble) -> EndpointDiscovery {
    EndpointDiscovery::with_defaults(name, Arc::new(ensemble.clone()))
        .await
        .expect("discovery should start")
}

/// Unified-contract listener that records every event.
#[derive(Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<(EndpointEvent, String)>>,
}

impl RecordingListener {
    pub(crate) async fn events(&self) -> Vec<(EndpointEventKind, String)> {
        self.events
            .lock()
            .await
            .iter()
            .map(|(event, _)| (event.kind, event.description.id().to_string()))
            .collect()
    }

    pub(crate) async fn descriptions(&self) -> Vec<EndpointDescription> {
        self.events
            .lock()
            .await
            .iter()
            .map(|(event, _)| event.description.clone())
            .collect()
    }

    pub(crate) async fn filters(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .map(|(_, filter)| filter.clone())
            .collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[async_trait]
impl EndpointEventListener for RecordingListener {
    async fn endpoint_changed(&self, event: EndpointEvent, matched_filter: &str) {
        self.events
            .lock()
            .await
            .push((event, matched_filter.to_string()));
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum LegacyCall {
    Added(String),
    Removed(String),
}

/// Legacy-contract listener that records each call with the descriptor's `version`.
#[derive(Default)]
pub(crate) struct LegacyRecordingListener {
    calls: Mutex<Vec<(LegacyCall, Option<PropertyValue>)>>,
}

impl LegacyRecordingListener {
    pub(crate) async fn calls(&self) -> Vec<(LegacyCall, Option<PropertyValue>)> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn len(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl EndpointListener for LegacyRecordingListener {
    async fn endpoint_added(&self, description: EndpointDescription, _matched_filter: &str) {
        self.calls.lock().await.push((
            LegacyCall::Added(description.id().to_string()),
            description.get("version").cloned(),
        ));
    }

    async fn endpoint_removed(&self, description: EndpointDescription, _matched_filter: &str) {
        self.calls.lock().await.push((
            LegacyCall::Removed(description.id().to_string()),
            description.get("version").cloned(),
        ));
    }
}

/// Repository sink that records every event with its kind.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<EndpointEvent>>,
}

impl RecordingSink {
    pub(crate) async fn events(&self) -> Vec<(EndpointEventKind, String)> {
        self.events
            .lock()
            .await
            .iter()
            .map(|event| (event.kind, event.description.id().to_string()))
            .collect()
    }

    pub(crate) async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl EndpointEventSink for RecordingSink {
    async fn endpoint_event(&self, event: EndpointEvent) {
        self.events.lock().await.push(event);
    }
}
