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

mod support;

use endpoint_discovery::coordination::InMemoryEnsemble;
use endpoint_discovery::interest::Subscriber;
use endpoint_discovery::{EndpointDescription, EndpointEventKind, PropertyValue, StoreError};
use std::sync::Arc;
use support::{endpoint, endpoint_with, RecordingListener, GREETER};

const GREETERS: &str = "(objectClass=org.example.Greeter)";

#[tokio::test(flavor = "multi_thread")]
async fn exporter_expiry_withdraws_then_republishes() {
    support::init_logging();
    let ensemble = InMemoryEnsemble::new();
    let exporter = support::discovery("exporter", &ensemble).await;
    let importer = support::discovery("importer", &ensemble).await;

    let listener = Arc::new(RecordingListener::default());
    importer
        .subscribe(GREETERS, Subscriber::Unified(listener.clone()))
        .await
        .expect("subscribe");
    exporter
        .publish(&endpoint("tcp://e:1/a", &[GREETER]))
        .await
        .expect("publish");
    let seen = &listener;
    support::eventually("added", || async move { seen.len().await == 1 }).await;

    let old_session = exporter.session().session_id().expect("exporter session");
    assert!(ensemble.expire_session(old_session));

    support::eventually("removed then re-added", || async move {
        seen.len().await == 3
    })
    .await;
    assert_eq!(
        listener.events().await,
        vec![
            (EndpointEventKind::Added, "tcp://e:1/a".to_string()),
            (EndpointEventKind::Removed, "tcp://e:1/a".to_string()),
            (EndpointEventKind::Added, "tcp://e:1/a".to_string()),
        ]
    );

    let new_session = exporter.session().session_id().expect("exporter reconnected");
    assert_ne!(new_session, old_session);
    let leaf = exporter
        .repository()
        .paths()
        .endpoint_path(GREETER, "tcp://e:1/a");
    assert_eq!(ensemble.ephemeral_owner(&leaf), Some(new_session));

    exporter.shutdown().await;
    importer.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn importer_expiry_resyncs_without_duplicates() {
    support::init_logging();
    let ensemble = InMemoryEnsemble::new();
    let exporter = support::discovery("exporter", &ensemble).await;
    let importer = support::discovery("importer", &ensemble).await;

    let listener = Arc::new(RecordingListener::default());
    importer
        .subscribe(GREETERS, Subscriber::Unified(listener.clone()))
        .await
        .expect("subscribe");

    let a = endpoint("tcp://e:1/a", &[GREETER]);
    let b = endpoint("tcp://e:1/b", &[GREETER]);
    let c = endpoint("tcp://e:1/c", &[GREETER]);
    exporter.publish(&a).await.expect("publish a");
    exporter.publish(&b).await.expect("publish b");
    let seen = &listener;
    support::eventually("a and b added", || async move { seen.len().await == 2 }).await;

    // Cut the importer off so it misses the next changes, then let its session expire.
    let importer_session = importer.session().session_id().expect("importer session");
    ensemble.inject_fault(importer_session, Some(StoreError::ConnectionLoss));
    exporter.unpublish(&b).await;
    exporter.publish(&c).await.expect("publish c");
    assert!(ensemble.expire_session(importer_session));

    let importer_ref = &importer;
    support::eventually("importer converged", || async move {
        let mut ids: Vec<String> = importer_ref
            .endpoints()
            .await
            .iter()
            .map(|description| description.id().to_string())
            .collect();
        ids.sort();
        ids == ["tcp://e:1/a", "tcp://e:1/c"]
    })
    .await;
    support::eventually("subscriber converged", || async move {
        seen.len().await == 4
    })
    .await;
    support::settle().await;

    let mut after_resync = listener.events().await.split_off(2);
    after_resync.sort();
    assert_eq!(
        after_resync,
        vec![
            (EndpointEventKind::Added, "tcp://e:1/c".to_string()),
            (EndpointEventKind::Removed, "tcp://e:1/b".to_string()),
        ]
    );

    exporter.shutdown().await;
    importer.shutdown().await;
}

fn versioned(version: i64) -> EndpointDescription {
    endpoint_with(
        "tcp://e:1/a",
        &[GREETER],
        &[("version", PropertyValue::from(version))],
    )
}

fn version_of(description: &EndpointDescription) -> Option<PropertyValue> {
    description.get("version").cloned()
}

#[tokio::test(flavor = "multi_thread")]
async fn importer_connection_recovery_rearms_watches() {
    support::init_logging();
    let ensemble = InMemoryEnsemble::new();
    let exporter = support::discovery("exporter", &ensemble).await;
    let importer = support::discovery("importer", &ensemble).await;

    let listener = Arc::new(RecordingListener::default());
    importer
        .subscribe(GREETERS, Subscriber::Unified(listener.clone()))
        .await
        .expect("subscribe");
    exporter.publish(&versioned(1)).await.expect("publish v1");
    let seen = &listener;
    support::eventually("v1 added", || async move { seen.len().await == 1 }).await;

    // The v2 watch notification arrives while the importer cannot read; the session survives.
    let importer_session = importer.session().session_id().expect("importer session");
    ensemble.inject_fault(importer_session, Some(StoreError::ConnectionLoss));
    exporter.update(&versioned(2)).await.expect("update v2");
    support::settle().await;
    ensemble.inject_fault(importer_session, None);
    support::settle().await;
    exporter.update(&versioned(3)).await.expect("update v3");

    let v3 = Some(PropertyValue::from(3i64));
    let expected = &v3;
    support::eventually("subscriber sees v3", || async move {
        seen.descriptions()
            .await
            .last()
            .is_some_and(|description| version_of(description) == *expected)
    })
    .await;
    let importer_ref = &importer;
    support::eventually("importer mirror holds v3", || async move {
        importer_ref
            .endpoints()
            .await
            .iter()
            .any(|description| version_of(description) == *expected)
    })
    .await;

    assert_eq!(importer.session().session_id(), Some(importer_session));
    assert!(listener
        .events()
        .await
        .iter()
        .skip(1)
        .all(|(kind, _)| *kind == EndpointEventKind::Modified));

    exporter.shutdown().await;
    importer.shutdown().await;
}
