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

//! # endpoint-discovery
//!
//! `endpoint-discovery` propagates remote-service endpoint descriptions between processes
//! through a shared, ZooKeeper-like coordination store, and lets local components subscribe
//! to the endpoints matching an LDAP-style scope filter.
//!
//! Typical usage is API-first and centered on [`EndpointDiscovery`]. Internal modules are
//! organized by domain layer: `coordination` (store contract and session), `filter`,
//! `repository` (publication and the registry mirror) and `interest` (subscriptions).
//!
//! ## Publish and subscribe
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use endpoint_discovery::coordination::InMemoryEnsemble;
//! use endpoint_discovery::interest::{EndpointEventListener, Subscriber};
//! use endpoint_discovery::{EndpointDescription, EndpointDiscovery, EndpointEvent};
//! use tokio::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Seen(Mutex<Vec<EndpointEvent>>);
//!
//! #[async_trait]
//! impl EndpointEventListener for Seen {
//!     async fn endpoint_changed(&self, event: EndpointEvent, _matched_filter: &str) {
//!         self.0.lock().await.push(event);
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = InMemoryEnsemble::new();
//! let exporter = EndpointDiscovery::with_defaults("exporter", Arc::new(store.clone()))
//!     .await
//!     .unwrap();
//! let importer = EndpointDiscovery::with_defaults("importer", Arc::new(store.clone()))
//!     .await
//!     .unwrap();
//!
//! let seen = Arc::new(Seen::default());
//! importer
//!     .subscribe(
//!         "(&(objectClass=org.example.Greeter)(language=en))",
//!         Subscriber::Unified(seen.clone()),
//!     )
//!     .await
//!     .unwrap();
//!
//! let greeter = EndpointDescription::builder("tcp://exporter:9000/greeter")
//!     .interface("org.example.Greeter")
//!     .property("language", "en")
//!     .build()
//!     .unwrap();
//! exporter.publish(&greeter).await.unwrap();
//!
//! for _ in 0..500 {
//!     if !seen.0.lock().await.is_empty() {
//!         break;
//!     }
//!     tokio::time::sleep(Duration::from_millis(10)).await;
//! }
//! assert_eq!(seen.0.lock().await[0].description, greeter);
//!
//! exporter.shutdown().await;
//! importer.shutdown().await;
//! # });
//! ```
//!
//! ## Consistency
//!
//! Propagation is per node, eventual and best effort. A descriptor exporting K interfaces
//! is stored under K leaves and observed as K independent changes. Session expiry drops every
//! watch; the mirror and every monitor then rebuild from a full walk of their subtree and
//! report only the differences.

pub mod coordination;
pub mod filter;
pub mod interest;
#[doc(hidden)]
pub mod observability;
pub mod repository;

mod codec;
mod config;
mod description;
mod endpoint_discovery;
mod error;
mod event;

pub use codec::{DescriptionCodec, JsonDescriptionCodec};
pub use config::DiscoveryConfig;
pub use description::{
    EndpointDescription, EndpointDescriptionBuilder, PropertyMap, PropertyValue,
    ENDPOINT_FRAMEWORK_UUID, ENDPOINT_ID, OBJECT_CLASS, SERVICE_IMPORTED_CONFIGS,
};
pub use endpoint_discovery::EndpointDiscovery;
pub use error::{
    CodecError, ConfigError, DescriptionError, DiscoveryError, FailureClass, FilterError,
    PublishError, StoreError, SubscribeError,
};
pub use event::{DiscardingSink, EndpointEvent, EndpointEventKind, EndpointEventSink};
