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

use crate::codec::DescriptionCodec;
use crate::coordination::{CoordinationSession, RegistryPaths, SessionAware};
use crate::event::EndpointEventSink;
use crate::repository::watch_tree::WatchTree;
use std::sync::Arc;

/// Watches the store subtree of one interface on behalf of one interest entry.
pub(crate) struct InterfaceMonitor {
    id: u64,
    interface: String,
    tree: Arc<WatchTree>,
}

impl InterfaceMonitor {
    pub(crate) fn new(
        id: u64,
        interface: &str,
        paths: &RegistryPaths,
        session: &Arc<CoordinationSession>,
        codec: Arc<dyn DescriptionCodec>,
        sink: Arc<dyn EndpointEventSink>,
    ) -> Arc<Self> {
        let tree = WatchTree::new(
            &format!("monitor:{interface}"),
            &paths.interface_path(interface),
            session.clone(),
            codec,
            sink,
        );
        let listener: Arc<dyn SessionAware> = tree.clone();
        session.add_session_listener(Arc::downgrade(&listener));

        Arc::new(Self {
            id,
            interface: interface.to_string(),
            tree,
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn interface(&self) -> &str {
        &self.interface
    }

    pub(crate) fn root(&self) -> &str {
        self.tree.root()
    }

    pub(crate) fn start(&self) {
        self.tree.start();
    }

    pub(crate) fn stop(&self) {
        self.tree.stop();
    }

    /// Replays every known endpoint to `sink` as ADDED, ordered with the live events.
    pub(crate) fn replay(&self, sink: Arc<dyn EndpointEventSink>) {
        self.tree.replay(sink);
    }
}
