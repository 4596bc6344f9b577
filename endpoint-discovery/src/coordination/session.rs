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

//! Coordination session lifecycle: connect, expiry, reconnection and listener notification.

use crate::coordination::{CoordinationStore, SessionState, SessionStateListener, StoreConnector};
use crate::error::StoreError;
use crate::observability::{events, fields};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

const COMPONENT: &str = "coordination_session";
const RECONNECT_BACKOFF_START: Duration = Duration::from_millis(50);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Components that hold store-side state (ephemeral nodes, watches) and must rebuild it after
/// the session that owned it expired.
#[async_trait]
pub trait SessionAware: Send + Sync {
    /// The old session is gone. Store calls fail until
    /// [`session_restored`](Self::session_restored).
    async fn session_lost(&self) {}

    /// A new session is active. Called once per reconnect, listeners in registration order.
    async fn session_restored(&self);

    /// The same session reconnected after a transient disconnect. Ephemeral nodes survived,
    /// but watch notifications due while disconnected may have been missed.
    async fn connection_restored(&self) {}
}

struct ActiveStore {
    store: Arc<dyn CoordinationStore>,
    generation: u64,
}

/// Shared handle to the current store session.
///
/// Every successful (re)connect gets a new generation number; state callbacks from a session
/// of an older generation are ignored.
pub struct CoordinationSession {
    connector: Arc<dyn StoreConnector>,
    active: ArcSwapOption<ActiveStore>,
    generation: AtomicU64,
    listeners: Mutex<Vec<Weak<dyn SessionAware>>>,
    reconnect_on_expiry: bool,
    closed: AtomicBool,
    transitions: tokio::sync::Mutex<()>,
}

impl CoordinationSession {
    /// Opens the first session through `connector`.
    pub async fn connect(
        connector: Arc<dyn StoreConnector>,
        reconnect_on_expiry: bool,
    ) -> Result<Arc<Self>, StoreError> {
        let session = Arc::new(Self {
            connector,
            active: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            reconnect_on_expiry,
            closed: AtomicBool::new(false),
            transitions: tokio::sync::Mutex::new(()),
        });
        session.open().await?;
        Ok(session)
    }

    async fn open(self: &Arc<Self>) -> Result<u64, StoreError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let relay = Arc::new(SessionStateRelay {
            session: Arc::downgrade(self),
            generation,
            disconnected: AtomicBool::new(false),
        });

        let store = match self.connector.connect(relay).await {
            Ok(store) => store,
            Err(err) => {
                warn!(
                    event = events::SESSION_CONNECT_FAILED,
                    component = COMPONENT,
                    generation,
                    err = %err,
                    "unable to open coordination session"
                );
                return Err(err);
            }
        };

        info!(
            event = events::SESSION_CONNECTED,
            component = COMPONENT,
            session_id = store.session_id(),
            generation,
            "coordination session opened"
        );
        self.active
            .store(Some(Arc::new(ActiveStore { store, generation })));
        Ok(generation)
    }

    /// The live store, or [`StoreError::SessionExpired`] between expiry and reconnection.
    pub fn store(&self) -> Result<Arc<dyn CoordinationStore>, StoreError> {
        self.active
            .load_full()
            .map(|active| active.store.clone())
            .ok_or(StoreError::SessionExpired)
    }

    pub fn session_id(&self) -> Option<u64> {
        self.active
            .load_full()
            .map(|active| active.store.session_id())
    }

    /// Generation of the live session; 0 while none is active.
    pub fn generation(&self) -> u64 {
        self.active
            .load_full()
            .map_or(0, |active| active.generation)
    }

    pub fn is_active(&self) -> bool {
        self.active.load().is_some()
    }

    /// Registers `listener` for loss/restore notifications. Held weakly.
    pub fn add_session_listener(&self, listener: Weak<dyn SessionAware>) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|listener| listener.strong_count() > 0);
        listeners.push(listener);
    }

    #[cfg(test)]
    fn registered_listeners(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn live_listeners(&self) -> Vec<Arc<dyn SessionAware>> {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|listener| listener.strong_count() > 0);
        if listeners.len() != before {
            debug!(
                event = events::SESSION_LISTENER_DROPPED,
                component = COMPONENT,
                dropped = before - listeners.len(),
                "pruned session listeners that were dropped"
            );
        }
        listeners.iter().filter_map(Weak::upgrade).collect()
    }

    /// Opens a fresh session after expiry and notifies every listener.
    ///
    /// No-op when a session is already active or the handle was closed.
    pub async fn reconnect(self: &Arc<Self>) -> Result<(), StoreError> {
        let _transition = self.transitions.lock().await;
        self.reconnect_locked().await
    }

    async fn reconnect_locked(self: &Arc<Self>) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) || self.is_active() {
            return Ok(());
        }

        let generation = self.open().await?;
        info!(
            event = events::SESSION_RESTORED,
            component = COMPONENT,
            generation,
            "coordination session restored"
        );
        for listener in self.live_listeners() {
            listener.session_restored().await;
        }
        Ok(())
    }

    async fn handle_expired(self: &Arc<Self>, generation: u64) {
        let _transition = self.transitions.lock().await;

        let current = self.active.load_full();
        if current.as_ref().map(|active| active.generation) != Some(generation) {
            debug!(
                event = events::SESSION_EXPIRED,
                component = COMPONENT,
                generation,
                reason = fields::NONE,
                "ignoring expiry of a superseded session"
            );
            return;
        }

        self.active.store(None);
        warn!(
            event = events::SESSION_EXPIRED,
            component = COMPONENT,
            generation,
            reason = fields::REASON_SESSION_EXPIRED,
            "coordination session expired; ephemeral nodes and watches are gone"
        );
        for listener in self.live_listeners() {
            listener.session_lost().await;
        }

        if !self.reconnect_on_expiry {
            return;
        }

        let mut backoff = RECONNECT_BACKOFF_START;
        while !self.closed.load(Ordering::SeqCst) {
            if self.reconnect_locked().await.is_ok() {
                return;
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(RECONNECT_BACKOFF_MAX);
        }
    }

    async fn handle_connection_restored(&self, generation: u64) {
        let _transition = self.transitions.lock().await;

        if self.generation() != generation || self.closed.load(Ordering::SeqCst) {
            return;
        }
        info!(
            event = events::SESSION_CONNECTION_RESTORED,
            component = COMPONENT,
            generation,
            "coordination store connection recovered; re-reading watched state"
        );
        for listener in self.live_listeners() {
            listener.connection_restored().await;
        }
    }

    /// Closes the live session. Its ephemeral nodes disappear; listeners are not notified.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(active) = self.active.swap(None) {
            active.store.close().await;
            info!(
                event = events::SESSION_DISCONNECTED,
                component = COMPONENT,
                generation = active.generation,
                reason = "closed",
                "coordination session closed"
            );
        }
    }
}

struct SessionStateRelay {
    session: Weak<CoordinationSession>,
    generation: u64,
    disconnected: AtomicBool,
}

#[async_trait]
impl SessionStateListener for SessionStateRelay {
    async fn on_session_state(&self, state: SessionState) {
        let Some(session) = self.session.upgrade() else {
            return;
        };

        match state {
            SessionState::Connected => {
                debug!(
                    event = events::SESSION_CONNECTED,
                    component = COMPONENT,
                    generation = self.generation,
                    "coordination store reports connected"
                );
                if self.disconnected.swap(false, Ordering::SeqCst) {
                    session.handle_connection_restored(self.generation).await;
                }
            }
            SessionState::Disconnected => {
                self.disconnected.store(true, Ordering::SeqCst);
                info!(
                    event = events::SESSION_DISCONNECTED,
                    component = COMPONENT,
                    generation = self.generation,
                    reason = fields::REASON_TRANSIENT,
                    "coordination store connection lost; waiting for it to recover"
                );
            }
            SessionState::Expired => session.handle_expired(self.generation).await,
        }
    }
}
