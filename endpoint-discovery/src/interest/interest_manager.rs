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

//! Filter-keyed interest registry with shared monitors and subscriber fan-out.

use crate::codec::DescriptionCodec;
use crate::coordination::{CoordinationSession, RegistryPaths};
use crate::error::SubscribeError;
use crate::event::{EndpointEvent, EndpointEventSink};
use crate::filter::{FilterCache, ScopeFilter};
use crate::interest::interface_monitor::InterfaceMonitor;
use crate::interest::subscriber::{Subscriber, SubscriberKey};
use crate::observability::events;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const COMPONENT: &str = "interest_manager";

struct Interest {
    scope: Arc<ScopeFilter>,
    monitor: Arc<InterfaceMonitor>,
    subscribers: Vec<Subscriber>,
}

enum AfterSubscribe {
    StartMonitor(Arc<InterfaceMonitor>),
    Replay(Arc<InterfaceMonitor>, Arc<ScopeFilter>),
    AlreadySubscribed,
}

/// Deduplicates subscriber filters into one monitor per distinct filter text.
///
/// Two indexes are kept: filter text → interest entry, and subscriber → filter texts. Both
/// are only touched under their locks; monitor callbacks see copies.
pub struct InterestManager {
    this: Weak<InterestManager>,
    paths: RegistryPaths,
    session: Arc<CoordinationSession>,
    codec: Arc<dyn DescriptionCodec>,
    filters: Arc<FilterCache>,
    interests: Mutex<HashMap<String, Interest>>,
    subscriptions: Mutex<HashMap<SubscriberKey, HashSet<String>>>,
    next_monitor_id: AtomicU64,
}

impl InterestManager {
    pub fn new(
        paths: RegistryPaths,
        session: Arc<CoordinationSession>,
        codec: Arc<dyn DescriptionCodec>,
        filters: Arc<FilterCache>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            paths,
            session,
            codec,
            filters,
            interests: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            next_monitor_id: AtomicU64::new(1),
        })
    }

    /// Registers `subscriber` for endpoints matching `filter`.
    ///
    /// The first subscriber of a filter starts its monitor; later ones get an ADDED for every
    /// matching endpoint the monitor already knows. The replay is queued on the monitor's
    /// worker and so never overtakes a later REMOVED, but an endpoint added while the replay
    /// is queued may be reported ADDED twice.
    pub async fn subscribe(
        &self,
        filter: &str,
        subscriber: Subscriber,
    ) -> Result<(), SubscribeError> {
        if subscriber.is_discovery_internal() {
            debug!(
                event = events::SUBSCRIBE_IGNORED_INTERNAL,
                component = COMPONENT,
                filter,
                "ignoring subscription of a discovery-internal listener"
            );
            return Ok(());
        }

        let scope = match ScopeFilter::new(filter, &self.filters) {
            Ok(scope) => Arc::new(scope),
            Err(err) => {
                warn!(
                    event = events::SUBSCRIBE_REJECTED,
                    component = COMPONENT,
                    filter,
                    err = %err,
                    "rejecting subscription"
                );
                return Err(err);
            }
        };

        let key = subscriber.key();
        let next = {
            let mut interests = self.interests.lock().await;
            match interests.get_mut(filter) {
                Some(interest) => {
                    if interest
                        .subscribers
                        .iter()
                        .any(|existing| existing.key() == key)
                    {
                        AfterSubscribe::AlreadySubscribed
                    } else {
                        interest.subscribers.push(subscriber.clone());
                        debug!(
                            event = events::MONITOR_REUSE,
                            component = COMPONENT,
                            filter,
                            monitor_id = interest.monitor.id(),
                            subscribers = interest.subscribers.len(),
                            "joining existing monitor"
                        );
                        AfterSubscribe::Replay(interest.monitor.clone(), interest.scope.clone())
                    }
                }
                None => {
                    let monitor = self.create_monitor(filter, &scope);
                    interests.insert(
                        filter.to_string(),
                        Interest {
                            scope: scope.clone(),
                            monitor: monitor.clone(),
                            subscribers: vec![subscriber.clone()],
                        },
                    );
                    AfterSubscribe::StartMonitor(monitor)
                }
            }
        };

        self.subscriptions
            .lock()
            .await
            .entry(key)
            .or_default()
            .insert(filter.to_string());

        match next {
            AfterSubscribe::StartMonitor(monitor) => monitor.start(),
            AfterSubscribe::Replay(monitor, scope) => {
                debug!(
                    event = events::SUBSCRIBE_REPLAY,
                    component = COMPONENT,
                    filter,
                    monitor_id = monitor.id(),
                    "queueing replay of known endpoints to new subscriber"
                );
                monitor.replay(Arc::new(ReplaySink {
                    manager: self.this.clone(),
                    filter: filter.to_string(),
                    monitor_id: monitor.id(),
                    scope,
                    subscriber,
                }));
            }
            AfterSubscribe::AlreadySubscribed => {}
        }

        info!(
            event = events::SUBSCRIBE_OK,
            component = COMPONENT,
            filter,
            interface = scope.target_interface(),
            "subscription registered"
        );
        Ok(())
    }

    fn create_monitor(&self, filter: &str, scope: &ScopeFilter) -> Arc<InterfaceMonitor> {
        let monitor_id = self.next_monitor_id.fetch_add(1, Ordering::SeqCst);
        let sink = Arc::new(InterestSink {
            manager: self.this.clone(),
            filter: filter.to_string(),
            monitor_id,
        });
        let monitor = InterfaceMonitor::new(
            monitor_id,
            scope.target_interface(),
            &self.paths,
            &self.session,
            self.codec.clone(),
            sink,
        );
        info!(
            event = events::MONITOR_CREATE,
            component = COMPONENT,
            filter,
            monitor_id,
            interface = monitor.interface(),
            path = monitor.root(),
            "created monitor for new filter"
        );
        monitor
    }

    /// Removes `subscriber` from every filter it registered. Unknown subscribers are ignored.
    pub async fn unsubscribe(&self, subscriber: &Subscriber) {
        let key = subscriber.key();
        let Some(filters) = self.subscriptions.lock().await.remove(&key) else {
            debug!(
                event = events::UNSUBSCRIBE_UNKNOWN,
                component = COMPONENT,
                "unsubscribe for a listener with no registrations"
            );
            return;
        };

        let mut released = Vec::new();
        {
            let mut interests = self.interests.lock().await;
            for filter in &filters {
                if let Some(monitor) = Self::detach(&mut interests, filter, &key) {
                    released.push((filter.clone(), monitor));
                }
            }
        }
        self.release(released);

        info!(
            event = events::UNSUBSCRIBE_OK,
            component = COMPONENT,
            filters = filters.len(),
            "listener unsubscribed"
        );
    }

    /// Removes one filter of `subscriber`, leaving its other registrations in place.
    pub async fn unsubscribe_filter(&self, filter: &str, subscriber: &Subscriber) {
        let key = subscriber.key();
        let registered = {
            let mut subscriptions = self.subscriptions.lock().await;
            let removed = subscriptions
                .get_mut(&key)
                .is_some_and(|filters| filters.remove(filter));
            if subscriptions.get(&key).is_some_and(HashSet::is_empty) {
                subscriptions.remove(&key);
            }
            removed
        };
        if !registered {
            debug!(
                event = events::UNSUBSCRIBE_UNKNOWN,
                component = COMPONENT,
                filter,
                "listener holds no registration for filter"
            );
            return;
        }

        let released = {
            let mut interests = self.interests.lock().await;
            Self::detach(&mut interests, filter, &key)
        };
        self.release(released.map(|monitor| (filter.to_string(), monitor)));
        info!(
            event = events::UNSUBSCRIBE_OK,
            component = COMPONENT,
            filter,
            "filter unsubscribed"
        );
    }

    /// Makes `filters` the complete filter set of `subscriber`.
    ///
    /// Every filter is validated before anything changes; on error the previous
    /// registrations are kept.
    pub async fn replace_scopes(
        &self,
        subscriber: Subscriber,
        filters: &[&str],
    ) -> Result<(), SubscribeError> {
        for filter in filters {
            ScopeFilter::new(filter, &self.filters)?;
        }

        let wanted: BTreeSet<&str> = filters.iter().copied().collect();
        let current: BTreeSet<String> = self
            .subscriptions
            .lock()
            .await
            .get(&subscriber.key())
            .map(|filters| filters.iter().cloned().collect())
            .unwrap_or_default();

        for stale in current.iter().filter(|filter| !wanted.contains(filter.as_str())) {
            self.unsubscribe_filter(stale, &subscriber).await;
        }
        for added in wanted.iter().filter(|filter| !current.contains(**filter)) {
            self.subscribe(added, subscriber.clone()).await?;
        }
        Ok(())
    }

    fn detach(
        interests: &mut HashMap<String, Interest>,
        filter: &str,
        key: &SubscriberKey,
    ) -> Option<Arc<InterfaceMonitor>> {
        let interest = interests.get_mut(filter)?;
        interest
            .subscribers
            .retain(|subscriber| subscriber.key() != *key);
        if !interest.subscribers.is_empty() {
            return None;
        }
        interests.remove(filter).map(|interest| interest.monitor)
    }

    fn release(&self, released: impl IntoIterator<Item = (String, Arc<InterfaceMonitor>)>) {
        for (filter, monitor) in released {
            monitor.stop();
            info!(
                event = events::MONITOR_REMOVE,
                component = COMPONENT,
                filter = %filter,
                monitor_id = monitor.id(),
                "removed monitor with its last subscriber"
            );
        }
    }

    pub async fn active_monitor_count(&self) -> usize {
        self.interests.lock().await.len()
    }

    pub async fn subscriber_count(&self, filter: &str) -> usize {
        self.interests
            .lock()
            .await
            .get(filter)
            .map_or(0, |interest| interest.subscribers.len())
    }

    /// Filters `subscriber` is currently registered with, sorted.
    pub async fn filters_of(&self, subscriber: &Subscriber) -> Vec<String> {
        let mut filters: Vec<String> = self
            .subscriptions
            .lock()
            .await
            .get(&subscriber.key())
            .map(|filters| filters.iter().cloned().collect())
            .unwrap_or_default();
        filters.sort();
        filters
    }

    /// Stops every monitor and forgets every registration.
    pub async fn close(&self) {
        let interests: Vec<(String, Interest)> =
            self.interests.lock().await.drain().collect();
        self.subscriptions.lock().await.clear();
        self.release(
            interests
                .into_iter()
                .map(|(filter, interest)| (filter, interest.monitor)),
        );
    }

    async fn still_subscribed(&self, filter: &str, monitor_id: u64, key: &SubscriberKey) -> bool {
        self.interests
            .lock()
            .await
            .get(filter)
            .filter(|interest| interest.monitor.id() == monitor_id)
            .is_some_and(|interest| {
                interest
                    .subscribers
                    .iter()
                    .any(|subscriber| subscriber.key() == *key)
            })
    }

    async fn fan_out_snapshot(
        &self,
        filter: &str,
        monitor_id: u64,
    ) -> Option<(Arc<ScopeFilter>, Vec<Subscriber>)> {
        let interests = self.interests.lock().await;
        interests
            .get(filter)
            .filter(|interest| interest.monitor.id() == monitor_id)
            .map(|interest| (interest.scope.clone(), interest.subscribers.clone()))
    }
}

/// Event sink of one monitor: re-checks the filter and fans out to the entry's subscribers.
struct InterestSink {
    manager: Weak<InterestManager>,
    filter: String,
    monitor_id: u64,
}

#[async_trait]
impl EndpointEventSink for InterestSink {
    async fn endpoint_event(&self, event: EndpointEvent) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        let Some((scope, subscribers)) = manager
            .fan_out_snapshot(&self.filter, self.monitor_id)
            .await
        else {
            debug!(
                event = events::FAN_OUT_STALE_MONITOR,
                component = COMPONENT,
                filter = %self.filter,
                monitor_id = self.monitor_id,
                "dropping event from a removed monitor"
            );
            return;
        };

        if !scope.matches(&event.description) {
            debug!(
                event = events::FAN_OUT_FILTER_MISMATCH,
                component = COMPONENT,
                filter = %self.filter,
                endpoint_id = event.description.id(),
                "endpoint does not match filter"
            );
            return;
        }

        debug!(
            event = events::FAN_OUT_DELIVER,
            component = COMPONENT,
            filter = %self.filter,
            endpoint_id = event.description.id(),
            subscribers = subscribers.len(),
            "delivering endpoint event"
        );
        for subscriber in subscribers {
            subscriber.deliver(&event, &self.filter).await;
        }
    }
}

/// One-off sink that replays a monitor's known endpoints to a single late subscriber.
struct ReplaySink {
    manager: Weak<InterestManager>,
    filter: String,
    monitor_id: u64,
    scope: Arc<ScopeFilter>,
    subscriber: Subscriber,
}

#[async_trait]
impl EndpointEventSink for ReplaySink {
    async fn endpoint_event(&self, event: EndpointEvent) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        if !self.scope.matches(&event.description) {
            return;
        }
        if !manager
            .still_subscribed(&self.filter, self.monitor_id, &self.subscriber.key())
            .await
        {
            debug!(
                event = events::FAN_OUT_STALE_MONITOR,
                component = COMPONENT,
                filter = %self.filter,
                monitor_id = self.monitor_id,
                "dropping replay for a subscriber that left"
            );
            return;
        }
        self.subscriber.deliver(&event, &self.filter).await;
    }
}
