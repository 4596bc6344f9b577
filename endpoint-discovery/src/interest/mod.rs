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

//! Subscriptions: who wants which endpoints, and how they are told.
//!
//! Subscribers register a scope filter. Each distinct filter text gets one monitor that
//! watches the store subtree of the filter's target interface. Monitor events are
//! re-matched against the full filter and fanned out to every subscriber of that filter,
//! through [`Subscriber::deliver`].

mod interest_manager;
mod interface_monitor;
mod subscriber;

pub use interest_manager::InterestManager;
pub use subscriber::{
    EndpointEventListener, EndpointListener, Subscriber, DISCOVERY_INTERNAL_LISTENER,
};
