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

//! Canonical structured field values and value-format helpers.

use crate::description::EndpointDescription;
use crate::event::EndpointEventKind;

/// Values of the `reason` field.
pub const NONE: &str = "none";
pub const REASON_NODE_VANISHED: &str = "node_vanished";
pub const REASON_SESSION_EXPIRED: &str = "session_expired";
pub const REASON_TRANSIENT: &str = "transient_connectivity";
pub const REASON_NO_SESSION: &str = "no_active_session";

pub fn format_interfaces(description: &EndpointDescription) -> String {
    let interfaces = description.interfaces();
    if interfaces.is_empty() {
        NONE.to_string()
    } else {
        interfaces.join(",")
    }
}

pub fn format_event_kind(kind: EndpointEventKind) -> &'static str {
    match kind {
        EndpointEventKind::Added => "added",
        EndpointEventKind::Modified => "modified",
        EndpointEventKind::Removed => "removed",
    }
}
