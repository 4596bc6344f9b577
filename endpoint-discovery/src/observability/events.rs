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

//! Canonical structured event names used across `endpoint-discovery`.

// Publication path events.
pub const PUBLISH_START: &str = "publish_start";
pub const PUBLISH_OK: &str = "publish_ok";
pub const PUBLISH_FAILED: &str = "publish_failed";
pub const PUBLISH_STALE_NODE_REPLACED: &str = "publish_stale_node_replaced";
pub const PUBLISH_STALE_NODE_RACE_LOST: &str = "publish_stale_node_race_lost";
pub const UPDATE_OK: &str = "update_ok";
pub const UPDATE_FAILED: &str = "update_failed";
pub const UPDATE_MISSING_NODE: &str = "update_missing_node";
pub const UNPUBLISH_OK: &str = "unpublish_ok";
pub const UNPUBLISH_FAILED: &str = "unpublish_failed";
pub const REPUBLISH_AFTER_SESSION_RESTORE: &str = "republish_after_session_restore";

// Watch tree events.
pub const WATCH_TREE_START: &str = "watch_tree_start";
pub const WATCH_TREE_STOP: &str = "watch_tree_stop";
pub const WATCH_REFRESH_FAILED: &str = "watch_refresh_failed";
pub const WATCH_NODE_VANISHED: &str = "watch_node_vanished";
pub const WATCH_ROOT_MISSING: &str = "watch_root_missing";
pub const WATCH_DECODE_FAILED: &str = "watch_decode_failed";
pub const WATCH_STALE_GENERATION: &str = "watch_stale_generation";
pub const WATCH_RESYNC_START: &str = "watch_resync_start";
pub const WATCH_RESYNC_OK: &str = "watch_resync_ok";
pub const WATCH_REPLAY: &str = "watch_replay";
pub const ENDPOINT_ADDED: &str = "endpoint_added";
pub const ENDPOINT_MODIFIED: &str = "endpoint_modified";
pub const ENDPOINT_REMOVED: &str = "endpoint_removed";

// Session lifecycle events.
pub const SESSION_CONNECTED: &str = "session_connected";
pub const SESSION_CONNECT_FAILED: &str = "session_connect_failed";
pub const SESSION_DISCONNECTED: &str = "session_disconnected";
pub const SESSION_EXPIRED: &str = "session_expired";
pub const SESSION_RESTORED: &str = "session_restored";
pub const SESSION_CONNECTION_RESTORED: &str = "session_connection_restored";
pub const SESSION_LISTENER_DROPPED: &str = "session_listener_dropped";

// Interest and subscription events.
pub const SUBSCRIBE_OK: &str = "subscribe_ok";
pub const SUBSCRIBE_REJECTED: &str = "subscribe_rejected";
pub const SUBSCRIBE_IGNORED_INTERNAL: &str = "subscribe_ignored_internal";
pub const SUBSCRIBE_REPLAY: &str = "subscribe_replay";
pub const UNSUBSCRIBE_OK: &str = "unsubscribe_ok";
pub const UNSUBSCRIBE_UNKNOWN: &str = "unsubscribe_unknown";
pub const MONITOR_CREATE: &str = "monitor_create";
pub const MONITOR_REUSE: &str = "monitor_reuse";
pub const MONITOR_REMOVE: &str = "monitor_remove";
pub const FAN_OUT_FILTER_MISMATCH: &str = "fan_out_filter_mismatch";
pub const FAN_OUT_STALE_MONITOR: &str = "fan_out_stale_monitor";
pub const FAN_OUT_DELIVER: &str = "fan_out_deliver";
pub const FILTER_PARSE_FAILED: &str = "filter_parse_failed";
