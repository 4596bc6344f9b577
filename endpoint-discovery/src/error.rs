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

//! Error types and the failure taxonomy for coordination-store calls.

use thiserror::Error;

/// How a failed store call should be treated by the caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureClass {
    /// Ownership race (node already exists / already gone). Handled inline.
    Race,
    /// Connection loss or timeout. Logged and abandoned; the next watch cycle repairs state.
    Transient,
    /// Every outstanding watch is gone; a full resynchronization is required.
    SessionExpired,
    /// Anything the store reports that fits none of the above.
    Fatal,
}

/// Failures reported by a [`CoordinationStore`](crate::coordination::CoordinationStore).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    #[error("node already exists: {0}")]
    NodeExists(String),
    #[error("no node at {0}")]
    NoNode(String),
    #[error("node has children: {0}")]
    NotEmpty(String),
    #[error("connection to the coordination store was lost")]
    ConnectionLoss,
    #[error("coordination store operation timed out")]
    OperationTimeout,
    #[error("coordination session expired")]
    SessionExpired,
    #[error("coordination store failure: {0}")]
    Other(String),
}

impl StoreError {
    pub fn class(&self) -> FailureClass {
        match self {
            StoreError::NodeExists(_) | StoreError::NoNode(_) | StoreError::NotEmpty(_) => {
                FailureClass::Race
            }
            StoreError::ConnectionLoss | StoreError::OperationTimeout => FailureClass::Transient,
            StoreError::SessionExpired => FailureClass::SessionExpired,
            StoreError::Other(_) => FailureClass::Fatal,
        }
    }

    /// `true` when the node the call targeted is not (or no longer) present.
    pub fn is_no_node(&self) -> bool {
        matches!(self, StoreError::NoNode(_))
    }

    pub fn is_node_exists(&self) -> bool {
        matches!(self, StoreError::NodeExists(_))
    }
}

/// Payload encode/decode failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unable to encode endpoint description: {0}")]
    Encode(#[source] serde_json::Error),
    /// Also covers payloads that parse but fail descriptor validation.
    #[error("unable to decode endpoint description: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Rejections raised while building an [`EndpointDescription`](crate::EndpointDescription).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DescriptionError {
    #[error("endpoint description has no exported interfaces (objectClass)")]
    MissingInterfaces,
    #[error("objectClass must be a string or a list of strings")]
    InvalidInterfaces,
    #[error("endpoint description has no endpoint id")]
    MissingEndpointId,
    #[error("endpoint id must be a non-empty string")]
    InvalidEndpointId,
    #[error("property {0:?} holds a non-finite number")]
    NonFiniteProperty(String),
}

/// Scope-filter syntax errors, with the byte offset the parser stopped at.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid filter at offset {offset}: {message}")]
pub struct FilterError {
    pub offset: usize,
    pub message: String,
}

impl FilterError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Synchronous rejections of a subscription request.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SubscribeError {
    #[error("malformed scope filter {filter:?}: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: FilterError,
    },
    #[error("scope filter {0:?} has no objectClass clause to monitor")]
    MissingInterfaceClause(String),
}

/// Failures surfaced to callers of publish/update. Store-side failures are logged instead.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("coordination store rejected {path}: {source}")]
    Rejected {
        path: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("invalid registry root {0:?}: expected an absolute path like /osgi/service_registry")]
    InvalidRegistryRoot(String),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to open coordination session: {0}")]
    Connect(#[source] StoreError),
}
