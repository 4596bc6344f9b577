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

//! Registry path layout.

use crate::error::ConfigError;

pub const DEFAULT_REGISTRY_ROOT: &str = "/osgi/service_registry";
/// Replaces `/` inside an endpoint id so the id stays one path segment.
pub const ENDPOINT_ID_ESCAPE: char = '#';

/// `<root>/<interface with '.' as '/'>/<escaped endpoint id>`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistryPaths {
    root: String,
}

impl RegistryPaths {
    pub fn new(root: &str) -> Result<Self, ConfigError> {
        let valid = root.starts_with('/')
            && root.len() > 1
            && !root.ends_with('/')
            && !root[1..].split('/').any(str::is_empty);
        if !valid {
            return Err(ConfigError::InvalidRegistryRoot(root.to_string()));
        }
        Ok(Self {
            root: root.to_string(),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn interface_path(&self, interface: &str) -> String {
        format!("{}/{}", self.root, interface.replace('.', "/"))
    }

    pub fn endpoint_path(&self, interface: &str, endpoint_id: &str) -> String {
        format!(
            "{}/{}",
            self.interface_path(interface),
            escape_endpoint_id(endpoint_id)
        )
    }
}

impl Default for RegistryPaths {
    fn default() -> Self {
        Self {
            root: DEFAULT_REGISTRY_ROOT.to_string(),
        }
    }
}

pub fn escape_endpoint_id(endpoint_id: &str) -> String {
    endpoint_id.replace('/', &ENDPOINT_ID_ESCAPE.to_string())
}

/// `/a/b/c` → `/a/b`; the root has no parent.
pub(crate) fn parent_path(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) if path.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(index) => Some(&path[..index]),
    }
}

pub(crate) fn child_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Every proper prefix of `path` below `/`, shortest first, followed by `path` itself.
pub(crate) fn path_chain(path: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        current.push('/');
        current.push_str(segment);
        chain.push(current.clone());
    }
    chain
}

/// `true` when `path` is `ancestor` or lies below it.
pub(crate) fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (ancestor == "/" && path.starts_with('/'))
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}
