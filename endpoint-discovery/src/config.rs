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

use crate::coordination::{RegistryPaths, DEFAULT_REGISTRY_ROOT};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_registry_root() -> String {
    DEFAULT_REGISTRY_ROOT.to_string()
}

fn default_reconnect() -> bool {
    true
}

/// Discovery settings, usually read from a JSON5 file.
///
/// ```json5
/// {
///     registry_root: "/osgi/service_registry",
///     reconnect_on_session_expiry: true,
/// }
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    #[serde(default = "default_registry_root")]
    pub registry_root: String,
    /// Open a new session as soon as the store expires the current one.
    #[serde(default = "default_reconnect")]
    pub reconnect_on_session_expiry: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            registry_root: default_registry_root(),
            reconnect_on_session_expiry: default_reconnect(),
        }
    }
}

impl DiscoveryConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DiscoveryConfig = json5::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json5_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry_paths().map(|_| ())
    }

    pub fn registry_paths(&self) -> Result<RegistryPaths, ConfigError> {
        RegistryPaths::new(&self.registry_root)
    }
}
