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

//! Endpoint descriptors: the immutable property maps that travel through the store.

use crate::error::DescriptionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Exported interface names. A string or a list of strings.
pub const OBJECT_CLASS: &str = "objectClass";
/// Globally unique endpoint identifier, typically the connection URI.
pub const ENDPOINT_ID: &str = "endpoint.id";
/// Identity of the framework that exported the endpoint.
pub const ENDPOINT_FRAMEWORK_UUID: &str = "endpoint.framework.uuid";
/// Configuration types the endpoint can be imported with.
pub const SERVICE_IMPORTED_CONFIGS: &str = "service.imported.configs";

/// One property value. Lists may nest scalars of mixed types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// False for NaN and infinite doubles, anywhere in a list. The wire format cannot carry them.
    fn is_finite(&self) -> bool {
        match self {
            PropertyValue::Double(value) => value.is_finite(),
            PropertyValue::List(values) => values.iter().all(PropertyValue::is_finite),
            PropertyValue::Bool(_) | PropertyValue::Long(_) | PropertyValue::String(_) => true,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(value) => write!(f, "{value}"),
            PropertyValue::Long(value) => write!(f, "{value}"),
            PropertyValue::Double(value) => write!(f, "{value}"),
            PropertyValue::String(value) => f.write_str(value),
            PropertyValue::List(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        PropertyValue::List(values.into_iter().map(Into::into).collect())
    }
}

pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Immutable description of one remotely reachable service endpoint.
///
/// Construction validates that `objectClass` names at least one interface and that
/// `endpoint.id` is a non-empty string, so every instance can be addressed in the store.
/// Non-finite doubles are rejected so every instance encodes and decodes.
/// Equality compares every property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PropertyMap", into = "PropertyMap")]
pub struct EndpointDescription {
    properties: PropertyMap,
    interfaces: Vec<String>,
}

impl EndpointDescription {
    pub fn new(properties: PropertyMap) -> Result<Self, DescriptionError> {
        let interfaces = match properties.get(OBJECT_CLASS) {
            None => return Err(DescriptionError::MissingInterfaces),
            Some(PropertyValue::String(name)) => vec![name.clone()],
            Some(PropertyValue::List(names)) => names
                .iter()
                .map(|name| {
                    name.as_str()
                        .map(str::to_string)
                        .ok_or(DescriptionError::InvalidInterfaces)
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(DescriptionError::InvalidInterfaces),
        };
        if interfaces.is_empty() || interfaces.iter().any(|name| name.is_empty()) {
            return Err(DescriptionError::MissingInterfaces);
        }

        match properties.get(ENDPOINT_ID) {
            None => return Err(DescriptionError::MissingEndpointId),
            Some(PropertyValue::String(id)) if !id.is_empty() => {}
            Some(_) => return Err(DescriptionError::InvalidEndpointId),
        }

        if let Some((key, _)) = properties.iter().find(|(_, value)| !value.is_finite()) {
            return Err(DescriptionError::NonFiniteProperty(key.clone()));
        }

        Ok(Self {
            properties,
            interfaces,
        })
    }

    pub fn builder(endpoint_id: &str) -> EndpointDescriptionBuilder {
        EndpointDescriptionBuilder::new(endpoint_id)
    }

    pub fn id(&self) -> &str {
        // Validated in `new`.
        self.properties
            .get(ENDPOINT_ID)
            .and_then(PropertyValue::as_str)
            .unwrap_or_default()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn framework_uuid(&self) -> Option<&str> {
        self.get(ENDPOINT_FRAMEWORK_UUID)
            .and_then(PropertyValue::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }
}

impl TryFrom<PropertyMap> for EndpointDescription {
    type Error = DescriptionError;

    fn try_from(properties: PropertyMap) -> Result<Self, Self::Error> {
        Self::new(properties)
    }
}

impl From<EndpointDescription> for PropertyMap {
    fn from(description: EndpointDescription) -> Self {
        description.properties
    }
}

/// Incremental construction of an [`EndpointDescription`].
#[derive(Clone, Debug)]
pub struct EndpointDescriptionBuilder {
    properties: PropertyMap,
    interfaces: Vec<PropertyValue>,
}

impl EndpointDescriptionBuilder {
    fn new(endpoint_id: &str) -> Self {
        let mut properties = PropertyMap::new();
        properties.insert(ENDPOINT_ID.to_string(), endpoint_id.into());
        Self {
            properties,
            interfaces: Vec::new(),
        }
    }

    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn build(mut self) -> Result<EndpointDescription, DescriptionError> {
        if !self.interfaces.is_empty() {
            self.properties.insert(
                OBJECT_CLASS.to_string(),
                PropertyValue::List(self.interfaces),
            );
        }
        EndpointDescription::new(self.properties)
    }
}
