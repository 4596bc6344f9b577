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

//! Scope filters.
//!
//! Subscribers describe the endpoints they care about with LDAP-style predicates such as
//! `(&(objectClass=org.example.Greeter)(service.intents=confidentiality))`. The
//! `objectClass` equality clause names the interface whose store subtree gets monitored;
//! the rest of the predicate narrows what is delivered from that subtree.
//!
//! ```
//! use endpoint_discovery::filter::{extract_target_interface, FilterCache};
//! use endpoint_discovery::EndpointDescription;
//!
//! let description = EndpointDescription::builder("tcp://host:9/greeter")
//!     .interface("org.example.Greeter")
//!     .property("x", 1i64)
//!     .build()
//!     .unwrap();
//!
//! let filters = FilterCache::default();
//! assert!(filters.matches("(&(objectClass=org.example.Greeter)(x=1))", &description));
//! assert!(!filters.matches("(&(objectClass=org.example.Greeter)(x=2))", &description));
//! // Malformed filters never match and never panic.
//! assert!(!filters.matches("(objectClass=", &description));
//!
//! assert_eq!(
//!     extract_target_interface("(&(objectClass=org.example.Greeter)(x=1))").as_deref(),
//!     Some("org.example.Greeter")
//! );
//! ```

mod evaluate;
mod parser;

pub use parser::{Filter, SubstringPattern};

use crate::description::{EndpointDescription, OBJECT_CLASS};
use crate::error::{FilterError, SubscribeError};
use crate::observability::events;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

const COMPONENT: &str = "filter";
const FILTER_CACHE_CAPACITY: usize = 1024;

/// Returns the interface an `objectClass` equality clause pins the filter to.
///
/// The clause must be the whole filter or a conjunct of top-level `&` groups; a clause under
/// `|` or `!` does not constrain the result set and is ignored.
pub fn extract_target_interface(filter: &str) -> Option<String> {
    Filter::parse(filter)
        .ok()
        .and_then(|parsed| target_interface(&parsed).map(str::to_string))
}

fn target_interface(filter: &Filter) -> Option<&str> {
    match filter {
        Filter::Equal { attr, value } if attr.eq_ignore_ascii_case(OBJECT_CLASS) => {
            Some(value.as_str())
        }
        Filter::And(filters) => filters.iter().find_map(target_interface),
        _ => None,
    }
}

/// Parsed-filter cache shared by every matcher in one discovery instance.
#[derive(Debug, Default)]
pub struct FilterCache {
    parsed: Mutex<HashMap<String, Result<Arc<Filter>, FilterError>>>,
}

impl FilterCache {
    pub fn parse(&self, text: &str) -> Result<Arc<Filter>, FilterError> {
        let mut parsed = self.parsed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = parsed.get(text) {
            return cached.clone();
        }

        if parsed.len() >= FILTER_CACHE_CAPACITY {
            parsed.clear();
        }
        let result = Filter::parse(text).map(Arc::new);
        parsed.insert(text.to_string(), result.clone());
        result
    }

    /// `false` for non-matching descriptors and for filters that do not parse.
    pub fn matches(&self, filter: &str, description: &EndpointDescription) -> bool {
        match self.parse(filter) {
            Ok(parsed) => parsed.matches(description.properties()),
            Err(err) => {
                debug!(
                    event = events::FILTER_PARSE_FAILED,
                    component = COMPONENT,
                    filter,
                    err = %err,
                    "treating malformed filter as non-matching"
                );
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.parsed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A subscriber filter together with the interface it is monitored through.
#[derive(Clone, Debug)]
pub struct ScopeFilter {
    text: String,
    filter: Arc<Filter>,
    target_interface: String,
}

impl ScopeFilter {
    pub fn new(text: &str, cache: &FilterCache) -> Result<Self, SubscribeError> {
        let filter = cache
            .parse(text)
            .map_err(|source| SubscribeError::InvalidFilter {
                filter: text.to_string(),
                source,
            })?;
        let target_interface = target_interface(&filter)
            .ok_or_else(|| SubscribeError::MissingInterfaceClause(text.to_string()))?
            .to_string();

        Ok(Self {
            text: text.to_string(),
            filter,
            target_interface,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn target_interface(&self) -> &str {
        &self.target_interface
    }

    pub fn matches(&self, description: &EndpointDescription) -> bool {
        self.filter.matches(description.properties())
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_target_interface, FilterCache, ScopeFilter};
    use crate::error::SubscribeError;

    #[test]
    fn target_interface_from_plain_and_conjunctive_filters() {
        assert_eq!(
            extract_target_interface("(objectClass=org.example.A)").as_deref(),
            Some("org.example.A")
        );
        assert_eq!(
            extract_target_interface("(&(x=1)(&(objectclass=org.example.B)(y=2)))").as_deref(),
            Some("org.example.B")
        );
    }

    #[test]
    fn target_interface_ignores_disjunctions_and_negations() {
        assert_eq!(
            extract_target_interface("(|(objectClass=org.example.A)(objectClass=org.example.B))"),
            None
        );
        assert_eq!(extract_target_interface("(!(objectClass=org.example.A))"), None);
        assert_eq!(extract_target_interface("(objectClass=org.*)"), None);
        assert_eq!(extract_target_interface("(objectClass="), None);
    }

    #[test]
    fn cache_parses_each_text_once() {
        let cache = FilterCache::default();
        let first = cache.parse("(x=1)").unwrap();
        let second = cache.parse("(x=1)").unwrap();

        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn scope_filter_rejects_missing_interface_clause() {
        let cache = FilterCache::default();

        assert_eq!(
            ScopeFilter::new("(x=1)", &cache).unwrap_err(),
            SubscribeError::MissingInterfaceClause("(x=1)".to_string())
        );
        assert!(matches!(
            ScopeFilter::new("(x=1", &cache).unwrap_err(),
            SubscribeError::InvalidFilter { .. }
        ));
    }

    #[test]
    fn scope_filter_exposes_interface_and_text() {
        let cache = FilterCache::default();
        let scope = ScopeFilter::new("(&(objectClass=org.example.A)(x=1))", &cache).unwrap();

        assert_eq!(scope.target_interface(), "org.example.A");
        assert_eq!(scope.text(), "(&(objectClass=org.example.A)(x=1))");
    }
}
