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

//! Evaluation of parsed filters against descriptor properties.

use crate::description::{PropertyMap, PropertyValue};
use crate::filter::parser::{Filter, SubstringPattern};
use std::cmp::Ordering;

#[derive(Clone, Copy)]
enum Comparison {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

impl Filter {
    /// Evaluates the filter. Attribute names match case-insensitively; list values match
    /// when any element does. Operands that cannot be read as the property's type never match.
    pub fn matches(&self, properties: &PropertyMap) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|filter| filter.matches(properties)),
            Filter::Or(filters) => filters.iter().any(|filter| filter.matches(properties)),
            Filter::Not(filter) => !filter.matches(properties),
            Filter::Present { attr } => lookup(properties, attr).is_some(),
            Filter::Equal { attr, value } => {
                compare_attr(properties, attr, Comparison::Equal, value)
            }
            Filter::Approx { attr, value } => {
                compare_attr(properties, attr, Comparison::Approx, value)
            }
            Filter::GreaterEq { attr, value } => {
                compare_attr(properties, attr, Comparison::GreaterEq, value)
            }
            Filter::LessEq { attr, value } => {
                compare_attr(properties, attr, Comparison::LessEq, value)
            }
            Filter::Substring { attr, pattern } => lookup(properties, attr)
                .is_some_and(|value| substring_matches(value, pattern)),
        }
    }
}

fn lookup<'a>(properties: &'a PropertyMap, attr: &str) -> Option<&'a PropertyValue> {
    properties.get(attr).or_else(|| {
        properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(attr))
            .map(|(_, value)| value)
    })
}

fn compare_attr(
    properties: &PropertyMap,
    attr: &str,
    comparison: Comparison,
    operand: &str,
) -> bool {
    lookup(properties, attr).is_some_and(|value| compare(value, comparison, operand))
}

fn compare(value: &PropertyValue, comparison: Comparison, operand: &str) -> bool {
    match value {
        PropertyValue::List(values) => values
            .iter()
            .any(|value| compare(value, comparison, operand)),
        PropertyValue::String(value) => match comparison {
            Comparison::Equal => value == operand,
            Comparison::Approx => normalize_approx(value) == normalize_approx(operand),
            Comparison::GreaterEq => value.as_str() >= operand,
            Comparison::LessEq => value.as_str() <= operand,
        },
        PropertyValue::Long(value) => operand
            .trim()
            .parse::<i64>()
            .is_ok_and(|operand| ordered(value.cmp(&operand), comparison)),
        PropertyValue::Double(value) => operand
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|operand| value.partial_cmp(&operand))
            .is_some_and(|ordering| ordered(ordering, comparison)),
        PropertyValue::Bool(value) => {
            let operand = operand.trim();
            let parsed = if operand.eq_ignore_ascii_case("true") {
                Some(true)
            } else if operand.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            };
            matches!(comparison, Comparison::Equal | Comparison::Approx) && parsed == Some(*value)
        }
    }
}

fn ordered(ordering: Ordering, comparison: Comparison) -> bool {
    match comparison {
        Comparison::Equal | Comparison::Approx => ordering == Ordering::Equal,
        Comparison::GreaterEq => ordering != Ordering::Less,
        Comparison::LessEq => ordering != Ordering::Greater,
    }
}

fn substring_matches(value: &PropertyValue, pattern: &SubstringPattern) -> bool {
    match value {
        PropertyValue::String(value) => pattern.matches(value),
        PropertyValue::List(values) => values
            .iter()
            .any(|value| substring_matches(value, pattern)),
        _ => false,
    }
}

fn normalize_approx(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::description::{EndpointDescription, PropertyValue};
    use crate::filter::parser::Filter;

    fn description() -> EndpointDescription {
        EndpointDescription::builder("tcp://host:9/greeter")
            .interface("org.example.Greeter")
            .interface("org.example.Admin")
            .property("x", 1i64)
            .property("weight", 2.5f64)
            .property("secure", true)
            .property("Service.Intents", vec!["confidentiality", "logging"])
            .property("region", "EU West")
            .build()
            .expect("description should build")
    }

    fn matches(filter: &str) -> bool {
        Filter::parse(filter)
            .expect("filter should parse")
            .matches(description().properties())
    }

    #[test]
    fn object_class_matches_any_listed_interface() {
        assert!(matches("(objectClass=org.example.Admin)"));
        assert!(!matches("(objectClass=org.example.Other)"));
    }

    #[test]
    fn numeric_comparisons_use_property_type() {
        assert!(matches("(x=1)"));
        assert!(matches("(x= 1 )"));
        assert!(matches("(x>=0)"));
        assert!(!matches("(x>=2)"));
        assert!(matches("(weight<=2.5)"));
        assert!(!matches("(x=one)"));
    }

    #[test]
    fn boolean_values_compare_case_insensitively() {
        assert!(matches("(secure=TRUE)"));
        assert!(!matches("(secure=false)"));
        assert!(!matches("(secure>=true)"));
    }

    #[test]
    fn attribute_names_are_case_insensitive() {
        assert!(matches("(service.intents=logging)"));
        assert!(matches("(OBJECTCLASS=org.example.Greeter)"));
    }

    #[test]
    fn approx_ignores_case_and_whitespace() {
        assert!(matches("(region~=euwest)"));
        assert!(!matches("(region=euwest)"));
    }

    #[test]
    fn presence_substring_and_negation() {
        assert!(matches("(service.intents=*)"));
        assert!(!matches("(missing=*)"));
        assert!(matches("(endpoint.id=tcp://*greeter)"));
        assert!(matches("(!(x=2))"));
        assert!(matches("(|(x=2)(secure=true))"));
        assert!(!matches("(&(x=1)(secure=false))"));
    }

    #[test]
    fn substring_never_matches_non_strings() {
        assert!(!matches("(x=1*)"));
    }

    #[test]
    fn nested_lists_are_searched() {
        let description = EndpointDescription::builder("tcp://host:9/a")
            .interface("org.example.A")
            .property(
                "nested",
                PropertyValue::List(vec![PropertyValue::List(vec![PropertyValue::Long(7)])]),
            )
            .build()
            .unwrap();

        let filter = Filter::parse("(nested=7)").unwrap();
        assert!(filter.matches(description.properties()));
    }
}
