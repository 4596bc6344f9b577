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

//! LDAP-style (RFC 1960) filter syntax tree and recursive-descent parser.

use crate::error::FilterError;

/// Parsed scope filter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equal { attr: String, value: String },
    Approx { attr: String, value: String },
    GreaterEq { attr: String, value: String },
    LessEq { attr: String, value: String },
    Present { attr: String },
    Substring { attr: String, pattern: SubstringPattern },
}

/// `initial*any*...*last`; empty pieces are dropped.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubstringPattern {
    pub initial: Option<String>,
    pub any: Vec<String>,
    pub last: Option<String>,
}

impl SubstringPattern {
    fn from_segments(mut segments: Vec<String>) -> Self {
        let last = segments.pop().filter(|segment| !segment.is_empty());
        let mut rest = segments.into_iter();
        let initial = rest.next().filter(|segment| !segment.is_empty());
        let any = rest.filter(|segment| !segment.is_empty()).collect();
        Self { initial, any, last }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let mut remaining = candidate;

        if let Some(initial) = &self.initial {
            match remaining.strip_prefix(initial.as_str()) {
                Some(rest) => remaining = rest,
                None => return false,
            }
        }

        for piece in &self.any {
            match remaining.find(piece.as_str()) {
                Some(index) => remaining = &remaining[index + piece.len()..],
                None => return false,
            }
        }

        match &self.last {
            Some(last) => remaining.ends_with(last.as_str()),
            None => true,
        }
    }
}

#[derive(Clone, Copy)]
enum Operator {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

/// Deepest `(&..)`/`(|..)`/`(!..)` nesting a filter may use.
pub const MAX_FILTER_DEPTH: usize = 256;

impl Filter {
    /// Parses `text`. Filters nested deeper than [`MAX_FILTER_DEPTH`] are rejected.
    pub fn parse(text: &str) -> Result<Filter, FilterError> {
        let mut parser = Parser {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        };
        let filter = parser.parse_filter()?;
        parser.skip_whitespace();
        if parser.pos != parser.chars.len() {
            return Err(FilterError::new(parser.pos, "trailing characters after filter"));
        }
        Ok(filter)
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterError> {
        match self.peek() {
            Some(found) if found == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(FilterError::new(
                self.pos,
                format!("expected '{expected}' but found '{found}'"),
            )),
            None => Err(FilterError::new(
                self.pos,
                format!("expected '{expected}' but reached end of filter"),
            )),
        }
    }

    fn parse_filter(&mut self) -> Result<Filter, FilterError> {
        self.skip_whitespace();
        if self.depth == MAX_FILTER_DEPTH {
            return Err(FilterError::new(
                self.pos,
                format!("filter nested deeper than {MAX_FILTER_DEPTH} levels"),
            ));
        }
        self.expect('(')?;
        self.skip_whitespace();
        self.depth += 1;

        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.parse_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.parse_list()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(FilterError::new(self.pos, "unexpected end of filter")),
        };

        self.skip_whitespace();
        self.expect(')')?;
        self.depth -= 1;
        Ok(filter)
    }

    fn parse_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut filters = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('(') {
                break;
            }
            filters.push(self.parse_filter()?);
        }
        if filters.is_empty() {
            return Err(FilterError::new(self.pos, "empty filter list"));
        }
        Ok(filters)
    }

    fn parse_item(&mut self) -> Result<Filter, FilterError> {
        let attr_start = self.pos;
        while let Some(ch) = self.peek() {
            if matches!(ch, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attr: String = self.chars[attr_start..self.pos]
            .iter()
            .collect::<String>()
            .trim()
            .to_string();
        if attr.is_empty() {
            return Err(FilterError::new(attr_start, "missing attribute name"));
        }

        let operator = match self.peek() {
            Some('=') => {
                self.pos += 1;
                Operator::Equal
            }
            Some('~') => {
                self.pos += 1;
                self.expect('=')?;
                Operator::Approx
            }
            Some('>') => {
                self.pos += 1;
                self.expect('=')?;
                Operator::GreaterEq
            }
            Some('<') => {
                self.pos += 1;
                self.expect('=')?;
                Operator::LessEq
            }
            _ => {
                return Err(FilterError::new(
                    self.pos,
                    format!("missing operator after attribute '{attr}'"),
                ))
            }
        };

        let segments = self.parse_value()?;

        Ok(match operator {
            Operator::Equal if segments.len() == 2 && segments.iter().all(String::is_empty) => {
                Filter::Present { attr }
            }
            Operator::Equal if segments.len() > 1 => Filter::Substring {
                attr,
                pattern: SubstringPattern::from_segments(segments),
            },
            Operator::Equal => Filter::Equal {
                attr,
                value: segments.concat(),
            },
            Operator::Approx => Filter::Approx {
                attr,
                value: segments.join("*"),
            },
            Operator::GreaterEq => Filter::GreaterEq {
                attr,
                value: segments.join("*"),
            },
            Operator::LessEq => Filter::LessEq {
                attr,
                value: segments.join("*"),
            },
        })
    }

    /// Reads a value up to the closing paren, split on unescaped `*`.
    fn parse_value(&mut self) -> Result<Vec<String>, FilterError> {
        let mut segments = Vec::new();
        let mut current = String::new();

        loop {
            match self.peek() {
                None => return Err(FilterError::new(self.pos, "unterminated filter value")),
                Some(')') => break,
                Some('(') => {
                    return Err(FilterError::new(
                        self.pos,
                        "unescaped '(' in filter value",
                    ))
                }
                Some('*') => {
                    segments.push(std::mem::take(&mut current));
                    self.pos += 1;
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(escaped) => {
                            current.push(escaped);
                            self.pos += 1;
                        }
                        None => {
                            return Err(FilterError::new(self.pos, "dangling escape character"))
                        }
                    }
                }
                Some(ch) => {
                    current.push(ch);
                    self.pos += 1;
                }
            }
        }

        segments.push(current);
        Ok(segments)
    }
}
