//! Field address patterns.
//!
//! A pattern is a compiled list of segments such as `$.plugins.*.package`.
//! `*` (or `[*]`) matches every element of an array or every value of an
//! object; any other segment is a literal object key.

use std::fmt;

use super::node::{Node, NodeKind};
use super::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Any,
}

/// A compiled field address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPattern {
    source: String,
    segments: Vec<Segment>,
}

impl FieldPattern {
    /// Compiles a pattern such as `$.plugins[*].entry`.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let body = pattern.strip_prefix('$').unwrap_or(pattern);
        let body = body.strip_prefix('.').unwrap_or(body);
        if body.is_empty() {
            return Err(invalid("pattern selects no field"));
        }

        let mut segments = Vec::new();
        for raw in body.split('.') {
            // `plugins[*]` is shorthand for `plugins.*`
            let (key, wildcard) = match raw.strip_suffix("[*]") {
                Some(key) => (key, true),
                None => (raw, false),
            };
            match key {
                "" if wildcard => {}
                "" => return Err(invalid("empty segment")),
                "*" => segments.push(Segment::Any),
                key if key.contains(['[', ']']) => {
                    return Err(invalid("only `[*]` is supported inside brackets"))
                }
                key => segments.push(Segment::Key(key.to_string())),
            }
            if wildcard {
                segments.push(Segment::Any);
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Visits every node in `root` this pattern addresses.
    pub(crate) fn for_each_match<E>(
        &self,
        root: &mut Node,
        visit: &mut impl FnMut(&mut Node) -> Result<(), E>,
    ) -> Result<(), E> {
        walk(&self.segments, root, visit)
    }
}

fn walk<E>(
    segments: &[Segment],
    node: &mut Node,
    visit: &mut impl FnMut(&mut Node) -> Result<(), E>,
) -> Result<(), E> {
    let Some((first, rest)) = segments.split_first() else {
        return visit(node);
    };

    match (first, &mut node.kind) {
        (Segment::Key(key), NodeKind::Object(fields)) => {
            if let Some((_, child)) = fields.iter_mut().find(|(name, _)| name == key) {
                walk(rest, child, visit)?;
            }
        }
        (Segment::Any, NodeKind::Object(fields)) => {
            for (_, child) in fields.iter_mut() {
                walk(rest, child, visit)?;
            }
        }
        (Segment::Any, NodeKind::Array(items)) => {
            for child in items.iter_mut() {
                walk(rest, child, visit)?;
            }
        }
        _ => {}
    }
    Ok(())
}

impl fmt::Display for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
