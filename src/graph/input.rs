// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Property values of declared resources.

use crate::error::{InfraError, Result};
use crate::graph::transform::Transform;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Reference to an attribute another resource produces once it exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutputRef {
    pub resource: String,
    pub attribute: String,
}

/// Reference to an output exported by another stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StackOutputRef {
    pub stack: String,
    pub output: String,
}

/// A property value. Anything that is not a literal stays opaque until the
/// resources or stacks it points at have been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Literal(Value),
    Output(OutputRef),
    StackOutput(StackOutputRef),
    /// Secret configuration value, looked up at deploy time by key.
    ConfigSecret(String),
    /// Marks the wrapped value as secret.
    Secret(Box<Input>),
    /// String concatenation of the rendered parts.
    Template(Vec<Input>),
    List(Vec<Input>),
    Map(BTreeMap<String, Input>),
    Apply(Transform, Box<Input>),
}

impl Input {
    pub fn string(value: impl Into<String>) -> Self {
        Input::Literal(Value::String(value.into()))
    }

    pub fn concat(parts: impl IntoIterator<Item = Input>) -> Self {
        Input::Template(parts.into_iter().collect())
    }

    pub fn list(items: impl IntoIterator<Item = Input>) -> Self {
        Input::List(items.into_iter().collect())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Input)>) -> Self {
        Input::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn secret(inner: impl Into<Input>) -> Self {
        Input::Secret(Box::new(inner.into()))
    }

    pub fn apply(transform: Transform, inner: impl Into<Input>) -> Self {
        Input::Apply(transform, Box::new(inner.into()))
    }

    /// Convert a plain JSON value into an input tree so that individual
    /// fields can later be replaced with references.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Input::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Input::from_value(v)))
                    .collect(),
            ),
            Value::Array(items) => Input::List(items.into_iter().map(Input::from_value).collect()),
            other => Input::Literal(other),
        }
    }

    /// Serialize a typed object (k8s-openapi, policy documents, ...) into an input tree.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Input::from_value(serde_json::to_value(value)?))
    }

    /// Replace the value at `path`, creating intermediate maps on the way.
    pub fn set_path(&mut self, path: &[&str], value: Input) -> Result<()> {
        let Some((head, rest)) = path.split_first() else {
            *self = value;
            return Ok(());
        };

        if matches!(self, Input::Literal(Value::Null)) {
            *self = Input::Map(BTreeMap::new());
        }

        match self {
            Input::Map(map) => {
                let entry = map
                    .entry(head.to_string())
                    .or_insert(Input::Literal(Value::Null));
                entry.set_path(rest, value)
            }
            other => Err(InfraError::Resolve(format!(
                "cannot set '{}' on non-map input {:?}",
                head, other
            ))),
        }
    }

    /// Builder form of [`Input::set_path`].
    pub fn with_path(mut self, path: &[&str], value: Input) -> Result<Self> {
        self.set_path(path, value)?;
        Ok(self)
    }

    /// Names of all resources whose outputs this input reads.
    pub fn referenced_resources(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references(&self, found: &mut BTreeSet<String>) {
        match self {
            Input::Output(r) => {
                found.insert(r.resource.clone());
            }
            Input::Secret(inner) | Input::Apply(_, inner) => inner.collect_references(found),
            Input::Template(items) | Input::List(items) => {
                for item in items {
                    item.collect_references(found);
                }
            }
            Input::Map(map) => {
                for item in map.values() {
                    item.collect_references(found);
                }
            }
            Input::Literal(_) | Input::StackOutput(_) | Input::ConfigSecret(_) => {}
        }
    }

    /// Stack outputs this input reads.
    pub fn referenced_stack_outputs(&self) -> BTreeSet<StackOutputRef> {
        let mut found = BTreeSet::new();
        self.collect_stack_outputs(&mut found);
        found
    }

    fn collect_stack_outputs(&self, found: &mut BTreeSet<StackOutputRef>) {
        match self {
            Input::StackOutput(r) => {
                found.insert(r.clone());
            }
            Input::Secret(inner) | Input::Apply(_, inner) => inner.collect_stack_outputs(found),
            Input::Template(items) | Input::List(items) => {
                for item in items {
                    item.collect_stack_outputs(found);
                }
            }
            Input::Map(map) => {
                for item in map.values() {
                    item.collect_stack_outputs(found);
                }
            }
            Input::Literal(_) | Input::Output(_) | Input::ConfigSecret(_) => {}
        }
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::string(value)
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::string(value)
    }
}

impl From<&String> for Input {
    fn from(value: &String) -> Self {
        Input::string(value.clone())
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Input::Literal(Value::Bool(value))
    }
}

impl From<i64> for Input {
    fn from(value: i64) -> Self {
        Input::Literal(Value::from(value))
    }
}

impl From<u16> for Input {
    fn from(value: u16) -> Self {
        Input::Literal(Value::from(value))
    }
}

impl From<u32> for Input {
    fn from(value: u32) -> Self {
        Input::Literal(Value::from(value))
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::from_value(value)
    }
}

impl From<OutputRef> for Input {
    fn from(value: OutputRef) -> Self {
        Input::Output(value)
    }
}

impl From<StackOutputRef> for Input {
    fn from(value: StackOutputRef) -> Self {
        Input::StackOutput(value)
    }
}

impl From<Vec<Input>> for Input {
    fn from(value: Vec<Input>) -> Self {
        Input::List(value)
    }
}
