// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Recorded state of an applied stack: the rendered inputs of every resource,
//! the outputs the engine reported for it, and the resolved exports.

use crate::error::Result;
use crate::graph::{ResolveContext, ResourceOutputs, SecretSource, StackGraph};
use crate::stack_ref::{OutputValue, StackReferences};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub type_token: String,
    pub inputs: Value,
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StackState {
    pub stack: String,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputValue>,
}

impl StackState {
    pub fn empty(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            ..Default::default()
        }
    }

    /// State file of `stack` inside `state_dir`.
    pub fn path(state_dir: &Path, stack: &str) -> PathBuf {
        state_dir.join(format!("{}.json", stack.replace(['/', '\\'], "_")))
    }

    pub fn load(state_dir: &Path, stack: &str) -> Result<Self> {
        let path = Self::path(state_dir, stack);
        debug!("Reading state of stack '{}' from {}", stack, path.display());
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_if_exists(state_dir: &Path, stack: &str) -> Result<Option<Self>> {
        if Self::path(state_dir, stack).exists() {
            Self::load(state_dir, stack).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn load_or_empty(state_dir: &Path, stack: &str) -> Result<Self> {
        Ok(Self::load_if_exists(state_dir, stack)?.unwrap_or_else(|| Self::empty(stack)))
    }

    pub fn save(&self, state_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(state_dir)?;
        let path = Self::path(state_dir, &self.stack);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!("Wrote state of stack '{}' to {}", self.stack, path.display());
        Ok(path)
    }

    /// Outputs the engine reported, keyed by resource name.
    pub fn resource_outputs(&self) -> ResourceOutputs {
        self.resources
            .iter()
            .map(|(name, record)| (name.clone(), record.outputs.clone()))
            .collect()
    }

    /// Store the outputs the engine reported for an applied resource. The
    /// engine writes these as `resources.<name>.outputs` of the state file;
    /// this is the same update for callers holding the state in memory.
    pub fn set_resource_outputs(&mut self, name: &str, outputs: BTreeMap<String, Value>) {
        if let Some(record) = self.resources.get_mut(name) {
            record.outputs = outputs;
        }
    }

    pub fn set_output(&mut self, name: &str, value: OutputValue) {
        self.outputs.insert(name.to_string(), value);
    }

    /// The state after applying `graph`: every declared resource is recorded
    /// with its rendered inputs, outputs of surviving resources are kept, and
    /// every export is stored, as unknown while it does not resolve yet.
    pub fn record(
        &self,
        graph: &StackGraph,
        stacks: &StackReferences,
        secrets: &dyn SecretSource,
    ) -> Result<Self> {
        let outputs = self.resource_outputs();
        let ctx = ResolveContext {
            graph,
            outputs: &outputs,
            stacks,
            secrets,
        };

        let mut resources = BTreeMap::new();
        for intent in graph.apply_order()? {
            let previous_outputs = self
                .resources
                .get(&intent.name)
                .filter(|r| r.type_token == intent.type_token)
                .map(|r| r.outputs.clone())
                .unwrap_or_default();
            resources.insert(
                intent.name.clone(),
                ResourceRecord {
                    type_token: intent.type_token.clone(),
                    inputs: ctx.fingerprint_inputs(&intent.inputs)?,
                    outputs: previous_outputs,
                },
            );
        }

        let mut exported = self.outputs.clone();
        for (name, resolved) in ctx.resolve_exports()? {
            match resolved.value {
                Some(value) => {
                    let output = if resolved.secret {
                        OutputValue::secret(value)
                    } else {
                        OutputValue::plain(value)
                    };
                    exported.insert(name, output);
                }
                None => {
                    exported
                        .entry(name)
                        .or_insert_with(|| OutputValue::unknown(resolved.secret));
                }
            }
        }

        Ok(Self {
            stack: graph.name().to_string(),
            resources,
            outputs: exported,
        })
    }
}
