// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cross-stack references: reading the exported outputs of another stack.

use crate::error::Result;
use crate::graph::{Input, StackOutputRef};
use crate::state::StackState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Named handle on another stack's outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackReference {
    name: String,
}

impl StackReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self, output: &str) -> Input {
        Input::StackOutput(StackOutputRef {
            stack: self.name.clone(),
            output: output.to_string(),
        })
    }

    /// An output that must stay masked wherever it is rendered.
    pub fn secret_output(&self, output: &str) -> Input {
        Input::secret(self.output(output))
    }
}

/// An exported output. Declared outputs whose value the engine has not
/// reported yet are recorded with `unknown` set and a null value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputValue {
    pub value: Value,
    #[serde(default)]
    pub secret: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unknown: bool,
}

impl OutputValue {
    pub fn plain(value: Value) -> Self {
        Self {
            value,
            secret: false,
            unknown: false,
        }
    }

    pub fn secret(value: Value) -> Self {
        Self {
            value,
            secret: true,
            unknown: false,
        }
    }

    pub fn unknown(secret: bool) -> Self {
        Self {
            value: Value::Null,
            secret,
            unknown: true,
        }
    }

    /// The value, if the engine has reported it.
    pub fn known_value(&self) -> Option<&Value> {
        (!self.unknown).then_some(&self.value)
    }
}

/// The exported outputs of one stack.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StackOutputs {
    stack: String,
    values: BTreeMap<String, OutputValue>,
}

impl StackOutputs {
    pub fn new(stack: impl Into<String>, values: BTreeMap<String, OutputValue>) -> Self {
        Self {
            stack: stack.into(),
            values,
        }
    }

    pub fn get(&self, output: &str) -> Option<&OutputValue> {
        self.values.get(output)
    }
}

/// Outputs of all stacks loaded so far, by stack name.
#[derive(Debug, Clone, Default)]
pub struct StackReferences {
    stacks: BTreeMap<String, StackOutputs>,
}

impl StackReferences {
    pub fn insert(&mut self, outputs: StackOutputs) {
        self.stacks.insert(outputs.stack.clone(), outputs);
    }

    pub fn get(&self, stack: &str) -> Option<&StackOutputs> {
        self.stacks.get(stack)
    }

    /// Load the outputs of `stack` from its state file under `state_dir`,
    /// if the stack has been applied.
    pub fn load(&mut self, state_dir: &Path, stack: &str) -> Result<bool> {
        let Some(state) = StackState::load_if_exists(state_dir, stack)? else {
            info!("No recorded state for stack '{}', its outputs stay unknown", stack);
            return Ok(false);
        };

        debug!(
            "Loaded {} outputs of stack '{}'",
            state.outputs.len(),
            stack
        );
        self.insert(StackOutputs::new(stack, state.outputs));
        Ok(true)
    }
}
