// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired-versus-recorded comparison of a stack.

use crate::error::Result;
use crate::graph::{inputs_match, ResolveContext, ResourceMode, SecretSource, StackGraph};
use crate::stack_ref::StackReferences;
use crate::state::StackState;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create,
    Update,
    /// The type changed; the old resource is deleted and a new one created
    Replace,
    Delete,
    Same,
    /// Data source, looked up on every run
    Read,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operation::Create => "+",
            Operation::Update => "~",
            Operation::Replace => "+-",
            Operation::Delete => "-",
            Operation::Same => " ",
            Operation::Read => ">",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub name: String,
    pub type_token: String,
    pub operation: Operation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub stack: String,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub same: usize,
    pub read: usize,
}

impl PlanSummary {
    pub fn total_changes(&self) -> usize {
        self.create + self.update + self.replace + self.delete
    }
}

impl Plan {
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for step in &self.steps {
            match step.operation {
                Operation::Create => summary.create += 1,
                Operation::Update => summary.update += 1,
                Operation::Replace => summary.replace += 1,
                Operation::Delete => summary.delete += 1,
                Operation::Same => summary.same += 1,
                Operation::Read => summary.read += 1,
            }
        }
        summary
    }

    pub fn has_changes(&self) -> bool {
        self.summary().total_changes() > 0
    }

    pub fn changes(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps
            .iter()
            .filter(|s| !matches!(s.operation, Operation::Same | Operation::Read))
    }
}

/// Compare `graph` against the recorded `state`. Steps follow the apply
/// order; deletions come last, in reverse of their recorded order. Inputs that
/// were still computed when recorded count as unchanged once they resolve.
pub fn diff(
    graph: &StackGraph,
    state: &StackState,
    stacks: &StackReferences,
    secrets: &dyn SecretSource,
) -> Result<Plan> {
    let outputs = state.resource_outputs();
    let ctx = ResolveContext {
        graph,
        outputs: &outputs,
        stacks,
        secrets,
    };

    let mut steps = Vec::new();
    for intent in graph.apply_order()? {
        let operation = if intent.mode == ResourceMode::Read {
            Operation::Read
        } else {
            match state.resources.get(&intent.name) {
                None => Operation::Create,
                Some(record) if record.type_token != intent.type_token => Operation::Replace,
                Some(record) => {
                    let desired = ctx.fingerprint_inputs(&intent.inputs)?;
                    if inputs_match(&record.inputs, &desired) {
                        Operation::Same
                    } else {
                        Operation::Update
                    }
                }
            }
        };
        debug!("{} {} ({})", operation, intent.name, intent.type_token);
        steps.push(PlanStep {
            name: intent.name.clone(),
            type_token: intent.type_token.clone(),
            operation,
        });
    }

    let mut deletions: Vec<PlanStep> = state
        .resources
        .iter()
        .filter(|(name, _)| graph.resource(name).is_none())
        .map(|(name, record)| PlanStep {
            name: name.clone(),
            type_token: record.type_token.clone(),
            operation: Operation::Delete,
        })
        .collect();
    deletions.reverse();
    steps.extend(deletions);

    let plan = Plan {
        stack: graph.name().to_string(),
        steps,
    };
    let summary = plan.summary();
    info!(
        "Plan for stack '{}': {} to create, {} to update, {} to replace, {} to delete, \
         {} unchanged",
        plan.stack, summary.create, summary.update, summary.replace, summary.delete, summary.same
    );
    Ok(plan)
}
