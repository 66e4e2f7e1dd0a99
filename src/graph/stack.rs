// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The set of resources declared by one stack and the order to apply them in.

use crate::error::{InfraError, Result};
use crate::graph::input::{Input, StackOutputRef};
use crate::graph::intent::{ResourceHandle, ResourceIntent};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub value: Input,
    pub secret: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StackGraph {
    name: String,
    resources: Vec<ResourceIntent>,
    index: BTreeMap<String, usize>,
    exports: BTreeMap<String, Export>,
}

impl StackGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a resource. Every resource it depends on must already be declared.
    pub fn add(&mut self, intent: ResourceIntent) -> Result<ResourceHandle> {
        if self.index.contains_key(&intent.name) {
            return Err(InfraError::DuplicateResource(intent.name));
        }

        for dependency in intent.dependencies() {
            if !self.index.contains_key(&dependency) {
                return Err(InfraError::UnknownDependency {
                    resource: intent.name.clone(),
                    dependency,
                });
            }
        }

        debug!("Declared {} ({})", intent.name, intent.type_token);

        let handle = ResourceHandle {
            name: intent.name.clone(),
            type_token: intent.type_token.clone(),
        };
        self.index.insert(intent.name.clone(), self.resources.len());
        self.resources.push(intent);
        Ok(handle)
    }

    pub fn export(&mut self, name: &str, value: impl Into<Input>) {
        self.exports.insert(
            name.to_string(),
            Export {
                value: value.into(),
                secret: false,
            },
        );
    }

    pub fn export_secret(&mut self, name: &str, value: impl Into<Input>) {
        self.exports.insert(
            name.to_string(),
            Export {
                value: value.into(),
                secret: true,
            },
        );
    }

    pub fn exports(&self) -> &BTreeMap<String, Export> {
        &self.exports
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceIntent> {
        self.index.get(name).map(|&idx| &self.resources[idx])
    }

    /// Resources in declaration order.
    pub fn resources(&self) -> &[ResourceIntent] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn count_of_type(&self, type_token: &str) -> usize {
        self.resources
            .iter()
            .filter(|r| r.type_token == type_token)
            .count()
    }

    pub fn dependencies_of(&self, name: &str) -> Option<BTreeSet<String>> {
        self.resource(name).map(|r| r.dependencies())
    }

    /// All `(dependency, dependent)` edges.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.resources
            .iter()
            .flat_map(|r| {
                r.dependencies()
                    .into_iter()
                    .map(move |dep| (dep, r.name.clone()))
            })
            .collect()
    }

    /// Outputs of other stacks this stack reads.
    pub fn stack_references(&self) -> BTreeSet<StackOutputRef> {
        self.resources
            .iter()
            .flat_map(|r| r.inputs.values())
            .chain(self.exports.values().map(|e| &e.value))
            .flat_map(|input| input.referenced_stack_outputs())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        self.apply_order().map(|_| ())
    }

    /// Topological order of the resources. Ties are broken by declaration
    /// order so the result is stable across runs.
    pub fn apply_order(&self) -> Result<Vec<&ResourceIntent>> {
        let mut in_degree = vec![0usize; self.resources.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.resources.len()];

        for (idx, resource) in self.resources.iter().enumerate() {
            for dependency in resource.dependencies() {
                let dep_idx =
                    *self
                        .index
                        .get(&dependency)
                        .ok_or_else(|| InfraError::UnknownDependency {
                            resource: resource.name.clone(),
                            dependency: dependency.clone(),
                        })?;
                in_degree[idx] += 1;
                dependents[dep_idx].push(idx);
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(idx, _)| idx)
            .collect();
        let mut order = Vec::with_capacity(self.resources.len());

        while let Some(idx) = ready.pop_first() {
            order.push(&self.resources[idx]);
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != self.resources.len() {
            let stuck = in_degree
                .iter()
                .enumerate()
                .filter(|(_, d)| **d > 0)
                .map(|(idx, _)| self.resources[idx].name.clone())
                .collect();
            return Err(InfraError::DependencyCycle(stuck));
        }

        Ok(order)
    }
}
