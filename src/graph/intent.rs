// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Declared resources and handles to them.

use crate::graph::input::{Input, OutputRef};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceMode {
    /// Created, updated and deleted by the engine
    Managed,
    /// Looked up on every run, never created
    Read,
}

/// One resource the stack wants to exist.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceIntent {
    pub type_token: String,
    pub name: String,
    pub mode: ResourceMode,
    pub inputs: BTreeMap<String, Input>,
    /// Ordering edges that cannot be inferred from inputs
    pub depends_on: BTreeSet<String>,
    /// Provider resource the engine must use for this resource
    pub provider: Option<String>,
    /// Output attributes holding secret material
    pub secret_outputs: BTreeSet<String>,
}

impl ResourceIntent {
    pub fn new(type_token: &str, name: impl Into<String>) -> Self {
        Self {
            type_token: type_token.to_string(),
            name: name.into(),
            mode: ResourceMode::Managed,
            inputs: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            provider: None,
            secret_outputs: BTreeSet::new(),
        }
    }

    /// A data source read rather than a managed resource.
    pub fn read(type_token: &str, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Read,
            ..Self::new(type_token, name)
        }
    }

    pub fn input(mut self, key: &str, value: impl Into<Input>) -> Self {
        self.inputs.insert(key.to_string(), value.into());
        self
    }

    pub fn depends_on(mut self, resource: &ResourceHandle) -> Self {
        self.depends_on.insert(resource.name.clone());
        self
    }

    pub fn provider(mut self, provider: &ResourceHandle) -> Self {
        self.provider = Some(provider.name.clone());
        self
    }

    pub fn secret_output(mut self, attribute: &str) -> Self {
        self.secret_outputs.insert(attribute.to_string());
        self
    }

    /// Resources this one reads outputs from.
    pub fn input_references(&self) -> BTreeSet<String> {
        self.inputs
            .values()
            .flat_map(|input| input.referenced_resources())
            .collect()
    }

    /// All resources that must exist before this one: explicit edges,
    /// resources referenced by inputs, and the provider.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = self.input_references();
        deps.extend(self.depends_on.iter().cloned());
        if let Some(provider) = &self.provider {
            deps.insert(provider.clone());
        }
        deps
    }
}

/// Handle returned when a resource is added to a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub name: String,
    pub type_token: String,
}

impl ResourceHandle {
    pub fn output(&self, attribute: &str) -> Input {
        Input::Output(OutputRef {
            resource: self.name.clone(),
            attribute: attribute.to_string(),
        })
    }

    pub fn id(&self) -> Input {
        self.output("id")
    }

    pub fn arn(&self) -> Input {
        self.output("arn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> ResourceHandle {
        ResourceHandle {
            name: name.to_string(),
            type_token: "test:index:Thing".to_string(),
        }
    }

    #[test]
    fn test_dependencies_union_of_all_edges() {
        let intent = ResourceIntent::new("test:index:Thing", "subject")
            .input("vpcId", handle("vpc").id())
            .depends_on(&handle("listener"))
            .provider(&handle("k8s"));

        assert_eq!(
            intent.dependencies(),
            BTreeSet::from([
                "k8s".to_string(),
                "listener".to_string(),
                "vpc".to_string()
            ])
        );
    }

    #[test]
    fn test_read_mode() {
        let intent = ResourceIntent::read("aws:ecr/getCredentials:getCredentials", "creds");
        assert_eq!(intent.mode, ResourceMode::Read);
        assert!(intent.dependencies().is_empty());
    }
}
