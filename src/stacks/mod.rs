// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The two stacks of the deployment, each built as a pure function of the configuration.

pub mod backstage;
pub mod gitops;
pub mod platform;

use crate::config::StackConfig;
use crate::error::{InfraError, Result};
use crate::graph::StackGraph;

/// Build the stack called `name`.
pub fn build(config: &StackConfig, name: &str) -> Result<StackGraph> {
    if name == config.platform.stack_name {
        platform::build(config)
    } else if name == config.backstage.stack_name {
        backstage::build(config)
    } else {
        Err(InfraError::Config(format!(
            "unknown stack '{}', expected '{}' or '{}'",
            name, config.platform.stack_name, config.backstage.stack_name
        )))
    }
}

/// Names of all stacks in deployment order.
pub fn names(config: &StackConfig) -> [&str; 2] {
    [
        config.platform.stack_name.as_str(),
        config.backstage.stack_name.as_str(),
    ]
}
