// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod cli;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod graph;
pub mod iam;
pub mod kubernetes;
pub mod network;
pub mod plan;
pub mod render;
pub mod stack_ref;
pub mod stacks;
pub mod state;
pub mod task_definition;
pub mod types;

#[cfg(test)]
pub mod test_utils;
