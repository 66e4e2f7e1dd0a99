// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource intents, the dependency graph between them, and input resolution.

pub mod input;
pub mod intent;
pub mod resolve;
pub mod stack;
pub mod transform;

pub use input::{Input, OutputRef, StackOutputRef};
pub use intent::{ResourceHandle, ResourceIntent, ResourceMode};
pub use resolve::{
    inputs_match, EnvSecrets, ResolveContext, Resolved, ResourceOutputs, SecretSource,
};
pub use stack::{Export, StackGraph};
pub use transform::Transform;
