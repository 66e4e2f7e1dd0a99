// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Printable form of a stack: its resources in apply order with resolved,
//! masked inputs, and its exports.

use crate::error::Result;
use crate::graph::{ResolveContext, ResourceMode};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn format<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(match self {
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedResource {
    pub name: String,
    #[serde(rename = "type")]
    pub type_token: String,
    pub mode: ResourceMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub inputs: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedStack {
    pub stack: String,
    pub resources: Vec<RenderedResource>,
    pub exports: BTreeMap<String, Value>,
}

/// Render every resource of the context's stack in apply order.
pub fn render_stack(ctx: &ResolveContext<'_>) -> Result<RenderedStack> {
    let mut resources = Vec::with_capacity(ctx.graph.len());
    for intent in ctx.graph.apply_order()? {
        resources.push(RenderedResource {
            name: intent.name.clone(),
            type_token: intent.type_token.clone(),
            mode: intent.mode,
            provider: intent.provider.clone(),
            depends_on: intent.dependencies().into_iter().collect(),
            inputs: ctx.render_inputs(&intent.inputs)?,
        });
    }

    Ok(RenderedStack {
        stack: ctx.graph.name().to_string(),
        resources,
        exports: render_exports(ctx)?,
    })
}

/// Resolved exports with secrets and unknowns masked.
pub fn render_exports(ctx: &ResolveContext<'_>) -> Result<BTreeMap<String, Value>> {
    Ok(ctx
        .resolve_exports()?
        .into_iter()
        .map(|(name, resolved)| (name, resolved.display()))
        .collect())
}
