// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Command line interface over the stacks.

use crate::config::{StackConfig, DEFAULT_CONFIG_PATH};
use crate::constants::{
    outputs, token::WAIT_TIMEOUT_SECS, COMPUTED_PLACEHOLDER, SECRET_PLACEHOLDER,
};
use crate::graph::{EnvSecrets, ResolveContext, StackGraph};
use crate::kubernetes::manifests::SERVICE_ACCOUNT_TOKEN_SECRET;
use crate::kubernetes::{create_platform_client, wait_for_service_account_token};
use crate::plan;
use crate::render::{render_exports, render_stack, OutputFormat};
use crate::stack_ref::{OutputValue, StackReferences};
use crate::stacks;
use crate::state::StackState;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "platform-stacks")]
#[command(version)]
#[command(about = "Declare the GitOps platform and Backstage stacks", long_about = None)]
pub struct Cli {
    /// Stack configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "PLATFORM_STACKS_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    /// Directory holding the recorded stack state, overrides `stateDir`
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the resources of a stack in apply order with resolved inputs
    Render {
        stack: String,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Print the apply order of a stack
    Order { stack: String },

    /// Compare a stack against its recorded state
    Plan { stack: String },

    /// Record the state a stack reaches once applied
    Record { stack: String },

    /// Print the resolved exports of a stack
    Outputs {
        stack: String,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Read the service-account token from the cluster and record it as an
    /// output of the platform stack
    FetchToken {
        /// Seconds to wait for the token controller
        #[arg(long, default_value_t = WAIT_TIMEOUT_SECS)]
        timeout: u64,
    },
}

/// Everything a command resolves a stack against.
struct Workspace {
    config: StackConfig,
    state_dir: PathBuf,
}

impl Workspace {
    fn build(&self, stack: &str) -> Result<StackGraph> {
        let graph = stacks::build(&self.config, stack)?;
        graph
            .validate()
            .with_context(|| format!("Stack '{}' is not a valid graph", stack))?;
        Ok(graph)
    }

    /// Outputs of every stack `graph` reads from, where they have been recorded.
    fn references(&self, graph: &StackGraph) -> Result<StackReferences> {
        let mut stacks = StackReferences::default();
        let referenced: std::collections::BTreeSet<String> = graph
            .stack_references()
            .into_iter()
            .map(|r| r.stack)
            .collect();
        for stack in referenced {
            if !stacks.load(&self.state_dir, &stack)? {
                warn!(
                    "Stack '{}' has no recorded state, its outputs stay unknown",
                    stack
                );
            }
        }
        Ok(stacks)
    }

    fn state(&self, stack: &str) -> Result<StackState> {
        Ok(StackState::load_or_empty(&self.state_dir, stack)?)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = StackConfig::from_path(&cli.config)?;
    let workspace = Workspace {
        state_dir: cli.state_dir.unwrap_or_else(|| config.state_dir.clone()),
        config,
    };

    match cli.command {
        Commands::Render { stack, format } => {
            let graph = workspace.build(&stack)?;
            let references = workspace.references(&graph)?;
            let outputs = workspace.state(&stack)?.resource_outputs();
            let ctx = ResolveContext {
                graph: &graph,
                outputs: &outputs,
                stacks: &references,
                secrets: &EnvSecrets,
            };
            println!("{}", format.format(&render_stack(&ctx)?)?);
        }
        Commands::Order { stack } => {
            let graph = workspace.build(&stack)?;
            for (position, intent) in graph.apply_order()?.iter().enumerate() {
                println!("{:>3}  {}  ({})", position + 1, intent.name, intent.type_token);
            }
        }
        Commands::Plan { stack } => {
            let graph = workspace.build(&stack)?;
            let references = workspace.references(&graph)?;
            let state = workspace.state(&stack)?;
            let plan = plan::diff(&graph, &state, &references, &EnvSecrets)?;

            for step in &plan.steps {
                println!("{:>2} {}  ({})", step.operation, step.name, step.type_token);
            }
            let summary = plan.summary();
            println!(
                "\n{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
                summary.create, summary.update, summary.replace, summary.delete, summary.same
            );
        }
        Commands::Record { stack } => {
            let graph = workspace.build(&stack)?;
            let references = workspace.references(&graph)?;
            let state = workspace
                .state(&stack)?
                .record(&graph, &references, &EnvSecrets)?;
            state.save(&workspace.state_dir)?;
        }
        Commands::Outputs { stack, format } => {
            let graph = workspace.build(&stack)?;
            let references = workspace.references(&graph)?;
            let state = workspace.state(&stack)?;
            let outputs = state.resource_outputs();
            let ctx = ResolveContext {
                graph: &graph,
                outputs: &outputs,
                stacks: &references,
                secrets: &EnvSecrets,
            };

            let mut exports = render_exports(&ctx)?;
            for (name, recorded) in &state.outputs {
                let Some(value) = recorded.known_value() else {
                    continue;
                };
                let unresolved = exports
                    .get(name)
                    .map_or(true, |shown| *shown == COMPUTED_PLACEHOLDER);
                if unresolved {
                    let shown = if recorded.secret {
                        Value::String(SECRET_PLACEHOLDER.to_string())
                    } else {
                        value.clone()
                    };
                    exports.insert(name.clone(), shown);
                }
            }
            println!("{}", format.format(&exports)?);
        }
        Commands::FetchToken { timeout } => {
            fetch_token(&workspace, Duration::from_secs(timeout)).await?;
        }
    }

    Ok(())
}

async fn fetch_token(workspace: &Workspace, timeout: Duration) -> Result<()> {
    let platform = &workspace.config.platform;
    let mut references = StackReferences::default();
    references.load(&workspace.state_dir, &platform.stack_name)?;

    let client = create_platform_client(references.get(&platform.stack_name))
        .await
        .context("Failed to connect to the platform cluster")?;

    let token = wait_for_service_account_token(
        &client,
        &platform.gitops.service_account_namespace,
        SERVICE_ACCOUNT_TOKEN_SECRET,
        timeout,
    )
    .await?;

    let mut state = workspace.state(&platform.stack_name)?;
    state.set_output(outputs::BACKSTAGE_TOKEN, OutputValue::secret(Value::String(token)));
    state.save(&workspace.state_dir)?;
    info!(
        "Recorded '{}' output of stack '{}'",
        outputs::BACKSTAGE_TOKEN,
        platform.stack_name
    );
    Ok(())
}
