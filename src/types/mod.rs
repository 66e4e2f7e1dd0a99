// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource types of the in-cluster GitOps agent.

pub mod flux;

pub use flux::{GitRepository, GitRepositorySpec, Kustomization, KustomizationSpec};
