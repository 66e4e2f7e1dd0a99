// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes objects of the GitOps bootstrap and live access to the platform cluster.

pub mod client;
pub mod manifests;
pub mod token;

pub use client::create_platform_client;
pub use token::wait_for_service_account_token;
