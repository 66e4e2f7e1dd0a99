// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Subnet allocation across availability zones.

use crate::constants::tokens;
use crate::error::{InfraError, Result};
use crate::graph::{Input, ResourceHandle, ResourceIntent, StackGraph};
use tracing::debug;

/// A subnet to create: the CIDR block at `index` placed in the zone at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetAllocation {
    pub index: usize,
    pub availability_zone: String,
    pub cidr_block: String,
}

/// Pair CIDR blocks with availability zones by position.
pub fn allocate_subnets(cidrs: &[String], zones: &[String]) -> Result<Vec<SubnetAllocation>> {
    if cidrs.len() != zones.len() {
        return Err(InfraError::CidrZoneMismatch {
            cidrs: cidrs.len(),
            zones: zones.len(),
        });
    }

    Ok(zones
        .iter()
        .zip(cidrs)
        .enumerate()
        .map(|(index, (zone, cidr))| SubnetAllocation {
            index,
            availability_zone: zone.clone(),
            cidr_block: cidr.clone(),
        })
        .collect())
}

/// Naming of the subnets and route-table associations of one stack.
#[derive(Debug, Clone, Copy)]
pub struct SubnetNaming<'a> {
    /// Logical name prefix of the subnet, suffixed with the index
    pub subnet: &'a str,
    /// `Name` tag prefix, suffixed with the zone
    pub tag: &'a str,
    /// Logical name prefix of the association, suffixed with the zone
    pub association: &'a str,
}

/// Declare one subnet per allocation, each associated with `route_table_id`.
/// Returns the subnet handles in allocation order.
pub fn declare_subnets(
    graph: &mut StackGraph,
    naming: SubnetNaming<'_>,
    vpc_id: &Input,
    route_table_id: &Input,
    allocations: &[SubnetAllocation],
) -> Result<Vec<ResourceHandle>> {
    let mut subnets = Vec::with_capacity(allocations.len());

    for allocation in allocations {
        let zone = &allocation.availability_zone;
        debug!(
            "Subnet {} in {} gets {}",
            allocation.index, zone, allocation.cidr_block
        );

        let subnet = graph.add(
            ResourceIntent::new(
                tokens::SUBNET,
                format!("{}-{}", naming.subnet, allocation.index),
            )
            .input("vpcId", vpc_id.clone())
            .input("cidrBlock", allocation.cidr_block.as_str())
            .input("mapPublicIpOnLaunch", false)
            .input("assignIpv6AddressOnCreation", false)
            .input("availabilityZone", zone.as_str())
            .input(
                "tags",
                Input::map([("Name", Input::string(format!("{}-{}", naming.tag, zone)))]),
            ),
        )?;

        graph.add(
            ResourceIntent::new(
                tokens::ROUTE_TABLE_ASSOCIATION,
                format!("{}-{}", naming.association, zone),
            )
            .input("routeTableId", route_table_id.clone())
            .input("subnetId", subnet.id()),
        )?;

        subnets.push(subnet);
    }

    Ok(subnets)
}

/// The ids of the given subnets as a single list input.
pub fn subnet_ids(subnets: &[ResourceHandle]) -> Input {
    Input::list(subnets.iter().map(|s| s.id()))
}
