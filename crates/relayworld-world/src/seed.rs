//! Deterministic world seeding.
//!
//! Every client generates the same resource nodes from the same seed and
//! layout, so node ids like `wood-0` refer to the same place everywhere.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use relayworld_types::{NodeState, Position, Resource, ResourceNode, ResourceNodeId};

use crate::random::{deterministic_random, roll_inclusive};
use crate::resource::ResourceRules;

/// Extent of the seeded area and how many nodes of each type it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedLayout {
    /// Width of the seeded area, starting at x = 0.
    pub width: f64,
    /// Height of the seeded area, starting at y = 0.
    pub height: f64,
    /// Node count per resource type.
    pub counts: BTreeMap<Resource, u32>,
}

impl Default for SeedLayout {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 1000.0,
            counts: BTreeMap::from([
                (Resource::Wood, 20),
                (Resource::Stone, 12),
                (Resource::Metal, 6),
                (Resource::Fiber, 10),
                (Resource::Crystal, 2),
            ]),
        }
    }
}

/// Map a random word onto `[0, extent)` with centimetre resolution.
fn coordinate(random: u64, extent: f64) -> f64 {
    let centimetres = random % 1_000_000;
    // centimetres < 10^6, exactly representable as f64.
    let fraction = f64::from(u32::try_from(centimetres).unwrap_or(0)) / 1_000_000.0;
    fraction * extent.max(0.0)
}

/// Generate the world's resource nodes, all available at seed time.
pub fn seed_nodes(layout: &SeedLayout, rules: &ResourceRules) -> Vec<ResourceNode> {
    let mut nodes = Vec::new();
    for (resource_index, (resource, count)) in (0_u64..).zip(layout.counts.iter()) {
        for index in 0..*count {
            let salt = resource_index
                .wrapping_mul(1_000_003)
                .wrapping_add(u64::from(index));
            let x = coordinate(deterministic_random(rules.seed, salt.wrapping_mul(2)), layout.width);
            let y = coordinate(
                deterministic_random(rules.seed, salt.wrapping_mul(2).wrapping_add(1)),
                layout.height,
            );
            let node_rules = rules.for_resource(*resource);
            let amount = roll_inclusive(rules.seed, salt, node_rules.yield_min, node_rules.yield_max);
            nodes.push(ResourceNode {
                id: ResourceNodeId::seeded(*resource, index),
                resource: *resource,
                position: Position::new(x, y),
                state: NodeState::Available {
                    amount: amount.max(1),
                },
            });
        }
    }
    debug!(nodes = nodes.len(), seed = rules.seed, "Seeded resource nodes");
    nodes
}

/// Place an explicitly configured node, available with a rolled yield.
pub fn fixed_node(
    resource: Resource,
    index: u32,
    position: Position,
    rules: &ResourceRules,
    at: DateTime<Utc>,
) -> ResourceNode {
    let mut node = ResourceNode {
        id: ResourceNodeId::seeded(resource, index),
        resource,
        position,
        state: NodeState::Available { amount: 1 },
    };
    node.state = NodeState::Available {
        amount: crate::resource::roll_yield(&node, at, rules),
    };
    node
}
