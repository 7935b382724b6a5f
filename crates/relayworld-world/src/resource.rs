//! Resource node lifecycle: `Available(amount) -> Depleted(respawn_at) ->
//! Available(new_amount)`.
//!
//! Depletion is driven by events. Respawn is driven by the local clock and
//! never broadcast; the new yield is rolled from `(seed, node id,
//! respawn_at)` so that every client replenishes a node identically.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use relayworld_types::{NodeState, Resource, ResourceNode};

use crate::random::{fnv1a, roll_inclusive};

/// Per-resource gather parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NodeRules {
    /// Smallest yield rolled on respawn.
    pub yield_min: u32,
    /// Largest yield rolled on respawn.
    pub yield_max: u32,
    /// Seconds a gather takes to complete.
    pub gather_seconds: u32,
}

impl Default for NodeRules {
    fn default() -> Self {
        Self {
            yield_min: 1,
            yield_max: 3,
            gather_seconds: 3,
        }
    }
}

/// Lifecycle parameters shared by all nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRules {
    /// World seed mixed into every yield roll.
    pub seed: u64,
    /// Delay between depletion and respawn.
    pub respawn_delay: Duration,
    /// Maximum gatherer distance from the node.
    pub gather_range: f64,
    /// Per-resource overrides. Missing resources use [`NodeRules::default`].
    pub per_resource: BTreeMap<Resource, NodeRules>,
}

impl ResourceRules {
    /// Rules for one resource type.
    pub fn for_resource(&self, resource: Resource) -> NodeRules {
        self.per_resource
            .get(&resource)
            .copied()
            .unwrap_or_default()
    }

    /// How long a gather of this resource takes.
    pub fn gather_duration(&self, resource: Resource) -> Duration {
        Duration::seconds(i64::from(self.for_resource(resource).gather_seconds))
    }
}

impl Default for ResourceRules {
    fn default() -> Self {
        Self {
            seed: 42,
            respawn_delay: Duration::seconds(300),
            gather_range: 50.0,
            per_resource: BTreeMap::new(),
        }
    }
}

/// Deterministic yield for `node` becoming available at `at`.
pub fn roll_yield(node: &ResourceNode, at: DateTime<Utc>, rules: &ResourceRules) -> u32 {
    let node_rules = rules.for_resource(node.resource);
    let salt = fnv1a(node.id.as_str()) ^ u64::from_le_bytes(at.timestamp().to_le_bytes());
    roll_inclusive(rules.seed, salt, node_rules.yield_min, node_rules.yield_max).max(1)
}

/// Mark an available node depleted until `respawn_at`.
///
/// Returns `false`, leaving the node untouched, if it was already depleted.
pub fn deplete(node: &mut ResourceNode, respawn_at: DateTime<Utc>) -> bool {
    match node.state {
        NodeState::Available { .. } => {
            node.state = NodeState::Depleted { respawn_at };
            true
        }
        NodeState::Depleted { .. } => false,
    }
}

/// Force a node available with `amount` (clamped to at least one).
pub fn replenish(node: &mut ResourceNode, amount: u32) {
    node.state = NodeState::Available {
        amount: amount.max(1),
    };
}

/// Whether a depleted node is due to respawn at `now`.
pub fn respawn_due(node: &ResourceNode, now: DateTime<Utc>) -> bool {
    matches!(node.state, NodeState::Depleted { respawn_at } if respawn_at <= now)
}

/// Respawn the node if due, returning the freshly rolled yield.
pub fn respawn_if_due(
    node: &mut ResourceNode,
    now: DateTime<Utc>,
    rules: &ResourceRules,
) -> Option<u32> {
    let NodeState::Depleted { respawn_at } = node.state else {
        return None;
    };
    if respawn_at > now {
        return None;
    }
    let amount = roll_yield(node, respawn_at, rules);
    replenish(node, amount);
    Some(amount)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use relayworld_types::{Position, ResourceNodeId};

    use super::*;

    fn make_node(state: NodeState) -> ResourceNode {
        ResourceNode {
            id: ResourceNodeId::seeded(Resource::Wood, 0),
            resource: Resource::Wood,
            position: Position::new(0.0, 0.0),
            state,
        }
    }

    #[test]
    fn deplete_is_idempotent() {
        let now = Utc::now();
        let mut node = make_node(NodeState::Available { amount: 2 });
        assert!(deplete(&mut node, now + Duration::seconds(300)));
        assert!(!deplete(&mut node, now + Duration::seconds(900)));
        assert_eq!(
            node.state,
            NodeState::Depleted {
                respawn_at: now + Duration::seconds(300)
            }
        );
    }

    #[test]
    fn respawn_waits_for_respawn_time() {
        let now = Utc::now();
        let rules = ResourceRules::default();
        let respawn_at = now + Duration::seconds(300);
        let mut node = make_node(NodeState::Depleted { respawn_at });

        assert!(!respawn_due(&node, respawn_at - Duration::seconds(1)));
        assert_eq!(respawn_if_due(&mut node, respawn_at - Duration::seconds(1), &rules), None);
        assert!(node.is_depleted());

        let amount = respawn_if_due(&mut node, respawn_at, &rules).unwrap();
        assert!((1..=3).contains(&amount));
        assert_eq!(node.available_amount(), Some(amount));
    }

    #[test]
    fn respawn_roll_is_shared_across_clients() {
        let respawn_at = Utc::now();
        let rules = ResourceRules::default();
        let mut a = make_node(NodeState::Depleted { respawn_at });
        let mut b = make_node(NodeState::Depleted { respawn_at });
        // Different local tick times, same respawn instant.
        let ya = respawn_if_due(&mut a, respawn_at + Duration::seconds(1), &rules);
        let yb = respawn_if_due(&mut b, respawn_at + Duration::seconds(7), &rules);
        assert_eq!(ya, yb);
    }

    #[test]
    fn per_resource_rules_override_defaults() {
        let mut rules = ResourceRules::default();
        rules.per_resource.insert(
            Resource::Wood,
            NodeRules {
                yield_min: 5,
                yield_max: 5,
                gather_seconds: 10,
            },
        );
        let node = make_node(NodeState::Available { amount: 1 });
        assert_eq!(roll_yield(&node, Utc::now(), &rules), 5);
        assert_eq!(rules.gather_duration(Resource::Wood), Duration::seconds(10));
        assert_eq!(rules.gather_duration(Resource::Stone), Duration::seconds(3));
    }

    #[test]
    fn replenish_never_yields_zero() {
        let mut node = make_node(NodeState::Depleted {
            respawn_at: Utc::now(),
        });
        replenish(&mut node, 0);
        assert_eq!(node.available_amount(), Some(1));
    }
}
