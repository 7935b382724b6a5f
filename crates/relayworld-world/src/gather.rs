//! Local gather sessions: `Idle -> InProgress -> Completed | Cancelled`.
//!
//! A session belongs to the local player only. It never touches the node
//! itself; completion hands back the amount to credit and the caller
//! performs the deplete and broadcasts.

use chrono::{DateTime, Duration, Utc};

use relayworld_types::{NodeState, Position, ResourceNode, ResourceNodeId};

use crate::error::WorldError;
use crate::resource::ResourceRules;

/// Why a session was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The gatherer moved out of range.
    OutOfRange,
    /// Someone else depleted the node first.
    NodeDepleted,
    /// The node no longer exists.
    NodeMissing,
    /// The player abandoned the gather.
    Abandoned,
}

/// State of a gather session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherState {
    /// No gather started.
    Idle,
    /// Gathering until `completes_at`.
    InProgress {
        /// When the gather started.
        started_at: DateTime<Utc>,
        /// When the gather finishes if nothing interrupts it.
        completes_at: DateTime<Utc>,
    },
    /// Finished. `amount` is the node's yield at completion.
    Completed {
        /// Units to credit.
        amount: u32,
    },
    /// Interrupted before completion. Progress is discarded.
    Cancelled(CancelReason),
}

/// A local player's attempt to gather one node.
#[derive(Debug, Clone, PartialEq)]
pub struct GatherSession {
    node: ResourceNodeId,
    state: GatherState,
}

/// Check that `node` can be gathered from `position`.
///
/// # Errors
///
/// Returns [`WorldError::NodeDepleted`] or [`WorldError::OutOfRange`].
pub fn check_gatherable(
    node: &ResourceNode,
    position: Position,
    rules: &ResourceRules,
) -> Result<u32, WorldError> {
    let NodeState::Available { amount } = node.state else {
        return Err(WorldError::NodeDepleted(node.id.clone()));
    };
    let distance = position.distance_to(node.position);
    if !position.is_finite() || distance > rules.gather_range {
        return Err(WorldError::OutOfRange {
            node: node.id.clone(),
            distance,
            range: rules.gather_range,
        });
    }
    Ok(amount)
}

impl GatherSession {
    /// An idle session aimed at `node`.
    pub const fn idle(node: ResourceNodeId) -> Self {
        Self {
            node,
            state: GatherState::Idle,
        }
    }

    /// Begin gathering `node` from `position`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NodeDepleted`] or [`WorldError::OutOfRange`]
    /// when the node cannot be gathered right now.
    pub fn start(
        node: &ResourceNode,
        position: Position,
        rules: &ResourceRules,
        now: DateTime<Utc>,
    ) -> Result<Self, WorldError> {
        check_gatherable(node, position, rules)?;
        let duration: Duration = rules.gather_duration(node.resource);
        let completes_at = now
            .checked_add_signed(duration)
            .ok_or(WorldError::ArithmeticOverflow)?;
        Ok(Self {
            node: node.id.clone(),
            state: GatherState::InProgress {
                started_at: now,
                completes_at,
            },
        })
    }

    /// Node being gathered.
    pub const fn node(&self) -> &ResourceNodeId {
        &self.node
    }

    /// Current state.
    pub const fn state(&self) -> GatherState {
        self.state
    }

    /// Whether the session has finished one way or the other.
    pub const fn is_finished(&self) -> bool {
        matches!(
            self.state,
            GatherState::Completed { .. } | GatherState::Cancelled(_)
        )
    }

    /// Advance the session at `now`, re-validating range and availability.
    ///
    /// `node` is the current view of the target, or `None` if it vanished.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::SessionNotActive`] if the session is not in
    /// progress.
    pub fn tick(
        &mut self,
        node: Option<&ResourceNode>,
        position: Position,
        rules: &ResourceRules,
        now: DateTime<Utc>,
    ) -> Result<GatherState, WorldError> {
        let GatherState::InProgress { completes_at, .. } = self.state else {
            return Err(WorldError::SessionNotActive);
        };

        self.state = match node {
            None => GatherState::Cancelled(CancelReason::NodeMissing),
            Some(node) => match check_gatherable(node, position, rules) {
                Err(WorldError::NodeDepleted(_)) => {
                    GatherState::Cancelled(CancelReason::NodeDepleted)
                }
                Err(_) => GatherState::Cancelled(CancelReason::OutOfRange),
                Ok(amount) if now >= completes_at => GatherState::Completed { amount },
                Ok(_) => self.state,
            },
        };
        Ok(self.state)
    }

    /// Abandon an in-progress session.
    pub const fn cancel(&mut self) {
        if let GatherState::InProgress { .. } = self.state {
            self.state = GatherState::Cancelled(CancelReason::Abandoned);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use relayworld_types::Resource;

    use super::*;

    fn wood_node(amount: u32) -> ResourceNode {
        ResourceNode {
            id: ResourceNodeId::seeded(Resource::Wood, 0),
            resource: Resource::Wood,
            position: Position::new(10.0, 0.0),
            state: NodeState::Available { amount },
        }
    }

    #[test]
    fn completes_after_gather_duration() {
        let rules = ResourceRules::default();
        let node = wood_node(2);
        let start = Utc::now();
        let mut session = GatherSession::start(&node, Position::new(0.0, 0.0), &rules, start).unwrap();

        let early = session
            .tick(Some(&node), Position::new(0.0, 0.0), &rules, start + Duration::seconds(1))
            .unwrap();
        assert!(matches!(early, GatherState::InProgress { .. }));

        let done = session
            .tick(Some(&node), Position::new(0.0, 0.0), &rules, start + Duration::seconds(3))
            .unwrap();
        assert_eq!(done, GatherState::Completed { amount: 2 });
        assert!(session.is_finished());
    }

    #[test]
    fn start_rejects_out_of_range_and_depleted() {
        let rules = ResourceRules::default();
        let node = wood_node(2);
        let far = GatherSession::start(&node, Position::new(100.0, 0.0), &rules, Utc::now());
        assert!(matches!(far, Err(WorldError::OutOfRange { .. })));

        let mut depleted = wood_node(2);
        depleted.state = NodeState::Depleted {
            respawn_at: Utc::now(),
        };
        let result = GatherSession::start(&depleted, Position::new(0.0, 0.0), &rules, Utc::now());
        assert!(matches!(result, Err(WorldError::NodeDepleted(_))));
    }

    #[test]
    fn walking_away_cancels() {
        let rules = ResourceRules::default();
        let node = wood_node(2);
        let start = Utc::now();
        let mut session = GatherSession::start(&node, Position::new(0.0, 0.0), &rules, start).unwrap();
        let state = session
            .tick(Some(&node), Position::new(200.0, 0.0), &rules, start + Duration::seconds(1))
            .unwrap();
        assert_eq!(state, GatherState::Cancelled(CancelReason::OutOfRange));
    }

    #[test]
    fn peer_depletion_cancels() {
        let rules = ResourceRules::default();
        let mut node = wood_node(2);
        let start = Utc::now();
        let mut session = GatherSession::start(&node, Position::new(0.0, 0.0), &rules, start).unwrap();
        node.state = NodeState::Depleted {
            respawn_at: start + Duration::seconds(300),
        };
        let state = session
            .tick(Some(&node), Position::new(0.0, 0.0), &rules, start + Duration::seconds(5))
            .unwrap();
        assert_eq!(state, GatherState::Cancelled(CancelReason::NodeDepleted));
    }

    #[test]
    fn finished_sessions_cannot_tick() {
        let rules = ResourceRules::default();
        let node = wood_node(2);
        let mut session =
            GatherSession::start(&node, Position::new(0.0, 0.0), &rules, Utc::now()).unwrap();
        session.cancel();
        assert_eq!(session.state(), GatherState::Cancelled(CancelReason::Abandoned));
        let result = session.tick(Some(&node), Position::new(0.0, 0.0), &rules, Utc::now());
        assert_eq!(result, Err(WorldError::SessionNotActive));
    }

    #[test]
    fn idle_session_is_not_active() {
        let mut session = GatherSession::idle(ResourceNodeId::seeded(Resource::Stone, 1));
        assert_eq!(session.state(), GatherState::Idle);
        let result = session.tick(None, Position::new(0.0, 0.0), &ResourceRules::default(), Utc::now());
        assert!(result.is_err());
    }
}
