//! Two or more clients converging through a shared relay.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use relayworld_core::{
    ClientConfig, Engine, Inbound, InboundOutcome, LocalAction, LocalRelay, Notice,
    RecordingPresenter, Relay, SubscriptionFilter,
};
use relayworld_events::Envelope;
use relayworld_types::{
    ActorId, EntityKind, NodeState, PaymentProof, Provenance, RegionId, Resource, ResourceNodeId,
};
use relayworld_world::CancelReason;

fn make_client(actor: &str, now: DateTime<Utc>) -> (Engine, RecordingPresenter) {
    let recorder = RecordingPresenter::new();
    let mut config = ClientConfig::default();
    config.identity.actor = actor.to_owned();
    let engine = Engine::new(config, Box::new(recorder.clone()), now);
    (engine, recorder)
}

fn claim(region: RegionId) -> LocalAction {
    LocalAction::ClaimLand {
        region,
        payment_proof: Some(PaymentProof("lnbc1".to_owned())),
    }
}

async fn publish_all(relay: &LocalRelay, envelopes: Vec<Envelope>) {
    for envelope in envelopes {
        relay.publish(envelope).await.unwrap();
    }
}

/// Replay everything the relay has stored into `engine`.
async fn catch_up(relay: &LocalRelay, engine: &mut Engine, now: DateTime<Utc>) -> Vec<InboundOutcome> {
    let (tx, mut rx) = mpsc::channel(64);
    let _subscription = relay.subscribe(SubscriptionFilter::all(), tx).await.unwrap();
    let mut outcomes = Vec::new();
    while let Some(item) = rx.recv().await {
        let done = item == Inbound::EndOfStoredEvents;
        outcomes.push(engine.handle_inbound(item, now));
        if done {
            break;
        }
    }
    outcomes
}

#[tokio::test]
async fn racing_claims_converge_on_the_earliest() {
    let t0 = Utc::now();
    let region = RegionId::new(3, 3);
    let relay = LocalRelay::new();
    let (mut alice, _) = make_client("alice", t0);
    let (mut bob, bob_notices) = make_client("bob", t0);

    // Both claim before hearing from each other; alice is a second earlier.
    publish_all(&relay, alice.submit(claim(region), t0).unwrap()).await;
    publish_all(&relay, bob.submit(claim(region), t0 + Duration::seconds(1)).unwrap()).await;

    let later = t0 + Duration::seconds(5);
    let alice_outcomes = catch_up(&relay, &mut alice, later).await;
    let bob_outcomes = catch_up(&relay, &mut bob, later).await;

    assert_eq!(alice_outcomes.first(), Some(&InboundOutcome::Confirmed));
    assert!(matches!(alice_outcomes.get(1), Some(InboundOutcome::Refused(_))));
    assert_eq!(bob_outcomes.first(), Some(&InboundOutcome::Applied));

    for engine in [&alice, &bob] {
        let held = engine.store().active_claim(region, later).unwrap();
        assert_eq!(held.owner, ActorId::new("alice"));
        assert_eq!(engine.store().claims().len(), 1);
    }
    assert_eq!(
        alice.store().active_claim(region, later).unwrap().provenance,
        Provenance::Confirmed
    );
    assert!(bob_notices.notices().contains(&Notice::ConflictLost {
        entity: EntityKind::LandClaim,
        id: region.to_string(),
        winner: ActorId::new("alice"),
    }));
}

#[tokio::test]
async fn earlier_claim_wins_even_when_it_arrives_second() {
    let t0 = Utc::now();
    let region = RegionId::new(3, 3);
    let (mut alice, _) = make_client("alice", t0);
    let (mut bob, _) = make_client("bob", t0);
    let (mut carol, _) = make_client("carol", t0);

    let early = alice.submit(claim(region), t0).unwrap();
    let late = bob.submit(claim(region), t0 + Duration::seconds(1)).unwrap();

    let now = t0 + Duration::seconds(5);
    for envelope in late.iter().chain(early.iter()) {
        carol.handle_envelope(envelope, now);
    }
    let held = carol.store().active_claim(region, now).unwrap();
    assert_eq!(held.owner, ActorId::new("alice"));
}

#[tokio::test]
async fn only_one_racing_gather_is_credited() {
    let t0 = Utc::now();
    let node = ResourceNodeId::seeded(Resource::Wood, 0);
    let (mut alice, _) = make_client("alice", t0);
    let (mut bob, bob_notices) = make_client("bob", t0);

    let at = alice.store().node(&node).unwrap().position;
    let start = t0 + Duration::seconds(1);
    for engine in [&mut alice, &mut bob] {
        engine
            .submit(LocalAction::MoveTo { x: at.x, y: at.y }, start)
            .unwrap();
        engine
            .submit(LocalAction::StartGather { resource_id: node.clone() }, start)
            .unwrap();
    }

    let done = start + Duration::seconds(3);
    let gathered = alice.tick(done);
    assert_eq!(gathered.len(), 3);

    for envelope in &gathered {
        assert_eq!(bob.handle_envelope(envelope, done), InboundOutcome::Applied);
    }
    assert!(bob.tick(done).is_empty());
    assert!(bob_notices.notices().contains(&Notice::GatherCancelled {
        node: node.clone(),
        reason: CancelReason::NodeDepleted,
    }));

    let alice_wood = alice
        .store()
        .inventory(&ActorId::new("alice"))
        .and_then(|i| i.resources.get(&Resource::Wood).copied());
    assert!(alice_wood.is_some_and(|w| w >= 1));
    // Bob mirrors alice's inventory and credits himself nothing.
    assert_eq!(
        bob.store()
            .inventory(&ActorId::new("alice"))
            .and_then(|i| i.resources.get(&Resource::Wood).copied()),
        alice_wood
    );
    assert!(bob.store().inventory(&ActorId::new("bob")).is_none_or(|i| i.resources.is_empty()));
    assert!(bob.store().node(&node).unwrap().is_depleted());
}

#[tokio::test]
async fn late_joiner_sees_a_regathered_node_depleted() {
    let t0 = Utc::now();
    let node = ResourceNodeId::seeded(Resource::Wood, 0);
    let (mut alice, _) = make_client("alice", t0);
    let at = alice.store().node(&node).unwrap().position;

    let mut history = alice.submit(LocalAction::MoveTo { x: at.x, y: at.y }, t0).unwrap();
    history.extend(
        alice
            .submit(LocalAction::StartGather { resource_id: node.clone() }, t0)
            .unwrap(),
    );
    history.extend(alice.tick(t0 + Duration::seconds(3)));

    // Past the 300s respawn delay the node is back and gathered again.
    let again = t0 + Duration::seconds(400);
    assert!(alice.tick(again).is_empty());
    assert!(!alice.store().node(&node).unwrap().is_depleted());
    history.extend(
        alice
            .submit(LocalAction::StartGather { resource_id: node.clone() }, again)
            .unwrap(),
    );
    history.extend(alice.tick(again + Duration::seconds(3)));

    let now = again + Duration::seconds(10);
    let (mut carol, _) = make_client("carol", t0);
    for envelope in &history {
        assert_eq!(carol.handle_envelope(envelope, now), InboundOutcome::Applied);
    }
    carol.tick(now);

    for engine in [&alice, &carol] {
        let state = engine.store().node(&node).unwrap().state;
        assert!(matches!(state, NodeState::Depleted { respawn_at } if respawn_at > now));
    }
}

#[tokio::test]
async fn replaying_history_twice_changes_nothing() {
    let t0 = Utc::now();
    let relay = LocalRelay::new();
    let (mut alice, _) = make_client("alice", t0);
    alice.grant(Resource::Wood, 20).unwrap();
    publish_all(&relay, alice.submit(claim(RegionId::new(0, 0)), t0).unwrap()).await;
    publish_all(
        &relay,
        alice
            .submit(
                LocalAction::PlaceStructure {
                    structure_type: relayworld_types::StructureType::Wall,
                    x: 10.0,
                    y: 10.0,
                    rotation: relayworld_types::Rotation::Deg0,
                    material: Resource::Wood,
                },
                t0,
            )
            .unwrap(),
    )
    .await;

    let now = t0 + Duration::seconds(5);
    let (mut observer, _) = make_client("carol", t0);
    catch_up(&relay, &mut observer, now).await;
    let once = observer.stats();
    let structures = observer.store().structures().clone();

    let outcomes = catch_up(&relay, &mut observer, now).await;
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, InboundOutcome::Duplicate | InboundOutcome::CaughtUp))
    );
    assert_eq!(observer.stats().world, once.world);
    assert_eq!(observer.store().structures(), &structures);
    assert_eq!(once.world.structures, 1);
    assert_eq!(once.world.claims, 1);
}

#[tokio::test]
async fn guild_history_converges_with_out_of_order_delivery() {
    let t0 = Utc::now();
    let (mut alice, _) = make_client("alice", t0);
    let (mut bob, _) = make_client("bob", t0);
    let (mut carol, _) = make_client("carol", t0);

    let created = alice
        .submit(LocalAction::CreateGuild { name: "Masons".to_owned() }, t0)
        .unwrap();
    for envelope in &created {
        bob.handle_envelope(envelope, t0);
    }
    let guild = bob.store().guilds().iter().next().map(|g| g.id).unwrap();
    let joined = bob.submit(LocalAction::JoinGuild { guild_id: guild }, t0).unwrap();
    for envelope in &joined {
        alice.handle_envelope(envelope, t0);
    }
    let promoted = alice
        .submit(
            LocalAction::PromoteMember {
                guild_id: guild,
                member: ActorId::new("bob"),
            },
            t0,
        )
        .unwrap();
    bob.grant(Resource::Stone, 5).unwrap();
    let deposited = bob
        .submit(
            LocalAction::DepositToGuild {
                guild_id: guild,
                resource: Resource::Stone,
                quantity: dec!(5),
            },
            t0,
        )
        .unwrap();

    // Carol hears the join before the guild exists.
    let now = t0 + Duration::seconds(1);
    for envelope in joined.iter().chain(&promoted).chain(&deposited).chain(&created) {
        carol.handle_envelope(envelope, now);
    }
    for envelope in &promoted {
        bob.handle_envelope(envelope, now);
    }

    let bob_id = ActorId::new("bob");
    for engine in [&carol, &bob] {
        assert!(engine.store().guilds().is_admin(&guild, &bob_id));
        assert_eq!(engine.store().guilds().balance(&guild, Resource::Stone), dec!(5));
    }
    assert_eq!(carol.stats().deferred, 0);
}

#[tokio::test]
async fn guild_territory_ends_when_the_claim_under_it_changes_hands() {
    let t0 = Utc::now();
    let region = RegionId::new(3, 3);
    let (mut alice, _) = make_client("alice", t0);
    let (mut bob, _) = make_client("bob", t0);
    let (mut carol, _) = make_client("carol", t0);
    let wall = |x: f64| LocalAction::PlaceStructure {
        structure_type: relayworld_types::StructureType::Wall,
        x,
        y: 310.0,
        rotation: relayworld_types::Rotation::Deg0,
        material: Resource::Wood,
    };

    let created = alice
        .submit(LocalAction::CreateGuild { name: "Masons".to_owned() }, t0)
        .unwrap();
    for envelope in &created {
        bob.handle_envelope(envelope, t0);
    }
    let guild = bob.store().guilds().iter().next().map(|g| g.id).unwrap();
    let mut history = created;
    history.extend(bob.submit(LocalAction::JoinGuild { guild_id: guild }, t0).unwrap());
    history.extend(alice.submit(claim(region), t0).unwrap());
    history.extend(
        alice
            .submit(LocalAction::ClaimTerritory { guild_id: guild, region }, t0)
            .unwrap(),
    );
    for envelope in &history {
        bob.handle_envelope(envelope, t0);
        carol.handle_envelope(envelope, t0);
    }

    bob.grant(Resource::Wood, 20).unwrap();
    assert!(bob.submit(wall(310.0), t0).is_ok());

    // Alice's week-long claim lapses and carol takes the region.
    let later = t0 + Duration::days(8);
    let taken = carol.submit(claim(region), later).unwrap();
    for envelope in &taken {
        assert_eq!(bob.handle_envelope(envelope, later), InboundOutcome::Applied);
    }
    for engine in [&bob, &carol] {
        assert!(engine.store().territory_holder(region, later).is_none());
        assert!(engine.store().owns_region(region, &ActorId::new("carol"), later));
    }
    assert!(bob.submit(wall(320.0), later).is_err());

    // The stale listing does not keep carol's own guild out.
    let founded = carol
        .submit(LocalAction::CreateGuild { name: "Quarry".to_owned() }, later)
        .unwrap();
    assert!(!founded.is_empty());
    let quarry = carol
        .store()
        .guilds()
        .iter()
        .find(|g| g.name == "Quarry")
        .map(|g| g.id)
        .unwrap();
    assert!(
        carol
            .submit(LocalAction::ClaimTerritory { guild_id: quarry, region }, later)
            .is_ok()
    );
    assert_eq!(
        carol.store().territory_holder(region, later).map(|g| g.id),
        Some(quarry)
    );
}
