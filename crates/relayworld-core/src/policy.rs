//! Authorization predicates over the store.
//!
//! These gate local actions only. Remote events are mirrored as facts
//! except where a model invariant depends on the signer's role.

use chrono::{DateTime, Utc};

use relayworld_types::{ActorId, GuildId, RegionId, Structure};

use crate::store::WorldStore;

/// Whether `actor` may build in `region` at `now`.
///
/// An active claim admits its owner. While the claim is held by an admin
/// of a guild that lists the region as territory, it also admits that
/// guild's members. An unclaimed region is open unless `require_claim` is
/// set.
pub fn can_build(
    store: &WorldStore,
    actor: &ActorId,
    region: RegionId,
    now: DateTime<Utc>,
    require_claim: bool,
) -> bool {
    if store
        .territory_holder(region, now)
        .is_some_and(|g| g.members.contains(actor))
    {
        return true;
    }
    match store.active_claim(region, now) {
        Some(claim) => &claim.owner == actor,
        None => !require_claim,
    }
}

/// Whether `actor` may interact with `structure`.
pub fn can_access_structure(store: &WorldStore, actor: &ActorId, structure: &Structure) -> bool {
    let permissions = &structure.permissions;
    &structure.owner == actor
        || permissions.public
        || permissions.whitelist.contains(actor)
        || permissions
            .guilds
            .iter()
            .any(|guild| store.guilds().is_member(guild, actor))
}

/// Whether `actor` may manage roles and territory of `guild`.
pub fn can_manage_guild(store: &WorldStore, actor: &ActorId, guild: &GuildId) -> bool {
    store.guilds().is_admin(guild, actor)
}
