//! Guild registry: membership, roles, territory, and treasury.
//!
//! Built the same event-sourced way as the rest of the world: every change
//! goes through [`GuildRegistry::apply`] with the signer and timestamp of
//! the event that carried it. Membership operations are idempotent set
//! operations. Role changes are accepted only from current admins and
//! disbanding only from the founder, so the founder is always a member and
//! an admin for as long as the guild exists.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use relayworld_types::{
    ActorId, EventId, Guild, GuildId, RegionId, Resource, TreasuryEntry, TreasuryEntryType,
};

use crate::error::LedgerError;
use crate::inventory;
use crate::treasury::{TreasuryEntryBuilder, apply_entry};

/// A guild operation, independent of how it travelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuildOp {
    /// Found a guild named `name`.
    Create {
        /// Display name.
        name: String,
    },
    /// Signer joins.
    Join,
    /// Signer leaves.
    Leave,
    /// Grant admin to `member`.
    Promote {
        /// Member to promote.
        member: ActorId,
    },
    /// Revoke admin from `member`.
    Demote {
        /// Member to demote.
        member: ActorId,
    },
    /// Remove the guild.
    Disband,
    /// Add `region` to the territory.
    ClaimTerritory {
        /// Region to add.
        region: RegionId,
    },
    /// Move resources into the treasury.
    Deposit {
        /// Resource moved.
        resource: Resource,
        /// Positive quantity.
        quantity: Decimal,
    },
    /// Move resources out of the treasury.
    Withdraw {
        /// Resource moved.
        resource: Resource,
        /// Positive quantity.
        quantity: Decimal,
    },
}

/// Signer and timestamp of the event carrying a guild operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpContext {
    /// Signer.
    pub actor: ActorId,
    /// Event id.
    pub event: EventId,
    /// Declared creation time.
    pub created_at: DateTime<Utc>,
}

/// What an applied operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuildChange {
    /// A guild was created.
    Created,
    /// An existing guild changed.
    Updated,
    /// The guild was removed.
    Disbanded,
    /// Nothing changed (idempotent repeat).
    Unchanged,
}

/// All known guilds plus the append-only treasury log.
#[derive(Debug, Clone, Default)]
pub struct GuildRegistry {
    guilds: BTreeMap<GuildId, Guild>,
    entries: Vec<TreasuryEntry>,
}

impl GuildRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            guilds: BTreeMap::new(),
            entries: Vec::new(),
        }
    }

    /// Look up a guild.
    pub fn get(&self, id: &GuildId) -> Option<&Guild> {
        self.guilds.get(id)
    }

    /// All guilds.
    pub fn iter(&self) -> impl Iterator<Item = &Guild> {
        self.guilds.values()
    }

    /// Number of guilds.
    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    /// Whether there are no guilds.
    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    /// Treasury log, oldest first.
    pub fn entries(&self) -> &[TreasuryEntry] {
        &self.entries
    }

    /// Treasury balance of `resource` in `guild` (zero if unknown).
    pub fn balance(&self, guild: &GuildId, resource: Resource) -> Decimal {
        self.guilds
            .get(guild)
            .and_then(|g| g.treasury.get(&resource).copied())
            .unwrap_or(Decimal::ZERO)
    }

    /// Whether `actor` belongs to `guild`.
    pub fn is_member(&self, guild: &GuildId, actor: &ActorId) -> bool {
        self.guilds
            .get(guild)
            .is_some_and(|g| g.members.contains(actor))
    }

    /// Whether `actor` administers `guild`.
    pub fn is_admin(&self, guild: &GuildId, actor: &ActorId) -> bool {
        self.guilds
            .get(guild)
            .is_some_and(|g| g.admins.contains(actor))
    }

    /// Guilds listing `region` as territory.
    ///
    /// Listing is not holding: territory only counts while an admin of the
    /// guild holds the land claim underneath it, which the registry cannot
    /// see.
    pub fn listing_territory(&self, region: RegionId) -> impl Iterator<Item = &Guild> {
        self.guilds.values().filter(move |g| g.territory.contains(&region))
    }

    fn require(&self, guild: GuildId) -> Result<&Guild, LedgerError> {
        self.guilds.get(&guild).ok_or(LedgerError::GuildNotFound(guild))
    }

    fn require_admin(&self, guild: GuildId, actor: &ActorId) -> Result<&Guild, LedgerError> {
        let g = self.require(guild)?;
        if g.admins.contains(actor) {
            Ok(g)
        } else {
            Err(LedgerError::NotAnAdmin {
                guild,
                actor: actor.clone(),
            })
        }
    }

    fn require_member(&self, guild: GuildId, actor: &ActorId) -> Result<&Guild, LedgerError> {
        let g = self.require(guild)?;
        if g.members.contains(actor) {
            Ok(g)
        } else {
            Err(LedgerError::NotAMember {
                guild,
                actor: actor.clone(),
            })
        }
    }

    // -----------------------------------------------------------------------
    // Local preconditions
    // -----------------------------------------------------------------------

    /// Check whether `actor` may perform `op` locally, before anything is
    /// broadcast.
    ///
    /// `holdings` is the actor's inventory; `owns_region` reports whether
    /// the actor holds an active land claim on a region.
    ///
    /// # Errors
    ///
    /// Returns the [`LedgerError`] describing the failed precondition.
    pub fn check_local(
        &self,
        actor: &ActorId,
        guild: GuildId,
        op: &GuildOp,
        holdings: &BTreeMap<Resource, u32>,
        owns_region: impl Fn(RegionId) -> bool,
    ) -> Result<(), LedgerError> {
        match op {
            GuildOp::Create { name } => {
                if name.trim().is_empty() {
                    return Err(LedgerError::EmptyName);
                }
                if self.guilds.contains_key(&guild) {
                    return Err(LedgerError::GuildExists(guild));
                }
            }
            GuildOp::Join => {
                if self.require(guild)?.members.contains(actor) {
                    return Err(LedgerError::AlreadyMember {
                        guild,
                        actor: actor.clone(),
                    });
                }
            }
            GuildOp::Leave => {
                let g = self.require_member(guild, actor)?;
                if &g.founder == actor {
                    return Err(LedgerError::FounderIsPermanent(guild));
                }
            }
            GuildOp::Promote { member } => {
                self.require_admin(guild, actor)?;
                self.require_member(guild, member)?;
            }
            GuildOp::Demote { member } => {
                let g = self.require_admin(guild, actor)?;
                if &g.founder == member {
                    return Err(LedgerError::FounderIsPermanent(guild));
                }
            }
            GuildOp::Disband => {
                if &self.require(guild)?.founder != actor {
                    return Err(LedgerError::NotFounder(guild));
                }
            }
            GuildOp::ClaimTerritory { region } => {
                self.require_admin(guild, actor)?;
                if !owns_region(*region) {
                    return Err(LedgerError::TerritoryNotOwned {
                        region: *region,
                        actor: actor.clone(),
                    });
                }
            }
            GuildOp::Deposit { resource, quantity } => {
                self.require_member(guild, actor)?;
                let units = inventory::whole_units(*quantity)?;
                let available = inventory::quantity(holdings, *resource);
                if available < units {
                    return Err(LedgerError::InsufficientResource {
                        resource: *resource,
                        required: units,
                        available,
                    });
                }
            }
            GuildOp::Withdraw { resource, quantity } => {
                self.require_member(guild, actor)?;
                inventory::whole_units(*quantity)?;
                let available = self.balance(&guild, *resource);
                if available < *quantity {
                    return Err(LedgerError::InsufficientTreasury {
                        resource: *resource,
                        requested: *quantity,
                        available,
                    });
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Apply an operation carried by an event.
    ///
    /// Role-dependent operations are re-checked against current state so
    /// that the guild invariants hold whatever peers broadcast. Treasury
    /// deltas are applied without a balance check.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] when the operation is not allowed for the
    /// signer; the registry is left unchanged.
    pub fn apply(
        &mut self,
        ctx: &OpContext,
        guild: GuildId,
        op: &GuildOp,
    ) -> Result<GuildChange, LedgerError> {
        let change = match op {
            GuildOp::Create { name } => {
                if self.guilds.contains_key(&guild) {
                    return Ok(GuildChange::Unchanged);
                }
                let founder = ctx.actor.clone();
                self.guilds.insert(
                    guild,
                    Guild {
                        id: guild,
                        name: name.trim().to_owned(),
                        founder: founder.clone(),
                        members: BTreeSet::from([founder.clone()]),
                        admins: BTreeSet::from([founder]),
                        territory: BTreeSet::new(),
                        treasury: BTreeMap::new(),
                        created_at: ctx.created_at,
                        last_activity: ctx.created_at,
                    },
                );
                debug!(guild = %guild, founder = %ctx.actor, "Guild created");
                return Ok(GuildChange::Created);
            }
            GuildOp::Join => {
                self.require(guild)?;
                let g = self.guild_mut(guild)?;
                changed(g.members.insert(ctx.actor.clone()))
            }
            GuildOp::Leave => {
                let g = self.require(guild)?;
                if g.founder == ctx.actor {
                    return Err(LedgerError::FounderIsPermanent(guild));
                }
                let g = self.guild_mut(guild)?;
                g.admins.remove(&ctx.actor);
                changed(g.members.remove(&ctx.actor))
            }
            GuildOp::Promote { member } => {
                self.require_admin(guild, &ctx.actor)?;
                self.require_member(guild, member)?;
                let g = self.guild_mut(guild)?;
                changed(g.admins.insert(member.clone()))
            }
            GuildOp::Demote { member } => {
                let g = self.require_admin(guild, &ctx.actor)?;
                if &g.founder == member {
                    return Err(LedgerError::FounderIsPermanent(guild));
                }
                let g = self.guild_mut(guild)?;
                changed(g.admins.remove(member))
            }
            GuildOp::Disband => {
                if self.require(guild)?.founder != ctx.actor {
                    return Err(LedgerError::NotFounder(guild));
                }
                self.guilds.remove(&guild);
                debug!(guild = %guild, "Guild disbanded");
                return Ok(GuildChange::Disbanded);
            }
            GuildOp::ClaimTerritory { region } => {
                self.require_admin(guild, &ctx.actor)?;
                let g = self.guild_mut(guild)?;
                changed(g.territory.insert(*region))
            }
            GuildOp::Deposit { resource, quantity } => {
                self.require(guild)?;
                self.record(ctx, guild, TreasuryEntryType::Deposit, *resource, *quantity)?
            }
            GuildOp::Withdraw { resource, quantity } => {
                self.require_member(guild, &ctx.actor)?;
                self.record(ctx, guild, TreasuryEntryType::Withdraw, *resource, *quantity)?
            }
        };

        if change != GuildChange::Unchanged {
            let g = self.guild_mut(guild)?;
            g.last_activity = g.last_activity.max(ctx.created_at);
        }
        Ok(change)
    }

    fn guild_mut(&mut self, guild: GuildId) -> Result<&mut Guild, LedgerError> {
        self.guilds
            .get_mut(&guild)
            .ok_or(LedgerError::GuildNotFound(guild))
    }

    fn record(
        &mut self,
        ctx: &OpContext,
        guild: GuildId,
        entry_type: TreasuryEntryType,
        resource: Resource,
        quantity: Decimal,
    ) -> Result<GuildChange, LedgerError> {
        let entry = TreasuryEntryBuilder::new(guild, entry_type, resource)
            .actor(ctx.actor.clone())
            .quantity(quantity)
            .event(ctx.event, ctx.created_at)
            .build()?;
        let g = self.guild_mut(guild)?;
        let balance = apply_entry(&mut g.treasury, &entry)?;
        debug!(
            guild = %guild,
            actor = %ctx.actor,
            resource = %resource,
            %quantity,
            %balance,
            "Treasury entry applied"
        );
        self.entries.push(entry);
        Ok(GuildChange::Updated)
    }
}

const fn changed(did_change: bool) -> GuildChange {
    if did_change {
        GuildChange::Updated
    } else {
        GuildChange::Unchanged
    }
}
