//! Actor inventory operations.
//!
//! Inventories are plain `Resource -> u32` maps. All arithmetic is checked:
//! no silent overflows, no panics.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use relayworld_types::Resource;

use crate::error::LedgerError;

/// Quantity of `resource` held.
pub fn quantity(inventory: &BTreeMap<Resource, u32>, resource: Resource) -> u32 {
    inventory.get(&resource).copied().unwrap_or(0)
}

/// Whether the inventory contains at least `amount` of `resource`.
pub fn has_resource(inventory: &BTreeMap<Resource, u32>, resource: Resource, amount: u32) -> bool {
    quantity(inventory, resource) >= amount
}

/// Whether the inventory covers every line of `cost`.
pub fn can_afford(inventory: &BTreeMap<Resource, u32>, cost: &BTreeMap<Resource, u32>) -> bool {
    cost.iter()
        .all(|(resource, amount)| has_resource(inventory, *resource, *amount))
}

/// Add `amount` units of `resource`.
///
/// # Errors
///
/// Returns [`LedgerError::ArithmeticOverflow`] if the quantity would
/// exceed `u32::MAX`.
pub fn add_resource(
    inventory: &mut BTreeMap<Resource, u32>,
    resource: Resource,
    amount: u32,
) -> Result<(), LedgerError> {
    let entry = inventory.entry(resource).or_insert(0);
    *entry = entry
        .checked_add(amount)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    Ok(())
}

/// Remove `amount` units of `resource`. Entries that reach zero are dropped.
///
/// # Errors
///
/// Returns [`LedgerError::InsufficientResource`] if fewer than `amount`
/// units are held.
pub fn remove_resource(
    inventory: &mut BTreeMap<Resource, u32>,
    resource: Resource,
    amount: u32,
) -> Result<(), LedgerError> {
    let available = quantity(inventory, resource);
    let remaining = available
        .checked_sub(amount)
        .ok_or(LedgerError::InsufficientResource {
            resource,
            required: amount,
            available,
        })?;
    if remaining == 0 {
        inventory.remove(&resource);
    } else {
        inventory.insert(resource, remaining);
    }
    Ok(())
}

/// Remove every line of `cost`, or nothing at all if any line is short.
///
/// # Errors
///
/// Returns [`LedgerError::InsufficientResource`] for the first short line.
pub fn consume(
    inventory: &mut BTreeMap<Resource, u32>,
    cost: &BTreeMap<Resource, u32>,
) -> Result<(), LedgerError> {
    if let Some((resource, amount)) = cost
        .iter()
        .find(|(resource, amount)| !has_resource(inventory, **resource, **amount))
    {
        return Err(LedgerError::InsufficientResource {
            resource: *resource,
            required: *amount,
            available: quantity(inventory, *resource),
        });
    }
    for (resource, amount) in cost {
        remove_resource(inventory, *resource, *amount)?;
    }
    Ok(())
}

/// Convert a treasury quantity into whole inventory units.
///
/// # Errors
///
/// Returns [`LedgerError::NonPositiveQuantity`] or
/// [`LedgerError::FractionalQuantity`].
pub fn whole_units(quantity: Decimal) -> Result<u32, LedgerError> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveQuantity { quantity });
    }
    if !quantity.fract().is_zero() {
        return Err(LedgerError::FractionalQuantity { quantity });
    }
    quantity
        .to_u32()
        .ok_or(LedgerError::FractionalQuantity { quantity })
}
