/// Flower regeneration.

use std::sync::atomic::{AtomicI64, Ordering};

use bevy::prelude::*;

use crate::colony::nectar::{per_tick, Nectar};
use crate::colony::pools::Flower;
use crate::colony::profiling::profile;
use crate::colony::simulation::resources::{RegenerationLedger, SimConfig};

/// Refills every flower toward its capacity and books what was actually added.
#[profile(2000)]
pub fn regenerate_flowers(
    mut flowers: Query<&mut Flower>,
    config: Res<SimConfig>,
    mut ledger: ResMut<RegenerationLedger>,
) {
    let amount = per_tick(config.regeneration_rate, config.delta_seconds());
    if amount <= Nectar::ZERO {
        ledger.last_tick = Nectar::ZERO;
        return;
    }

    // Raw fixed-point bits, so the atomic sum is exact
    let added = AtomicI64::new(0);
    for_each_agent!(config.execution_mode, flowers, |mut flower| {
        // Full flowers are skipped to keep change detection quiet
        if flower.amount < flower.capacity {
            let gained = flower.regenerate(amount);
            added.fetch_add(gained.to_bits(), Ordering::Relaxed);
        }
    });

    let added = Nectar::from_bits(added.into_inner());
    ledger.last_tick = added;
    ledger.total += added;
}
