//! Fire simulation: random road closures on a seeded RNG
//!
//! Each simulated fire starts from a clean network (every closure reopened)
//! and then closes a number of distinct random raw edges.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use crate::ch::UpdateOutcome;
use crate::error::Result;
use crate::router::Router;

#[derive(Debug, Clone, Serialize)]
pub struct RoadUpdate {
    pub from: String,
    pub to: String,
    pub outcome: UpdateOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct FireReport {
    pub seed: u64,
    pub reopened: Vec<RoadUpdate>,
    pub closed: Vec<RoadUpdate>,
}

impl FireReport {
    /// Updates that fell back to a full rebuild
    pub fn rebuilds(&self) -> usize {
        self.reopened
            .iter()
            .chain(&self.closed)
            .filter(|u| matches!(u.outcome, UpdateOutcome::RebuildRequired { .. }))
            .count()
    }
}

/// Reopen every closed edge
pub fn reset_closures(router: &Router) -> Result<Vec<RoadUpdate>> {
    let mut updates = Vec::new();
    for (from, to) in router.edge_pairs(true) {
        let outcome = router.set_closed(&from, &to, false)?;
        updates.push(RoadUpdate { from, to, outcome });
    }
    Ok(updates)
}

/// Reset all closures, then close `roads` distinct random edges
pub fn simulate_fire(router: &Router, roads: usize, seed: u64) -> Result<FireReport> {
    let reopened = reset_closures(router)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut candidates = router.edge_pairs(false);
    candidates.shuffle(&mut rng);
    candidates.truncate(roads);

    let mut closed = Vec::with_capacity(candidates.len());
    for (from, to) in candidates {
        let outcome = router.set_closed(&from, &to, true)?;
        closed.push(RoadUpdate { from, to, outcome });
    }

    let report = FireReport {
        seed,
        reopened,
        closed,
    };
    info!(
        seed,
        reopened = report.reopened.len(),
        closed = report.closed.len(),
        rebuilds = report.rebuilds(),
        "fire simulated"
    );
    Ok(report)
}
