//! Scheduled upkeep collection and default eviction.
//!
//! The dominant source of background mutation. Eviction goes through the
//! same `unclaim` entry point as player-triggered unclaims; there is no
//! parallel path that could drift from the territory invariants.

use chrono::{DateTime, Utc};
use dominion_protocol::{AreaId, FactionId, Notice};
use tracing::{debug, error, warn};

use crate::engine::Dominion;

impl Dominion {
    /// Collect upkeep for every claimed area past its due stamp.
    ///
    /// The debit is non-blocking: an underfunded faction fails fast into
    /// the grace window instead of holding the sweep. Payment any time
    /// inside the window settles the arrears on the next tick.
    pub(crate) fn run_upkeep(&mut self, now: DateTime<Utc>) {
        if !self.options.enable_upkeep {
            return;
        }

        let period = self.options.collection_period();
        let grace = self.options.grace_period();

        let due: Vec<(AreaId, FactionId)> = self
            .territory
            .all()
            .filter_map(|a| match (&a.owner, a.upkeep_due) {
                (Some(owner), Some(due)) if due <= now => Some((a.id.clone(), owner.clone())),
                _ => None,
            })
            .collect();

        for (area_id, owner) in due {
            if !self.factions.exists(&owner) {
                error!(
                    area = %area_id,
                    faction = %owner,
                    "invariant violation: area owned by nonexistent faction, force-unclaiming"
                );
                self.territory.unclaim(std::slice::from_ref(&area_id));
                continue;
            }

            let claim_count = self.territory.claim_count(&owner);
            let cost = self.options.upkeep_cost(claim_count.saturating_sub(1));
            let paid = self.factions.try_debit(&owner, cost).unwrap_or(false);

            if paid {
                if let Some(area) = self.territory.get_mut(&area_id) {
                    if area.default_since.take().is_some() {
                        debug!(area = %area_id, faction = %owner, "upkeep arrears settled");
                    }
                    area.upkeep_due = area.upkeep_due.map(|d| d + period);
                }
                debug!(area = %area_id, faction = %owner, cost, "upkeep collected");
                continue;
            }

            let default_since = self.territory.get(&area_id).and_then(|a| a.default_since);
            match default_since {
                None => {
                    if let Some(area) = self.territory.get_mut(&area_id) {
                        area.default_since = Some(now);
                    }
                    let grace_until = now + grace;
                    warn!(area = %area_id, faction = %owner, cost, "upkeep default, grace window started");
                    self.notify(Notice::UpkeepDefaulted {
                        area: area_id,
                        faction: owner,
                        grace_until,
                    });
                }
                Some(since) if now - since >= grace => {
                    warn!(area = %area_id, faction = %owner, "grace window elapsed unpaid, evicting claim");
                    self.territory.unclaim(std::slice::from_ref(&area_id));
                    self.notify(Notice::AreaEvicted {
                        area: area_id,
                        faction: owner,
                    });
                }
                // Still inside the grace window; the default notice already
                // went out once.
                Some(_) => {}
            }
        }
    }
}
