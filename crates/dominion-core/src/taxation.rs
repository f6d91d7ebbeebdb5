//! Taxation of economic activity on claimed territory, plus the policy
//! values (gather/decay/defensive bonuses) other subsystems apply.

use dominion_protocol::{AreaId, FactionId, Notice};
use tracing::error;

use crate::engine::Dominion;

impl Dominion {
    /// Tax one economic event tied to a territory cell. Returns the amount
    /// routed into the owning faction's treasury; zero when the cell is
    /// unclaimed, taxation is disabled, or the rate rounds to nothing.
    ///
    /// Rate changes take effect for subsequent events only.
    pub fn collect_tax(&mut self, area: &AreaId, amount: i64) -> i64 {
        if !self.options.enable_taxation || amount <= 0 {
            return 0;
        }
        let Some(owner) = self.territory.get(area).and_then(|a| a.owner.clone()) else {
            return 0;
        };
        let Some(faction) = self.factions.get(&owner) else {
            error!(
                area = %area,
                faction = %owner,
                "invariant violation: taxed area owned by nonexistent faction"
            );
            return 0;
        };

        let tax = (amount as f64 * f64::from(faction.tax_rate)) as i64;
        if tax <= 0 {
            return 0;
        }

        let container = faction.tax_container;
        if self.factions.deposit(&owner, tax).is_err() {
            return 0;
        }
        self.notify(Notice::TaxCollected {
            faction: owner,
            container,
            amount: tax,
        });
        tax
    }

    /// Gather-rate multiplier for activity on a cell.
    pub fn gather_bonus(&self, area: &AreaId) -> f32 {
        let Some(record) = self.territory.get(area) else {
            return 0.0;
        };
        if record.town && self.options.enable_towns {
            self.options.town_gather_bonus
        } else if record.is_claimed() {
            self.options.claimed_land_gather_bonus
        } else if record.badlands && self.options.enable_badlands {
            self.options.badlands_gather_bonus
        } else {
            0.0
        }
    }

    /// Structure-decay reduction for a cell.
    pub fn decay_reduction(&self, area: &AreaId) -> f32 {
        if !self.options.enable_decay_reduction {
            return 0.0;
        }
        let Some(record) = self.territory.get(area) else {
            return 0.0;
        };
        if record.town && self.options.enable_towns {
            self.options.town_decay_reduction
        } else if record.is_claimed() {
            self.options.claimed_land_decay_reduction
        } else {
            0.0
        }
    }

    /// Defensive bonus magnitude for a faction, tiered by how much land it
    /// holds. Consumed by the combat subsystem; never applied here.
    pub fn defensive_bonus(&self, faction: &FactionId) -> f32 {
        self.options
            .defensive_bonus(self.territory.claim_count(faction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineOptions;
    use chrono::Utc;
    use dominion_protocol::{AreaSeed, ContainerId};

    fn engine() -> Dominion {
        let mut options = EngineOptions::default();
        options.min_faction_members = 1;
        let mut dominion = Dominion::new(options);
        dominion.territory.seed([
            AreaSeed { id: "A7".into(), labels: vec![] },
            AreaSeed { id: "C1".into(), labels: vec![] },
        ]);
        dominion
            .create_faction("reds".into(), String::new(), "u1".into())
            .unwrap();
        dominion.claim(&"A7".into(), &"reds".into(), Utc::now()).unwrap();
        dominion.drain_notices();
        dominion
    }

    #[test]
    fn tax_routes_into_the_treasury() {
        let mut dominion = engine();
        dominion
            .set_tax_container(&"reds".into(), Some(ContainerId(9)))
            .unwrap();
        dominion.drain_notices();

        // Default rate 0.1 on a 250 event.
        let collected = dominion.collect_tax(&"A7".into(), 250);
        assert_eq!(collected, 25);
        assert_eq!(dominion.factions.get(&"reds".into()).unwrap().treasury, 25);

        let notices = dominion.drain_notices();
        assert!(matches!(
            notices.as_slice(),
            [Notice::TaxCollected {
                container: Some(ContainerId(9)),
                amount: 25,
                ..
            }]
        ));
    }

    #[test]
    fn unclaimed_cells_are_never_taxed() {
        let mut dominion = engine();
        assert_eq!(dominion.collect_tax(&"C1".into(), 250), 0);
        assert_eq!(dominion.factions.get(&"reds".into()).unwrap().treasury, 0);
        assert!(dominion.drain_notices().is_empty());
    }

    #[test]
    fn rate_changes_apply_to_subsequent_events_only() {
        let mut dominion = engine();
        assert_eq!(dominion.collect_tax(&"A7".into(), 100), 10);

        dominion.set_tax_rate(&"reds".into(), 0.2).unwrap();
        assert_eq!(dominion.collect_tax(&"A7".into(), 100), 20);
        // No retroactive recomputation of the earlier event.
        assert_eq!(dominion.factions.get(&"reds".into()).unwrap().treasury, 30);
    }

    #[test]
    fn toggle_disables_collection() {
        let mut dominion = engine();
        dominion.options.enable_taxation = false;
        assert_eq!(dominion.collect_tax(&"A7".into(), 1000), 0);
    }

    #[test]
    fn policy_bonuses_follow_classification() {
        let mut dominion = engine();

        assert_eq!(dominion.gather_bonus(&"A7".into()), 0.1);
        assert_eq!(dominion.decay_reduction(&"A7".into()), 0.5);
        assert_eq!(dominion.gather_bonus(&"C1".into()), 0.0);

        dominion.set_town(&"A7".into(), true).unwrap();
        assert_eq!(dominion.decay_reduction(&"A7".into()), 1.0);

        dominion.set_badlands(&"C1".into(), true).unwrap();
        assert_eq!(dominion.gather_bonus(&"C1".into()), 0.1);

        // One claimed area puts the faction on the middle defense tier.
        assert_eq!(dominion.defensive_bonus(&"reds".into()), 0.5);
    }
}
