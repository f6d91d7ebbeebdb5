//! The engine: serialized cross-entity orchestration.
//!
//! `Dominion` owns every registry. All mutation flows through `&mut self`,
//! and exactly one task owns the engine at runtime, so a multi-registry
//! cascade (disband, elimination) always runs to completion before the
//! next operation is examined. Notices accumulate in an internal buffer
//! the host drains and fans out; the engine never waits on observers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dominion_protocol::{
    AreaId, ContainerId, DisbandReason, DominionSnapshot, FactionId, FactionRecord, MemberId,
    Notice, WarEndReason, WarId, ZoneKind,
};
use tracing::error;

use crate::config::EngineOptions;
use crate::error::{ClaimError, FactionError, WarError};
use crate::factions::FactionRegistry;
use crate::members::MemberDirectory;
use crate::territory::AreaRegistry;
use crate::wars::WarRegistry;
use crate::zones::ZoneTracker;

pub struct Dominion {
    pub(crate) options: EngineOptions,
    pub(crate) factions: FactionRegistry,
    pub(crate) territory: AreaRegistry,
    pub(crate) wars: WarRegistry,
    pub(crate) zones: ZoneTracker,
    pub(crate) directory: MemberDirectory,
    pub(crate) notices: VecDeque<Notice>,
}

impl Dominion {
    pub fn new(options: EngineOptions) -> Self {
        let factions = FactionRegistry::new(options.default_tax_rate, options.max_tax_rate);
        let territory = AreaRegistry::new(options.dangerous_zone_labels.clone());
        let wars = WarRegistry::new(options.min_justification_length, options.war_duration());
        Self {
            options,
            factions,
            territory,
            wars,
            zones: ZoneTracker::new(),
            directory: MemberDirectory::new(),
            notices: VecDeque::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn factions(&self) -> &FactionRegistry {
        &self.factions
    }

    pub fn territory(&self) -> &AreaRegistry {
        &self.territory
    }

    pub fn wars(&self) -> &WarRegistry {
        &self.wars
    }

    pub fn zones(&self) -> &ZoneTracker {
        &self.zones
    }

    pub fn directory(&self) -> &MemberDirectory {
        &self.directory
    }

    /// Presence updates arrive from the external user directory.
    pub fn directory_mut(&mut self) -> &mut MemberDirectory {
        &mut self.directory
    }

    pub(crate) fn notify(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }

    /// Take everything emitted since the last drain, in order.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    // --- Faction lifecycle -------------------------------------------------

    pub fn create_faction(
        &mut self,
        id: FactionId,
        description: String,
        owner: MemberId,
    ) -> Result<FactionRecord, FactionError> {
        let record = self.factions.create(id, description, owner.clone())?.clone();
        self.directory.set_faction(&owner, Some(record.id.clone()));
        self.notify(Notice::FactionCreated {
            faction: record.id.clone(),
        });
        Ok(record)
    }

    /// Tear a faction down: territory first, then wars, then members, then
    /// the identity itself. Both other registries validate faction ids, so
    /// they are unwound before the id disappears; each step is idempotent,
    /// making an interrupted cascade safe to rerun.
    pub fn disband(
        &mut self,
        id: &FactionId,
        reason: DisbandReason,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        let roster: Vec<MemberId> = self
            .factions
            .get(id)
            .ok_or_else(|| FactionError::NotFound(id.clone()))?
            .members
            .keys()
            .cloned()
            .collect();

        let areas = self.territory.all_claimed_by(id);
        if !areas.is_empty() {
            for area in &areas {
                self.notices.push_back(Notice::AreaClaimLost {
                    area: area.clone(),
                    faction: id.clone(),
                });
            }
            self.territory.unclaim(&areas);
        }

        for war in self.wars.end_all_for_eliminated_faction(id, now) {
            self.notices.push_back(Notice::WarEnded {
                war: war.id,
                attacker: war.attacker,
                defender: war.defender,
                reason: WarEndReason::Eliminated,
            });
        }

        for member in &roster {
            if self.directory.is_online(member) {
                self.directory.set_faction(member, None);
            }
        }

        self.factions.remove(id);

        self.notify(Notice::FactionDisbanded {
            faction: id.clone(),
            reason,
        });
        self.notify(Notice::FactionsChanged);
        Ok(())
    }

    /// External ruling (admin action, conquest) destroying a faction.
    pub fn eliminate(&mut self, id: &FactionId, now: DateTime<Utc>) -> Result<(), FactionError> {
        self.disband(id, DisbandReason::Eliminated, now)
    }

    // --- Membership --------------------------------------------------------

    pub fn join_faction(
        &mut self,
        id: &FactionId,
        member: MemberId,
    ) -> Result<(), FactionError> {
        self.factions.add_member(id, member.clone())?;
        self.directory.set_faction(&member, Some(id.clone()));
        self.notify(Notice::FactionsChanged);
        Ok(())
    }

    /// Remove a member from whichever faction holds them. An emptied roster
    /// is never stored: the last member leaving disbands the faction.
    pub fn leave_faction(
        &mut self,
        member: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        let faction_id = self
            .factions
            .find_by_member(member)
            .map(|f| f.id.clone())
            .ok_or_else(|| FactionError::NotMember(member.clone()))?;

        let remaining = self.factions.remove_member(&faction_id, member)?;
        self.directory.set_faction(member, None);

        if remaining == 0 {
            self.disband(&faction_id, DisbandReason::Abandoned, now)?;
        } else {
            self.notify(Notice::FactionsChanged);
        }
        Ok(())
    }

    // --- Tax policy --------------------------------------------------------

    pub fn set_tax_rate(&mut self, id: &FactionId, rate: f32) -> Result<(), FactionError> {
        self.factions.set_tax_rate(id, rate)?;
        self.notify(Notice::FactionsChanged);
        Ok(())
    }

    pub fn set_tax_container(
        &mut self,
        id: &FactionId,
        container: Option<ContainerId>,
    ) -> Result<(), FactionError> {
        self.factions.set_tax_container(id, container)?;
        self.notify(Notice::FactionsChanged);
        Ok(())
    }

    /// Pay into a faction treasury (upkeep funding, donations).
    pub fn deposit(&mut self, id: &FactionId, amount: i64) -> Result<i64, FactionError> {
        self.factions.deposit(id, amount)
    }

    // --- Territory ---------------------------------------------------------

    /// Register cells supplied by the spatial grid provider.
    pub fn seed_territory(&mut self, seeds: impl IntoIterator<Item = dominion_protocol::AreaSeed>) {
        self.territory.seed(seeds);
    }

    /// Claim an area for a faction. The cost tier is the faction's current
    /// claim count, debited up front; the first upkeep deadline is one
    /// collection period out.
    pub fn claim(
        &mut self,
        area: &AreaId,
        faction_id: &FactionId,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        let faction = self
            .factions
            .get(faction_id)
            .ok_or_else(|| ClaimError::FactionNotFound(faction_id.clone()))?;
        if faction.member_count() < self.options.min_faction_members {
            return Err(ClaimError::TooFewMembers {
                required: self.options.min_faction_members,
            });
        }
        let treasury = faction.treasury;

        let cell = self
            .territory
            .get(area)
            .ok_or_else(|| ClaimError::AreaNotFound(area.clone()))?;
        if cell.is_claimed() {
            return Err(ClaimError::AlreadyClaimed(area.clone()));
        }

        let cost = self.options.claim_cost(self.territory.claim_count(faction_id));
        let debited = self
            .factions
            .try_debit(faction_id, cost)
            .map_err(|_| ClaimError::FactionNotFound(faction_id.clone()))?;
        if !debited {
            return Err(ClaimError::InsufficientFunds { cost, treasury });
        }

        let due = now + self.options.collection_period();
        self.territory.claim(area, faction_id, now, due)
    }

    /// Batch unclaim by player action. Idempotent per entry.
    pub fn unclaim(&mut self, areas: &[AreaId]) -> Vec<(AreaId, FactionId)> {
        self.territory.unclaim(areas)
    }

    pub fn set_area_name(&mut self, area: &AreaId, name: String) -> Result<(), ClaimError> {
        self.territory
            .set_name(area, name, self.options.min_area_name_length)
    }

    pub fn set_town(&mut self, area: &AreaId, town: bool) -> Result<(), ClaimError> {
        self.territory.set_town(area, town)
    }

    pub fn set_badlands(&mut self, area: &AreaId, badlands: bool) -> Result<(), ClaimError> {
        self.territory.set_badlands(area, badlands)
    }

    // --- Conflict ----------------------------------------------------------

    pub fn declare_war(
        &mut self,
        attacker: &FactionId,
        defender: &FactionId,
        justification: String,
        now: DateTime<Utc>,
    ) -> Result<WarId, WarError> {
        for id in [attacker, defender] {
            if !self.factions.exists(id) {
                return Err(WarError::FactionNotFound(id.clone()));
            }
        }

        let war = self
            .wars
            .declare(attacker.clone(), defender.clone(), justification, now)?;
        let id = war.id.clone();
        self.notify(Notice::WarDeclared {
            war: id.clone(),
            attacker: attacker.clone(),
            defender: defender.clone(),
        });
        Ok(id)
    }

    pub fn surrender(&mut self, war: &WarId, now: DateTime<Utc>) -> Result<(), WarError> {
        let ended = self.wars.end_war(war, WarEndReason::Surrender, now)?;
        self.notify(Notice::WarEnded {
            war: ended.id,
            attacker: ended.attacker,
            defender: ended.defender,
            reason: WarEndReason::Surrender,
        });
        Ok(())
    }

    pub fn create_zone(&mut self, area: AreaId, kind: ZoneKind, now: DateTime<Utc>) {
        let lifespan = self.options.zone_lifespan();
        self.zones.create(area, kind, now, lifespan);
    }

    // --- Scheduler entry point ---------------------------------------------

    /// One scheduler tick: upkeep collection, war timeouts, zone expiry.
    /// Per-entity failures are independent; one faction's default never
    /// aborts the sweep for the rest.
    pub fn run_sweep(&mut self, now: DateTime<Utc>) {
        self.run_upkeep(now);

        for war in self.wars.expire_timed_out(now) {
            self.notices.push_back(Notice::WarEnded {
                war: war.id,
                attacker: war.attacker,
                defender: war.defender,
                reason: WarEndReason::Timeout,
            });
        }

        for zone in self.zones.expire(now) {
            self.notices.push_back(Notice::ZoneExpired {
                area: zone.area,
                kind: zone.kind,
            });
        }
    }

    // --- Persistence -------------------------------------------------------

    pub fn serialize(&self) -> DominionSnapshot {
        DominionSnapshot {
            factions: self.factions.serialize(),
            areas: self.territory.serialize(),
            wars: self.wars.serialize(),
            zones: self.zones.serialize(),
        }
    }

    /// Restore from a snapshot. Idempotent; emits no creation notices.
    /// Call `reconcile` afterwards to enforce referential integrity.
    pub fn initialize(&mut self, snapshot: DominionSnapshot) {
        self.factions.initialize(snapshot.factions);
        self.territory.initialize(snapshot.areas);
        self.wars.initialize(snapshot.wars);
        self.zones.initialize(snapshot.zones);
    }

    /// Verify no area or war references a nonexistent faction and
    /// force-correct any found. Such references mean a cascade was
    /// interrupted; they are logged as the fatal case and healed.
    pub fn reconcile(&mut self, now: DateTime<Utc>) -> usize {
        let mut corrections = 0;

        let dangling: Vec<AreaId> = self
            .territory
            .all()
            .filter(|a| {
                a.owner
                    .as_ref()
                    .is_some_and(|owner| !self.factions.exists(owner))
            })
            .map(|a| a.id.clone())
            .collect();
        if !dangling.is_empty() {
            error!(
                count = dangling.len(),
                "invariant violation: areas owned by nonexistent factions, force-unclaiming"
            );
            corrections += self.territory.unclaim(&dangling).len();
        }

        let orphaned: Vec<WarId> = self
            .wars
            .active_wars()
            .filter(|w| !self.factions.exists(&w.attacker) || !self.factions.exists(&w.defender))
            .map(|w| w.id.clone())
            .collect();
        for id in orphaned {
            error!(war = %id, "invariant violation: war references nonexistent faction, force-ending");
            if self.wars.end_war(&id, WarEndReason::Eliminated, now).is_ok() {
                corrections += 1;
            }
        }

        corrections
    }

    /// Release all in-memory state. Process shutdown only.
    pub fn teardown_all(&mut self) {
        self.factions.teardown_all();
        self.territory.teardown_all();
        self.wars.teardown_all();
        self.zones.teardown_all();
        self.notices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dominion_protocol::AreaSeed;

    const JUSTIFICATION: &str =
        "Your raiders burned our outpost at the northern ridge and took the harvest.";

    fn engine() -> Dominion {
        let mut options = EngineOptions::default();
        options.min_faction_members = 1;
        let mut dominion = Dominion::new(options);
        dominion.territory_seed(["A7", "B3", "C1"]);
        dominion
    }

    impl Dominion {
        fn territory_seed<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
            self.seed_territory(ids.into_iter().map(|id| AreaSeed {
                id: id.into(),
                labels: vec![],
            }));
        }

        fn create_funded(&mut self, id: &str, owner: &str, funds: i64) {
            self.create_faction(id.into(), String::new(), owner.into())
                .unwrap();
            self.deposit(&id.into(), funds).unwrap();
        }
    }

    #[test]
    fn first_claim_is_free_then_tiers_climb() {
        let mut dominion = engine();
        let now = Utc::now();
        dominion.create_funded("reds", "u1", 50);

        // Tier 0 costs 0: succeeds on an empty treasury margin.
        dominion.claim(&"A7".into(), &"reds".into(), now).unwrap();
        assert_eq!(
            dominion.territory().get(&"A7".into()).unwrap().owner,
            Some(FactionId::new("reds"))
        );

        // Second claim reads tier 1 (100) and the treasury holds 50.
        let err = dominion.claim(&"B3".into(), &"reds".into(), now).unwrap_err();
        assert_eq!(
            err,
            ClaimError::InsufficientFunds {
                cost: 100,
                treasury: 50
            }
        );

        dominion.deposit(&"reds".into(), 50).unwrap();
        dominion.claim(&"B3".into(), &"reds".into(), now).unwrap();
        assert_eq!(dominion.factions().get(&"reds".into()).unwrap().treasury, 0);
    }

    #[test]
    fn min_member_gate_on_claims() {
        let mut options = EngineOptions::default();
        options.min_faction_members = 2;
        let mut dominion = Dominion::new(options);
        dominion.territory_seed(["A7"]);
        dominion.create_funded("reds", "u1", 1000);

        assert_eq!(
            dominion.claim(&"A7".into(), &"reds".into(), Utc::now()),
            Err(ClaimError::TooFewMembers { required: 2 })
        );

        dominion.join_faction(&"reds".into(), "u2".into()).unwrap();
        dominion.claim(&"A7".into(), &"reds".into(), Utc::now()).unwrap();
    }

    #[test]
    fn disband_cascade_clears_territory_wars_and_members() {
        let mut dominion = engine();
        let now = Utc::now();
        dominion.create_funded("reds", "u1", 1000);
        dominion.create_funded("blues", "u2", 1000);
        dominion.join_faction(&"reds".into(), "u3".into()).unwrap();
        dominion.directory_mut().connect("u3".into(), Some("reds".into()));

        dominion.claim(&"A7".into(), &"reds".into(), now).unwrap();
        dominion.claim(&"B3".into(), &"reds".into(), now).unwrap();
        let war = dominion
            .declare_war(&"blues".into(), &"reds".into(), JUSTIFICATION.into(), now)
            .unwrap();
        dominion.drain_notices();

        dominion.disband(&"reds".into(), DisbandReason::Eliminated, now).unwrap();

        // Territory released.
        assert!(dominion.territory().get(&"A7".into()).unwrap().owner.is_none());
        assert!(dominion.territory().get(&"B3".into()).unwrap().owner.is_none());
        // War forced terminal in the same cascade.
        let record = dominion.wars().get(&war).unwrap();
        assert_eq!(record.end_reason, Some(WarEndReason::Eliminated));
        // Online member affiliation cleared, identity gone.
        assert_eq!(dominion.directory().faction_of(&"u3".into()), None);
        assert!(!dominion.factions().exists(&"reds".into()));

        // Per-area losses precede the disband/changed notices.
        let notices = dominion.drain_notices();
        let losses = notices
            .iter()
            .filter(|n| matches!(n, Notice::AreaClaimLost { .. }))
            .count();
        assert_eq!(losses, 2);
        assert!(matches!(
            notices.last(),
            Some(Notice::FactionsChanged)
        ));
        assert!(notices
            .iter()
            .any(|n| matches!(n, Notice::FactionDisbanded { faction, .. } if *faction == FactionId::new("reds"))));
    }

    #[test]
    fn last_member_leaving_disbands() {
        let mut dominion = engine();
        let now = Utc::now();
        dominion.create_funded("reds", "u1", 0);
        dominion.claim(&"A7".into(), &"reds".into(), now).unwrap();

        dominion.leave_faction(&"u1".into(), now).unwrap();

        assert!(!dominion.factions().exists(&"reds".into()));
        assert!(dominion.territory().get(&"A7".into()).unwrap().owner.is_none());
        assert!(dominion.drain_notices().iter().any(|n| matches!(
            n,
            Notice::FactionDisbanded {
                reason: DisbandReason::Abandoned,
                ..
            }
        )));
    }

    #[test]
    fn war_requires_both_factions() {
        let mut dominion = engine();
        dominion.create_funded("reds", "u1", 0);

        let err = dominion
            .declare_war(&"reds".into(), &"ghosts".into(), JUSTIFICATION.into(), Utc::now())
            .unwrap_err();
        assert_eq!(err, WarError::FactionNotFound("ghosts".into()));
    }

    #[test]
    fn reconcile_heals_dangling_references() {
        let mut dominion = engine();
        let now = Utc::now();
        dominion.create_funded("reds", "u1", 0);
        dominion.create_funded("blues", "u2", 0);
        dominion.claim(&"A7".into(), &"reds".into(), now).unwrap();
        dominion
            .declare_war(&"reds".into(), &"blues".into(), JUSTIFICATION.into(), now)
            .unwrap();

        // Simulate an interrupted cascade: restore a snapshot where the
        // faction records vanished but territory and wars survived.
        let mut snapshot = dominion.serialize();
        snapshot.factions.retain(|f| f.id != FactionId::new("reds"));
        dominion.initialize(snapshot);

        let corrections = dominion.reconcile(now);
        assert_eq!(corrections, 2);
        assert!(dominion.territory().get(&"A7".into()).unwrap().owner.is_none());
        assert_eq!(dominion.wars().active_wars().count(), 0);

        // A clean state needs no corrections.
        assert_eq!(dominion.reconcile(now), 0);
    }

    #[test]
    fn snapshot_round_trip_restores_everything() {
        let mut dominion = engine();
        let now = Utc::now();
        dominion.create_funded("reds", "u1", 500);
        dominion.claim(&"A7".into(), &"reds".into(), now).unwrap();
        dominion.create_zone("A7".into(), ZoneKind::Raid, now);

        let snapshot = dominion.serialize();
        let mut restored = engine();
        restored.initialize(snapshot);
        restored.drain_notices();

        assert!(restored.factions().exists(&"reds".into()));
        assert_eq!(restored.territory().claim_count(&"reds".into()), 1);
        assert_eq!(restored.zones().active().count(), 1);
        // Restore is not creation: no notices were emitted.
        assert!(restored.drain_notices().is_empty());
    }
}
