//! Faction registry: identity anchor for everything else in the engine.
//!
//! Owns faction records and their member rosters. Cross-registry teardown
//! (disband, elimination) is orchestrated by the engine; the registry
//! itself only ever mutates its own storage.

use std::collections::{BTreeMap, HashMap};

use dominion_protocol::{ContainerId, FactionId, FactionRecord, MemberId, Role};
use tracing::{info, warn};

use crate::error::FactionError;

/// All factions, keyed by their unique id.
#[derive(Debug)]
pub struct FactionRegistry {
    factions: HashMap<FactionId, FactionRecord>,
    default_tax_rate: f32,
    max_tax_rate: f32,
}

impl FactionRegistry {
    pub fn new(default_tax_rate: f32, max_tax_rate: f32) -> Self {
        Self {
            factions: HashMap::new(),
            default_tax_rate,
            max_tax_rate,
        }
    }

    /// Register a new faction with `owner` as its sole member.
    pub fn create(
        &mut self,
        id: FactionId,
        description: String,
        owner: MemberId,
    ) -> Result<&FactionRecord, FactionError> {
        if self.factions.contains_key(&id) {
            return Err(FactionError::AlreadyExists(id));
        }
        if self.find_by_member(&owner).is_some() {
            return Err(FactionError::AlreadyMember(owner));
        }

        let record = FactionRecord {
            id: id.clone(),
            description,
            owner: owner.clone(),
            members: BTreeMap::from([(owner, Role::Owner)]),
            tax_rate: self.default_tax_rate,
            tax_container: None,
            treasury: 0,
        };

        info!(faction = %id, "faction created");
        Ok(self.factions.entry(id).or_insert(record))
    }

    pub fn get(&self, id: &FactionId) -> Option<&FactionRecord> {
        self.factions.get(id)
    }

    pub fn exists(&self, id: &FactionId) -> bool {
        self.factions.contains_key(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &FactionRecord> {
        self.factions.values()
    }

    pub fn len(&self) -> usize {
        self.factions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factions.is_empty()
    }

    /// A member belongs to at most one faction, so the first match is the
    /// only match.
    pub fn find_by_member(&self, member: &MemberId) -> Option<&FactionRecord> {
        self.factions.values().find(|f| f.has_member(member))
    }

    /// Resolve the faction owning a tax container. Two factions sharing a
    /// container means the registries have diverged; that surfaces as the
    /// fatal case rather than picking one arbitrarily.
    pub fn find_by_tax_container(
        &self,
        container: ContainerId,
    ) -> Result<Option<&FactionRecord>, FactionError> {
        let mut matches = self
            .factions
            .values()
            .filter(|f| f.tax_container == Some(container));

        let first = matches.next();
        if let Some(second) = matches.next() {
            let first = first.map(|f| f.id.clone()).unwrap_or_else(|| FactionId::new("?"));
            return Err(FactionError::InvariantViolation(format!(
                "tax container {container} claimed by both `{first}` and `{}`",
                second.id
            )));
        }
        Ok(first)
    }

    pub fn set_tax_rate(&mut self, id: &FactionId, rate: f32) -> Result<(), FactionError> {
        if !(0.0..=self.max_tax_rate).contains(&rate) {
            return Err(FactionError::OutOfRange {
                rate,
                max: self.max_tax_rate,
            });
        }
        let faction = self.get_mut(id)?;
        faction.tax_rate = rate;
        Ok(())
    }

    /// Reassign the collection point. Uniqueness is not checked eagerly;
    /// `find_by_tax_container` catches a conflicting assignment lazily.
    pub fn set_tax_container(
        &mut self,
        id: &FactionId,
        container: Option<ContainerId>,
    ) -> Result<(), FactionError> {
        self.get_mut(id)?.tax_container = container;
        Ok(())
    }

    /// Add a member to a roster. Members belong to at most one faction.
    pub fn add_member(&mut self, id: &FactionId, member: MemberId) -> Result<(), FactionError> {
        if self.find_by_member(&member).is_some() {
            return Err(FactionError::AlreadyMember(member));
        }
        self.get_mut(id)?.members.insert(member, Role::Member);
        Ok(())
    }

    /// Remove a member, returning the remaining roster size. Removing the
    /// owner promotes another member so the owner reference never dangles;
    /// the engine disbands the faction when the roster empties.
    pub fn remove_member(
        &mut self,
        id: &FactionId,
        member: &MemberId,
    ) -> Result<usize, FactionError> {
        let faction = self.get_mut(id)?;
        if faction.members.remove(member).is_none() {
            return Err(FactionError::NotMember(member.clone()));
        }

        if faction.owner == *member {
            let successor = faction
                .members
                .iter()
                .find(|(_, role)| **role == Role::Manager)
                .or_else(|| faction.members.iter().next())
                .map(|(m, _)| m.clone());
            if let Some(successor) = successor {
                info!(faction = %id, new_owner = %successor, "ownership transferred");
                faction.members.insert(successor.clone(), Role::Owner);
                faction.owner = successor;
            }
        }

        Ok(faction.members.len())
    }

    /// Change a member's role. Promoting to `Owner` demotes the previous
    /// owner to `Manager` so exactly one owner exists at all times.
    pub fn set_role(
        &mut self,
        id: &FactionId,
        member: &MemberId,
        role: Role,
    ) -> Result<(), FactionError> {
        let faction = self.get_mut(id)?;
        if !faction.members.contains_key(member) {
            return Err(FactionError::NotMember(member.clone()));
        }

        if role == Role::Owner && faction.owner != *member {
            let previous = faction.owner.clone();
            faction.members.insert(previous, Role::Manager);
            faction.owner = member.clone();
        }
        faction.members.insert(member.clone(), role);
        Ok(())
    }

    pub fn deposit(&mut self, id: &FactionId, amount: i64) -> Result<i64, FactionError> {
        let faction = self.get_mut(id)?;
        faction.treasury = faction.treasury.saturating_add(amount);
        Ok(faction.treasury)
    }

    /// Non-blocking debit: `Ok(true)` when the treasury covered the amount,
    /// `Ok(false)` when it did not (balance untouched).
    pub fn try_debit(&mut self, id: &FactionId, amount: i64) -> Result<bool, FactionError> {
        let faction = self.get_mut(id)?;
        if faction.treasury < amount {
            return Ok(false);
        }
        faction.treasury -= amount;
        Ok(true)
    }

    /// Remove a faction record outright. Only the engine's disband cascade
    /// calls this, after territory and wars have been unwound.
    pub(crate) fn remove(&mut self, id: &FactionId) -> Option<FactionRecord> {
        self.factions.remove(id)
    }

    /// Bulk restore from persisted records. Idempotent; emits no creation
    /// notices, distinguishing restore from create.
    pub fn initialize(&mut self, records: Vec<FactionRecord>) {
        info!(count = records.len(), "restoring faction records");
        self.factions.clear();
        for record in records {
            if self.factions.contains_key(&record.id) {
                warn!(faction = %record.id, "duplicate faction record skipped");
                continue;
            }
            self.factions.insert(record.id.clone(), record);
        }
    }

    pub fn serialize(&self) -> Vec<FactionRecord> {
        self.factions.values().cloned().collect()
    }

    /// Release all in-memory faction state. Process shutdown only.
    pub fn teardown_all(&mut self) {
        info!(count = self.factions.len(), "releasing faction records");
        self.factions.clear();
    }

    fn get_mut(&mut self, id: &FactionId) -> Result<&mut FactionRecord, FactionError> {
        self.factions
            .get_mut(id)
            .ok_or_else(|| FactionError::NotFound(id.clone()))
    }
}
