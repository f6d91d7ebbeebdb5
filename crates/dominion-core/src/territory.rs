//! Territory registry: claim state for every map cell the grid provider
//! exposes.
//!
//! Cells reference their owning faction by id only. The registry never
//! consults the faction registry itself; the engine validates faction
//! existence and treasury before a claim lands here.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use dominion_protocol::{AreaId, AreaRecord, AreaSeed, FactionId};
use tracing::{info, warn};

use crate::error::ClaimError;

#[derive(Debug)]
pub struct AreaRegistry {
    areas: HashMap<AreaId, AreaRecord>,
    dangerous_labels: BTreeSet<String>,
}

impl AreaRegistry {
    pub fn new(dangerous_labels: BTreeSet<String>) -> Self {
        Self {
            areas: HashMap::new(),
            dangerous_labels,
        }
    }

    /// Register cells supplied by the spatial grid provider. Cells already
    /// known keep their claim state; only labels are refreshed.
    pub fn seed(&mut self, seeds: impl IntoIterator<Item = AreaSeed>) {
        for seed in seeds {
            match self.areas.get_mut(&seed.id) {
                Some(area) => area.labels = seed.labels,
                None => {
                    self.areas.insert(
                        seed.id.clone(),
                        AreaRecord {
                            id: seed.id,
                            owner: None,
                            name: None,
                            claimed_at: None,
                            upkeep_due: None,
                            default_since: None,
                            town: false,
                            badlands: false,
                            labels: seed.labels,
                        },
                    );
                }
            }
        }
    }

    pub fn get(&self, id: &AreaId) -> Option<&AreaRecord> {
        self.areas.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &AreaRecord> {
        self.areas.values()
    }

    /// Stamp ownership on an unclaimed cell. Cost and treasury are the
    /// engine's concern; `due` is the first upkeep deadline.
    pub fn claim(
        &mut self,
        id: &AreaId,
        faction: &FactionId,
        now: DateTime<Utc>,
        due: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        let area = self
            .areas
            .get_mut(id)
            .ok_or_else(|| ClaimError::AreaNotFound(id.clone()))?;
        if area.owner.is_some() {
            return Err(ClaimError::AlreadyClaimed(id.clone()));
        }

        area.owner = Some(faction.clone());
        area.claimed_at = Some(now);
        area.upkeep_due = Some(due);
        area.default_since = None;
        info!(area = %id, faction = %faction, "area claimed");
        Ok(())
    }

    /// Batch unclaim. Already-unclaimed and unknown entries are per-entry
    /// no-ops so a disband cascade can never partially fail. Returns the
    /// (area, previous owner) pairs that actually changed.
    pub fn unclaim(&mut self, ids: &[AreaId]) -> Vec<(AreaId, FactionId)> {
        let mut released = Vec::new();
        for id in ids {
            let Some(area) = self.areas.get_mut(id) else {
                warn!(area = %id, "unclaim of unknown area ignored");
                continue;
            };
            let Some(owner) = area.owner.take() else {
                continue;
            };
            area.name = None;
            area.town = false;
            area.claimed_at = None;
            area.upkeep_due = None;
            area.default_since = None;
            released.push((id.clone(), owner));
        }
        released
    }

    pub fn all_claimed_by(&self, faction: &FactionId) -> Vec<AreaId> {
        self.areas
            .values()
            .filter(|a| a.owner.as_ref() == Some(faction))
            .map(|a| a.id.clone())
            .collect()
    }

    pub fn claim_count(&self, faction: &FactionId) -> usize {
        self.areas
            .values()
            .filter(|a| a.owner.as_ref() == Some(faction))
            .count()
    }

    /// Owner-assigned display name, bounded below by configuration.
    pub fn set_name(
        &mut self,
        id: &AreaId,
        name: String,
        min_len: usize,
    ) -> Result<(), ClaimError> {
        if name.chars().count() < min_len {
            return Err(ClaimError::NameTooShort { min: min_len });
        }
        let area = self
            .areas
            .get_mut(id)
            .ok_or_else(|| ClaimError::AreaNotFound(id.clone()))?;
        if area.owner.is_none() {
            return Err(ClaimError::NotClaimed(id.clone()));
        }
        area.name = Some(name);
        Ok(())
    }

    pub fn set_town(&mut self, id: &AreaId, town: bool) -> Result<(), ClaimError> {
        let area = self
            .areas
            .get_mut(id)
            .ok_or_else(|| ClaimError::AreaNotFound(id.clone()))?;
        if town && area.owner.is_none() {
            return Err(ClaimError::NotClaimed(id.clone()));
        }
        area.town = town;
        Ok(())
    }

    pub fn set_badlands(&mut self, id: &AreaId, badlands: bool) -> Result<(), ClaimError> {
        self.areas
            .get_mut(id)
            .ok_or_else(|| ClaimError::AreaNotFound(id.clone()))?
            .badlands = badlands;
        Ok(())
    }

    pub fn is_town(&self, id: &AreaId) -> bool {
        self.areas.get(id).is_some_and(|a| a.town)
    }

    pub fn is_badlands(&self, id: &AreaId) -> bool {
        self.areas.get(id).is_some_and(|a| a.badlands)
    }

    /// Derived from grid-provider labels against the configured label set.
    pub fn is_dangerous(&self, id: &AreaId) -> bool {
        self.areas
            .get(id)
            .is_some_and(|a| a.labels.iter().any(|l| self.dangerous_labels.contains(l)))
    }

    pub(crate) fn get_mut(&mut self, id: &AreaId) -> Option<&mut AreaRecord> {
        self.areas.get_mut(id)
    }

    /// Bulk restore from persisted records. Idempotent, no notices.
    pub fn initialize(&mut self, records: Vec<AreaRecord>) {
        info!(count = records.len(), "restoring area records");
        self.areas.clear();
        for record in records {
            self.areas.insert(record.id.clone(), record);
        }
    }

    pub fn serialize(&self) -> Vec<AreaRecord> {
        self.areas.values().cloned().collect()
    }

    pub fn teardown_all(&mut self) {
        info!(count = self.areas.len(), "releasing area records");
        self.areas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> AreaRegistry {
        let mut reg = AreaRegistry::new(BTreeSet::from(["launch_site".to_owned()]));
        reg.seed([
            AreaSeed {
                id: "A7".into(),
                labels: vec![],
            },
            AreaSeed {
                id: "B3".into(),
                labels: vec!["launch_site".to_owned()],
            },
            AreaSeed {
                id: "C1".into(),
                labels: vec![],
            },
        ]);
        reg
    }

    #[test]
    fn claim_and_double_claim() {
        let mut reg = seeded();
        let now = Utc::now();

        reg.claim(&"A7".into(), &"reds".into(), now, now).unwrap();
        assert_eq!(
            reg.get(&"A7".into()).unwrap().owner,
            Some(FactionId::new("reds"))
        );

        let err = reg.claim(&"A7".into(), &"blues".into(), now, now).unwrap_err();
        assert_eq!(err, ClaimError::AlreadyClaimed("A7".into()));
    }

    #[test]
    fn unclaim_is_idempotent_inside_a_batch() {
        let mut reg = seeded();
        let now = Utc::now();
        reg.claim(&"A7".into(), &"reds".into(), now, now).unwrap();

        // Batch mixes a claimed cell, an unclaimed cell and an unknown id.
        let released = reg.unclaim(&["A7".into(), "C1".into(), "Z9".into()]);
        assert_eq!(released, vec![("A7".into(), "reds".into())]);

        // Repeating the batch is a clean no-op.
        let released = reg.unclaim(&["A7".into(), "C1".into(), "Z9".into()]);
        assert!(released.is_empty());
        assert!(reg.get(&"A7".into()).unwrap().owner.is_none());
    }

    #[test]
    fn claim_count_and_lookup_by_faction() {
        let mut reg = seeded();
        let now = Utc::now();
        reg.claim(&"A7".into(), &"reds".into(), now, now).unwrap();
        reg.claim(&"B3".into(), &"reds".into(), now, now).unwrap();
        reg.claim(&"C1".into(), &"blues".into(), now, now).unwrap();

        assert_eq!(reg.claim_count(&"reds".into()), 2);
        let mut claimed = reg.all_claimed_by(&"reds".into());
        claimed.sort();
        assert_eq!(claimed, vec![AreaId::new("A7"), AreaId::new("B3")]);
    }

    #[test]
    fn dangerous_derives_from_labels() {
        let reg = seeded();
        assert!(reg.is_dangerous(&"B3".into()));
        assert!(!reg.is_dangerous(&"A7".into()));
    }

    #[test]
    fn naming_requires_a_claim_and_a_minimum_length() {
        let mut reg = seeded();
        let now = Utc::now();

        assert_eq!(
            reg.set_name(&"A7".into(), "ab".into(), 3),
            Err(ClaimError::NameTooShort { min: 3 })
        );
        assert_eq!(
            reg.set_name(&"A7".into(), "Fort".into(), 3),
            Err(ClaimError::NotClaimed("A7".into()))
        );

        reg.claim(&"A7".into(), &"reds".into(), now, now).unwrap();
        reg.set_name(&"A7".into(), "Fort".into(), 3).unwrap();
        assert_eq!(reg.get(&"A7".into()).unwrap().name.as_deref(), Some("Fort"));

        // Unclaim clears the name and town status with the claim.
        reg.set_town(&"A7".into(), true).unwrap();
        reg.unclaim(&["A7".into()]);
        let area = reg.get(&"A7".into()).unwrap();
        assert!(area.name.is_none());
        assert!(!area.town);
    }
}
