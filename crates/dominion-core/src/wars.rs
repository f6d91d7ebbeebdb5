//! War registry: active and historical conflicts between factions.
//!
//! Active wars are unique per unordered faction pair. Terminal records are
//! kept as history and never resurrected.

use chrono::{DateTime, Utc};
use dominion_protocol::{FactionId, WarEndReason, WarId, WarRecord};
use rand::Rng;
use std::collections::HashMap;
use tracing::info;

use crate::error::WarError;

#[derive(Debug)]
pub struct WarRegistry {
    wars: HashMap<WarId, WarRecord>,
    min_justification_length: usize,
    war_duration: chrono::Duration,
}

impl WarRegistry {
    pub fn new(min_justification_length: usize, war_duration: chrono::Duration) -> Self {
        Self {
            wars: HashMap::new(),
            min_justification_length,
            war_duration,
        }
    }

    /// Open a new war. Faction existence is validated by the engine before
    /// the declaration reaches the registry.
    pub fn declare(
        &mut self,
        attacker: FactionId,
        defender: FactionId,
        justification: String,
        now: DateTime<Utc>,
    ) -> Result<&WarRecord, WarError> {
        if attacker == defender {
            return Err(WarError::InvalidPair);
        }
        if justification.chars().count() < self.min_justification_length {
            return Err(WarError::JustificationTooShort {
                min: self.min_justification_length,
            });
        }
        if self
            .wars
            .values()
            .any(|w| w.is_active() && w.is_between(&attacker, &defender))
        {
            return Err(WarError::DuplicateWar { attacker, defender });
        }

        let id = self.generate_war_id();
        info!(war = %id, attacker = %attacker, defender = %defender, "war declared");
        let record = WarRecord {
            id: id.clone(),
            attacker,
            defender,
            justification,
            declared_at: now,
            ended_at: None,
            end_reason: None,
        };
        Ok(self.wars.entry(id).or_insert(record))
    }

    pub fn get(&self, id: &WarId) -> Option<&WarRecord> {
        self.wars.get(id)
    }

    pub fn active_wars(&self) -> impl Iterator<Item = &WarRecord> {
        self.wars.values().filter(|w| w.is_active())
    }

    pub fn all(&self) -> impl Iterator<Item = &WarRecord> {
        self.wars.values()
    }

    pub fn wars_involving<'a>(
        &'a self,
        faction: &'a FactionId,
    ) -> impl Iterator<Item = &'a WarRecord> {
        self.active_wars().filter(move |w| w.involves(faction))
    }

    /// Whether an active war exists between the pair, either direction.
    pub fn are_at_war(&self, a: &FactionId, b: &FactionId) -> bool {
        self.active_wars().any(|w| w.is_between(a, b))
    }

    /// Terminate one active war. Terminal wars cannot be re-ended.
    pub fn end_war(
        &mut self,
        id: &WarId,
        reason: WarEndReason,
        now: DateTime<Utc>,
    ) -> Result<WarRecord, WarError> {
        let war = self
            .wars
            .get_mut(id)
            .filter(|w| w.is_active())
            .ok_or_else(|| WarError::NotFound(id.clone()))?;

        war.ended_at = Some(now);
        war.end_reason = Some(reason);
        info!(war = %id, ?reason, "war ended");
        Ok(war.clone())
    }

    /// Force every active war referencing the faction to a terminal state.
    /// Idempotent: a no-op when none exist.
    pub fn end_all_for_eliminated_faction(
        &mut self,
        faction: &FactionId,
        now: DateTime<Utc>,
    ) -> Vec<WarRecord> {
        let mut ended = Vec::new();
        for war in self.wars.values_mut() {
            if war.is_active() && war.involves(faction) {
                war.ended_at = Some(now);
                war.end_reason = Some(WarEndReason::Eliminated);
                ended.push(war.clone());
            }
        }
        if !ended.is_empty() {
            info!(faction = %faction, count = ended.len(), "wars force-ended for eliminated faction");
        }
        ended
    }

    /// Time out wars older than the configured ceiling. Scheduler-driven.
    pub fn expire_timed_out(&mut self, now: DateTime<Utc>) -> Vec<WarRecord> {
        let mut expired = Vec::new();
        for war in self.wars.values_mut() {
            if war.is_active() && now - war.declared_at >= self.war_duration {
                war.ended_at = Some(now);
                war.end_reason = Some(WarEndReason::Timeout);
                expired.push(war.clone());
            }
        }
        expired
    }

    /// Bulk restore from persisted records. Idempotent, no notices.
    pub fn initialize(&mut self, records: Vec<WarRecord>) {
        info!(count = records.len(), "restoring war records");
        self.wars.clear();
        for record in records {
            self.wars.insert(record.id.clone(), record);
        }
    }

    pub fn serialize(&self) -> Vec<WarRecord> {
        self.wars.values().cloned().collect()
    }

    pub fn teardown_all(&mut self) {
        info!(count = self.wars.len(), "releasing war records");
        self.wars.clear();
    }

    fn generate_war_id(&self) -> WarId {
        let mut rng = rand::thread_rng();
        loop {
            let token: String = (0..8)
                .map(|_| {
                    let idx = rng.gen_range(0..36);
                    if idx < 10 {
                        (b'0' + idx) as char
                    } else {
                        (b'a' + idx - 10) as char
                    }
                })
                .collect();
            let id = WarId::new(format!("war-{token}"));
            if !self.wars.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUSTIFICATION: &str =
        "Your raiders burned our outpost at the northern ridge and took the harvest.";

    fn registry() -> WarRegistry {
        WarRegistry::new(50, chrono::Duration::hours(72))
    }

    #[test]
    fn self_war_is_invalid() {
        let mut reg = registry();
        let err = reg
            .declare("reds".into(), "reds".into(), JUSTIFICATION.into(), Utc::now())
            .unwrap_err();
        assert_eq!(err, WarError::InvalidPair);
    }

    #[test]
    fn short_justification_rejected() {
        let mut reg = registry();
        let err = reg
            .declare("reds".into(), "blues".into(), "because".into(), Utc::now())
            .unwrap_err();
        assert_eq!(err, WarError::JustificationTooShort { min: 50 });
    }

    #[test]
    fn one_active_war_per_unordered_pair() {
        let mut reg = registry();
        let now = Utc::now();
        reg.declare("reds".into(), "blues".into(), JUSTIFICATION.into(), now)
            .unwrap();

        // Same pair, either direction, while the first is active.
        assert!(matches!(
            reg.declare("reds".into(), "blues".into(), JUSTIFICATION.into(), now),
            Err(WarError::DuplicateWar { .. })
        ));
        assert!(matches!(
            reg.declare("blues".into(), "reds".into(), JUSTIFICATION.into(), now),
            Err(WarError::DuplicateWar { .. })
        ));
        assert!(reg.are_at_war(&"blues".into(), &"reds".into()));
    }

    #[test]
    fn pair_can_fight_again_after_a_terminal_war() {
        let mut reg = registry();
        let now = Utc::now();
        let id = reg
            .declare("reds".into(), "blues".into(), JUSTIFICATION.into(), now)
            .unwrap()
            .id
            .clone();

        reg.end_war(&id, WarEndReason::Surrender, now).unwrap();
        assert!(!reg.are_at_war(&"reds".into(), &"blues".into()));

        // Ending twice is an error, not a silent rewrite of history.
        assert!(reg.end_war(&id, WarEndReason::Timeout, now).is_err());

        reg.declare("blues".into(), "reds".into(), JUSTIFICATION.into(), now)
            .unwrap();
    }

    #[test]
    fn elimination_ends_every_involved_war() {
        let mut reg = registry();
        let now = Utc::now();
        reg.declare("reds".into(), "blues".into(), JUSTIFICATION.into(), now)
            .unwrap();
        reg.declare("greens".into(), "reds".into(), JUSTIFICATION.into(), now)
            .unwrap();
        reg.declare("greens".into(), "blues".into(), JUSTIFICATION.into(), now)
            .unwrap();

        let ended = reg.end_all_for_eliminated_faction(&"reds".into(), now);
        assert_eq!(ended.len(), 2);
        assert!(ended
            .iter()
            .all(|w| w.end_reason == Some(WarEndReason::Eliminated)));
        assert_eq!(reg.active_wars().count(), 1);

        // Idempotent: nothing left to end.
        assert!(reg.end_all_for_eliminated_faction(&"reds".into(), now).is_empty());
    }

    #[test]
    fn wars_time_out_past_the_ceiling() {
        let mut reg = registry();
        let declared = Utc::now();
        reg.declare("reds".into(), "blues".into(), JUSTIFICATION.into(), declared)
            .unwrap();

        assert!(reg.expire_timed_out(declared + chrono::Duration::hours(71)).is_empty());

        let expired = reg.expire_timed_out(declared + chrono::Duration::hours(72));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].end_reason, Some(WarEndReason::Timeout));
    }
}
