//! Online-presence view of the external user directory.
//!
//! The engine does not own user accounts; it tracks who is currently
//! online and mirrors the faction affiliation of online members so the
//! disband cascade can clear it. The authoritative member→faction
//! relation is the faction rosters.

use std::collections::HashMap;

use dominion_protocol::{FactionId, MemberId};

#[derive(Clone, Debug, Default)]
struct Presence {
    online: bool,
    faction: Option<FactionId>,
}

/// Presence and affiliation for currently known members.
#[derive(Debug, Default)]
pub struct MemberDirectory {
    members: HashMap<MemberId, Presence>,
}

impl MemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a member online, with the faction affiliation resolved at login.
    pub fn connect(&mut self, member: MemberId, faction: Option<FactionId>) {
        let entry = self.members.entry(member).or_default();
        entry.online = true;
        entry.faction = faction;
    }

    pub fn disconnect(&mut self, member: &MemberId) {
        if let Some(entry) = self.members.get_mut(member) {
            entry.online = false;
        }
    }

    pub fn is_online(&self, member: &MemberId) -> bool {
        self.members.get(member).is_some_and(|m| m.online)
    }

    pub fn set_faction(&mut self, member: &MemberId, faction: Option<FactionId>) {
        if let Some(entry) = self.members.get_mut(member) {
            entry.faction = faction;
        }
    }

    pub fn faction_of(&self, member: &MemberId) -> Option<&FactionId> {
        self.members.get(member).and_then(|m| m.faction.as_ref())
    }

    pub fn online_members(&self) -> impl Iterator<Item = &MemberId> {
        self.members
            .iter()
            .filter(|(_, p)| p.online)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_tracks_affiliation() {
        let mut directory = MemberDirectory::new();
        let u1 = MemberId::new("u1");

        assert!(!directory.is_online(&u1));

        directory.connect(u1.clone(), Some(FactionId::new("reds")));
        assert!(directory.is_online(&u1));
        assert_eq!(directory.faction_of(&u1), Some(&FactionId::new("reds")));

        directory.set_faction(&u1, None);
        assert_eq!(directory.faction_of(&u1), None);

        directory.disconnect(&u1);
        assert!(!directory.is_online(&u1));
        assert_eq!(directory.online_members().count(), 0);
    }
}
