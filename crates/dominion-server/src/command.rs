//! External actions entering the engine.
//!
//! The command front-end (chat parsing, permissions) lives outside this
//! process boundary; whatever produces these has already validated who is
//! allowed to ask. Commands are serializable so any transport can carry
//! them.

use dominion_protocol::{AreaId, ContainerId, FactionId, MemberId, WarId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    // Faction lifecycle
    CreateFaction {
        id: FactionId,
        description: String,
        owner: MemberId,
    },
    DisbandFaction {
        faction: FactionId,
    },
    EliminateFaction {
        faction: FactionId,
    },

    // Membership
    JoinFaction {
        faction: FactionId,
        member: MemberId,
    },
    LeaveFaction {
        member: MemberId,
    },

    // Tax policy and treasury
    SetTaxRate {
        faction: FactionId,
        rate: f32,
    },
    SetTaxContainer {
        faction: FactionId,
        container: Option<ContainerId>,
    },
    Deposit {
        faction: FactionId,
        amount: i64,
    },

    // Territory
    Claim {
        area: AreaId,
        faction: FactionId,
    },
    Unclaim {
        areas: Vec<AreaId>,
    },
    SetAreaName {
        area: AreaId,
        name: String,
    },

    // Conflict
    DeclareWar {
        attacker: FactionId,
        defender: FactionId,
        justification: String,
    },
    Surrender {
        war: WarId,
    },

    // Collaborator inputs
    EconomicEvent {
        area: AreaId,
        amount: i64,
    },
    MemberConnected {
        member: MemberId,
    },
    MemberDisconnected {
        member: MemberId,
    },
}
