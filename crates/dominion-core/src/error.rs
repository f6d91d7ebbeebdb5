//! Operation-level error taxonomy.
//!
//! Every mutation returns its error synchronously; nothing is swallowed.
//! `InvariantViolation` is the fatal case: it means registries have
//! diverged (a cascade-ordering bug, not a user mistake) and the affected
//! operation halts.

use dominion_protocol::{AreaId, FactionId, MemberId, WarId};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum FactionError {
    #[error("faction `{0}` already exists")]
    AlreadyExists(FactionId),
    #[error("faction `{0}` not found")]
    NotFound(FactionId),
    #[error("member `{0}` already belongs to a faction")]
    AlreadyMember(MemberId),
    #[error("member `{0}` is not on the roster")]
    NotMember(MemberId),
    #[error("tax rate {rate} out of range [0, {max}]")]
    OutOfRange { rate: f32, max: f32 },
    #[error("insufficient funds: needed {needed}, treasury holds {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("registry invariant violated: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ClaimError {
    #[error("area `{0}` is already claimed")]
    AlreadyClaimed(AreaId),
    #[error("area `{0}` is not claimed")]
    NotClaimed(AreaId),
    #[error("unknown area `{0}`")]
    AreaNotFound(AreaId),
    #[error("faction `{0}` not found")]
    FactionNotFound(FactionId),
    #[error("insufficient funds: claim costs {cost}, treasury holds {treasury}")]
    InsufficientFunds { cost: i64, treasury: i64 },
    #[error("faction needs at least {required} members to hold land")]
    TooFewMembers { required: usize },
    #[error("area name must be at least {min} characters")]
    NameTooShort { min: usize },
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum WarError {
    #[error("a faction cannot declare war on itself")]
    InvalidPair,
    #[error("an active war between `{attacker}` and `{defender}` already exists")]
    DuplicateWar {
        attacker: FactionId,
        defender: FactionId,
    },
    #[error("justification must be at least {min} characters")]
    JustificationTooShort { min: usize },
    #[error("faction `{0}` not found")]
    FactionNotFound(FactionId),
    #[error("no active war `{0}`")]
    NotFound(WarId),
}
