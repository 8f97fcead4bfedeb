//! Win conditions. Pure functions over policy counts and roles.
//!
//! Conditions are checked in this order and the first satisfied one wins:
//! 1. republican policies reach 5
//! 2. fascist policies reach 6
//! 3. Franco is the elected chancellor while fascist policies are at least 3
//!
//! Executing Franco is decided separately by [`evaluate_execution`].

use shared::{
    Role, Team, WinReason, FASCIST_POLICIES_TO_WIN, FRANCO_CHANCELLOR_THRESHOLD,
    REPUBLICAN_POLICIES_TO_WIN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Victory {
    pub winner: Team,
    pub reason: WinReason,
}

/// `elected_chancellor` is the role of a chancellor whose government was just
/// approved; pass `None` after a policy enactment.
pub fn evaluate(
    republican_policies: u8,
    fascist_policies: u8,
    elected_chancellor: Option<Role>,
) -> Option<Victory> {
    if republican_policies >= REPUBLICAN_POLICIES_TO_WIN {
        return Some(Victory {
            winner: Team::Republicans,
            reason: WinReason::RepublicanPolicies,
        });
    }
    if fascist_policies >= FASCIST_POLICIES_TO_WIN {
        return Some(Victory {
            winner: Team::Fascists,
            reason: WinReason::FascistPolicies,
        });
    }
    if elected_chancellor == Some(Role::Franco) && fascist_policies >= FRANCO_CHANCELLOR_THRESHOLD
    {
        return Some(Victory {
            winner: Team::Fascists,
            reason: WinReason::FrancoElectedChancellor,
        });
    }
    None
}

pub fn evaluate_execution(executed: Role) -> Option<Victory> {
    (executed == Role::Franco).then_some(Victory {
        winner: Team::Republicans,
        reason: WinReason::FrancoExecuted,
    })
}
