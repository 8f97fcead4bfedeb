//! Secret role assignment and the asymmetric knowledge each role starts with.
//!
//! Fascists know the whole fascist roster, Franco included. Franco knows the
//! roster only in 5-6 player games; from 7 players on Franco knows only itself.
//! Republicans know nothing.

use crate::deck::shuffle;
use crate::error::EngineError;
use rand::Rng;
use shared::{PlayerId, PrivateRole, Role, MAX_PLAYERS, MIN_PLAYERS};
use std::collections::{BTreeMap, BTreeSet};

/// Largest table size at which Franco still learns who the fascists are.
const FRANCO_KNOWS_FASCISTS_MAX_PLAYERS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleDistribution {
    pub republicans: usize,
    pub fascists: usize,
    pub franco: usize,
}

/// Fixed role table keyed by player count.
pub fn role_distribution(player_count: usize) -> Result<RoleDistribution, EngineError> {
    let (republicans, fascists) = match player_count {
        5 => (3, 1),
        6 => (4, 1),
        7 => (4, 2),
        8 => (5, 2),
        9 => (5, 3),
        10 => (6, 3),
        _ => return Err(EngineError::InvalidConfiguration(player_count)),
    };

    Ok(RoleDistribution {
        republicans,
        fascists,
        franco: 1,
    })
}

/// Draws a uniform random bijection between players and the role tokens for their count.
///
/// Players and tokens are shuffled independently and then paired positionally.
pub fn assign<R: Rng + ?Sized>(
    player_ids: &[PlayerId],
    rng: &mut R,
) -> Result<BTreeMap<PlayerId, PrivateRole>, EngineError> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_ids.len()) {
        return Err(EngineError::InvalidConfiguration(player_ids.len()));
    }
    let distinct: BTreeSet<&PlayerId> = player_ids.iter().collect();
    if distinct.len() != player_ids.len() {
        return Err(EngineError::invalid("player ids must be distinct"));
    }

    let distribution = role_distribution(player_ids.len())?;
    let mut tokens = Vec::with_capacity(player_ids.len());
    tokens.extend(std::iter::repeat(Role::Republican).take(distribution.republicans));
    tokens.extend(std::iter::repeat(Role::Fascist).take(distribution.fascists));
    tokens.extend(std::iter::repeat(Role::Franco).take(distribution.franco));

    let mut players = player_ids.to_vec();
    shuffle(&mut players, rng);
    shuffle(&mut tokens, rng);

    let pairs: Vec<(PlayerId, Role)> = players.into_iter().zip(tokens).collect();
    Ok(derive_knowledge(&pairs))
}

/// Deterministic given the assignment.
pub fn derive_knowledge(assignment: &[(PlayerId, Role)]) -> BTreeMap<PlayerId, PrivateRole> {
    let fascist_roster: BTreeSet<PlayerId> = assignment
        .iter()
        .filter(|(_, role)| matches!(role, Role::Fascist | Role::Franco))
        .map(|(id, _)| id.clone())
        .collect();
    let franco_knows_roster = assignment.len() <= FRANCO_KNOWS_FASCISTS_MAX_PLAYERS;

    assignment
        .iter()
        .map(|(id, role)| {
            let (knows_franco, known_fascists) = match role {
                Role::Republican => (false, BTreeSet::new()),
                Role::Fascist => (true, fascist_roster.clone()),
                Role::Franco if franco_knows_roster => (true, fascist_roster.clone()),
                Role::Franco => (true, BTreeSet::from([id.clone()])),
            };

            let private = PrivateRole {
                role: *role,
                party: role.party(),
                knows_franco,
                known_fascists,
            };
            (id.clone(), private)
        })
        .collect()
}
