//! Session, player and role records, plus the projections clients are allowed to see.

use crate::deck::PolicyDeck;
use shared::{
    ExecutivePower, Phase, Policy, PlayerId, PrivateRole, PublicPlayer, PublicSessionView, Role,
    SessionId, SessionStatus, Tally, Team, WinReason,
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VetoState {
    #[default]
    None,
    Requested,
    Refused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub code: String,
    pub host_id: PlayerId,
    pub status: SessionStatus,
    pub phase: Phase,
    /// Fixed once the game starts.
    pub player_order: Vec<PlayerId>,
    pub president_index: usize,
    pub chancellor_id: Option<PlayerId>,
    pub previous_president_id: Option<PlayerId>,
    pub previous_chancellor_id: Option<PlayerId>,
    pub republican_policies: u8,
    pub fascist_policies: u8,
    pub election_tracker: u8,
    pub deck: PolicyDeck,
    /// Cards held by the president or chancellor during a legislative session.
    pub hand: Vec<Policy>,
    pub veto_enabled: bool,
    pub veto: VetoState,
    pub current_power: Option<ExecutivePower>,
    /// Index of the president who called a special election; rotation resumes after it.
    pub special_election_caller: Option<usize>,
    pub investigated: BTreeSet<PlayerId>,
    /// Incremented on every nomination.
    pub round: u32,
    pub last_tally: Option<Tally>,
    pub winner: Option<Team>,
    pub win_reason: Option<WinReason>,
}

impl Session {
    pub fn new(id: SessionId, code: String, host_id: PlayerId) -> Self {
        Self {
            id,
            code,
            host_id,
            status: SessionStatus::Waiting,
            phase: Phase::Nomination,
            player_order: Vec::new(),
            president_index: 0,
            chancellor_id: None,
            previous_president_id: None,
            previous_chancellor_id: None,
            republican_policies: 0,
            fascist_policies: 0,
            election_tracker: 0,
            deck: PolicyDeck::default(),
            hand: Vec::new(),
            veto_enabled: false,
            veto: VetoState::None,
            current_power: None,
            special_election_caller: None,
            investigated: BTreeSet::new(),
            round: 0,
            last_tally: None,
            winner: None,
            win_reason: None,
        }
    }

    pub fn president_id(&self) -> Option<&PlayerId> {
        self.player_order.get(self.president_index)
    }

    pub fn is_president(&self, player_id: &PlayerId) -> bool {
        self.president_id() == Some(player_id)
    }

    pub fn is_chancellor(&self, player_id: &PlayerId) -> bool {
        self.chancellor_id.as_ref() == Some(player_id)
    }

    pub fn enacted_policies(&self) -> usize {
        usize::from(self.republican_policies) + usize::from(self.fascist_policies)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_alive: bool,
    pub has_voted: bool,
    pub vote: Option<bool>,
    pub was_president: bool,
    pub was_chancellor: bool,
    pub order_index: usize,
}

impl Player {
    pub fn new(id: PlayerId, name: String, order_index: usize) -> Self {
        Self {
            id,
            name,
            is_alive: true,
            has_voted: false,
            vote: None,
            was_president: false,
            was_chancellor: false,
            order_index,
        }
    }

    pub fn reset_vote(&mut self) {
        self.has_voted = false;
        self.vote = None;
    }
}

/// Everything one atomic commit covers: the session and all of its child records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session: Session,
    pub players: BTreeMap<PlayerId, Player>,
    /// Written once when the game starts, never touched again.
    pub roles: BTreeMap<PlayerId, PrivateRole>,
}

impl SessionRecord {
    pub fn new(session: Session, host: Player) -> Self {
        let mut players = BTreeMap::new();
        players.insert(host.id.clone(), host);
        Self {
            session,
            players,
            roles: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.session.id
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive).count()
    }

    pub fn is_alive(&self, player_id: &PlayerId) -> bool {
        self.players.get(player_id).is_some_and(|p| p.is_alive)
    }

    pub fn role_of(&self, player_id: &PlayerId) -> Option<Role> {
        self.roles.get(player_id).map(|r| r.role)
    }

    pub fn public_view(&self) -> PublicSessionView {
        let session = &self.session;
        let votes_visible = session.phase != Phase::Voting;

        let mut players: Vec<PublicPlayer> = self
            .players
            .values()
            .map(|p| PublicPlayer {
                id: p.id.clone(),
                name: p.name.clone(),
                is_alive: p.is_alive,
                has_voted: p.has_voted,
                vote: if votes_visible { p.vote } else { None },
                was_president: p.was_president,
                was_chancellor: p.was_chancellor,
                order_index: p.order_index,
            })
            .collect();
        players.sort_by_key(|p| p.order_index);

        let revealed_roles = (session.phase == Phase::GameOver).then(|| {
            self.roles
                .iter()
                .map(|(id, r)| (id.clone(), r.role))
                .collect()
        });

        PublicSessionView {
            session_id: session.id.clone(),
            code: session.code.clone(),
            host_id: session.host_id.clone(),
            status: session.status,
            phase: session.phase,
            players,
            player_order: session.player_order.clone(),
            president_id: session.president_id().cloned(),
            chancellor_id: session.chancellor_id.clone(),
            previous_president_id: session.previous_president_id.clone(),
            previous_chancellor_id: session.previous_chancellor_id.clone(),
            republican_policies: session.republican_policies,
            fascist_policies: session.fascist_policies,
            election_tracker: session.election_tracker,
            draw_pile: session.deck.draw_pile().len(),
            discard_pile: session.deck.discard_pile().len(),
            veto_enabled: session.veto_enabled,
            veto_requested: session.veto == VetoState::Requested,
            current_power: session.current_power,
            round: session.round,
            last_tally: session.last_tally.clone(),
            winner: session.winner,
            win_reason: session.win_reason,
            revealed_roles,
        }
    }

    /// The legislative hand, but only for whoever currently holds it.
    pub fn hand_for(&self, player_id: &PlayerId) -> Vec<Policy> {
        let session = &self.session;
        let holds_hand = match session.phase {
            Phase::PresidentDiscard => session.is_president(player_id),
            Phase::ChancellorEnact => session.is_chancellor(player_id),
            _ => false,
        };
        if holds_hand {
            session.hand.clone()
        } else {
            Vec::new()
        }
    }
}
