use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const PROTOCOL_VERSION: u32 = 1;

pub const MIN_PLAYERS: usize = 5;
pub const MAX_PLAYERS: usize = 10;

pub const ROOM_CODE_LEN: usize = 6;
/// Room code alphabet. `I`, `O`, `0` and `1` are left out so codes read aloud unambiguously.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const REPUBLICAN_POLICY_CARDS: usize = 6;
pub const FASCIST_POLICY_CARDS: usize = 11;
pub const DECK_SIZE: usize = REPUBLICAN_POLICY_CARDS + FASCIST_POLICY_CARDS;

pub const REPUBLICAN_POLICIES_TO_WIN: u8 = 5;
pub const FASCIST_POLICIES_TO_WIN: u8 = 6;
pub const FRANCO_CHANCELLOR_THRESHOLD: u8 = 3;
pub const VETO_THRESHOLD: u8 = 5;
pub const ELECTION_TRACKER_LIMIT: u8 = 3;
/// Above this many living players the previous president is also term-limited.
pub const TERM_LIMIT_ALIVE_THRESHOLD: usize = 5;
pub const LEGISLATIVE_HAND_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Republican,
    Fascist,
    Franco,
}

impl Role {
    /// Franco plays for the fascist party.
    pub fn party(self) -> Party {
        match self {
            Role::Republican => Party::Republican,
            Role::Fascist | Role::Franco => Party::Fascist,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    Republican,
    Fascist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    Republican,
    Fascist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Waiting,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Nomination,
    Voting,
    PresidentDiscard,
    ChancellorEnact,
    ExecutiveAction,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Republicans,
    Fascists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WinReason {
    RepublicanPolicies,
    FascistPolicies,
    FrancoElectedChancellor,
    FrancoExecuted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutivePower {
    PolicyPeek,
    InvestigateLoyalty,
    SpecialElection,
    Execution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TallyResult {
    Approved,
    Rejected,
}

/// Committed result of one voting round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub round: u32,
    pub yes: usize,
    pub no: usize,
    pub result: TallyResult,
}

/// What a tally did to the game, reported to the player whose vote closed the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundResolution {
    Approved,
    Rejected { chaos_policy: Option<Policy> },
    FrancoElected,
}

/// Secret knowledge handed to exactly one player at game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateRole {
    pub role: Role,
    pub party: Party,
    pub knows_franco: bool,
    pub known_fascists: BTreeSet<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub name: String,
    pub is_alive: bool,
    pub has_voted: bool,
    /// Hidden while the round is still open.
    pub vote: Option<bool>,
    pub was_president: bool,
    pub was_chancellor: bool,
    pub order_index: usize,
}

/// Everything any participant may see about a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSessionView {
    pub session_id: SessionId,
    pub code: String,
    pub host_id: PlayerId,
    pub status: SessionStatus,
    pub phase: Phase,
    pub players: Vec<PublicPlayer>,
    pub player_order: Vec<PlayerId>,
    pub president_id: Option<PlayerId>,
    pub chancellor_id: Option<PlayerId>,
    pub previous_president_id: Option<PlayerId>,
    pub previous_chancellor_id: Option<PlayerId>,
    pub republican_policies: u8,
    pub fascist_policies: u8,
    pub election_tracker: u8,
    pub draw_pile: usize,
    pub discard_pile: usize,
    pub veto_enabled: bool,
    pub veto_requested: bool,
    pub current_power: Option<ExecutivePower>,
    pub round: u32,
    pub last_tally: Option<Tally>,
    pub winner: Option<Team>,
    pub win_reason: Option<WinReason>,
    /// Populated only once the game is over.
    pub revealed_roles: Option<BTreeMap<PlayerId, Role>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthenticated,
    InvalidArgument,
    NotFound,
    PermissionDenied,
    FailedPrecondition,
    ResourceExhausted,
    AlreadyExists,
    EmptyDeck,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::NotFound => "not-found",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::FailedPrecondition => "failed-precondition",
            ErrorKind::ResourceExhausted => "resource-exhausted",
            ErrorKind::AlreadyExists => "already-exists",
            ErrorKind::EmptyDeck => "empty-deck",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// The only error shape clients ever observe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for WireError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    CreateSession {
        display_name: String,
    },
    JoinSession {
        code: String,
        display_name: String,
    },
    StartSession {
        session_id: SessionId,
    },
    NominateChancellor {
        session_id: SessionId,
        nominee_id: PlayerId,
    },
    CastVote {
        session_id: SessionId,
        vote: bool,
    },
    DiscardPolicy {
        session_id: SessionId,
        index: usize,
    },
    EnactPolicy {
        session_id: SessionId,
        index: usize,
    },
    RequestVeto {
        session_id: SessionId,
    },
    RespondVeto {
        session_id: SessionId,
        accept: bool,
    },
    UseExecutivePower {
        session_id: SessionId,
        target: Option<PlayerId>,
    },
    ViewSession {
        session_id: SessionId,
    },
    ViewPrivate {
        session_id: SessionId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerResult {
    PolicyPeek {
        top: Vec<Policy>,
    },
    Investigated {
        target: PlayerId,
        party: Party,
    },
    SpecialElection {
        next_president: PlayerId,
    },
    Executed {
        target: PlayerId,
        winner: Option<Team>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    SessionCreated {
        session_id: SessionId,
        code: String,
    },
    SessionJoined {
        session_id: SessionId,
        already_joined: bool,
    },
    SessionStarted {
        player_count: usize,
        first_president_id: PlayerId,
    },
    ChancellorNominated {
        nominee_id: PlayerId,
    },
    VoteRegistered {
        vote: bool,
        resolution: Option<RoundResolution>,
    },
    PolicyDiscarded,
    PolicyEnacted {
        enacted: Policy,
        power: Option<ExecutivePower>,
        winner: Option<Team>,
    },
    VetoRequested,
    VetoResolved {
        accepted: bool,
        chaos_policy: Option<Policy>,
    },
    PowerUsed(PowerResult),
    Session(Box<PublicSessionView>),
    Private {
        role: Option<PrivateRole>,
        hand: Vec<Policy>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    /// Announces the identity the external identity provider verified for this client.
    Connect {
        client_version: u32,
        player_id: PlayerId,
    },
    Request {
        request_id: u32,
        request: Request,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    Response {
        request_id: u32,
        result: Result<Response, WireError>,
    },
    Disconnected {
        reason: String,
    },
}

pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(packet)
}

pub fn decode_packet(bytes: &[u8]) -> Result<Packet, bincode::Error> {
    bincode::deserialize(bytes)
}

/// Normalises a room code typed by a player: trims and upper-cases it.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}
