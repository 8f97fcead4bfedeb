//! The game engine: every client intent enters here as one atomic operation.
//!
//! Each operation loads the session record, validates and mutates a private
//! copy, then commits it with a compare-and-swap. When another request commits
//! first, the whole operation re-runs against the fresh record, so every
//! precondition is always checked against the state that actually gets
//! replaced.

use crate::deck::{shuffle, PolicyDeck};
use crate::error::{EngineError, StoreError};
use crate::legislative::{self, EnactOutcome, VetoOutcome};
use crate::phases;
use crate::roles;
use crate::session::{Player, Session, SessionRecord};
use crate::store::SessionStore;
use crate::utils::{generate_room_code, generate_session_id};
use crate::votes::{self, VoteProgress};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    normalize_room_code, Phase, Policy, PlayerId, PowerResult, PrivateRole, PublicSessionView,
    RoundResolution, SessionId, SessionStatus, MAX_PLAYERS, MIN_PLAYERS,
    TERM_LIMIT_ALIVE_THRESHOLD,
};
use std::sync::{Arc, Mutex};

const ROOM_CODE_ATTEMPTS: usize = 10;
const DEFAULT_HOST_NAME: &str = "Host";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Attempts per operation before a write conflict is reported as internal.
    pub max_commit_retries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReceipt {
    pub session_id: SessionId,
    pub already_joined: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReceipt {
    pub player_count: usize,
    pub first_president_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReceipt {
    pub vote: bool,
    /// Present only on the request whose vote completed the round.
    pub resolution: Option<RoundResolution>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateView {
    pub role: Option<PrivateRole>,
    pub hand: Vec<Policy>,
}

pub struct GameEngine {
    store: Arc<dyn SessionStore>,
    rng: Mutex<StdRng>,
    config: EngineConfig,
}

impl GameEngine {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_rng(store, StdRng::from_entropy(), EngineConfig::default())
    }

    /// Builds an engine around a given random source, e.g. a seeded one for reproducible games.
    pub fn with_rng(store: Arc<dyn SessionStore>, rng: StdRng, config: EngineConfig) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn create_session(
        &self,
        caller: Option<&PlayerId>,
        display_name: &str,
    ) -> Result<SessionHandle, EngineError> {
        let caller = authenticated(caller)?;
        let name = match display_name.trim() {
            "" => DEFAULT_HOST_NAME.to_string(),
            name => name.to_string(),
        };

        for _ in 0..ROOM_CODE_ATTEMPTS {
            let (session_id, code) = {
                let mut rng = self.lock_rng()?;
                (generate_session_id(&mut *rng), generate_room_code(&mut *rng))
            };
            if self.store.find_by_code(&code).await?.is_some() {
                debug!("Room code {} already in use, drawing another", code);
                continue;
            }

            let session = Session::new(session_id.clone(), code.clone(), caller.clone());
            let record = SessionRecord::new(session, Player::new(caller.clone(), name.clone(), 0));
            match self.store.insert(record).await {
                Ok(()) => {
                    info!("Session {} created by {} with code {}", session_id, caller, code);
                    return Ok(SessionHandle { session_id, code });
                }
                Err(StoreError::Duplicate(what)) => {
                    debug!("Insert collided on {}, retrying", what);
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!("Could not allocate a room code after {} attempts", ROOM_CODE_ATTEMPTS);
        Err(EngineError::Internal(
            "could not allocate a unique room code".to_string(),
        ))
    }

    pub async fn join_session(
        &self,
        caller: Option<&PlayerId>,
        code: &str,
        display_name: &str,
    ) -> Result<JoinReceipt, EngineError> {
        let caller = authenticated(caller)?;
        let code = normalize_room_code(code);
        if code.is_empty() {
            return Err(EngineError::invalid("room code is empty"));
        }
        let session_id = self
            .store
            .find_by_code(&code)
            .await?
            .ok_or_else(|| not_found_code(&code))?;

        let display_name = display_name.trim();
        let receipt = self
            .transact(&session_id, |record, _| {
                if record.session.status != SessionStatus::Waiting {
                    return Err(not_found_code(&code));
                }
                if record.players.contains_key(caller) {
                    return Ok(true);
                }
                let seated = record.players.len();
                if seated >= MAX_PLAYERS {
                    return Err(EngineError::ResourceExhausted(format!(
                        "session is full ({} players max)",
                        MAX_PLAYERS
                    )));
                }

                let name = if display_name.is_empty() {
                    format!("Player {}", seated + 1)
                } else {
                    display_name.to_string()
                };
                record
                    .players
                    .insert(caller.clone(), Player::new(caller.clone(), name, seated));
                Ok(false)
            })
            .await?;

        if !receipt {
            info!("Player {} joined session {}", caller, session_id);
        }
        Ok(JoinReceipt {
            session_id,
            already_joined: receipt,
        })
    }

    pub async fn start_session(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
    ) -> Result<StartReceipt, EngineError> {
        let caller = authenticated(caller)?;
        let receipt = self
            .transact(session_id, |record, rng| {
                if record.session.host_id != *caller {
                    return Err(EngineError::denied("only the host can start the game"));
                }
                if record.session.status != SessionStatus::Waiting {
                    return Err(EngineError::precondition("the game has already started"));
                }
                let player_count = record.players.len();
                if player_count < MIN_PLAYERS {
                    return Err(EngineError::precondition(format!(
                        "at least {} players are needed (there are {})",
                        MIN_PLAYERS, player_count
                    )));
                }

                let mut order: Vec<PlayerId> = record.players.keys().cloned().collect();
                shuffle(&mut order, rng);
                let assigned = roles::assign(&order, rng)?;

                for (index, id) in order.iter().enumerate() {
                    if let Some(player) = record.players.get_mut(id) {
                        player.order_index = index;
                    }
                }
                let session = &mut record.session;
                session.status = SessionStatus::Playing;
                session.phase = Phase::Nomination;
                session.president_index = 0;
                session.deck = PolicyDeck::new_shuffled(rng);
                session.player_order = order;
                record.roles = assigned;

                let first_president_id = record
                    .session
                    .president_id()
                    .cloned()
                    .ok_or_else(|| EngineError::Internal("empty player order".to_string()))?;
                Ok(StartReceipt {
                    player_count,
                    first_president_id,
                })
            })
            .await?;

        info!(
            "Session {} started with {} players, first president {}",
            session_id, receipt.player_count, receipt.first_president_id
        );
        Ok(receipt)
    }

    pub async fn nominate_chancellor(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
        nominee_id: &PlayerId,
    ) -> Result<PlayerId, EngineError> {
        let caller = authenticated(caller)?;
        self.transact(session_id, |record, _| {
            let session = &record.session;
            if !session.is_president(caller) {
                return Err(EngineError::denied("only the president can nominate"));
            }
            if session.phase != Phase::Nomination {
                return Err(EngineError::precondition("it is not time to nominate"));
            }
            if nominee_id == caller {
                return Err(EngineError::invalid("you cannot nominate yourself"));
            }
            if session.previous_chancellor_id.as_ref() == Some(nominee_id) {
                return Err(EngineError::invalid(
                    "the previous chancellor cannot be nominated",
                ));
            }
            if record.alive_count() > TERM_LIMIT_ALIVE_THRESHOLD
                && session.previous_president_id.as_ref() == Some(nominee_id)
            {
                return Err(EngineError::invalid(format!(
                    "the previous president cannot be nominated with more than {} players alive",
                    TERM_LIMIT_ALIVE_THRESHOLD
                )));
            }
            if !record.is_alive(nominee_id) {
                return Err(EngineError::invalid(format!(
                    "{} is not available for nomination",
                    nominee_id
                )));
            }

            for player in record.players.values_mut() {
                player.reset_vote();
            }
            let session = &mut record.session;
            session.chancellor_id = Some(nominee_id.clone());
            session.phase = Phase::Voting;
            session.round += 1;
            Ok(())
        })
        .await?;

        info!(
            "Session {}: {} nominated {} for chancellor",
            session_id, caller, nominee_id
        );
        Ok(nominee_id.clone())
    }

    /// Registers a vote. The request whose vote completes the round applies the
    /// tally and its phase transition in the same commit.
    pub async fn cast_vote(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
        vote: bool,
    ) -> Result<VoteReceipt, EngineError> {
        let caller = authenticated(caller)?;
        self.transact(session_id, |record, rng| {
            let resolution = match votes::register_vote(record, caller, vote)? {
                VoteProgress::Pending { cast, needed } => {
                    debug!("Session {}: {}/{} votes in", record.id(), cast, needed);
                    None
                }
                VoteProgress::Complete(tally) => {
                    Some(phases::resolve_election(record, &tally, rng)?)
                }
            };
            Ok(VoteReceipt { vote, resolution })
        })
        .await
    }

    pub async fn discard_policy(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
        index: usize,
    ) -> Result<(), EngineError> {
        let caller = authenticated(caller)?;
        self.transact(session_id, |record, _| {
            legislative::discard_policy(record, caller, index)
        })
        .await
    }

    pub async fn enact_policy(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
        index: usize,
    ) -> Result<EnactOutcome, EngineError> {
        let caller = authenticated(caller)?;
        self.transact(session_id, |record, rng| {
            legislative::enact_policy(record, caller, index, rng)
        })
        .await
    }

    pub async fn request_veto(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
    ) -> Result<(), EngineError> {
        let caller = authenticated(caller)?;
        self.transact(session_id, |record, _| {
            legislative::request_veto(record, caller)
        })
        .await?;
        info!("Session {}: {} requested a veto", session_id, caller);
        Ok(())
    }

    pub async fn respond_veto(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
        accept: bool,
    ) -> Result<VetoOutcome, EngineError> {
        let caller = authenticated(caller)?;
        self.transact(session_id, |record, rng| {
            legislative::respond_veto(record, caller, accept, rng)
        })
        .await
    }

    pub async fn use_executive_power(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
        target: Option<&PlayerId>,
    ) -> Result<PowerResult, EngineError> {
        let caller = authenticated(caller)?;
        self.transact(session_id, |record, rng| {
            legislative::use_power(record, caller, target, rng)
        })
        .await
    }

    pub async fn view_session(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
    ) -> Result<PublicSessionView, EngineError> {
        let caller = authenticated(caller)?;
        let record = self.load_as_participant(caller, session_id).await?;
        Ok(record.public_view())
    }

    pub async fn view_private(
        &self,
        caller: Option<&PlayerId>,
        session_id: &SessionId,
    ) -> Result<PrivateView, EngineError> {
        let caller = authenticated(caller)?;
        let record = self.load_as_participant(caller, session_id).await?;
        Ok(PrivateView {
            role: record.roles.get(caller).cloned(),
            hand: record.hand_for(caller),
        })
    }

    async fn load_as_participant(
        &self,
        caller: &PlayerId,
        session_id: &SessionId,
    ) -> Result<SessionRecord, EngineError> {
        let record = self
            .store
            .load(session_id)
            .await?
            .ok_or_else(|| not_found_session(session_id))?
            .value;
        if !record.players.contains_key(caller) {
            return Err(EngineError::NotFound(format!(
                "you are not part of session {}",
                session_id
            )));
        }
        Ok(record)
    }

    /// Load, apply, compare-and-swap; re-run `apply` on a fresh record after a conflict.
    ///
    /// `apply` must validate before it mutates. An error from `apply` aborts
    /// without writing, and an unchanged record is not written at all.
    async fn transact<T, F>(&self, session_id: &SessionId, mut apply: F) -> Result<T, EngineError>
    where
        F: FnMut(&mut SessionRecord, &mut StdRng) -> Result<T, EngineError>,
    {
        for attempt in 1..=self.config.max_commit_retries {
            let current = self
                .store
                .load(session_id)
                .await?
                .ok_or_else(|| not_found_session(session_id))?;

            let mut record = current.value.clone();
            let outcome = {
                let mut rng = self.lock_rng()?;
                apply(&mut record, &mut *rng)?
            };
            if record == current.value {
                return Ok(outcome);
            }

            match self
                .store
                .compare_and_swap(session_id, current.version, record)
                .await
            {
                Ok(_) => return Ok(outcome),
                Err(StoreError::Conflict { expected, actual }) => {
                    debug!(
                        "Session {}: commit conflict on attempt {} (expected v{}, found v{})",
                        session_id, attempt, expected, actual
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            "Session {}: gave up after {} conflicting commits",
            session_id, self.config.max_commit_retries
        );
        Err(EngineError::Internal(format!(
            "too much contention on session {}, try again",
            session_id
        )))
    }

    fn lock_rng(&self) -> Result<std::sync::MutexGuard<'_, StdRng>, EngineError> {
        self.rng
            .lock()
            .map_err(|_| EngineError::Internal("random source is poisoned".to_string()))
    }
}

fn authenticated(caller: Option<&PlayerId>) -> Result<&PlayerId, EngineError> {
    caller.ok_or(EngineError::Unauthenticated)
}

fn not_found_session(session_id: &SessionId) -> EngineError {
    EngineError::NotFound(format!("session {} not found", session_id))
}

fn not_found_code(code: &str) -> EngineError {
    EngineError::NotFound(format!("no open session with code {}", code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemorySessionStore, Versioned};
    use async_trait::async_trait;
    use shared::{Role, Team, TallyResult, WinReason};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine(seed: u64) -> (GameEngine, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let engine = GameEngine::with_rng(
            store.clone(),
            StdRng::seed_from_u64(seed),
            EngineConfig::default(),
        );
        (engine, store)
    }

    fn id(i: usize) -> PlayerId {
        PlayerId::new(format!("player-{}", i))
    }

    async fn lobby(engine: &GameEngine, n: usize) -> SessionHandle {
        let handle = engine.create_session(Some(&id(0)), "Ana").await.unwrap();
        for i in 1..n {
            engine
                .join_session(Some(&id(i)), &handle.code, &format!("p{}", i))
                .await
                .unwrap();
        }
        handle
    }

    async fn started(engine: &GameEngine, n: usize) -> (SessionId, PublicSessionView) {
        let handle = lobby(engine, n).await;
        engine
            .start_session(Some(&id(0)), &handle.session_id)
            .await
            .unwrap();
        let view = engine
            .view_session(Some(&id(0)), &handle.session_id)
            .await
            .unwrap();
        (handle.session_id, view)
    }

    /// Writes the same record back before delegating, so the next CAS the engine
    /// attempts always sees a newer version.
    struct ContendedStore {
        inner: InMemorySessionStore,
        interferences: AtomicUsize,
    }

    #[async_trait]
    impl SessionStore for ContendedStore {
        async fn load(
            &self,
            id: &SessionId,
        ) -> Result<Option<Versioned<SessionRecord>>, StoreError> {
            self.inner.load(id).await
        }

        async fn insert(&self, record: SessionRecord) -> Result<(), StoreError> {
            self.inner.insert(record).await
        }

        async fn compare_and_swap(
            &self,
            id: &SessionId,
            expected_version: u64,
            record: SessionRecord,
        ) -> Result<u64, StoreError> {
            let remaining = self.interferences.load(Ordering::SeqCst);
            if remaining > 0 {
                self.interferences.store(remaining - 1, Ordering::SeqCst);
                if let Some(current) = self.inner.load(id).await? {
                    self.inner
                        .compare_and_swap(id, current.version, current.value)
                        .await?;
                }
            }
            self.inner.compare_and_swap(id, expected_version, record).await
        }

        async fn find_by_code(&self, code: &str) -> Result<Option<SessionId>, StoreError> {
            self.inner.find_by_code(code).await
        }
    }

    #[tokio::test]
    async fn test_every_operation_requires_identity() {
        let (engine, _) = engine(1);
        let sid = SessionId::from("whatever");
        assert_eq!(
            engine.create_session(None, "x").await.unwrap_err(),
            EngineError::Unauthenticated
        );
        assert_eq!(
            engine.join_session(None, "ABCDEF", "x").await.unwrap_err(),
            EngineError::Unauthenticated
        );
        assert_eq!(
            engine.cast_vote(None, &sid, true).await.unwrap_err(),
            EngineError::Unauthenticated
        );
        assert_eq!(
            engine.view_session(None, &sid).await.unwrap_err(),
            EngineError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_create_session_seats_host() {
        let (engine, store) = engine(2);
        let handle = engine.create_session(Some(&id(0)), "  ").await.unwrap();
        assert!(shared::is_valid_room_code(&handle.code));

        let stored = store.load(&handle.session_id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        let host = &stored.value.players[&id(0)];
        assert_eq!(host.name, DEFAULT_HOST_NAME);
        assert_eq!(host.order_index, 0);
        assert_eq!(stored.value.session.status, SessionStatus::Waiting);
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_bounded() {
        let (engine, _) = engine(3);
        let handle = lobby(&engine, MAX_PLAYERS).await;

        let again = engine
            .join_session(Some(&id(3)), &handle.code.to_lowercase(), "")
            .await
            .unwrap();
        assert!(again.already_joined);
        assert_eq!(again.session_id, handle.session_id);

        let err = engine
            .join_session(Some(&id(99)), &handle.code, "late")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ResourceExhausted(_)));
    }

    #[tokio::test]
    async fn test_join_default_name_and_unknown_code() {
        let (engine, _) = engine(4);
        let handle = lobby(&engine, 1).await;
        engine
            .join_session(Some(&id(1)), &handle.code, "")
            .await
            .unwrap();
        let view = engine
            .view_session(Some(&id(1)), &handle.session_id)
            .await
            .unwrap();
        assert_eq!(view.players[1].name, "Player 2");

        let err = engine
            .join_session(Some(&id(2)), "ZZZZZZ", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        let err = engine.join_session(Some(&id(2)), "  ", "x").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_join_after_start_is_not_found() {
        let (engine, _) = engine(5);
        let handle = lobby(&engine, 5).await;
        engine
            .start_session(Some(&id(0)), &handle.session_id)
            .await
            .unwrap();
        let err = engine
            .join_session(Some(&id(7)), &handle.code, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_start_preconditions() {
        let (engine, _) = engine(6);
        let handle = lobby(&engine, 4).await;

        let err = engine
            .start_session(Some(&id(1)), &handle.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied(_)));
        let err = engine
            .start_session(Some(&id(0)), &handle.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FailedPrecondition(_)));

        engine
            .join_session(Some(&id(4)), &handle.code, "p4")
            .await
            .unwrap();
        let receipt = engine
            .start_session(Some(&id(0)), &handle.session_id)
            .await
            .unwrap();
        assert_eq!(receipt.player_count, 5);

        let err = engine
            .start_session(Some(&id(0)), &handle.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_start_assigns_roles_and_deck() {
        let (engine, store) = engine(7);
        let (sid, view) = started(&engine, 7).await;
        assert_eq!(view.status, SessionStatus::Playing);
        assert_eq!(view.phase, Phase::Nomination);
        assert_eq!(view.player_order.len(), 7);
        assert_eq!(view.president_id.as_ref(), Some(&view.player_order[0]));
        assert_eq!(view.draw_pile, 17);
        assert!(view.revealed_roles.is_none());

        let record = store.load(&sid).await.unwrap().unwrap().value;
        let francos = record
            .roles
            .values()
            .filter(|r| r.role == Role::Franco)
            .count();
        assert_eq!(francos, 1);
        for (index, pid) in record.session.player_order.iter().enumerate() {
            assert_eq!(record.players[pid].order_index, index);
        }

        let private = engine.view_private(Some(&id(3)), &sid).await.unwrap();
        assert!(private.role.is_some());
        assert!(private.hand.is_empty());
    }

    #[tokio::test]
    async fn test_nomination_rules() {
        let (engine, _) = engine(8);
        let (sid, view) = started(&engine, 5).await;
        let president = view.player_order[0].clone();
        let other = view.player_order[1].clone();

        let err = engine
            .nominate_chancellor(Some(&other), &sid, &president)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied(_)));
        let err = engine
            .nominate_chancellor(Some(&president), &sid, &president)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        let err = engine
            .nominate_chancellor(Some(&president), &sid, &PlayerId::from("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));

        engine
            .nominate_chancellor(Some(&president), &sid, &other)
            .await
            .unwrap();
        let err = engine
            .nominate_chancellor(Some(&president), &sid, &other)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FailedPrecondition(_)));

        let view = engine.view_session(Some(&president), &sid).await.unwrap();
        assert_eq!(view.phase, Phase::Voting);
        assert_eq!(view.chancellor_id, Some(other));
        assert_eq!(view.round, 1);
    }

    #[tokio::test]
    async fn test_term_limits_and_dead_nominees_on_larger_tables() {
        let (engine, store) = engine(21);
        let (sid, view) = started(&engine, 7).await;
        let order = view.player_order.clone();

        engine
            .nominate_chancellor(Some(&order[0]), &sid, &order[1])
            .await
            .unwrap();
        for pid in &order {
            engine.cast_vote(Some(pid), &sid, true).await.unwrap();
        }
        engine.discard_policy(Some(&order[0]), &sid, 0).await.unwrap();
        engine.enact_policy(Some(&order[1]), &sid, 0).await.unwrap();

        let view = engine.view_session(Some(&order[0]), &sid).await.unwrap();
        assert_eq!(view.phase, Phase::Nomination);
        assert_eq!(view.president_id.as_ref(), Some(&order[1]));
        assert_eq!(view.previous_president_id.as_ref(), Some(&order[0]));

        let version = store.load(&sid).await.unwrap().unwrap().version;
        let err = engine
            .nominate_chancellor(Some(&order[1]), &sid, &order[0])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert_eq!(store.load(&sid).await.unwrap().unwrap().version, version);

        let mut record = store.load(&sid).await.unwrap().unwrap().value;
        if let Some(player) = record.players.get_mut(&order[3]) {
            player.is_alive = false;
        }
        let version = store.compare_and_swap(&sid, version, record).await.unwrap();

        let err = engine
            .nominate_chancellor(Some(&order[1]), &sid, &order[3])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert_eq!(store.load(&sid).await.unwrap().unwrap().version, version);

        let view = engine.view_session(Some(&order[1]), &sid).await.unwrap();
        assert_eq!(view.phase, Phase::Nomination);
        assert_eq!(view.chancellor_id, None);
    }

    #[tokio::test]
    async fn test_approved_vote_deals_hand_to_president() {
        let (engine, _) = engine(9);
        let (sid, view) = started(&engine, 5).await;
        let order = view.player_order.clone();
        engine
            .nominate_chancellor(Some(&order[0]), &sid, &order[1])
            .await
            .unwrap();

        for pid in &order[..4] {
            let receipt = engine.cast_vote(Some(pid), &sid, true).await.unwrap();
            assert_eq!(receipt.resolution, None);
        }
        let last = engine.cast_vote(Some(&order[4]), &sid, true).await.unwrap();

        let view = engine.view_session(Some(&order[0]), &sid).await.unwrap();
        assert_eq!(last.resolution, Some(RoundResolution::Approved));
        assert_eq!(view.phase, Phase::PresidentDiscard);
        assert_eq!(view.last_tally.unwrap().result, TallyResult::Approved);

        let president_view = engine.view_private(Some(&order[0]), &sid).await.unwrap();
        assert_eq!(president_view.hand.len(), 3);
        let chancellor_view = engine.view_private(Some(&order[1]), &sid).await.unwrap();
        assert!(chancellor_view.hand.is_empty());
    }

    #[tokio::test]
    async fn test_legislative_round_through_engine() {
        let (engine, _) = engine(10);
        let (sid, view) = started(&engine, 5).await;
        let order = view.player_order.clone();

        engine
            .nominate_chancellor(Some(&order[0]), &sid, &order[1])
            .await
            .unwrap();
        for pid in &order {
            engine.cast_vote(Some(pid), &sid, true).await.unwrap();
        }

        engine.discard_policy(Some(&order[0]), &sid, 0).await.unwrap();
        let err = engine
            .discard_policy(Some(&order[0]), &sid, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FailedPrecondition(_)));

        let outcome = engine.enact_policy(Some(&order[1]), &sid, 0).await.unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.power, None);

        let view = engine.view_session(Some(&order[0]), &sid).await.unwrap();
        assert_eq!(view.phase, Phase::Nomination);
        assert_eq!(view.president_id.as_ref(), Some(&order[1]));
        assert_eq!(view.previous_president_id.as_ref(), Some(&order[0]));
        assert_eq!(view.previous_chancellor_id.as_ref(), Some(&order[1]));
        assert_eq!(
            usize::from(view.republican_policies + view.fascist_policies)
                + view.draw_pile
                + view.discard_pile,
            17
        );
    }

    #[tokio::test]
    async fn test_failed_precondition_writes_nothing() {
        let (engine, store) = engine(11);
        let (sid, view) = started(&engine, 5).await;
        let before = store.load(&sid).await.unwrap().unwrap();

        let err = engine
            .cast_vote(Some(&view.player_order[2]), &sid, true)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FailedPrecondition(_)));

        let after = store.load(&sid).await.unwrap().unwrap();
        assert_eq!(before.version, after.version);
        assert_eq!(before.value, after.value);
    }

    #[tokio::test]
    async fn test_conflicts_are_retried() {
        let inner = InMemorySessionStore::new();
        let store = Arc::new(ContendedStore {
            inner,
            interferences: AtomicUsize::new(0),
        });
        let engine = GameEngine::with_rng(
            store.clone(),
            StdRng::seed_from_u64(12),
            EngineConfig::default(),
        );
        let handle = lobby(&engine, 1).await;

        store.interferences.store(3, Ordering::SeqCst);
        let receipt = engine
            .join_session(Some(&id(1)), &handle.code, "p1")
            .await
            .unwrap();
        assert!(!receipt.already_joined);

        let view = engine
            .view_session(Some(&id(1)), &handle.session_id)
            .await
            .unwrap();
        assert_eq!(view.players.len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_internal() {
        let store = Arc::new(ContendedStore {
            inner: InMemorySessionStore::new(),
            interferences: AtomicUsize::new(0),
        });
        let engine = GameEngine::with_rng(
            store.clone(),
            StdRng::seed_from_u64(13),
            EngineConfig {
                max_commit_retries: 2,
            },
        );
        let handle = lobby(&engine, 1).await;

        store.interferences.store(usize::MAX, Ordering::SeqCst);
        let err = engine
            .join_session(Some(&id(1)), &handle.code, "p1")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));

        store.interferences.store(0, Ordering::SeqCst);
        let view = engine
            .view_session(Some(&id(0)), &handle.session_id)
            .await
            .unwrap();
        assert_eq!(view.players.len(), 1);
    }

    #[tokio::test]
    async fn test_view_requires_participation() {
        let (engine, _) = engine(14);
        let handle = lobby(&engine, 2).await;
        let err = engine
            .view_session(Some(&PlayerId::from("stranger")), &handle.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        let err = engine
            .view_private(Some(&id(0)), &SessionId::from("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_franco_elected_after_three_fascist_policies() {
        let (engine, store) = engine(15);
        let (sid, view) = started(&engine, 5).await;
        let order = view.player_order.clone();

        let mut versioned = store.load(&sid).await.unwrap().unwrap();
        versioned.value.session.fascist_policies = 3;
        let franco = versioned
            .value
            .roles
            .iter()
            .find(|(_, r)| r.role == Role::Franco)
            .map(|(pid, _)| pid.clone())
            .unwrap();
        let president = order.iter().find(|p| **p != franco).unwrap().clone();
        versioned.value.session.president_index =
            order.iter().position(|p| *p == president).unwrap();
        store
            .compare_and_swap(&sid, versioned.version, versioned.value)
            .await
            .unwrap();

        engine
            .nominate_chancellor(Some(&president), &sid, &franco)
            .await
            .unwrap();
        let mut resolution = None;
        for pid in &order {
            resolution = engine.cast_vote(Some(pid), &sid, true).await.unwrap().resolution;
        }
        assert_eq!(resolution, Some(RoundResolution::FrancoElected));

        let view = engine.view_session(Some(&president), &sid).await.unwrap();
        assert_eq!(view.phase, Phase::GameOver);
        assert_eq!(view.winner, Some(Team::Fascists));
        assert_eq!(view.win_reason, Some(WinReason::FrancoElectedChancellor));
        assert_eq!(view.revealed_roles.unwrap().len(), 5);

        let err = engine
            .nominate_chancellor(Some(&president), &sid, &franco)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FailedPrecondition(_)));
    }
}
