//! Phase transitions shared by every operation that ends a round.
//!
//! ```text
//! nomination -> voting -> presidentDiscard -> chancellorEnact -> (executiveAction) -> nomination
//!                      \-> nomination (rejected, presidency rotates)
//! any state -> gameOver
//! ```
//!
//! All functions here mutate a private copy of the record inside an engine
//! transaction; none of them touch the store.

use crate::error::EngineError;
use crate::legislative;
use crate::session::{SessionRecord, VetoState};
use crate::win::{self, Victory};
use log::info;
use rand::Rng;
use shared::{
    Phase, Policy, RoundResolution, SessionStatus, Tally, TallyResult, WinReason,
    ELECTION_TRACKER_LIMIT, LEGISLATIVE_HAND_SIZE, VETO_THRESHOLD,
};

/// Applies the outcome of a completed vote. Runs exactly once per round.
pub fn resolve_election<R: Rng + ?Sized>(
    record: &mut SessionRecord,
    tally: &Tally,
    rng: &mut R,
) -> Result<RoundResolution, EngineError> {
    info!(
        "Session {} round {}: {} yes / {} no -> {:?}",
        record.id(),
        tally.round,
        tally.yes,
        tally.no,
        tally.result
    );

    match tally.result {
        TallyResult::Approved => {
            let chancellor = record.session.chancellor_id.clone().ok_or_else(|| {
                EngineError::Internal("approved government has no chancellor".to_string())
            })?;
            record.session.election_tracker = 0;

            let session = &record.session;
            let chancellor_role = record.role_of(&chancellor);
            if let Some(victory) = win::evaluate(
                session.republican_policies,
                session.fascist_policies,
                chancellor_role,
            ) {
                finish(record, victory);
                return Ok(match victory.reason {
                    WinReason::FrancoElectedChancellor => RoundResolution::FrancoElected,
                    _ => RoundResolution::Approved,
                });
            }

            legislative::begin_session(record, rng)?;
            Ok(RoundResolution::Approved)
        }
        TallyResult::Rejected => {
            record.session.chancellor_id = None;
            let chaos_policy = advance_election_tracker(record, rng)?;
            Ok(RoundResolution::Rejected { chaos_policy })
        }
    }
}

/// Counts a failed government. On the third failure the top card is enacted
/// without a chancellor and term limits are forgotten.
pub fn advance_election_tracker<R: Rng + ?Sized>(
    record: &mut SessionRecord,
    rng: &mut R,
) -> Result<Option<Policy>, EngineError> {
    record.session.election_tracker += 1;
    if record.session.election_tracker < ELECTION_TRACKER_LIMIT {
        end_round(record, rng);
        return Ok(None);
    }

    let session = &mut record.session;
    session.deck.replenish(1, rng);
    let policy = session.deck.draw(1)?.remove(0);
    session.election_tracker = 0;
    session.chancellor_id = None;
    session.previous_president_id = None;
    session.previous_chancellor_id = None;
    info!(
        "Session {}: election tracker maxed out, {:?} policy enacted by chaos",
        session.id, policy
    );

    match enact(record, policy) {
        Some(victory) => finish(record, victory),
        None => end_round(record, rng),
    }
    Ok(Some(policy))
}

/// Moves a policy onto its track and reports a win if one follows.
pub fn enact(record: &mut SessionRecord, policy: Policy) -> Option<Victory> {
    let session = &mut record.session;
    match policy {
        Policy::Republican => session.republican_policies += 1,
        Policy::Fascist => session.fascist_policies += 1,
    }
    if session.fascist_policies >= VETO_THRESHOLD {
        session.veto_enabled = true;
    }
    info!(
        "Session {}: {:?} policy enacted ({} republican / {} fascist)",
        session.id, policy, session.republican_policies, session.fascist_policies
    );

    win::evaluate(session.republican_policies, session.fascist_policies, None)
}

/// Terminal transition. Nothing may mutate the session afterwards.
pub fn finish(record: &mut SessionRecord, victory: Victory) {
    let session = &mut record.session;
    session.phase = Phase::GameOver;
    session.status = SessionStatus::Finished;
    session.winner = Some(victory.winner);
    session.win_reason = Some(victory.reason);
    session.current_power = None;
    session.veto = VetoState::None;
    info!(
        "Session {}: game over, {:?} win by {:?}",
        session.id, victory.winner, victory.reason
    );
}

/// Closes the current round and hands the presidency on.
pub fn end_round<R: Rng + ?Sized>(record: &mut SessionRecord, rng: &mut R) {
    let session = &mut record.session;
    session.chancellor_id = None;
    session.current_power = None;
    session.veto = VetoState::None;
    if !session.hand.is_empty() {
        let leftover = std::mem::take(&mut session.hand);
        session.deck.discard(leftover);
    }
    session.deck.replenish(LEGISLATIVE_HAND_SIZE, rng);
    session.phase = Phase::Nomination;
    advance_presidency(record);
}

/// Next alive player in seat order, resuming after the caller of a special election if there was one.
pub fn advance_presidency(record: &mut SessionRecord) {
    let seats = record.session.player_order.len();
    if seats == 0 {
        return;
    }

    let from = record
        .session
        .special_election_caller
        .take()
        .unwrap_or(record.session.president_index);
    let next = (1..=seats)
        .map(|step| (from + step) % seats)
        .find(|&index| record.is_alive(&record.session.player_order[index]));

    if let Some(index) = next {
        record.session.president_index = index;
    }
}
