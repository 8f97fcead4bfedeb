//! Legislative session and executive powers.
//!
//! The president draws three policies and discards one, the chancellor enacts
//! one of the remaining two and discards the other. A fascist policy enacted by
//! an elected government may grant the president a one-shot executive power.

use crate::error::EngineError;
use crate::phases;
use crate::session::{SessionRecord, VetoState};
use crate::win;
use log::info;
use rand::Rng;
use shared::{
    ExecutivePower, Phase, Policy, PlayerId, PowerResult, Team, LEGISLATIVE_HAND_SIZE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnactOutcome {
    pub enacted: Policy,
    pub power: Option<ExecutivePower>,
    pub winner: Option<Team>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VetoOutcome {
    pub accepted: bool,
    pub chaos_policy: Option<Policy>,
}

/// Power granted by the `fascist_policies`-th fascist policy at a table of `player_count`.
pub fn power_for(player_count: usize, fascist_policies: u8) -> Option<ExecutivePower> {
    use ExecutivePower::*;
    match (player_count, fascist_policies) {
        (5..=6, 3) => Some(PolicyPeek),
        (7..=10, 2) => Some(InvestigateLoyalty),
        (9..=10, 1) => Some(InvestigateLoyalty),
        (7..=10, 3) => Some(SpecialElection),
        (5..=10, 4 | 5) => Some(Execution),
        _ => None,
    }
}

/// Seats the newly elected government and deals the president's hand.
pub fn begin_session<R: Rng + ?Sized>(
    record: &mut SessionRecord,
    rng: &mut R,
) -> Result<(), EngineError> {
    let session = &mut record.session;
    session.deck.replenish(LEGISLATIVE_HAND_SIZE, rng);
    session.hand = session.deck.draw(LEGISLATIVE_HAND_SIZE)?;

    let president = session.president_id().cloned();
    let chancellor = session.chancellor_id.clone();
    session.previous_president_id = president.clone();
    session.previous_chancellor_id = chancellor.clone();
    session.veto = VetoState::None;
    session.phase = Phase::PresidentDiscard;

    if let Some(player) = president.and_then(|id| record.players.get_mut(&id)) {
        player.was_president = true;
    }
    if let Some(player) = chancellor.and_then(|id| record.players.get_mut(&id)) {
        player.was_chancellor = true;
    }
    Ok(())
}

pub fn discard_policy(
    record: &mut SessionRecord,
    caller: &PlayerId,
    index: usize,
) -> Result<(), EngineError> {
    let session = &mut record.session;
    if session.phase != Phase::PresidentDiscard {
        return Err(EngineError::precondition("the president is not discarding"));
    }
    if !session.is_president(caller) {
        return Err(EngineError::denied("only the president may discard"));
    }
    if index >= session.hand.len() {
        return Err(EngineError::invalid(format!(
            "card index {} is out of range for a hand of {}",
            index,
            session.hand.len()
        )));
    }

    let card = session.hand.remove(index);
    session.deck.discard([card]);
    session.phase = Phase::ChancellorEnact;
    Ok(())
}

pub fn enact_policy<R: Rng + ?Sized>(
    record: &mut SessionRecord,
    caller: &PlayerId,
    index: usize,
    rng: &mut R,
) -> Result<EnactOutcome, EngineError> {
    let session = &mut record.session;
    if session.phase != Phase::ChancellorEnact {
        return Err(EngineError::precondition("the chancellor is not enacting"));
    }
    if !session.is_chancellor(caller) {
        return Err(EngineError::denied("only the chancellor may enact"));
    }
    if session.veto == VetoState::Requested {
        return Err(EngineError::precondition(
            "waiting for the president to answer the veto",
        ));
    }
    if index >= session.hand.len() {
        return Err(EngineError::invalid(format!(
            "card index {} is out of range for a hand of {}",
            index,
            session.hand.len()
        )));
    }

    let enacted = session.hand.remove(index);
    let rest = std::mem::take(&mut session.hand);
    session.deck.discard(rest);
    session.deck.replenish(LEGISLATIVE_HAND_SIZE, rng);

    if let Some(victory) = phases::enact(record, enacted) {
        phases::finish(record, victory);
        return Ok(EnactOutcome {
            enacted,
            power: None,
            winner: Some(victory.winner),
        });
    }

    let power = match enacted {
        Policy::Fascist => power_for(
            record.session.player_order.len(),
            record.session.fascist_policies,
        ),
        Policy::Republican => None,
    };
    match power {
        Some(power) => {
            info!("Session {}: president gains {:?}", record.id(), power);
            record.session.current_power = Some(power);
            record.session.phase = Phase::ExecutiveAction;
        }
        None => phases::end_round(record, rng),
    }

    Ok(EnactOutcome {
        enacted,
        power,
        winner: None,
    })
}

pub fn request_veto(record: &mut SessionRecord, caller: &PlayerId) -> Result<(), EngineError> {
    let session = &mut record.session;
    if session.phase != Phase::ChancellorEnact {
        return Err(EngineError::precondition("the chancellor is not enacting"));
    }
    if !session.is_chancellor(caller) {
        return Err(EngineError::denied("only the chancellor may request a veto"));
    }
    if !session.veto_enabled {
        return Err(EngineError::precondition("veto power is not unlocked yet"));
    }
    match session.veto {
        VetoState::Requested => Err(EngineError::AlreadyExists(
            "a veto is already pending".to_string(),
        )),
        VetoState::Refused => Err(EngineError::precondition(
            "the president refused the veto; a policy must be enacted",
        )),
        VetoState::None => {
            session.veto = VetoState::Requested;
            Ok(())
        }
    }
}

pub fn respond_veto<R: Rng + ?Sized>(
    record: &mut SessionRecord,
    caller: &PlayerId,
    accept: bool,
    rng: &mut R,
) -> Result<VetoOutcome, EngineError> {
    let session = &mut record.session;
    if session.phase != Phase::ChancellorEnact {
        return Err(EngineError::precondition("the chancellor is not enacting"));
    }
    if !session.is_president(caller) {
        return Err(EngineError::denied("only the president may answer a veto"));
    }
    if session.veto != VetoState::Requested {
        return Err(EngineError::precondition("no veto is pending"));
    }

    if !accept {
        session.veto = VetoState::Refused;
        return Ok(VetoOutcome {
            accepted: false,
            chaos_policy: None,
        });
    }

    info!("Session {}: agenda vetoed", session.id);
    let hand = std::mem::take(&mut session.hand);
    session.deck.discard(hand);
    let chaos_policy = phases::advance_election_tracker(record, rng)?;
    Ok(VetoOutcome {
        accepted: true,
        chaos_policy,
    })
}

pub fn use_power<R: Rng + ?Sized>(
    record: &mut SessionRecord,
    caller: &PlayerId,
    target: Option<&PlayerId>,
    rng: &mut R,
) -> Result<PowerResult, EngineError> {
    if record.session.phase != Phase::ExecutiveAction {
        return Err(EngineError::precondition("no executive power is pending"));
    }
    if !record.session.is_president(caller) {
        return Err(EngineError::denied("only the president may use this power"));
    }
    let power = record
        .session
        .current_power
        .ok_or_else(|| EngineError::Internal("executive phase without a power".to_string()))?;

    let result = match power {
        ExecutivePower::PolicyPeek => {
            let top = record.session.deck.peek(LEGISLATIVE_HAND_SIZE).to_vec();
            phases::end_round(record, rng);
            PowerResult::PolicyPeek { top }
        }
        ExecutivePower::InvestigateLoyalty => {
            let target = eligible_target(record, caller, target)?;
            if record.session.investigated.contains(&target) {
                return Err(EngineError::invalid(format!(
                    "{} has already been investigated",
                    target
                )));
            }
            let party = record
                .roles
                .get(&target)
                .map(|r| r.party)
                .ok_or_else(|| EngineError::Internal(format!("{} has no role", target)))?;
            record.session.investigated.insert(target.clone());
            phases::end_round(record, rng);
            PowerResult::Investigated { target, party }
        }
        ExecutivePower::SpecialElection => {
            let target = eligible_target(record, caller, target)?;
            let seat = record
                .session
                .player_order
                .iter()
                .position(|id| *id == target)
                .ok_or_else(|| EngineError::Internal(format!("{} has no seat", target)))?;

            let session = &mut record.session;
            session.special_election_caller = Some(session.president_index);
            session.president_index = seat;
            session.chancellor_id = None;
            session.current_power = None;
            session.phase = Phase::Nomination;
            PowerResult::SpecialElection {
                next_president: target,
            }
        }
        ExecutivePower::Execution => {
            let target = eligible_target(record, caller, target)?;
            if let Some(player) = record.players.get_mut(&target) {
                player.is_alive = false;
            }
            let victory = record
                .role_of(&target)
                .and_then(win::evaluate_execution);
            match victory {
                Some(victory) => phases::finish(record, victory),
                None => phases::end_round(record, rng),
            }
            PowerResult::Executed {
                target,
                winner: victory.map(|v| v.winner),
            }
        }
    };

    info!("Session {}: {:?} used by {}", record.id(), power, caller);
    Ok(result)
}

fn eligible_target(
    record: &SessionRecord,
    caller: &PlayerId,
    target: Option<&PlayerId>,
) -> Result<PlayerId, EngineError> {
    let target = target.ok_or_else(|| EngineError::invalid("this power needs a target"))?;
    if target == caller {
        return Err(EngineError::invalid("you cannot target yourself"));
    }
    match record.players.get(target) {
        None => Err(EngineError::invalid(format!("{} is not in this game", target))),
        Some(player) if !player.is_alive => {
            Err(EngineError::invalid(format!("{} is no longer alive", target)))
        }
        Some(_) => Ok(target.clone()),
    }
}
