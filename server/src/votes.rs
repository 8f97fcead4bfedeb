//! Vote collection for a nominated government.
//!
//! Registration and tallying run inside one engine transaction. The vote that
//! completes the round produces the tally, and the engine leaves the voting
//! phase in the same commit. A competing last vote either loses the
//! compare-and-swap and re-runs against the resolved round, or is counted
//! before the tally. The round is never tallied twice.

use crate::error::EngineError;
use crate::session::SessionRecord;
use shared::{Phase, PlayerId, Tally, TallyResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteProgress {
    Pending { cast: usize, needed: usize },
    Complete(Tally),
}

/// Records `voter`'s choice and, if it was the last outstanding alive vote, tallies the round.
pub fn register_vote(
    record: &mut SessionRecord,
    voter: &PlayerId,
    choice: bool,
) -> Result<VoteProgress, EngineError> {
    let session = &record.session;
    let player = record
        .players
        .get(voter)
        .ok_or_else(|| EngineError::NotFound("you are not part of this session".to_string()))?;

    if session.phase != Phase::Voting {
        if let Some(tally) = session
            .last_tally
            .as_ref()
            .filter(|t| player.has_voted && t.round == session.round)
        {
            return Err(EngineError::AlreadyExists(format!(
                "vote already counted; round {} was {} ({} yes, {} no)",
                tally.round,
                describe(tally.result),
                tally.yes,
                tally.no
            )));
        }
        return Err(EngineError::precondition("it is not time to vote"));
    }
    if !player.is_alive {
        return Err(EngineError::precondition("dead players cannot vote"));
    }
    if player.has_voted {
        return Err(EngineError::AlreadyExists("you have already voted".to_string()));
    }

    if let Some(player) = record.players.get_mut(voter) {
        player.has_voted = true;
        player.vote = Some(choice);
    }

    match tally(record) {
        Some(tally) => {
            record.session.last_tally = Some(tally.clone());
            Ok(VoteProgress::Complete(tally))
        }
        None => {
            let needed = record.alive_count();
            let cast = record
                .players
                .values()
                .filter(|p| p.is_alive && p.has_voted)
                .count();
            Ok(VoteProgress::Pending { cast, needed })
        }
    }
}

/// Returns the tally once every alive player has voted. Strict majority approves.
pub fn tally(record: &SessionRecord) -> Option<Tally> {
    let alive: Vec<_> = record.players.values().filter(|p| p.is_alive).collect();
    if alive.is_empty() || alive.iter().any(|p| !p.has_voted) {
        return None;
    }

    let yes = alive.iter().filter(|p| p.vote == Some(true)).count();
    let no = alive.len() - yes;
    let result = if yes > no {
        TallyResult::Approved
    } else {
        TallyResult::Rejected
    };

    Some(Tally {
        round: record.session.round,
        yes,
        no,
        result,
    })
}

fn describe(result: TallyResult) -> &'static str {
    match result {
        TallyResult::Approved => "approved",
        TallyResult::Rejected => "rejected",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Player, Session};
    use shared::{SessionId, SessionStatus};

    fn voting_record(n: usize) -> SessionRecord {
        let host = PlayerId::from("p0");
        let session = Session::new(SessionId::from("s"), "ABC234".to_string(), host.clone());
        let mut record = SessionRecord::new(session, Player::new(host, "p0".to_string(), 0));
        for i in 1..n {
            let id = PlayerId::new(format!("p{}", i));
            record
                .players
                .insert(id.clone(), Player::new(id, format!("p{}", i), i));
        }
        record.session.status = SessionStatus::Playing;
        record.session.phase = Phase::Voting;
        record.session.round = 1;
        record
    }

    fn id(i: usize) -> PlayerId {
        PlayerId::new(format!("p{}", i))
    }

    #[test]
    fn test_pending_until_last_alive_vote() {
        let mut record = voting_record(5);
        for i in 0..4 {
            let progress = register_vote(&mut record, &id(i), true).unwrap();
            assert_eq!(
                progress,
                VoteProgress::Pending {
                    cast: i + 1,
                    needed: 5
                }
            );
        }
        assert!(record.session.last_tally.is_none());

        let progress = register_vote(&mut record, &id(4), false).unwrap();
        match progress {
            VoteProgress::Complete(tally) => {
                assert_eq!(tally.yes, 4);
                assert_eq!(tally.no, 1);
                assert_eq!(tally.result, TallyResult::Approved);
                assert_eq!(tally.round, 1);
            }
            other => panic!("Expected a tally, got {:?}", other),
        }
        assert!(record.session.last_tally.is_some());
    }

    #[test]
    fn test_tie_is_rejected() {
        let mut record = voting_record(6);
        for i in 0..6 {
            register_vote(&mut record, &id(i), i % 2 == 0).unwrap();
        }
        let tally = record.session.last_tally.unwrap();
        assert_eq!((tally.yes, tally.no), (3, 3));
        assert_eq!(tally.result, TallyResult::Rejected);
    }

    #[test]
    fn test_dead_players_are_not_waited_for() {
        let mut record = voting_record(5);
        record.players.get_mut(&id(4)).unwrap().is_alive = false;

        for i in 0..3 {
            register_vote(&mut record, &id(i), false).unwrap();
        }
        let progress = register_vote(&mut record, &id(3), true).unwrap();
        assert!(matches!(progress, VoteProgress::Complete(_)));
    }

    #[test]
    fn test_dead_player_cannot_vote() {
        let mut record = voting_record(5);
        record.players.get_mut(&id(2)).unwrap().is_alive = false;
        let err = register_vote(&mut record, &id(2), true).unwrap_err();
        assert!(matches!(err, EngineError::FailedPrecondition(_)));
    }

    #[test]
    fn test_repeat_vote_already_exists() {
        let mut record = voting_record(5);
        register_vote(&mut record, &id(0), true).unwrap();
        let err = register_vote(&mut record, &id(0), false).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists(_)));
        assert_eq!(record.players[&id(0)].vote, Some(true));
    }

    #[test]
    fn test_stranger_is_not_found() {
        let mut record = voting_record(5);
        let err = register_vote(&mut record, &PlayerId::from("ghost"), true).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_vote_outside_voting_phase() {
        let mut record = voting_record(5);
        record.session.phase = Phase::Nomination;
        let err = register_vote(&mut record, &id(0), true).unwrap_err();
        assert!(matches!(err, EngineError::FailedPrecondition(_)));
    }

    #[test]
    fn test_late_duplicate_observes_resolved_round() {
        let mut record = voting_record(5);
        for i in 0..5 {
            register_vote(&mut record, &id(i), false).unwrap();
        }
        // the engine leaves the voting phase in the same commit as the tally
        record.session.phase = Phase::Nomination;

        let err = register_vote(&mut record, &id(4), false).unwrap_err();
        match err {
            EngineError::AlreadyExists(message) => assert!(message.contains("rejected")),
            other => panic!("Expected AlreadyExists, got {:?}", other),
        }
    }

    #[test]
    fn test_tally_requires_every_alive_vote() {
        let mut record = voting_record(5);
        assert!(tally(&record).is_none());
        for player in record.players.values_mut() {
            player.has_voted = true;
            player.vote = Some(true);
        }
        assert_eq!(tally(&record).unwrap().yes, 5);
    }
}
