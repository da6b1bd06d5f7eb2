use std::collections::{HashMap, HashSet};

use super::{clamp_imposters, have_all_players_voted, mark_updated, sorted_players, RoomEngine};
use crate::catalog::game_summary;
use crate::error::{AppError, AppResult};
use crate::types::*;
use crate::util::now_millis;

impl RoomEngine {
    /// Deal a fresh round and move into discussion (or straight to voting
    /// for games without a discussion phase).
    pub(crate) fn start_round(&self, room: &mut RoomSnapshot) -> AppResult<()> {
        let game = game_summary(room.game_id);
        let players = sorted_players(room);

        if players.len() < game.min_players {
            return Err(AppError::Conflict(format!(
                "At least {} players are required to start.",
                game.min_players
            )));
        }

        let deck = self.deck(room);
        let player_ids: Vec<PlayerId> = players.iter().map(|player| player.id.clone()).collect();

        // Recently used ids carry over so consecutive rounds avoid repeats.
        let previous_used = room
            .round
            .as_ref()
            .map(|round| round.used_fact_ids.clone())
            .unwrap_or_default();

        let dealt = if game.supports_imposters {
            let imposters = clamp_imposters(room, room.settings.imposters);
            room.settings.imposters = imposters;
            super::dealer::deal_imposter_round(&deck, &player_ids, imposters as usize, &previous_used)?
        } else {
            super::dealer::deal_shared_round(&deck, &player_ids, &previous_used)?
        };

        room.rounds_played += 1;
        room.round = Some(Round {
            round_number: room.rounds_played,
            used_fact_ids: dealt.used_fact_ids,
            assignments: dealt.assignments,
            swaps_used: HashMap::new(),
            discussion_ends_at: now_millis()
                + i64::from(room.settings.discussion_minutes) * 60_000,
            votes: HashMap::new(),
            correct_answer: dealt.correct_answer,
            revealed: false,
            result: None,
        });
        room.phase = if game.has_discussion {
            RoomPhase::Discussion
        } else {
            RoomPhase::Voting
        };
        mark_updated(room);
        tracing::debug!(code = %room.code, round = room.rounds_played, "round started");

        Ok(())
    }

    /// Time- and completion-driven transitions. Idempotent; never errors.
    pub(crate) fn apply_automatic_transitions(&self, room: &mut RoomSnapshot) -> bool {
        let Some(discussion_ends_at) = room.round.as_ref().map(|round| round.discussion_ends_at)
        else {
            return false;
        };

        let mut changed = false;

        if room.phase == RoomPhase::Discussion && now_millis() >= discussion_ends_at {
            room.phase = RoomPhase::Voting;
            mark_updated(room);
            changed = true;
        }

        if room.phase == RoomPhase::Voting
            && !room.round.as_ref().is_some_and(|round| round.revealed)
            && have_all_players_voted(room)
        {
            // Guards above make this infallible.
            if self.finalize_round(room).is_ok() {
                changed = true;
            }
        }

        changed
    }

    pub(crate) fn cast_vote(
        &self,
        room: &mut RoomSnapshot,
        session_id: &str,
        target_player_id: &str,
    ) -> AppResult<()> {
        if !game_summary(room.game_id).supports_imposters {
            return Err(AppError::Conflict(
                "This game uses true/false answers, not votes.".to_string(),
            ));
        }
        if room.phase != RoomPhase::Voting || room.round.is_none() {
            return Err(AppError::Conflict("Voting is not active.".to_string()));
        }
        if !room.players.contains_key(target_player_id) {
            return Err(AppError::NotFound("Vote target not found.".to_string()));
        }
        if target_player_id == session_id {
            return Err(AppError::Forbidden(
                "You cannot vote for yourself.".to_string(),
            ));
        }

        let round = room.round.as_mut().expect("voting phase has a round");
        round.votes.insert(session_id.to_string(), target_player_id.to_string());

        if have_all_players_voted(room) {
            return self.finalize_round(room);
        }

        mark_updated(room);
        Ok(())
    }

    pub(crate) fn answer_true_false(
        &self,
        room: &mut RoomSnapshot,
        session_id: &str,
        answer: TrueFalseAnswer,
    ) -> AppResult<()> {
        if game_summary(room.game_id).supports_imposters {
            return Err(AppError::Conflict(
                "This game votes for players, not answers.".to_string(),
            ));
        }
        if room.phase != RoomPhase::Voting || room.round.is_none() {
            return Err(AppError::Conflict("Voting is not active.".to_string()));
        }

        let round = room.round.as_mut().expect("voting phase has a round");
        round
            .votes
            .insert(session_id.to_string(), answer.as_vote().to_string());

        if have_all_players_voted(room) {
            return self.finalize_round(room);
        }

        mark_updated(room);
        Ok(())
    }

    /// Score the round, freeze its result, and enter the results phase.
    /// Rejects a second attempt on an already-revealed round.
    pub(crate) fn finalize_round(&self, room: &mut RoomSnapshot) -> AppResult<()> {
        {
            let round = room
                .round
                .as_ref()
                .ok_or_else(|| AppError::Conflict("No active round to reveal.".to_string()))?;
            if round.revealed {
                return Err(AppError::Conflict(
                    "Round results are already revealed.".to_string(),
                ));
            }
        }

        let round = room.round.as_ref().expect("checked above");
        let votes = round.votes.clone();
        let correct_answer = round.correct_answer;

        let mut imposters: Vec<PlayerId> = round
            .assignments
            .iter()
            .filter(|(_, assignment)| assignment.role == PlayerRole::Imposter)
            .map(|(player_id, _)| player_id.clone())
            .collect();
        imposters.sort();
        let imposter_set: HashSet<&PlayerId> = imposters.iter().collect();

        let mut vote_counts: HashMap<PlayerId, u32> = HashMap::new();
        for target in votes.values() {
            *vote_counts.entry(target.clone()).or_insert(0) += 1;
        }

        let active_ids: Vec<PlayerId> = room.players.keys().cloned().collect();
        let active_count = active_ids.len();

        match correct_answer {
            Some(correct) => {
                // Binary mode: +1 per matching answer.
                for player_id in &active_ids {
                    if votes.get(player_id).map(String::as_str) == Some(correct.as_vote()) {
                        if let Some(player) = room.players.get_mut(player_id) {
                            player.score += 1;
                        }
                    }
                }
            }
            None => {
                // Non-imposters gain a point for fingering any imposter.
                for player_id in &active_ids {
                    let Some(target) = votes.get(player_id) else {
                        continue;
                    };
                    if !imposter_set.contains(player_id) && imposter_set.contains(target) {
                        if let Some(player) = room.players.get_mut(player_id) {
                            player.score += 1;
                        }
                    }
                }

                // Imposters survive when strictly fewer than half the room
                // voted for them.
                let survival_threshold = active_count.div_ceil(2) as u32;
                for imposter_id in &imposters {
                    let votes_against = vote_counts.get(imposter_id).copied().unwrap_or(0);
                    if votes_against < survival_threshold {
                        if let Some(player) = room.players.get_mut(imposter_id) {
                            player.score += 1;
                        }
                    }
                }
            }
        }

        let round = room.round.as_mut().expect("checked above");
        let facts = facts_in_play(&round.assignments);
        round.revealed = true;
        round.result = Some(RoundResult {
            votes: votes.clone(),
            vote_counts,
            imposters,
            correct_answer,
            cards: round.assignments.clone(),
            facts,
        });
        room.phase = RoomPhase::Results;
        mark_updated(room);
        tracing::debug!(code = %room.code, "round finalized");

        Ok(())
    }
}

/// Distinct cards actually dealt this round, reconstructed from assignments.
fn facts_in_play(assignments: &HashMap<PlayerId, Assignment>) -> RoundFacts {
    let mut seen: HashSet<&FactId> = HashSet::new();
    let mut facts = RoundFacts::default();

    let mut ordered: Vec<&Assignment> = assignments.values().collect();
    ordered.sort_by(|a, b| a.fact_id.cmp(&b.fact_id));

    for assignment in ordered {
        if !seen.insert(&assignment.fact_id) {
            continue;
        }
        let card = FactCard {
            id: assignment.fact_id.clone(),
            category: assignment.category.clone(),
            text: assignment.card.clone(),
            kind: assignment.fact_kind,
            correction: assignment.fact_correction.clone(),
            metadata: assignment.fact_metadata.clone(),
        };
        match assignment.fact_kind {
            FactKind::Real => facts.real.push(card),
            FactKind::Fake => facts.fake.push(card),
        }
    }

    facts
}

#[cfg(test)]
mod tests {
    use super::super::tests::{act, engine, room_with_players};
    use super::*;

    #[tokio::test]
    async fn start_round_requires_minimum_players() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::FactOrFake, &["Ann", "Bea"]).await;

        let result = act(&engine, &code, "p0", RoomAction::StartRound).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn start_round_enters_discussion_with_hidden_assignments() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::FactOrFake, &["Ann", "Bea", "Cal"]).await;

        let view = act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        assert_eq!(view.phase, RoomPhase::Discussion);

        let round = view.round.unwrap();
        assert_eq!(round.round_number, 1);
        assert!(round.my_card.is_some());
        assert!(round.my_role.is_some());
        assert!(round.discussion_ends_at.is_some());
        // Nothing revealed yet, not even to the host.
        assert!(round.imposters.is_none());
        assert!(round.cards.is_none());
        assert!(round.facts.is_none());
    }

    #[tokio::test]
    async fn binary_mode_skips_discussion_and_shares_one_card() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::TrueOrFalse, &["Ann", "Bea"]).await;

        let host_view = act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        assert_eq!(host_view.phase, RoomPhase::Voting);

        let other_view = engine.sync(&code, "p1", 0).await.unwrap();
        assert_eq!(
            host_view.round.as_ref().unwrap().my_card,
            other_view.round.as_ref().unwrap().my_card
        );
        // The catalog's declared answer stays hidden until results.
        assert!(host_view.round.as_ref().unwrap().correct_answer.is_none());
    }

    #[tokio::test]
    async fn voting_completes_into_results_automatically() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::FactOrFake, &["Ann", "Bea", "Cal"]).await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        act(&engine, &code, "p0", RoomAction::EndDiscussion).await.unwrap();

        act(&engine, &code, "p0", RoomAction::CastVote { target_player_id: "p1".into() })
            .await
            .unwrap();
        act(&engine, &code, "p1", RoomAction::CastVote { target_player_id: "p2".into() })
            .await
            .unwrap();
        let view = act(&engine, &code, "p2", RoomAction::CastVote { target_player_id: "p0".into() })
            .await
            .unwrap();

        assert_eq!(view.phase, RoomPhase::Results);
        let round = view.round.unwrap();
        let counts = round.vote_counts.unwrap();
        assert_eq!(counts.values().sum::<u32>(), 3);
        assert_eq!(round.imposters.as_ref().unwrap().len(), 1);
        assert!(round.cards.is_some());
        assert!(round.facts.is_some());
    }

    #[tokio::test]
    async fn self_votes_and_unknown_targets_are_rejected() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::FactOrFake, &["Ann", "Bea", "Cal"]).await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        act(&engine, &code, "p0", RoomAction::EndDiscussion).await.unwrap();

        let own = act(&engine, &code, "p0", RoomAction::CastVote { target_player_id: "p0".into() }).await;
        assert!(matches!(own, Err(AppError::Forbidden(_))));

        let ghost = act(&engine, &code, "p0", RoomAction::CastVote { target_player_id: "p9".into() }).await;
        assert!(matches!(ghost, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn votes_are_rejected_outside_the_voting_phase() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::FactOrFake, &["Ann", "Bea", "Cal"]).await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();

        // Still in discussion.
        let early = act(&engine, &code, "p0", RoomAction::CastVote { target_player_id: "p1".into() }).await;
        assert!(matches!(early, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn imposter_survival_threshold_is_strict() {
        // 5 players, 1 imposter. Threshold is ceil(5/2) = 3: an imposter
        // taking exactly 3 votes earns no survival point, and the three
        // accurate accusers each earn one.
        let engine = engine();
        let code = room_with_players(
            &engine,
            GameId::FactOrFake,
            &["Ann", "Bea", "Cal", "Dee", "Eli"],
        )
        .await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        act(&engine, &code, "p0", RoomAction::EndDiscussion).await.unwrap();

        let state = engine.sync(&code, "p0", 0).await.unwrap();
        let me_role = state.round.as_ref().unwrap().my_role;
        assert!(me_role.is_some());

        // Find the imposter by checking each player's own view.
        let mut imposter = None;
        let mut truthers = Vec::new();
        for index in 0..5 {
            let session = format!("p{index}");
            let view = engine.sync(&code, &session, 0).await.unwrap();
            match view.round.unwrap().my_role.unwrap() {
                PlayerRole::Imposter => imposter = Some(session),
                PlayerRole::Truth => truthers.push(session),
            }
        }
        let imposter = imposter.expect("one imposter was dealt");
        assert_eq!(truthers.len(), 4);

        // Three truthers vote the imposter, one truther votes another
        // truther, the imposter votes a truther.
        for voter in &truthers[..3] {
            act(&engine, &code, voter, RoomAction::CastVote { target_player_id: imposter.clone() })
                .await
                .unwrap();
        }
        act(
            &engine,
            &code,
            &truthers[3],
            RoomAction::CastVote { target_player_id: truthers[0].clone() },
        )
        .await
        .unwrap();
        let view = act(
            &engine,
            &code,
            &imposter,
            RoomAction::CastVote { target_player_id: truthers[0].clone() },
        )
        .await
        .unwrap();

        assert_eq!(view.phase, RoomPhase::Results);
        let scores: HashMap<String, u32> = view
            .players
            .iter()
            .map(|player| (player.id.clone(), player.score))
            .collect();

        // Exactly 3 votes against the imposter: not strictly below 3, so no
        // survival point.
        assert_eq!(scores[&imposter], 0);
        for voter in &truthers[..3] {
            assert_eq!(scores[voter], 1, "accurate voter {voter} gains a point");
        }
        assert_eq!(scores[&truthers[3]], 0);
    }

    #[tokio::test]
    async fn surviving_imposter_scores_when_votes_scatter() {
        let engine = engine();
        let code = room_with_players(
            &engine,
            GameId::FactOrFake,
            &["Ann", "Bea", "Cal", "Dee", "Eli"],
        )
        .await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        act(&engine, &code, "p0", RoomAction::EndDiscussion).await.unwrap();

        let mut imposter = None;
        let mut truthers = Vec::new();
        for index in 0..5 {
            let session = format!("p{index}");
            let view = engine.sync(&code, &session, 0).await.unwrap();
            match view.round.unwrap().my_role.unwrap() {
                PlayerRole::Imposter => imposter = Some(session),
                PlayerRole::Truth => truthers.push(session),
            }
        }
        let imposter = imposter.unwrap();

        // Everyone votes the next truther in a cycle; the imposter gets no
        // votes and survives.
        for index in 0..truthers.len() {
            let target = truthers[(index + 1) % truthers.len()].clone();
            act(
                &engine,
                &code,
                &truthers[index],
                RoomAction::CastVote { target_player_id: target },
            )
            .await
            .unwrap();
        }
        let view = act(
            &engine,
            &code,
            &imposter,
            RoomAction::CastVote { target_player_id: truthers[0].clone() },
        )
        .await
        .unwrap();

        let scores: HashMap<String, u32> = view
            .players
            .iter()
            .map(|player| (player.id.clone(), player.score))
            .collect();
        assert_eq!(scores[&imposter], 1);
        for truther in &truthers {
            assert_eq!(scores[truther], 0);
        }
    }

    #[tokio::test]
    async fn binary_mode_scores_matching_answers() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::TrueOrFalse, &["Ann", "Bea"]).await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();

        act(
            &engine,
            &code,
            "p0",
            RoomAction::AnswerTrueFalse { answer: TrueFalseAnswer::True },
        )
        .await
        .unwrap();
        let view = act(
            &engine,
            &code,
            "p1",
            RoomAction::AnswerTrueFalse { answer: TrueFalseAnswer::False },
        )
        .await
        .unwrap();

        assert_eq!(view.phase, RoomPhase::Results);
        let round = view.round.unwrap();
        let correct = round.correct_answer.expect("revealed at results");
        assert!(round.imposters.unwrap().is_empty());

        let scores: HashMap<String, u32> = view
            .players
            .iter()
            .map(|player| (player.id.clone(), player.score))
            .collect();
        // The two answers disagree, so exactly one of them matched.
        assert_eq!(scores.values().sum::<u32>(), 1);
        let winner = if correct == TrueFalseAnswer::True { "p0" } else { "p1" };
        assert_eq!(scores[winner], 1);
    }

    #[tokio::test]
    async fn reveal_results_is_host_only_and_idempotent() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::FactOrFake, &["Ann", "Bea", "Cal"]).await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        act(&engine, &code, "p0", RoomAction::EndDiscussion).await.unwrap();

        let denied = act(&engine, &code, "p1", RoomAction::RevealResults).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        // Forced reveal with incomplete votes.
        act(&engine, &code, "p0", RoomAction::CastVote { target_player_id: "p1".into() })
            .await
            .unwrap();
        let view = act(&engine, &code, "p0", RoomAction::RevealResults).await.unwrap();
        assert_eq!(view.phase, RoomPhase::Results);
        let first_counts = view.round.unwrap().vote_counts.unwrap();

        let again = act(&engine, &code, "p0", RoomAction::RevealResults).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        // Stored result unchanged.
        let after = engine.sync(&code, "p0", 0).await.unwrap();
        assert_eq!(after.round.unwrap().vote_counts.unwrap(), first_counts);
    }

    #[tokio::test]
    async fn leave_that_completes_the_vote_set_finalizes() {
        let engine = engine();
        let code = room_with_players(
            &engine,
            GameId::FactOrFake,
            &["Ann", "Bea", "Cal", "Dee"],
        )
        .await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        act(&engine, &code, "p0", RoomAction::EndDiscussion).await.unwrap();

        act(&engine, &code, "p0", RoomAction::CastVote { target_player_id: "p1".into() })
            .await
            .unwrap();
        act(&engine, &code, "p1", RoomAction::CastVote { target_player_id: "p0".into() })
            .await
            .unwrap();
        act(&engine, &code, "p2", RoomAction::CastVote { target_player_id: "p0".into() })
            .await
            .unwrap();

        // p3 never voted; their departure completes the vote set.
        act(&engine, &code, "p3", RoomAction::LeaveRoom).await.unwrap();

        let view = engine.sync(&code, "p0", 0).await.unwrap();
        assert_eq!(view.phase, RoomPhase::Results);
    }

    #[tokio::test]
    async fn back_to_lobby_clears_the_round_and_play_again_redeals() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::FactOrFake, &["Ann", "Bea", "Cal"]).await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        act(&engine, &code, "p0", RoomAction::EndDiscussion).await.unwrap();
        act(&engine, &code, "p0", RoomAction::RevealResults).await.unwrap();

        let lobby = act(&engine, &code, "p0", RoomAction::BackToLobby).await.unwrap();
        assert_eq!(lobby.phase, RoomPhase::Lobby);
        assert!(lobby.round.is_none());

        // Numbering survives the round record being cleared.
        let replay = act(&engine, &code, "p0", RoomAction::PlayAgain).await.unwrap();
        assert_eq!(replay.phase, RoomPhase::Discussion);
        assert_eq!(replay.round.unwrap().round_number, 2);
    }

    #[tokio::test]
    async fn play_again_from_results_increments_round_number() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::FactOrFake, &["Ann", "Bea", "Cal"]).await;
        act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        act(&engine, &code, "p0", RoomAction::EndDiscussion).await.unwrap();
        act(&engine, &code, "p0", RoomAction::RevealResults).await.unwrap();

        let replay = act(&engine, &code, "p0", RoomAction::PlayAgain).await.unwrap();
        assert_eq!(replay.round.unwrap().round_number, 2);
    }

    #[tokio::test]
    async fn extend_discussion_clamps_the_extension() {
        let engine = engine();
        let code = room_with_players(&engine, GameId::FactOrFake, &["Ann", "Bea", "Cal"]).await;
        let started = act(&engine, &code, "p0", RoomAction::StartRound).await.unwrap();
        let before = started.round.unwrap().discussion_ends_at.unwrap();

        let view = act(&engine, &code, "p0", RoomAction::ExtendDiscussion { seconds: 1 })
            .await
            .unwrap();
        let after = view.round.unwrap().discussion_ends_at.unwrap();
        assert_eq!(after - before, i64::from(MIN_EXTEND_SECONDS) * 1_000);

        let view = act(&engine, &code, "p0", RoomAction::ExtendDiscussion { seconds: 10_000 })
            .await
            .unwrap();
        let capped = view.round.unwrap().discussion_ends_at.unwrap();
        assert_eq!(capped - after, i64::from(MAX_EXTEND_SECONDS) * 1_000);
    }
}
