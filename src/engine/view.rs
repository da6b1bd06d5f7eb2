use super::{sorted_players, RoomEngine};
use crate::catalog::game_summary;
use crate::types::*;

impl RoomEngine {
    /// Project a snapshot into what one viewer is allowed to see. Hidden
    /// information (other cards, results before reveal) never leaves here.
    pub(crate) fn room_view(&self, room: &RoomSnapshot, session_id: &str) -> RoomView {
        let game = game_summary(room.game_id);
        let players = sorted_players(room);
        let viewer_is_member = room.players.contains_key(session_id);

        let voting_visible =
            room.phase == RoomPhase::Voting || room.phase == RoomPhase::Results;
        let public_players: Vec<PublicPlayer> = players
            .iter()
            .map(|player| PublicPlayer {
                id: player.id.clone(),
                display_name: player.display_name.clone(),
                score: player.score,
                is_host: room.host_id == player.id,
                has_voted: voting_visible
                    && room
                        .round
                        .as_ref()
                        .is_some_and(|round| round.votes.contains_key(&player.id)),
            })
            .collect();

        if !viewer_is_member {
            let message = if room.phase == RoomPhase::Lobby {
                "Enter your name to join this room."
            } else {
                "A round is in progress. Join when the lobby opens."
            };

            return RoomView {
                joined: false,
                room_code: room.code.clone(),
                game_id: room.game_id,
                language: room.settings.language,
                version: room.version,
                phase: room.phase,
                settings: room.settings.clone(),
                min_players: game.min_players,
                players: public_players,
                host_id: Some(room.host_id.clone()),
                me_id: None,
                can_start: false,
                requires_password: room.password.is_some(),
                round: None,
                message: Some(message.to_string()),
            };
        }

        let round = room.round.as_ref().map(|round| {
            let assignment = round.assignments.get(session_id);
            let revealed = room.phase == RoomPhase::Results;
            let result = round.result.as_ref().filter(|_| revealed);

            let my_vote_raw = round.votes.get(session_id);
            let (my_vote, my_answer) = if game.supports_imposters {
                (my_vote_raw.cloned(), None)
            } else {
                (
                    None,
                    my_vote_raw.and_then(|value| TrueFalseAnswer::from_vote(value)),
                )
            };

            let my_swaps_remaining = if game.supports_imposters {
                SWAP_LIMIT_PER_ROUND
                    .saturating_sub(round.swaps_used.get(session_id).copied().unwrap_or(0))
            } else {
                0
            };

            PublicRound {
                round_number: round.round_number,
                discussion_ends_at: (room.phase == RoomPhase::Discussion)
                    .then_some(round.discussion_ends_at),
                my_card: assignment.map(|a| a.card.clone()),
                my_role: assignment.map(|a| a.role),
                my_swaps_remaining,
                my_vote,
                my_answer,
                correct_answer: result.and_then(|r| r.correct_answer),
                imposters: result.map(|r| r.imposters.clone()),
                votes: result.map(|r| r.votes.clone()),
                vote_counts: result.map(|r| r.vote_counts.clone()),
                cards: result.map(|r| r.cards.clone()),
                facts: result.map(|r| r.facts.clone()),
            }
        });

        let can_start = room.host_id == session_id
            && room.phase == RoomPhase::Lobby
            && players.len() >= game.min_players;
        let message = if room.phase == RoomPhase::Lobby && players.len() < game.min_players {
            Some(format!(
                "Need at least {} players to start.",
                game.min_players
            ))
        } else {
            None
        };

        RoomView {
            joined: true,
            room_code: room.code.clone(),
            game_id: room.game_id,
            language: room.settings.language,
            version: room.version,
            phase: room.phase,
            settings: room.settings.clone(),
            min_players: game.min_players,
            players: public_players,
            host_id: Some(room.host_id.clone()),
            me_id: Some(session_id.to_string()),
            can_start,
            requires_password: room.password.is_some(),
            round,
            message,
        }
    }
}

/// What a viewer sees after the room they were in has been destroyed.
pub(crate) fn closed_room_view(code: &str) -> RoomView {
    RoomView {
        joined: false,
        room_code: code.to_string(),
        game_id: GameId::FactOrFake,
        language: Language::En,
        version: 0,
        phase: RoomPhase::Lobby,
        settings: RoomSettings::default(),
        min_players: game_summary(GameId::FactOrFake).min_players,
        players: Vec::new(),
        host_id: None,
        me_id: None,
        can_start: false,
        requires_password: false,
        round: None,
        message: Some("This room has closed.".to_string()),
    }
}
