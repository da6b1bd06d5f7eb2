//! Room session engine: phase state machine, action application, and the
//! per-room serialization that keeps concurrent callers from losing updates.

mod dealer;
mod round;
mod sync;
mod view;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::catalog::{game_summary, FactCatalog};
use crate::error::{AppError, AppResult};
use crate::store::RoomStore;
use crate::types::*;
use crate::util::{
    generate_room_code, normalize_room_code, now_millis, sanitize_display_name, sanitize_password,
};

/// Per-room gate: the mutex serializes every read-compute-write sequence for
/// one room code; the notify wakes long-poll waiters on every commit.
pub(crate) struct RoomGate {
    pub(crate) lock: tokio::sync::Mutex<()>,
    pub(crate) notify: Notify,
}

pub struct RoomEngine {
    store: Arc<dyn RoomStore>,
    catalog: Arc<dyn FactCatalog>,
    gates: Mutex<HashMap<String, Arc<RoomGate>>>,
}

impl RoomEngine {
    pub fn new(store: Arc<dyn RoomStore>, catalog: Arc<dyn FactCatalog>) -> Self {
        Self {
            store,
            catalog,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn gate(&self, code: &str) -> Arc<RoomGate> {
        let mut gates = self.gates.lock().expect("gate registry poisoned");
        gates
            .entry(code.to_string())
            .or_insert_with(|| {
                Arc::new(RoomGate {
                    lock: tokio::sync::Mutex::new(()),
                    notify: Notify::new(),
                })
            })
            .clone()
    }

    fn drop_gate(&self, code: &str) {
        self.gates.lock().expect("gate registry poisoned").remove(code);
    }

    /// Remove a code's gate entry when no other caller holds it. Keeps the
    /// registry from accumulating entries for client-supplied codes that
    /// never named a real room.
    fn release_gate_if_unused(&self, code: &str, gate: &Arc<RoomGate>) {
        let mut gates = self.gates.lock().expect("gate registry poisoned");
        if let Some(entry) = gates.get(code) {
            // Two strong refs: the registry's and this caller's.
            if Arc::ptr_eq(entry, gate) && Arc::strong_count(entry) <= 2 {
                gates.remove(code);
            }
        }
    }

    /// Load under an already-held gate; a failed load also releases the
    /// caller's gate entry so unknown codes leave no trace in the registry.
    pub(crate) async fn load_room_gated(
        &self,
        gate: &Arc<RoomGate>,
        code: &str,
    ) -> AppResult<RoomSnapshot> {
        match self.load_room(code).await {
            Ok(room) => Ok(room),
            Err(err) => {
                self.release_gate_if_unused(code, gate);
                Err(err)
            }
        }
    }

    pub(crate) fn deck(&self, room: &RoomSnapshot) -> FactDeck {
        self.catalog.deck(room.game_id, room.settings.language)
    }

    pub(crate) async fn load_room(&self, code: &str) -> AppResult<RoomSnapshot> {
        self.store
            .get(code)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))
    }

    /// Persist a mutated snapshot and wake this room's long-poll waiters.
    pub(crate) async fn commit(&self, gate: &RoomGate, room: &RoomSnapshot) -> AppResult<()> {
        self.store.put(room.clone()).await?;
        gate.notify.notify_waiters();
        Ok(())
    }

    pub async fn create_room(&self, input: CreateRoomInput) -> AppResult<RoomView> {
        let session_id = require_session_id(&input.session_id)?;
        let display_name = sanitize_display_name(&input.display_name);
        if display_name.is_empty() {
            return Err(AppError::Validation("Display name is required.".to_string()));
        }

        let mut settings = RoomSettings::default();
        if let Some(language) = input.language {
            settings.language = language;
        }

        for _ in 0..MAX_ROOM_CODE_ATTEMPTS {
            let candidate = generate_room_code();
            let gate = self.gate(&candidate);
            let _guard = gate.lock.lock().await;

            if self.store.get(&candidate).await?.is_some() {
                continue;
            }

            let now = now_millis();
            let mut players = HashMap::new();
            players.insert(
                session_id.clone(),
                Player {
                    id: session_id.clone(),
                    display_name,
                    joined_at: now,
                    score: 0,
                },
            );

            let room = RoomSnapshot {
                code: candidate.clone(),
                game_id: input.game_id,
                host_id: session_id.clone(),
                password: sanitize_password(input.password.as_deref()),
                created_at: now,
                updated_at: now,
                version: 1,
                rounds_played: 0,
                phase: RoomPhase::Lobby,
                settings,
                players,
                round: None,
            };

            self.store.put(room.clone()).await?;
            tracing::info!(code = %candidate, game = ?input.game_id, "room created");
            return Ok(self.room_view(&room, &session_id));
        }

        Err(AppError::Conflict(
            "Unable to allocate a room code. Try again.".to_string(),
        ))
    }

    pub async fn join_room(&self, input: JoinRoomInput) -> AppResult<RoomView> {
        let session_id = require_session_id(&input.session_id)?;
        let display_name = sanitize_display_name(&input.display_name);
        if display_name.is_empty() {
            return Err(AppError::Validation("Display name is required.".to_string()));
        }

        let code = normalize_room_code(&input.room_code);
        if code.is_empty() {
            return Err(AppError::Validation("Room code is required.".to_string()));
        }

        let gate = self.gate(&code);
        let _guard = gate.lock.lock().await;

        let mut room = self.load_room_gated(&gate, &code).await?;

        if let Some(ref password) = room.password {
            if sanitize_password(input.password.as_deref()).as_deref() != Some(password.as_str()) {
                return Err(AppError::Forbidden("Incorrect room password.".to_string()));
            }
        }

        let mut changed = self.apply_automatic_transitions(&mut room);

        if room.players.contains_key(&session_id) {
            // Rejoin: only the display name may change.
            let player = room.players.get_mut(&session_id).expect("member checked");
            if player.display_name != display_name {
                player.display_name = display_name;
                mark_updated(&mut room);
                changed = true;
            }
            if changed {
                self.commit(&gate, &room).await?;
            }
            return Ok(self.room_view(&room, &session_id));
        }

        if room.phase != RoomPhase::Lobby {
            if changed {
                self.commit(&gate, &room).await?;
            }
            return Err(AppError::Conflict(
                "Round already in progress. Join after results.".to_string(),
            ));
        }

        room.players.insert(
            session_id.clone(),
            Player {
                id: session_id.clone(),
                display_name,
                joined_at: now_millis(),
                score: 0,
            },
        );
        mark_updated(&mut room);
        self.commit(&gate, &room).await?;
        tracing::debug!(code = %code, player = %session_id, "player joined");

        Ok(self.room_view(&room, &session_id))
    }

    pub async fn perform_action(&self, room_code: &str, input: ActionInput) -> AppResult<RoomView> {
        let session_id = require_session_id(&input.session_id)?;
        let code = normalize_room_code(room_code);
        if code.is_empty() {
            return Err(AppError::Validation("Room code is required.".to_string()));
        }

        let gate = self.gate(&code);
        let _guard = gate.lock.lock().await;

        let mut room = self.load_room_gated(&gate, &code).await?;
        let mut changed = self.apply_automatic_transitions(&mut room);

        if !matches!(input.action, RoomAction::LeaveRoom) {
            ensure_member(&room, &session_id)?;
        }

        match input.action {
            RoomAction::UpdateSettings {
                discussion_minutes,
                imposters,
                language,
            } => {
                let previous = room.version;
                self.update_settings(&mut room, &session_id, discussion_minutes, imposters, language)?;
                changed |= room.version != previous;
            }
            RoomAction::StartRound => {
                require_host(&room, &session_id)?;
                if room.phase != RoomPhase::Lobby {
                    return Err(AppError::Conflict(
                        "You can only start from the lobby.".to_string(),
                    ));
                }
                self.start_round(&mut room)?;
                changed = true;
            }
            RoomAction::CastVote { target_player_id } => {
                let previous = room.version;
                self.cast_vote(&mut room, &session_id, &target_player_id)?;
                changed |= room.version != previous;
            }
            RoomAction::AnswerTrueFalse { answer } => {
                let previous = room.version;
                self.answer_true_false(&mut room, &session_id, answer)?;
                changed |= room.version != previous;
            }
            RoomAction::RevealResults => {
                require_host(&room, &session_id)?;
                if room.phase != RoomPhase::Voting {
                    return Err(AppError::Conflict(
                        "Results can only be revealed during voting.".to_string(),
                    ));
                }
                self.finalize_round(&mut room)?;
                changed = true;
            }
            RoomAction::SwapCard => {
                self.swap_card(&mut room, &session_id)?;
                changed = true;
            }
            RoomAction::EndDiscussion => {
                require_host(&room, &session_id)?;
                if room.phase != RoomPhase::Discussion {
                    return Err(AppError::Conflict(
                        "No discussion is in progress.".to_string(),
                    ));
                }
                room.phase = RoomPhase::Voting;
                mark_updated(&mut room);
                changed = true;
            }
            RoomAction::ExtendDiscussion { seconds } => {
                require_host(&room, &session_id)?;
                if room.phase != RoomPhase::Discussion {
                    return Err(AppError::Conflict(
                        "No discussion is in progress.".to_string(),
                    ));
                }
                let extension = seconds.clamp(MIN_EXTEND_SECONDS, MAX_EXTEND_SECONDS);
                let round = room.round.as_mut().expect("discussion phase has a round");
                round.discussion_ends_at += i64::from(extension) * 1_000;
                mark_updated(&mut room);
                changed = true;
            }
            RoomAction::PlayAgain => {
                require_host(&room, &session_id)?;
                if room.phase != RoomPhase::Results && room.phase != RoomPhase::Lobby {
                    return Err(AppError::Conflict(
                        "Finish this round before starting a new one.".to_string(),
                    ));
                }
                self.start_round(&mut room)?;
                changed = true;
            }
            RoomAction::BackToLobby => {
                require_host(&room, &session_id)?;
                if room.phase != RoomPhase::Results {
                    return Err(AppError::Conflict(
                        "You can only return to lobby after results.".to_string(),
                    ));
                }
                room.phase = RoomPhase::Lobby;
                room.round = None;
                mark_updated(&mut room);
                changed = true;
            }
            RoomAction::LeaveRoom => {
                let previous = room.version;
                match self.leave_room(&mut room, &session_id)? {
                    LeaveOutcome::Deleted => {
                        self.store.delete(&code).await?;
                        gate.notify.notify_waiters();
                        self.drop_gate(&code);
                        tracing::info!(code = %code, "room closed, last player left");
                        return Ok(view::closed_room_view(&code));
                    }
                    LeaveOutcome::Updated => {
                        changed |= room.version != previous;
                    }
                }
            }
        }

        changed |= self.apply_automatic_transitions(&mut room);

        if changed {
            self.commit(&gate, &room).await?;
        }

        Ok(self.room_view(&room, &session_id))
    }

    fn update_settings(
        &self,
        room: &mut RoomSnapshot,
        session_id: &str,
        discussion_minutes: u32,
        imposters: u32,
        language: Language,
    ) -> AppResult<()> {
        require_host(room, session_id)?;
        if room.phase != RoomPhase::Lobby {
            return Err(AppError::Conflict(
                "Settings can only be changed in the lobby.".to_string(),
            ));
        }

        let next_minutes = discussion_minutes.clamp(MIN_DISCUSSION_MINUTES, MAX_DISCUSSION_MINUTES);
        let next_imposters = clamp_imposters(room, imposters);

        if next_minutes != room.settings.discussion_minutes
            || next_imposters != room.settings.imposters
            || language != room.settings.language
        {
            room.settings.discussion_minutes = next_minutes;
            room.settings.imposters = next_imposters;
            room.settings.language = language;
            mark_updated(room);
        }

        Ok(())
    }

    fn leave_room(&self, room: &mut RoomSnapshot, session_id: &str) -> AppResult<LeaveOutcome> {
        if room.players.remove(session_id).is_none() {
            return Ok(LeaveOutcome::Updated);
        }

        if room.players.is_empty() {
            return Ok(LeaveOutcome::Deleted);
        }

        if room.host_id == session_id {
            // Host passes to the longest-tenured remaining player.
            let successor = sorted_players(room)
                .into_iter()
                .next()
                .expect("players is non-empty");
            room.host_id = successor.id;
        }

        let min_players = game_summary(room.game_id).min_players;
        if room.phase != RoomPhase::Lobby && room.players.len() < min_players {
            room.phase = RoomPhase::Lobby;
            room.round = None;
            mark_updated(room);
            return Ok(LeaveOutcome::Updated);
        }

        if room.phase == RoomPhase::Voting && have_all_players_voted(room) {
            self.finalize_round(room)?;
            return Ok(LeaveOutcome::Updated);
        }

        mark_updated(room);
        Ok(LeaveOutcome::Updated)
    }
}

pub(crate) enum LeaveOutcome {
    Deleted,
    Updated,
}

pub(crate) fn require_session_id(session_id: &str) -> AppResult<String> {
    let value = session_id.trim();
    if value.is_empty() {
        return Err(AppError::Validation("Missing session id.".to_string()));
    }
    Ok(value.to_string())
}

pub(crate) fn require_host(room: &RoomSnapshot, session_id: &str) -> AppResult<()> {
    if room.host_id != session_id {
        return Err(AppError::Forbidden(
            "Only the room host can perform this action.".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_member(room: &RoomSnapshot, session_id: &str) -> AppResult<()> {
    if !room.players.contains_key(session_id) {
        return Err(AppError::Forbidden("You are not in this room.".to_string()));
    }
    Ok(())
}

pub(crate) fn mark_updated(room: &mut RoomSnapshot) {
    room.updated_at = now_millis();
    room.version += 1;
}

/// Players ordered by tenure (joined_at, then id for stable ties).
pub(crate) fn sorted_players(room: &RoomSnapshot) -> Vec<Player> {
    let mut players: Vec<Player> = room.players.values().cloned().collect();
    players.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
    players
}

pub(crate) fn have_all_players_voted(room: &RoomSnapshot) -> bool {
    let Some(round) = room.round.as_ref() else {
        return false;
    };
    !room.players.is_empty()
        && room
            .players
            .keys()
            .all(|player_id| round.votes.contains_key(player_id))
}

pub(crate) fn clamp_imposters(room: &RoomSnapshot, requested: u32) -> u32 {
    let game = game_summary(room.game_id);
    if !game.supports_imposters {
        return 0;
    }
    let by_player_count = (room.players.len().saturating_sub(2)).max(1) as u32;
    requested.clamp(1, by_player_count.min(game.max_imposters).max(1))
}
