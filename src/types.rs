use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Session ids double as player ids; room codes and fact ids are opaque strings.
pub type PlayerId = String;
pub type FactId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameId {
    FactOrFake,
    TrueOrFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ru,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Lobby,
    Discussion,
    Voting,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    Truth,
    Imposter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    Real,
    Fake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrueFalseAnswer {
    True,
    False,
}

impl TrueFalseAnswer {
    /// Wire form used in the round's vote map.
    pub fn as_vote(&self) -> &'static str {
        match self {
            TrueFalseAnswer::True => "true",
            TrueFalseAnswer::False => "false",
        }
    }

    pub fn from_vote(value: &str) -> Option<Self> {
        match value {
            "true" => Some(TrueFalseAnswer::True),
            "false" => Some(TrueFalseAnswer::False),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub discussion_minutes: u32,
    pub imposters: u32,
    pub language: Language,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            discussion_minutes: 2,
            imposters: 1,
            language: Language::En,
        }
    }
}

/// Registry entry for one playable game.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub id: GameId,
    pub title: &'static str,
    pub description: &'static str,
    pub min_players: usize,
    pub max_imposters: u32,
    pub supports_imposters: bool,
    /// Games without a discussion phase start straight into voting.
    pub has_discussion: bool,
    pub fact_count: usize,
}

/// One content card from the fact catalog. `metadata` is editorial
/// bookkeeping (source, quality tier, tags) passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactCard {
    pub id: FactId,
    pub category: String,
    pub text: String,
    pub kind: FactKind,
    pub correction: Option<String>,
    pub metadata: serde_json::Value,
}

/// The two disjoint pools the catalog serves per game and language.
#[derive(Debug, Clone, Default)]
pub struct FactDeck {
    pub real: Vec<FactCard>,
    pub fake: Vec<FactCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    /// Epoch millis; also the host-succession tiebreaker.
    pub joined_at: i64,
    pub score: u32,
}

/// A player's private card and role for the current round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub role: PlayerRole,
    pub card: String,
    pub fact_id: FactId,
    pub category: String,
    pub fact_kind: FactKind,
    pub fact_correction: Option<String>,
    pub fact_metadata: serde_json::Value,
}

/// Distinct cards actually dealt this round, for post-game display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundFacts {
    pub real: Vec<FactCard>,
    pub fake: Vec<FactCard>,
}

/// Immutable outcome frozen exactly once, at reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub votes: HashMap<PlayerId, String>,
    pub vote_counts: HashMap<PlayerId, u32>,
    pub imposters: Vec<PlayerId>,
    pub correct_answer: Option<TrueFalseAnswer>,
    pub cards: HashMap<PlayerId, Assignment>,
    pub facts: RoundFacts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub round_number: u32,
    /// Ids dealt in this and recent rounds; draws avoid these while the
    /// pool can still cover the request.
    pub used_fact_ids: HashSet<FactId>,
    pub assignments: HashMap<PlayerId, Assignment>,
    pub swaps_used: HashMap<PlayerId, u32>,
    /// Epoch millis; meaningful only while phase == discussion.
    pub discussion_ends_at: i64,
    /// Vote target id, or "true"/"false" in the binary-answer mode.
    pub votes: HashMap<PlayerId, String>,
    pub correct_answer: Option<TrueFalseAnswer>,
    pub revealed: bool,
    pub result: Option<RoundResult>,
}

/// Whole-room state, the unit the store persists and replaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: String,
    pub game_id: GameId,
    pub host_id: PlayerId,
    pub password: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Starts at 1, +1 per committed mutation. Never decreases.
    pub version: u64,
    /// Lifetime round counter; survives the round record being cleared on
    /// lobby returns so numbering never restarts.
    pub rounds_played: u32,
    pub phase: RoomPhase,
    pub settings: RoomSettings,
    pub players: HashMap<PlayerId, Player>,
    pub round: Option<Round>,
}

// ========== Per-viewer projections ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub display_name: String,
    pub score: u32,
    pub is_host: bool,
    /// Only meaningful during voting/results; false elsewhere.
    pub has_voted: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRound {
    pub round_number: u32,
    pub discussion_ends_at: Option<i64>,
    pub my_card: Option<String>,
    pub my_role: Option<PlayerRole>,
    pub my_swaps_remaining: u32,
    pub my_vote: Option<PlayerId>,
    pub my_answer: Option<TrueFalseAnswer>,
    // Everything below stays null until phase == results.
    pub correct_answer: Option<TrueFalseAnswer>,
    pub imposters: Option<Vec<PlayerId>>,
    pub votes: Option<HashMap<PlayerId, String>>,
    pub vote_counts: Option<HashMap<PlayerId, u32>>,
    pub cards: Option<HashMap<PlayerId, Assignment>>,
    pub facts: Option<RoundFacts>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub joined: bool,
    pub room_code: String,
    pub game_id: GameId,
    pub language: Language,
    pub version: u64,
    pub phase: RoomPhase,
    pub settings: RoomSettings,
    pub min_players: usize,
    pub players: Vec<PublicPlayer>,
    pub host_id: Option<PlayerId>,
    pub me_id: Option<PlayerId>,
    pub can_start: bool,
    pub requires_password: bool,
    pub round: Option<PublicRound>,
    pub message: Option<String>,
}

// ========== Action envelope ==========

/// Closed action union; the engine dispatches with an exhaustive match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomAction {
    #[serde(rename_all = "camelCase")]
    UpdateSettings {
        discussion_minutes: u32,
        imposters: u32,
        language: Language,
    },
    StartRound,
    #[serde(rename_all = "camelCase")]
    CastVote { target_player_id: PlayerId },
    AnswerTrueFalse { answer: TrueFalseAnswer },
    RevealResults,
    SwapCard,
    EndDiscussion,
    ExtendDiscussion { seconds: u32 },
    PlayAgain,
    BackToLobby,
    LeaveRoom,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomInput {
    pub session_id: String,
    pub display_name: String,
    pub game_id: GameId,
    pub password: Option<String>,
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomInput {
    pub session_id: String,
    pub room_code: String,
    pub display_name: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInput {
    pub session_id: String,
    pub action: RoomAction,
}

// ========== Tuning constants ==========

pub const MIN_DISCUSSION_MINUTES: u32 = 1;
pub const MAX_DISCUSSION_MINUTES: u32 = 5;
pub const MIN_EXTEND_SECONDS: u32 = 15;
pub const MAX_EXTEND_SECONDS: u32 = 300;
pub const MAX_NAME_LENGTH: usize = 24;
pub const SWAP_LIMIT_PER_ROUND: u32 = 2;
pub const MAX_ROOM_CODE_ATTEMPTS: u32 = 30;
pub const LONG_POLL_TIMEOUT_MS: u64 = 20_000;
/// Fallback wake interval so discussion deadlines fire with no writers.
pub const LONG_POLL_TICK_MS: u64 = 900;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_union_round_trips_from_wire_json() {
        let raw = r#"{"type":"cast_vote","targetPlayerId":"p2"}"#;
        let action: RoomAction = serde_json::from_str(raw).unwrap();
        match action {
            RoomAction::CastVote { target_player_id } => assert_eq!(target_player_id, "p2"),
            other => panic!("unexpected action: {:?}", other),
        }

        let raw = r#"{"type":"update_settings","discussionMinutes":3,"imposters":2,"language":"ru"}"#;
        let action: RoomAction = serde_json::from_str(raw).unwrap();
        match action {
            RoomAction::UpdateSettings {
                discussion_minutes,
                imposters,
                language,
            } => {
                assert_eq!(discussion_minutes, 3);
                assert_eq!(imposters, 2);
                assert_eq!(language, Language::Ru);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn true_false_answer_matches_vote_encoding() {
        assert_eq!(TrueFalseAnswer::True.as_vote(), "true");
        assert_eq!(TrueFalseAnswer::from_vote("false"), Some(TrueFalseAnswer::False));
        assert_eq!(TrueFalseAnswer::from_vote("p3"), None);
        assert_eq!(
            serde_json::to_string(&TrueFalseAnswer::True).unwrap(),
            "\"true\""
        );
    }

    #[test]
    fn snapshot_serializes_with_camel_case_keys() {
        let snapshot = RoomSnapshot {
            code: "ABCDE".to_string(),
            game_id: GameId::FactOrFake,
            host_id: "host".to_string(),
            password: None,
            created_at: 0,
            updated_at: 0,
            version: 1,
            rounds_played: 0,
            phase: RoomPhase::Lobby,
            settings: RoomSettings::default(),
            players: HashMap::new(),
            round: None,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["gameId"], "fact-or-fake");
        assert_eq!(json["hostId"], "host");
        assert_eq!(json["phase"], "lobby");
    }
}
