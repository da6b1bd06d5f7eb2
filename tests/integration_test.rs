use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

use imposter::api;
use imposter::catalog::SeedCatalog;
use imposter::engine::RoomEngine;
use imposter::store::MemoryRoomStore;
use imposter::types::*;

fn engine() -> Arc<RoomEngine> {
    Arc::new(RoomEngine::new(
        Arc::new(MemoryRoomStore::new()),
        Arc::new(SeedCatalog::new()),
    ))
}

fn router(engine: Arc<RoomEngine>) -> Router {
    Router::new()
        .route("/api/games", get(api::list_games))
        .route("/api/rooms/create", post(api::create_room))
        .route("/api/rooms/join", post(api::join_room))
        .route("/api/rooms/{code}/action", post(api::room_action))
        .route("/api/rooms/{code}/sync", get(api::sync_room))
        .with_state(engine)
}

/// End-to-end flow for a complete imposter-mode round, driven through the
/// engine API: create, join, start, vote, observe results, scores update.
#[tokio::test]
async fn test_full_round_flow() {
    let engine = engine();

    // 1. Ann creates the room.
    let view = engine
        .create_room(CreateRoomInput {
            session_id: "ann".to_string(),
            display_name: "Ann".to_string(),
            game_id: GameId::FactOrFake,
            password: None,
            language: None,
        })
        .await
        .unwrap();
    let code = view.room_code.clone();
    assert_eq!(view.version, 1);
    assert_eq!(view.phase, RoomPhase::Lobby);

    // 2. Two more players join.
    for (session, name) in [("bob", "Bob"), ("cara", "Cara")] {
        let joined = engine
            .join_room(JoinRoomInput {
                session_id: session.to_string(),
                room_code: code.clone(),
                display_name: name.to_string(),
                password: None,
            })
            .await
            .unwrap();
        assert!(joined.joined);
    }

    let lobby = engine.sync(&code, "ann", 0).await.unwrap();
    assert_eq!(lobby.players.len(), 3);
    assert!(lobby.can_start);

    // 3. Host starts a round with one imposter.
    let started = engine
        .perform_action(
            &code,
            ActionInput {
                session_id: "ann".to_string(),
                action: RoomAction::StartRound,
            },
        )
        .await
        .unwrap();
    assert_eq!(started.phase, RoomPhase::Discussion);
    assert_eq!(started.settings.imposters, 1);

    // Every player holds a card; exactly one is the imposter.
    let mut imposters = 0;
    for session in ["ann", "bob", "cara"] {
        let view = engine.sync(&code, session, 0).await.unwrap();
        let round = view.round.unwrap();
        assert!(round.my_card.is_some());
        if round.my_role == Some(PlayerRole::Imposter) {
            imposters += 1;
        }
    }
    assert_eq!(imposters, 1);

    // 4. Host cuts discussion short, then everyone votes a distinct other
    // player; the third vote finalizes the round automatically.
    engine
        .perform_action(
            &code,
            ActionInput {
                session_id: "ann".to_string(),
                action: RoomAction::EndDiscussion,
            },
        )
        .await
        .unwrap();

    for (session, target) in [("ann", "bob"), ("bob", "cara"), ("cara", "ann")] {
        engine
            .perform_action(
                &code,
                ActionInput {
                    session_id: session.to_string(),
                    action: RoomAction::CastVote {
                        target_player_id: target.to_string(),
                    },
                },
            )
            .await
            .unwrap();
    }

    let results = engine.sync(&code, "ann", 0).await.unwrap();
    assert_eq!(results.phase, RoomPhase::Results);
    let round = results.round.unwrap();
    assert_eq!(
        round.vote_counts.as_ref().unwrap().values().sum::<u32>(),
        3
    );
    assert_eq!(round.imposters.as_ref().unwrap().len(), 1);

    // With one vote on each player the imposter survives (1 < ceil(3/2)),
    // and whoever voted for the imposter scored a point.
    let total_score: u32 = results.players.iter().map(|player| player.score).sum();
    assert_eq!(total_score, 2);

    // 5. Back to lobby clears the round; everyone leaving destroys the room.
    engine
        .perform_action(
            &code,
            ActionInput {
                session_id: "ann".to_string(),
                action: RoomAction::BackToLobby,
            },
        )
        .await
        .unwrap();

    for session in ["ann", "bob", "cara"] {
        engine
            .perform_action(
                &code,
                ActionInput {
                    session_id: session.to_string(),
                    action: RoomAction::LeaveRoom,
                },
            )
            .await
            .unwrap();
    }
    let gone = engine.sync(&code, "ann", 0).await;
    assert!(gone.is_err(), "room is destroyed once empty");
}

#[tokio::test]
async fn test_http_round_trip() {
    let app = router(engine());

    // Game registry is public.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/games")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let games: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(games.as_array().unwrap().len(), 2);

    // Create a room over HTTP.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/rooms/create")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"sessionId":"ann","displayName":"Ann","gameId":"fact-or-fake"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let code = view["roomCode"].as_str().unwrap().to_string();
    assert_eq!(view["version"], 1);
    assert_eq!(view["phase"], "lobby");
    assert_eq!(view["joined"], true);

    // Sync with a zero baseline returns immediately.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/rooms/{code}/sync?sessionId=ann&sinceVersion=0"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A phase-invalid action comes back as a structured conflict error.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/rooms/{code}/action"))
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"sessionId":"ann","action":{"type":"start_round"}}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["kind"], "conflict");

    // Unknown rooms are 404s.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/rooms/ZZZZZ/sync?sessionId=ann&sinceVersion=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
