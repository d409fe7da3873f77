//! HTTP-level integration tests for the conversation claim endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener.

mod common;

use std::time::Duration;

use agentdesk_core::chat_lock::ClaimEvent;
use agentdesk_db::repositories::ChatLockRepo;
use axum::http::StatusCode;
use common::{body_json, claim_action, get, post_json_as};
use http_body_util::BodyExt;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Acquire
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn acquire_unclaimed_chat_returns_unlocked(pool: PgPool) {
    let data = claim_action(common::build_test_app(pool.clone()), "acquire", "agent-a", "c1").await;

    assert_eq!(data["is_locked"], false);
    assert!(data["locked_by_user"].is_null());

    let row = ChatLockRepo::find_by_chat(&pool, "c1").await.unwrap().unwrap();
    assert_eq!(row.user_id, "agent-a");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn acquire_held_chat_reports_holder(pool: PgPool) {
    claim_action(common::build_test_app(pool.clone()), "acquire", "agent-a", "c1").await;

    let data = claim_action(common::build_test_app(pool.clone()), "acquire", "agent-b", "c1").await;

    assert_eq!(data["is_locked"], true);
    assert_eq!(data["locked_by_user"], "agent-a");
    let row = ChatLockRepo::find_by_chat(&pool, "c1").await.unwrap().unwrap();
    assert_eq!(row.user_id, "agent-a");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn acquire_is_idempotent_for_holder(pool: PgPool) {
    claim_action(common::build_test_app(pool.clone()), "acquire", "agent-a", "c1").await;
    let data = claim_action(common::build_test_app(pool.clone()), "acquire", "agent-a", "c1").await;

    assert_eq!(data["is_locked"], false);
    assert_eq!(ChatLockRepo::list(&pool).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_acquires_have_one_winner(pool: PgPool) {
    let requests = (0..8).map(|i| {
        let app = common::build_test_app(pool.clone());
        async move {
            let agent = format!("agent-{i}");
            let data = claim_action(app, "acquire", &agent, "c1").await;
            (agent, data)
        }
    });
    let results = futures::future::join_all(requests).await;

    let row = ChatLockRepo::find_by_chat(&pool, "c1").await.unwrap().unwrap();
    let winners: Vec<_> = results
        .iter()
        .filter(|(_, data)| data["is_locked"] == false)
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].0, row.user_id);

    for (agent, data) in &results {
        if *agent != row.user_id {
            assert_eq!(data["locked_by_user"], row.user_id.as_str());
        }
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn acquire_without_agent_header_returns_401(pool: PgPool) {
    let response = post_json_as(
        common::build_test_app(pool),
        "/api/v1/chat-locks/acquire",
        None,
        serde_json::json!({ "chat_id": "c1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn acquire_blank_chat_id_returns_400(pool: PgPool) {
    let response = post_json_as(
        common::build_test_app(pool.clone()),
        "/api/v1/chat-locks/acquire",
        Some("agent-a"),
        serde_json::json!({ "chat_id": "  " }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(ChatLockRepo::list(&pool).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn acquire_with_malformed_body_returns_400(pool: PgPool) {
    let response = post_json_as(
        common::build_test_app(pool),
        "/api/v1/chat-locks/acquire",
        Some("agent-a"),
        serde_json::json!({ "chat": "c1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Heartbeat / release
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn heartbeat_refreshes_only_the_holder(pool: PgPool) {
    claim_action(common::build_test_app(pool.clone()), "acquire", "agent-a", "c1").await;

    let data = claim_action(common::build_test_app(pool.clone()), "heartbeat", "agent-a", "c1").await;
    assert_eq!(data["refreshed"], true);

    let data = claim_action(common::build_test_app(pool.clone()), "heartbeat", "agent-b", "c1").await;
    assert_eq!(data["refreshed"], false);

    let data = claim_action(common::build_test_app(pool), "heartbeat", "agent-a", "c2").await;
    assert_eq!(data["refreshed"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn release_is_holder_only_and_idempotent(pool: PgPool) {
    claim_action(common::build_test_app(pool.clone()), "acquire", "agent-a", "c1").await;

    let data = claim_action(common::build_test_app(pool.clone()), "release", "agent-b", "c1").await;
    assert_eq!(data["released"], false);
    assert!(ChatLockRepo::find_by_chat(&pool, "c1").await.unwrap().is_some());

    let data = claim_action(common::build_test_app(pool.clone()), "release", "agent-a", "c1").await;
    assert_eq!(data["released"], true);

    let data = claim_action(common::build_test_app(pool.clone()), "release", "agent-a", "c1").await;
    assert_eq!(data["released"], false);
    assert!(ChatLockRepo::find_by_chat(&pool, "c1").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn release_then_other_agent_acquires(pool: PgPool) {
    claim_action(common::build_test_app(pool.clone()), "acquire", "agent-a", "c1").await;
    let blocked = claim_action(common::build_test_app(pool.clone()), "acquire", "agent-b", "c1").await;
    assert_eq!(blocked["locked_by_user"], "agent-a");

    claim_action(common::build_test_app(pool.clone()), "release", "agent-a", "c1").await;
    let data = claim_action(common::build_test_app(pool.clone()), "acquire", "agent-b", "c1").await;

    assert_eq!(data["is_locked"], false);
    let row = ChatLockRepo::find_by_chat(&pool, "c1").await.unwrap().unwrap();
    assert_eq!(row.user_id, "agent-b");
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn get_claim_returns_row_or_404(pool: PgPool) {
    claim_action(common::build_test_app(pool.clone()), "acquire", "agent-a", "c1").await;

    let response = get(common::build_test_app(pool.clone()), "/api/v1/chat-locks/c1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["chat_id"], "c1");
    assert_eq!(json["data"]["user_id"], "agent-a");
    assert!(json["data"]["last_activity"].is_string());

    let response = get(common::build_test_app(pool), "/api/v1/chat-locks/c2").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_claims_returns_all_active_claims(pool: PgPool) {
    claim_action(common::build_test_app(pool.clone()), "acquire", "agent-a", "c1").await;
    claim_action(common::build_test_app(pool.clone()), "acquire", "agent-b", "c2").await;

    let response = get(common::build_test_app(pool), "/api/v1/chat-locks").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let claims = json["data"].as_array().unwrap();
    assert_eq!(claims.len(), 2);
    let mut chats: Vec<_> = claims.iter().map(|c| c["chat_id"].as_str().unwrap()).collect();
    chats.sort_unstable();
    assert_eq!(chats, ["c1", "c2"]);
}

// ---------------------------------------------------------------------------
// Change feed
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn events_feed_streams_changes_for_its_chat(pool: PgPool) {
    let state = common::test_state(pool);
    let app = common::build_test_app_with_state(state.clone());

    let response = get(app, "/api/v1/chat-locks/c1/events").await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
    assert_eq!(state.event_bus.subscriber_count(), 1);

    state.event_bus.publish(ClaimEvent::Released {
        chat_id: "c2".into(),
        user_id: "agent-x".into(),
    });
    state.event_bus.publish(ClaimEvent::Released {
        chat_id: "c1".into(),
        user_id: "agent-a".into(),
    });

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("no event within timeout")
        .expect("feed ended")
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();

    assert!(text.contains("claim.released"), "unexpected frame: {text}");
    assert!(text.contains(r#""chat_id":"c1""#), "unexpected frame: {text}");
    assert!(!text.contains("agent-x"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn events_feed_tells_clients_to_resync(pool: PgPool) {
    let state = common::test_state(pool);
    let app = common::build_test_app_with_state(state.clone());

    let response = get(app, "/api/v1/chat-locks/c1/events").await;
    assert_eq!(response.status(), StatusCode::OK);

    state.event_bus.publish_resync();

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("no event within timeout")
        .expect("feed ended")
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();

    assert!(text.contains("event: claim.resync"), "unexpected frame: {text}");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn events_feed_rejects_oversized_chat_id(pool: PgPool) {
    let long = "x".repeat(300);
    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/chat-locks/{long}/events"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
