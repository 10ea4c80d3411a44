//! Session lifecycle over HTTP: start, answer, summarize, cancel.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{id_of, TestApp};

async fn start(app: &TestApp, token: &str, category_id: Uuid, grade: &str) -> common::TestResponse {
    app.post(
        "/api/v1/sessions",
        token,
        json!({ "category_id": category_id, "grade": grade }),
    )
    .await
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let app = TestApp::new();
    app.create_user("candidate@test.com").await;
    let category = app.category_with_questions("SQL", "middle", 12).await;
    let token = app.login("candidate@test.com").await;

    let created = start(&app, &token, category.id, "middle").await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["data"]["status"], "active");
    assert_eq!(created.body["data"]["grade"], "middle");
    let session_id = id_of(&created.body["data"]);

    let questions = app
        .get(&format!("/api/v1/sessions/{session_id}/questions"), &token)
        .await;
    assert_eq!(questions.status, StatusCode::OK);
    let drawn = questions.body["data"].as_array().unwrap().clone();
    assert_eq!(drawn.len(), 10);
    for (i, question) in drawn.iter().enumerate() {
        assert_eq!(question["position"], i as i64);
        assert!(question["text"].as_str().unwrap().starts_with("SQL middle"));
        assert_eq!(question["answer"], "");
    }

    let question_id = id_of(&drawn[3]);
    let uri = format!("/api/v1/sessions/{session_id}/questions/{question_id}");
    let answered = app
        .request(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "answer": "SELECT 1" })),
        )
        .await;
    assert_eq!(answered.status, StatusCode::OK);
    assert_eq!(answered.body["data"]["answer"], "SELECT 1");

    let fetched = app.get(&uri, &token).await;
    assert_eq!(fetched.body["data"]["answer"], "SELECT 1");

    let summarized = app
        .post(
            &format!("/api/v1/sessions/{session_id}/summarize"),
            &token,
            json!({}),
        )
        .await;
    assert_eq!(summarized.status, StatusCode::OK);
    assert_eq!(summarized.body["data"]["status"], "finished");
    assert!(!summarized.body["data"]["summary"].as_str().unwrap().is_empty());

    let after = app
        .get(&format!("/api/v1/sessions/{session_id}"), &token)
        .await;
    assert_eq!(after.status, StatusCode::BAD_REQUEST);
    assert_eq!(after.code(), "SESSION_FINISHED");

    let late_answer = app
        .request(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "answer": "too late" })),
        )
        .await;
    assert_eq!(late_answer.code(), "SESSION_FINISHED");

    let listed = app.get("/api/v1/sessions", &token).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["pagination"]["total"], 1);
    assert_eq!(listed.body["data"][0]["status"], "finished");
}

#[tokio::test]
async fn test_one_active_session_per_user() {
    let app = TestApp::new();
    app.create_user("busy@test.com").await;
    let category = app.category_with_questions("Vue", "senior", 10).await;
    let token = app.login("busy@test.com").await;

    let first = start(&app, &token, category.id, "senior").await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = start(&app, &token, category.id, "senior").await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.code(), "USER_HAS_ACTIVE_SESSION");

    let session_id = id_of(&first.body["data"]);
    let cancelled = app
        .post(
            &format!("/api/v1/sessions/{session_id}/cancel"),
            &token,
            json!({}),
        )
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);

    let third = start(&app, &token, category.id, "senior").await;
    assert_eq!(third.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_session_creation_rejections() {
    let app = TestApp::new();
    app.create_user("picky@test.com").await;
    let category = app.category_with_questions("PHP", "junior", 3).await;
    let token = app.login("picky@test.com").await;

    let short = start(&app, &token, category.id, "junior").await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    assert_eq!(short.code(), "QUESTION_NOT_ENOUGH");

    let bad_grade = start(&app, &token, category.id, "principal").await;
    assert_eq!(bad_grade.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_grade.code(), "INVALID_GRADE_VALUE");

    let missing = start(&app, &token, Uuid::new_v4(), "junior").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    // Nothing was persisted by the failed attempts.
    let listed = app.get("/api/v1/sessions", &token).await;
    assert_eq!(listed.body["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_sessions_are_private_to_their_owner() {
    let app = TestApp::new();
    app.create_user("owner@test.com").await;
    app.create_user("other@test.com").await;
    let category = app.category_with_questions("TS", "junior", 10).await;
    let owner = app.login("owner@test.com").await;
    let other = app.login("other@test.com").await;

    let created = start(&app, &owner, category.id, "junior").await;
    let session_id = id_of(&created.body["data"]);

    for uri in [
        format!("/api/v1/sessions/{session_id}"),
        format!("/api/v1/sessions/{session_id}/questions"),
    ] {
        let response = app.get(&uri, &other).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(response.code(), "ACCESS_DENIED", "{uri}");
    }

    let summarize = app
        .post(
            &format!("/api/v1/sessions/{session_id}/summarize"),
            &other,
            json!({}),
        )
        .await;
    assert_eq!(summarize.status, StatusCode::FORBIDDEN);

    let others_list = app.get("/api/v1/sessions", &other).await;
    assert_eq!(others_list.body["pagination"]["total"], 0);

    let still_active = app
        .get(&format!("/api/v1/sessions/{session_id}"), &owner)
        .await;
    assert_eq!(still_active.status, StatusCode::OK);
}

#[tokio::test]
async fn test_empty_answer_is_rejected() {
    let app = TestApp::new();
    app.create_user("quiet@test.com").await;
    let category = app.category_with_questions("JS", "senior", 10).await;
    let token = app.login("quiet@test.com").await;

    let created = start(&app, &token, category.id, "senior").await;
    let session_id = id_of(&created.body["data"]);
    let questions = app
        .get(&format!("/api/v1/sessions/{session_id}/questions"), &token)
        .await;
    let question_id = id_of(&questions.body["data"][0]);

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/sessions/{session_id}/questions/{question_id}"),
            Some(&token),
            Some(json!({ "answer": "" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "VALIDATION_ERROR");
}
