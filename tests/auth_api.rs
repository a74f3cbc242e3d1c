//! Unified login and caller profile.

#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use serde_json::{Value, json};

use common::*;

async fn login_body(email: &str, password: &str) -> (StatusCode, Value) {
    let env = env_at(at(15, 8, 0));
    let app = app!(env);

    let resp = test::call_service(
        &app,
        request(TestRequest::post().uri("/api/login"), None)
            .set_json(json!({ "email": email, "password": password }))
            .to_request(),
    )
    .await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

#[actix_web::test]
async fn admin_logs_in() {
    let (status, body) = login_body("admin@mtefop.gov.mg", PASSWORD).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    assert_eq!(body["user"]["id"], ADMIN_ID);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[actix_web::test]
async fn agent_logs_in_and_token_reaches_agent_routes() {
    let env = env_at(at(15, 7, 55));
    let app = app!(env);

    let resp = test::call_service(
        &app,
        request(TestRequest::post().uri("/api/login"), None)
            .set_json(json!({ "email": "rakoto@mtefop.gov.mg", "password": PASSWORD }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["role"], "agent");
    assert_eq!(body["user"]["immatricule"], "MAT-0010");
    let token = body["token"].as_str().unwrap().to_string();

    let resp = test::call_service(&app, request(TestRequest::post().uri("/api/agent/presences"), Some(&token)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(&app, request(TestRequest::get().uri("/api/profile"), Some(&token)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["role"], "agent");
    assert_eq!(body["user"]["nom"], "Rakoto");
}

#[actix_web::test]
async fn wrong_password_is_unauthorized() {
    let (status, body) = login_body("rabe@mtefop.gov.mg", "nope").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

#[actix_web::test]
async fn unknown_email_is_unauthorized() {
    let (status, _) = login_body("personne@mtefop.gov.mg", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn empty_credentials_are_a_validation_failure() {
    let (status, _) = login_body("  ", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn profile_requires_a_token() {
    let env = env_at(at(15, 8, 0));
    let app = app!(env);

    let resp = test::call_service(&app, request(TestRequest::get().uri("/api/profile"), None).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Missing Authorization header");
}

#[actix_web::test]
async fn agent_with_bcrypt_hash_from_roster_logs_in() {
    let env = env_at(at(15, 8, 0));
    let hash = bcrypt::hash_with_result(PASSWORD, 4)
        .unwrap()
        .format_for_version(bcrypt::Version::TwoY);
    env.store.add_agent(presence::model::account::AgentAccount {
        id: 12,
        immatricule: "MAT-0012".into(),
        nom: "Randria".into(),
        prenom: None,
        email: Some("randria@mtefop.gov.mg".into()),
        mot_de_passe: Some(hash),
    });
    let app = app!(env);

    let resp = test::call_service(
        &app,
        request(TestRequest::post().uri("/api/login"), None)
            .set_json(json!({ "email": "randria@mtefop.gov.mg", "password": PASSWORD }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["role"], "agent");
    assert_eq!(body["user"]["id"], 12);
}
