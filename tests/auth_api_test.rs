mod common;

use std::sync::Arc;

use account_backend::config::Environment;
use account_backend::models::user::Role;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::*;
use serde_json::json;

fn set_cookie(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn signup_issues_a_token_and_cookie() {
    let store = Arc::new(MemoryStore::new());
    let app = TestApp::with_store(test_config(Environment::Production), store.clone());

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/users/signup",
            None,
            &json!({
                "name": "New Person",
                "email": "new@example.com",
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
                "role": "admin"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(body["token"].as_str().unwrap().split('.').count() == 3);
    assert_eq!(body["data"]["user"]["role"], "user");
    assert!(body["data"]["user"].get("password").is_none());

    let token = body["token"].as_str().unwrap();
    let me = app
        .send(empty_request("GET", "/api/v1/users/me", Some(token)))
        .await;
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_requires_both_credentials() {
    let app = TestApp::with_store(
        test_config(Environment::Production),
        Arc::new(MemoryStore::new()),
    );
    let response = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            &json!({ "email": "someone@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "Please provide email and password!"
    );
}

#[tokio::test]
async fn login_rejects_wrong_password_and_inactive_accounts() {
    let store = Arc::new(MemoryStore::new());
    let app = TestApp::with_store(test_config(Environment::Production), store.clone());
    let user = store.seed("Carol", "carol@example.com", Role::User);

    let wrong = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            &json!({ "email": "carol@example.com", "password": "wrongpass" }),
        ))
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(wrong).await["message"],
        "Incorrect email or password"
    );

    let ok = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            &json!({ "email": "Carol@Example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert!(body_json(ok).await["token"].is_string());

    app.send(empty_request(
        "DELETE",
        "/api/v1/users/deleteMe",
        Some(&app.token_for(&user)),
    ))
    .await;
    let inactive = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            &json!({ "email": "carol@example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(inactive.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn jwt_cookie_authenticates_and_logout_clears_it() {
    let store = Arc::new(MemoryStore::new());
    let app = TestApp::with_store(test_config(Environment::Production), store.clone());
    let user = store.seed("Dana", "dana@example.com", Role::User);

    let via_cookie = app
        .send(
            Request::builder()
                .uri("/api/v1/users/me")
                .header(header::COOKIE, format!("jwt={}", app.token_for(&user)))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(via_cookie.status(), StatusCode::OK);

    let logout = app
        .send(empty_request("GET", "/api/v1/users/logout", None))
        .await;
    assert_eq!(logout.status(), StatusCode::OK);
    let cookie = set_cookie(&logout);
    assert!(cookie.starts_with("jwt=loggedout"));

    let after = app
        .send(
            Request::builder()
                .uri("/api/v1/users/me")
                .header(header::COOKIE, "jwt=loggedout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_password_checks_current_and_reissues_token() {
    let store = Arc::new(MemoryStore::new());
    let app = TestApp::with_store(test_config(Environment::Production), store.clone());
    let user = store.seed("Eve", "eve@example.com", Role::User);
    let token = app.token_for(&user);

    let wrong = app
        .send(json_request(
            "PATCH",
            "/api/v1/users/updateMyPassword",
            Some(&token),
            &json!({
                "passwordCurrent": "not-it-at-all",
                "password": "newpass123",
                "passwordConfirm": "newpass123"
            }),
        ))
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(wrong).await["message"],
        "Your current password is wrong."
    );

    let changed = app
        .send(json_request(
            "PATCH",
            "/api/v1/users/updateMyPassword",
            Some(&token),
            &json!({
                "passwordCurrent": PASSWORD,
                "password": "newpass123",
                "passwordConfirm": "newpass123"
            }),
        ))
        .await;
    assert_eq!(changed.status(), StatusCode::OK);
    let body = body_json(changed).await;
    let new_token = body["token"].as_str().unwrap().to_string();

    let login = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            &json!({ "email": "eve@example.com", "password": "newpass123" }),
        ))
        .await;
    assert_eq!(login.status(), StatusCode::OK);

    let me = app
        .send(empty_request("GET", "/api/v1/users/me", Some(&new_token)))
        .await;
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn tokens_issued_before_a_password_change_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let config = test_config(Environment::Production);
    let app = TestApp::with_store(config.clone(), store.clone());
    let user = store.seed("Finn", "finn@example.com", Role::User);
    let old_token = app.token_for(&user);

    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;
    app.send(json_request(
        "PATCH",
        "/api/v1/users/updateMyPassword",
        Some(&old_token),
        &json!({
            "passwordCurrent": PASSWORD,
            "password": "newpass123",
            "passwordConfirm": "newpass123"
        }),
    ))
    .await;

    let response = app
        .send(empty_request("GET", "/api/v1/users/me", Some(&old_token)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["message"],
        "User recently changed password! Please log in again."
    );
}
