//! Integration test: run a small axum backend on loopback and drive
//! `HttpTransport` against it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use pony_api::{ApiError, HttpTransport, Transport, accounts, auth, chats, decode, messages};
use pony_types::api::{ChatsResponse, LoginForm, SendMessageRequest, TokenResponse, UpdatePasswordForm};

async fn list_chats(headers: HeaderMap) -> impl IntoResponse {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    Json(json!({
        "metadata": { "count": 2 },
        "chats": [{ "id": 2, "name": auth }, { "id": 1, "name": "a" }]
    }))
}

async fn token(Form(fields): Form<HashMap<String, String>>) -> impl IntoResponse {
    if fields.get("username").map(String::as_str) == Some("pony")
        && fields.get("password").map(String::as_str) == Some("hunter22")
    {
        (StatusCode::OK, Json(json!({ "access_token": "tok-1", "token_type": "bearer" })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_credentials", "message": "Authentication failed" })),
        )
    }
}

async fn send_message(Path(chat_id): Path<i64>, Json(body): Json<Value>) -> impl IntoResponse {
    if chat_id == 5 {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "forbidden", "message": "not a member" })),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "id": 1,
            "chat_id": chat_id,
            "account_id": body["account_id"],
            "text": body["text"],
            "created_at": "2024-05-01T12:00:00"
        })),
    )
}

async fn update_password(Form(fields): Form<HashMap<String, String>>) -> impl IntoResponse {
    if fields.contains_key("old_password") && fields.contains_key("new_password") {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

async fn broken() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "<html>upstream down</html>")
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "chats": [] }))
}

async fn spawn_backend() -> SocketAddr {
    let app = Router::new()
        .route("/chats", get(list_chats))
        .route("/chats/{chat_id}/messages", post(send_message))
        .route("/auth/token", post(token))
        .route("/accounts/me", delete(|| async { StatusCode::NO_CONTENT }))
        .route("/accounts/me/password", put(update_password))
        .route("/broken", get(broken))
        .route("/slow", get(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn transport(addr: SocketAddr) -> HttpTransport {
    HttpTransport::new(format!("http://{}/", addr), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn sends_bearer_and_decodes_envelope() {
    let addr = spawn_backend().await;
    let http = transport(addr);

    let value = http.send(chats::list().bearer(Some("tok-1"))).await.unwrap();
    let resp: ChatsResponse = decode(value).unwrap();

    assert_eq!(resp.metadata.unwrap().count, 2);
    assert_eq!(resp.chats[0].name, "Bearer tok-1");
}

#[tokio::test]
async fn login_is_form_encoded() {
    let addr = spawn_backend().await;
    let http = transport(addr);

    let form = LoginForm {
        username: "pony".into(),
        password: "hunter22".into(),
    };
    let value = http.send(auth::token(&form).unwrap()).await.unwrap();
    let token: TokenResponse = decode(value).unwrap();
    assert_eq!(token.access_token, "tok-1");

    let bad = LoginForm {
        username: "pony".into(),
        password: "wrong".into(),
    };
    let err = http.send(auth::token(&bad).unwrap()).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.code(), Some("invalid_credentials"));
}

#[tokio::test]
async fn non_member_send_maps_to_forbidden() {
    let addr = spawn_backend().await;
    let http = transport(addr);

    let req = messages::send(
        5,
        &SendMessageRequest {
            text: "hi".into(),
            account_id: 9,
        },
    )
    .unwrap();
    let err = http.send(req.bearer(Some("tok-1"))).await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Api {
            status: 403,
            code: "forbidden".into(),
            message: "not a member".into(),
        }
    );
}

#[tokio::test]
async fn no_content_is_an_empty_object() {
    let addr = spawn_backend().await;
    let http = transport(addr);

    let value = http.send(accounts::delete_me().bearer(Some("tok-1"))).await.unwrap();
    assert_eq!(value, json!({}));

    let form = UpdatePasswordForm {
        old_password: "a".into(),
        new_password: "b".into(),
    };
    let value = http.send(accounts::update_password(&form).unwrap()).await.unwrap();
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn non_envelope_error_body_is_still_an_api_error() {
    let addr = spawn_backend().await;
    let http = transport(addr);

    let err = http.send(pony_api::ApiRequest::get("/broken")).await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.code(), Some("unknown"));
}

#[tokio::test]
async fn hung_request_times_out_as_network_error() {
    let addr = spawn_backend().await;
    let http = HttpTransport::new(format!("http://{}", addr), Duration::from_millis(200)).unwrap();

    let err = http.send(pony_api::ApiRequest::get("/slow")).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let http = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = http.send(chats::list()).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
}
