use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::util::ServiceExt;

use crate::{
    admin_token::AdminGate, http::build_router, service::RaffleService, state::RaffleStore,
};

fn app(tmp: &TempDir) -> axum::Router {
    let store = RaffleStore::open(tmp.path().join("data").join("raffles.json")).unwrap();
    build_router(RaffleService::new(
        Arc::new(store),
        AdminGate::new("testtoken"),
    ))
}

fn req(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn req_authed(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, "Bearer testtoken")
        .body(Body::empty())
        .unwrap()
}

fn req_json(method: &str, uri: &str, value: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&value).unwrap()))
        .unwrap()
}

fn req_authed_json(method: &str, uri: &str, value: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, "Bearer testtoken")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&value).unwrap()))
        .unwrap()
}

async fn body_bytes(res: axum::response::Response) -> Bytes {
    res.into_body().collect().await.unwrap().to_bytes()
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = body_bytes(res).await;
    serde_json::from_slice(&bytes).unwrap()
}

fn spring() -> Value {
    json!({
        "id": 1,
        "title": "Spring",
        "prize": 100,
        "status": "open",
        "dateTime": "2024-01-01"
    })
}

#[tokio::test]
async fn root_banner_and_health() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let res = app.clone().oneshot(req("GET", "/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, Bytes::from("Raffle server is running"));

    let res = app.oneshot(req("GET", "/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "ok");
}

#[tokio::test]
async fn end_to_end_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let res = app
        .clone()
        .oneshot(req_authed_json("POST", "/raffle/create", spring()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let created = body_json(res).await;
    assert_eq!(created["participants"], json!([]));
    assert_eq!(created["winner"], "");

    let join = json!({ "raffleId": 1, "nickname": "bob", "email": "b@x.com" });
    let res = app
        .clone()
        .oneshot(req_json("POST", "/raffle/join", join.clone()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({ "status": "joined", "total": 1 }));

    let res = app
        .clone()
        .oneshot(req_json("POST", "/raffle/join", join))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "already_joined");

    let res = app
        .clone()
        .oneshot(req_authed_json(
            "POST",
            "/raffle/1/finish",
            json!({ "winner": "bob" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let finished = body_json(res).await;
    assert_eq!(finished["status"], "finished");
    assert_eq!(finished["winner"], "bob");

    let res = app
        .clone()
        .oneshot(req_authed("DELETE", "/raffle/1"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["id"], 1);

    let res = app.oneshot(req("GET", "/raffle/1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn create_without_admin_key_is_forbidden() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let res = app
        .clone()
        .oneshot(req_json("POST", "/raffle/create", spring()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(res).await["error"]["code"], "forbidden");

    let res = app.oneshot(req("GET", "/raffles")).await.unwrap();
    assert_eq!(body_json(res).await, json!([]));
}

#[tokio::test]
async fn x_admin_key_header_is_accepted() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/raffle/create")
                .header(super::ADMIN_KEY_HEADER, "testtoken")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&spring()).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn x_admin_key_is_used_when_authorization_is_not_bearer() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/raffle/create")
                .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .header(super::ADMIN_KEY_HEADER, "testtoken")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&spring()).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn empty_admin_secret_rejects_empty_keys() {
    let tmp = tempfile::tempdir().unwrap();
    let store = RaffleStore::open(tmp.path().join("raffles.json")).unwrap();
    let app = build_router(RaffleService::new(Arc::new(store), AdminGate::new("")));

    let empty_header = Request::builder()
        .method("POST")
        .uri("/raffle/create")
        .header(super::ADMIN_KEY_HEADER, "")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&spring()).unwrap()))
        .unwrap();
    let res = app.clone().oneshot(empty_header).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let empty_bearer = Request::builder()
        .method("POST")
        .uri("/raffle/create")
        .header(header::AUTHORIZATION, "Bearer ")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&spring()).unwrap()))
        .unwrap();
    let res = app.clone().oneshot(empty_bearer).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.oneshot(req("GET", "/raffles")).await.unwrap();
    assert_eq!(body_json(res).await, json!([]));
}

#[tokio::test]
async fn wrong_bearer_token_is_forbidden_for_delete() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);
    app.clone()
        .oneshot(req_authed_json("POST", "/raffle/create", spring()))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/raffle/1")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.oneshot(req("GET", "/raffle/1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_create_is_conflict() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let res = app
        .clone()
        .oneshot(req_authed_json("POST", "/raffle/create", spring()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let mut dup = spring();
    dup["id"] = json!("1");
    let res = app
        .clone()
        .oneshot(req_authed_json("POST", "/raffle/create", dup))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["error"]["details"]["id"], 1);

    let res = app.oneshot(req("GET", "/raffles")).await.unwrap();
    let raffles = body_json(res).await;
    assert_eq!(raffles.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let mut body = spring();
    body.as_object_mut().unwrap().remove("dateTime");
    let res = app
        .clone()
        .oneshot(req_authed_json("POST", "/raffle/create", body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err = body_json(res).await;
    assert_eq!(err["error"]["code"], "invalid_request");
    assert_eq!(err["error"]["details"]["field"], "dateTime");

    let res = app
        .clone()
        .oneshot(req_json(
            "POST",
            "/raffle/join",
            json!({ "raffleId": 1, "nickname": "bob" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"]["details"]["field"], "email");

    let res = app
        .oneshot(req_json("POST", "/raffle/join", json!("not an object")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn join_unknown_raffle_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let res = app
        .oneshot(req_json(
            "POST",
            "/raffle/join",
            json!({ "raffleId": "42", "nickname": "bob", "email": "b@x.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_path_id_is_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let res = app.oneshot(req("GET", "/raffle/abc")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn finish_without_winner_is_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);
    app.clone()
        .oneshot(req_authed_json("POST", "/raffle/create", spring()))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(req_authed_json("POST", "/raffle/1/finish", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.oneshot(req("GET", "/raffle/1")).await.unwrap();
    let raffle = body_json(res).await;
    assert_eq!(raffle["status"], "open");
    assert_eq!(raffle["winner"], "");
}

#[tokio::test]
async fn corrupt_store_is_internal_error() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);
    std::fs::write(tmp.path().join("data").join("raffles.json"), b"not json").unwrap();

    let res = app.oneshot(req("GET", "/raffles")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(res).await["error"]["code"], "internal");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(&tmp);

    let res = app.oneshot(req("GET", "/nope")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
