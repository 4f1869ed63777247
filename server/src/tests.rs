//! Router-Tests gegen einen gemockten Realtime-Provider

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::ServerConfig;
use crate::{app_bauen, AppState};

fn config(provider: &MockServer, key: Option<&str>) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.realtime.provider_url = format!("{}/v1", provider.uri());
    config.realtime.api_key = key.map(str::to_string);
    config
}

fn app(config: &ServerConfig) -> (Router, AppState) {
    let (_tx, rx) = watch::channel(false);
    let state = AppState::aus_config(config, rx).unwrap();
    (app_bauen(config, state.clone()), state)
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json_lesen(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_antwort() -> Value {
    json!({
        "id": "sess_042",
        "object": "realtime.session",
        "model": "gpt-4o-realtime-preview-2024-12-17",
        "voice": "verse",
        "client_secret": { "value": "ek_abc", "expires_at": 1734626400 }
    })
}

#[tokio::test]
async fn health_antwortet() {
    let provider = MockServer::start().await;
    let (app, _) = app(&config(&provider, None));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json_lesen(response).await;
    assert_eq!(json["status"], "OK");
    assert_eq!(json["environment"], "development");
}

#[tokio::test]
async fn unbekannte_route_liefert_404_envelope() {
    let provider = MockServer::start().await;
    let (app, _) = app(&config(&provider, None));

    let response = app
        .oneshot(Request::get("/api/v1/gibt-es-nicht").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json_lesen(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Route not found");
    assert_eq!(json["path"], "/api/v1/gibt-es-nicht");
}

#[tokio::test]
async fn ephemeral_mit_standardwerten() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/realtime/sessions"))
        .and(header("authorization", "Bearer sk-server"))
        .and(body_json(json!({
            "model": "gpt-4o-realtime-preview-2024-12-17",
            "voice": "verse"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_antwort()))
        .expect(1)
        .mount(&provider)
        .await;

    let (app, state) = app(&config(&provider, Some("sk-server")));
    let response = app
        .oneshot(post("/api/v1/webrtc/openai/ephemeral", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json_lesen(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["session"]["id"], "sess_042");
    assert_eq!(json["session"]["client_secret"]["value"], "ek_abc");
    assert_eq!(json["session"]["client_secret"]["expires_at"], 1734626400);
    assert_eq!(state.metriken.credentials_total.get(), 1);
}

#[tokio::test]
async fn ephemeral_reicht_modell_und_stimme_weiter() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/realtime/sessions"))
        .and(body_json(json!({
            "model": "gpt-4o-mini-realtime-preview",
            "voice": "alloy"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_antwort()))
        .expect(1)
        .mount(&provider)
        .await;

    let (app, _) = app(&config(&provider, Some("sk-server")));
    let response = app
        .oneshot(post(
            "/api/v1/webrtc/openai/ephemeral",
            r#"{"model":"gpt-4o-mini-realtime-preview","voice":"alloy","modalities":["audio","text"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ephemeral_ungueltiger_body_ist_400() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_antwort()))
        .expect(0)
        .mount(&provider)
        .await;

    let (app, _) = app(&config(&provider, Some("sk-server")));
    let response = app
        .oneshot(post("/api/v1/webrtc/openai/ephemeral", r#"{"model": 42}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json_lesen(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Validation error");
    assert!(json["errors"]["body"][0].is_string());
}

#[tokio::test]
async fn ephemeral_null_modell_ist_400() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_antwort()))
        .expect(0)
        .mount(&provider)
        .await;

    let (app, _) = app(&config(&provider, Some("sk-server")));
    let response = app
        .oneshot(post(
            "/api/v1/webrtc/openai/ephemeral",
            r#"{"model": null, "voice": "alloy"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json_lesen(response).await;
    assert_eq!(json["message"], "Validation error");
    assert!(json["errors"]["body"][0].as_str().unwrap().contains("null"));
}

#[tokio::test]
async fn ephemeral_ohne_geheimnis_ist_500_ohne_netzwerk() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_antwort()))
        .expect(0)
        .mount(&provider)
        .await;

    let (app, _) = app(&config(&provider, None));
    let response = app
        .oneshot(post("/api/v1/webrtc/openai/ephemeral", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json_lesen(response).await;
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("OPENAI_API_KEY"));
}

#[tokio::test]
async fn provider_ablehnung_ist_502() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/realtime/sessions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "message": "Incorrect API key provided" } })),
        )
        .expect(1)
        .mount(&provider)
        .await;

    let (app, state) = app(&config(&provider, Some("sk-falsch")));
    let response = app
        .oneshot(post("/api/v1/webrtc/openai/ephemeral", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = body_json_lesen(response).await;
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("401"));
    assert_eq!(
        state
            .metriken
            .upstream_errors_total
            .with_label_values(&["401"])
            .get(),
        1
    );
    assert_eq!(state.metriken.credentials_total.get(), 0);
}

#[tokio::test]
async fn praefix_folgt_api_version() {
    let provider = MockServer::start().await;
    let mut cfg = config(&provider, None);
    cfg.api.version = "v2".into();
    let (app, _) = app(&cfg);

    let alt = app
        .clone()
        .oneshot(post("/api/v1/webrtc/openai/ephemeral", "{}"))
        .await
        .unwrap();
    assert_eq!(alt.status(), StatusCode::NOT_FOUND);

    // Ohne Geheimnis 500, aber die Route existiert
    let neu = app
        .oneshot(post("/api/v2/webrtc/openai/ephemeral", "{}"))
        .await
        .unwrap();
    assert_eq!(neu.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn metriken_endpunkt_abschaltbar() {
    let provider = MockServer::start().await;

    let (app_an, _) = app(&config(&provider, None));
    let response = app_an
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut cfg = config(&provider, None);
    cfg.observability.metriken_aktiviert = false;
    let (app_aus, _) = app(&cfg);
    let response = app_aus
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_erlaubt_konfigurierten_origin() {
    let provider = MockServer::start().await;
    let (app, _) = app(&config(&provider, None));

    let response = app
        .oneshot(
            Request::get("/health")
                .header("origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn websocket_join_und_gauge() {
    let provider = MockServer::start().await;
    let cfg = config(&provider, None);
    let (app, state) = app(&cfg);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let adresse = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{adresse}/ws"))
        .await
        .unwrap();

    // Binaer-Frames werden uebersprungen, die Verbindung bleibt offen
    ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    ws.send(Message::Text(
        json!({"event": "join-session", "data": {"sessionId": "s1", "userId": "u1"}}).to_string(),
    ))
    .await
    .unwrap();

    let antwort = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => break serde_json::from_str::<Value>(&text).unwrap(),
                Some(Ok(_)) => continue,
                andere => panic!("Unerwartetes Frame: {andere:?}"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(
        antwort,
        json!({"event": "session-joined", "data": {"sessionId": "s1", "success": true, "viewers": 1}})
    );
    assert_eq!(state.metriken.ws_connections.get(), 1);
    assert_eq!(state.metriken.ws_connections_total.get(), 1);
    assert_eq!(state.hub.aktive_sessions(), 1);

    ws.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while state.metriken.ws_connections.get() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Gauge muss nach dem Schliessen auf 0 fallen");
    assert_eq!(state.hub.client_anzahl(), 0);
    assert_eq!(state.hub.aktive_sessions(), 0);
}
