mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::atomic::Ordering;
use tower::util::ServiceExt;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{FixedRecognizer, stub_state, test_config};
use parley::{AppState, create_app};

async fn body_json_of(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_app(AppState::new(test_config("http://localhost:8001/api")).unwrap());

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json_of(response).await, json!({ "status": "OK" }));
}

#[tokio::test]
async fn test_chat_start_proxies_dialogue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "s-1",
            "message": "Dzień dobry! Ile masz lat?",
            "createdAt": "2024-05-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let app = create_app(stub_state(test_config(&format!("{}/api", server.uri())), None));
    let response = app.oneshot(get("/api/chat/start")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json_of(response).await;
    assert_eq!(json["sessionId"], "s-1");
    assert_eq!(json["message"], "Dzień dobry! Ile masz lat?");
    assert_eq!(json["createdAt"], "2024-05-01T10:00:00Z");
}

#[tokio::test]
async fn test_chat_start_failure_returns_fallback_greeting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/start"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let app = create_app(stub_state(test_config(&format!("{}/api", server.uri())), None));
    let response = app.oneshot(get("/api/chat/start")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json_of(response).await;
    assert_eq!(
        json["message"],
        "Cześć! Jestem twoim asystentem głosowym. W czym mogę ci pomóc?"
    );
}

#[tokio::test]
async fn test_chat_answer_validation() {
    let app = create_app(stub_state(test_config("http://127.0.0.1:9/api"), None));

    let response = app
        .clone()
        .oneshot(post_json("/api/chat/answer", json!({ "answer": "35" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json_of(response).await["error"]
            .as_str()
            .unwrap()
            .contains("sessionId")
    );

    let response = app
        .oneshot(post_json(
            "/api/chat/answer",
            json!({ "sessionId": "s-1", "answer": "  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_answer_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/answer"))
        .and(body_json(json!({
            "sessionId": "s-1",
            "answer": "35 lat",
            "systemQuestion": "Ile masz lat?"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "s-1",
            "question": "Ile zarabiasz miesięcznie?",
            "isCompleted": false,
            "category": "income",
            "questionNumber": 2,
            "totalQuestions": 9
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_app(stub_state(test_config(&format!("{}/api", server.uri())), None));
    let response = app
        .oneshot(post_json(
            "/api/chat/answer",
            json!({ "sessionId": "s-1", "answer": "35 lat", "systemQuestion": "Ile masz lat?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json_of(response).await;
    assert_eq!(json["question"], "Ile zarabiasz miesięcznie?");
    assert_eq!(json["isCompleted"], false);
    assert_eq!(json["questionNumber"], 2);
    assert_eq!(json["nextAction"], "none");
}

#[tokio::test]
async fn test_chat_answer_failure_returns_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/answer"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = create_app(stub_state(test_config(&format!("{}/api", server.uri())), None));
    let response = app
        .oneshot(post_json(
            "/api/chat/answer",
            json!({ "sessionId": "s-1", "answer": "35 lat" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json_of(response).await;
    assert_eq!(json["error"], "Failed to connect to chat API");
    assert_eq!(json["question"], "Przepraszam, wystąpił błąd. Spróbuj ponownie.");
}

#[tokio::test]
async fn test_mortgage_offers_and_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/mortgage-offers/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "offers": { "items": [
                { "bank": { "name": "Bank A" }, "title": "Kredyt", "monthlyInstallment": 2100.5 }
            ] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat/send-offers-email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sent": true })))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_app(stub_state(test_config(&format!("{}/api", server.uri())), None));

    let response = app
        .clone()
        .oneshot(get("/api/chat/mortgage-offers/s-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json_of(response).await;
    assert_eq!(json["offers"]["items"][0]["bank"]["name"], "Bank A");
    assert_eq!(json["offers"]["items"][0]["monthlyInstallment"], 2100.5);

    let response = app
        .oneshot(post_json(
            "/api/chat/send-offers-email",
            json!({ "sessionId": "s-1", "email": "jan@example.com", "message": "Oferty" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json_of(response).await, json!({ "success": true }));
}

#[tokio::test]
async fn test_speech_endpoints_unavailable_without_providers() {
    let app = create_app(AppState::new(test_config("http://localhost:8001/api")).unwrap());

    let response = app
        .clone()
        .oneshot(post_json("/api/tts", json!({ "text": "Dzień dobry" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let boundary = "parley-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"a.webm\"\r\nContent-Type: audio/webm\r\n\r\nxxxx\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/stt")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_tts_streams_audio() {
    let app = create_app(stub_state(test_config("http://localhost:8001/api"), None));

    let response = app
        .clone()
        .oneshot(post_json("/api/tts", json!({ "text": "Dzień dobry" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut expected = "Dzień dobry".as_bytes().to_vec();
    expected.push(0);
    assert_eq!(&body[..], &expected[..]);

    let response = app
        .oneshot(post_json("/api/tts", json!({ "text": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stt_upload() {
    let recognizer = FixedRecognizer::new("Chcę kredyt");
    let app = create_app(stub_state(
        test_config("http://localhost:8001/api"),
        Some(recognizer.clone()),
    ));

    let audio = "a".repeat(400);
    let boundary = "parley-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"a.webm\"\r\nContent-Type: audio/webm\r\n\r\n{audio}\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/stt")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json_of(response).await,
        json!({ "transcript": "Chcę kredyt" })
    );
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(recognizer.last_len.load(Ordering::SeqCst), 400);

    // Under the minimum size the provider is not called
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"a.webm\"\r\nContent-Type: audio/webm\r\n\r\nshort\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/stt")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json_of(response).await, json!({ "transcript": "" }));
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);

    // Missing audio field
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/stt")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sessions_empty() {
    let app = create_app(stub_state(test_config("http://localhost:8001/api"), None));

    let response = app.oneshot(get("/api/sessions")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json_of(response).await,
        json!({ "active": 0, "sessions": [] })
    );
}
