use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use coach_overlay::command::{CommandClient, CommandError, HttpCommandClient};
use coach_proto::{AdviceEvent, ConnectionStatus, Severity, StateSnapshot};
use serde_json::json;

async fn invoke(Path(command): Path<String>) -> Response {
    match command.as_str() {
        "get_connection_status" => axum::Json(ConnectionStatus {
            log_tailing: true,
            addon_connected: false,
            wow_path: "C:/Games/WoW".into(),
        })
        .into_response(),
        "get_state_snapshot" => axum::Json(json!({
            "pull_elapsed_ms": 12_500,
            "gcd_gap_ms": 310,
            "avoidable_count": 1,
            "interrupt_count": 3,
            "in_combat": true
        }))
        .into_response(),
        "drain_advice_queue" => axum::Json(json!([{
            "key": "gcd_gap",
            "title": "GCD gap",
            "message": "1.2s idle",
            "severity": "warn",
            "kv": [["gap", "1.2s"]],
            "timestamp_ms": 1_700_000_000_123u64
        }]))
        .into_response(),
        "drain_event_log" => (StatusCode::INTERNAL_SERVER_ERROR, "log queue poisoned").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve() -> String {
    let app = Router::new().route("/invoke/:command", post(invoke));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn decodes_command_responses() {
    let client = HttpCommandClient::new(serve().await).expect("client");

    let status = client.get_connection_status().await.expect("status");
    assert!(status.log_tailing);
    assert!(!status.addon_connected);
    assert_eq!(status.wow_path, "C:/Games/WoW");

    let snapshot = client.get_state_snapshot().await.expect("snapshot");
    assert_eq!(
        snapshot,
        StateSnapshot {
            pull_elapsed_ms: 12_500,
            gcd_gap_ms: 310,
            avoidable_count: 1,
            interrupt_count: 3,
            in_combat: true,
            encounter_name: None,
        }
    );

    let advice = client.drain_advice_queue().await.expect("advice");
    assert_eq!(
        advice,
        vec![AdviceEvent {
            key: "gcd_gap".into(),
            title: "GCD gap".into(),
            message: "1.2s idle".into(),
            severity: Severity::Warn,
            kv: vec![("gap".into(), "1.2s".into())],
            timestamp_ms: 1_700_000_000_123,
        }]
    );
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let client = HttpCommandClient::new(serve().await).expect("client");
    match client.drain_event_log().await {
        Err(CommandError::UnexpectedStatus { status, body }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "log queue poisoned");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_backend_is_an_http_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = HttpCommandClient::new(format!("http://{addr}")).expect("client");
    assert!(matches!(
        client.get_state_snapshot().await,
        Err(CommandError::Http(_))
    ));
}
