//! Control API registration behavior against a local stub server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ari_bridge::config::ApiConfig;
use ari_bridge::control::{AppRegistration, ControlApiClient};
use ari_bridge::event::NodeId;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::Router;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct RecordedRequest {
    path: String,
    node_header: Option<String>,
    has_auth: bool,
}

#[derive(Clone, Default)]
struct StubState {
    statuses: Arc<Mutex<VecDeque<u16>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubState {
    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn stub(State(state): State<StubState>, uri: Uri, headers: HeaderMap) -> StatusCode {
    let node_header = headers
        .get("X-Asterisk-ID")
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    state.requests.lock().unwrap().push(RecordedRequest {
        path: uri.path().to_string(),
        node_header,
        has_auth: headers.contains_key(header::AUTHORIZATION),
    });
    let code = state.statuses.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(code).unwrap()
}

/// Spawn a stub control API that answers with the scripted statuses, then
/// 200 once exhausted.
async fn spawn_stub(statuses: Vec<u16>) -> (String, StubState) {
    let state = StubState {
        statuses: Arc::new(Mutex::new(statuses.into())),
        requests: Arc::default(),
    };
    let app = Router::new().fallback(stub).with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn client(endpoint: &str) -> ControlApiClient {
    let api = ApiConfig {
        endpoint: endpoint.to_string(),
        username: "user".into(),
        password: "pass".into(),
    };
    ControlApiClient::new(&api, "switchboard").with_retry_delay(Duration::from_millis(5))
}

#[tokio::test]
async fn retries_every_non_success_status_until_accepted() {
    let (endpoint, state) = spawn_stub(vec![500, 404, 201]).await;

    client(&endpoint)
        .register_application(Some(&NodeId::new("node-1")))
        .await
        .unwrap();

    let requests = state.requests();
    assert_eq!(requests.len(), 3, "one request per scripted status");
    assert!(requests
        .iter()
        .all(|request| request.path == "/ari/amqp/switchboard"));
    assert!(requests
        .iter()
        .all(|request| request.node_header.as_deref() == Some("node-1")));
    assert!(requests.iter().all(|request| request.has_auth));
}

#[tokio::test]
async fn global_registration_omits_node_header() {
    let (endpoint, state) = spawn_stub(vec![200]).await;

    client(&endpoint).register_application(None).await.unwrap();

    let requests = state.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].node_header, None);
    assert!(requests[0].has_auth);
}

#[tokio::test]
async fn answer_targets_the_channel_and_succeeds() {
    let (endpoint, state) = spawn_stub(vec![204]).await;

    client(&endpoint)
        .answer(Some(&NodeId::new("node-2")), "chan-9")
        .await
        .unwrap();

    let requests = state.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/ari/channels/chan-9/answer");
    assert_eq!(requests[0].node_header.as_deref(), Some("node-2"));
}

#[tokio::test]
async fn answer_does_not_retry_on_failure() {
    let (endpoint, state) = spawn_stub(vec![503]).await;

    let result = client(&endpoint).answer(None, "chan-9").await;

    assert!(result.is_err());
    assert_eq!(state.requests().len(), 1, "answer is single-shot");
}
