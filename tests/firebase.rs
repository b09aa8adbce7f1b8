//! Firebase backend against a local stand-in for the Realtime Database
//! REST interface.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use talctrack::firebase::FirebaseRemote;
use talctrack::sync::SyncSession;
use talctrack_core::store::RemoteStore;

#[derive(Clone, Default)]
struct Stub {
    written: Arc<Mutex<Option<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

const EVENTS: &str = concat!(
    "event: put\n",
    "data: {\"path\":\"/\",\"data\":{\"receivables\":[{\"id\":\"r1\",\"payer\":\"Bob\",\"amount\":100}]}}\n",
    "\n",
    "event: keep-alive\n",
    "data: null\n",
    "\n",
    "event: patch\n",
    "data: {\"path\":\"/\",\"data\":{\"dealerContacts\":[{\"id\":\"d1\",\"name\":\"Dealer B\",\"contactInfo\":\"555-123-4567\"}]}}\n",
    "\n",
);

async fn stream_events(
    State(stub): State<Stub>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Some(auth) = query.get("auth") {
        stub.auth.lock().unwrap().push(auth.clone());
    }
    ([(header::CONTENT_TYPE, "text/event-stream")], EVENTS)
}

async fn put_document(
    State(stub): State<Stub>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if let Some(auth) = query.get("auth") {
        stub.auth.lock().unwrap().push(auth.clone());
    }
    *stub.written.lock().unwrap() = Some(body.clone());
    Json(body)
}

async fn start(stub: Stub) -> String {
    let app = Router::new()
        .route("/shops/main.json", get(stream_events).put(put_document))
        .route(
            "/denied.json",
            get(|| async { (StatusCode::UNAUTHORIZED, "{\"error\":\"Permission denied\"}") }),
        )
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn subscription_applies_put_and_patch() {
    let stub = Stub::default();
    let base = start(stub.clone()).await;
    let remote = FirebaseRemote::new(&base, "/shops/main/", Some("secret".into())).unwrap();
    assert_eq!(remote.url(), format!("{}/shops/main.json", base));

    let mut stream = remote.subscribe().await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first["receivables"][0]["payer"], "Bob");

    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second["receivables"][0]["payer"], "Bob");
    assert_eq!(second["dealerContacts"][0]["name"], "Dealer B");

    // The stand-in closes the response after the last event.
    assert!(stream.next().await.unwrap().is_err());
    assert!(stream.next().await.is_none());

    assert_eq!(stub.auth.lock().unwrap().as_slice(), ["secret".to_string()]);
}

#[tokio::test]
async fn replace_puts_whole_tree() {
    let stub = Stub::default();
    let base = start(stub.clone()).await;
    let remote = FirebaseRemote::new(&base, "shops/main", None).unwrap();

    let tree = json!({"payables": [{"id": "p1", "payee": "Supplier X", "amount": 2000.0, "dueDate": "2024-07-01"}]});
    remote.replace(&tree).await.unwrap();
    assert_eq!(stub.written.lock().unwrap().clone(), Some(tree));
    assert!(stub.auth.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_subscription_surfaces_status() {
    let base = start(Stub::default()).await;
    let remote = FirebaseRemote::new(&base, "denied", None).unwrap();
    let err = remote.subscribe().await.err().unwrap();
    assert!(err.to_string().contains("401"), "{}", err);
}

#[tokio::test]
async fn session_loads_from_firebase() {
    let base = start(Stub::default()).await;
    let remote: Arc<dyn RemoteStore> =
        Arc::new(FirebaseRemote::new(&base, "/shops/main", None).unwrap());

    let session = SyncSession::open_loaded(remote, Duration::from_secs(5))
        .await
        .unwrap();
    let ledger = session.ledger().await;
    assert_eq!(ledger.receivables()[0].payer, "Bob");
    assert!(!ledger.is_dirty());
}
