//! End-to-end handshake over loopback HTTP.
//!
//! A real receive session is bound to 127.0.0.1 with advertisement
//! disabled and driven by the real handshake client, so no multicast
//! networking is needed.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use connect_core::{Credential, DeviceEntry, Error, HandshakeStep};
use connect_crypto::SealedBlobCodec;
use connect_pairing::{
    CredentialStore, FileCredentialStore, HandshakeClient, Identity, PushSession, PushState,
    ReceiveHandle, ReceiveSession, ReceiveState, SessionConfig, StatusResponse,
};

const WAIT: Duration = Duration::from_secs(5);

fn target_config() -> SessionConfig {
    SessionConfig::builder()
        .device_name("Living Room")
        .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .port(0)
        .advertise(false)
        .build()
}

fn source_client() -> HandshakeClient {
    let config = SessionConfig::builder().device_name("Phone").build();
    HandshakeClient::new(Arc::new(Identity::generate(&config)), Arc::new(SealedBlobCodec))
        .unwrap()
}

async fn start_target() -> (ReceiveHandle, String) {
    let handle = ReceiveSession::new(target_config()).start().await.unwrap();
    let url = format!("http://{}/", handle.local_addr());
    (handle, url)
}

async fn get_info(url: &str) -> serde_json::Value {
    reqwest::Client::new()
        .get(url)
        .query(&[("action", "getInfo")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn post_empty_blob(url: &str) -> reqwest::StatusCode {
    reqwest::Client::new()
        .post(url)
        .form(&[
            ("action", "addUser"),
            ("userName", "mallory"),
            ("clientKey", "AAAA"),
            ("blob", ""),
        ])
        .send()
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn push_to_advertising_target_pairs_alice() {
    let (mut target, url) = start_target().await;

    let before = get_info(&url).await;
    assert_eq!(before["remoteName"], "Living Room");
    assert_eq!(before["activeUser"], "");
    let again = get_info(&url).await;
    assert_eq!(before["publicKey"], again["publicKey"]);

    source_client()
        .pair(&url, &Credential::new("alice", b"reusable-token".to_vec()))
        .await
        .unwrap();
    assert_eq!(target.state(), ReceiveState::Paired);

    let credential = target.wait_timeout(WAIT).await.unwrap();
    assert_eq!(credential.username(), "alice");
    assert_eq!(credential.payload(), b"reusable-token");
    assert_eq!(target.state(), ReceiveState::Paired);
}

#[tokio::test]
async fn malformed_request_before_valid_one_is_rejected() {
    let (mut target, url) = start_target().await;

    assert_eq!(post_empty_blob(&url).await, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(target.state(), ReceiveState::AwaitingHandshake);

    source_client()
        .pair(&url, &Credential::new("alice", b"token".to_vec()))
        .await
        .unwrap();
    assert_eq!(target.wait_timeout(WAIT).await.unwrap().username(), "alice");
}

#[tokio::test]
async fn malformed_request_after_valid_one_is_rejected() {
    let (target, url) = start_target().await;

    source_client()
        .pair(&url, &Credential::new("alice", b"token".to_vec()))
        .await
        .unwrap();
    assert_eq!(post_empty_blob(&url).await, reqwest::StatusCode::BAD_REQUEST);

    let held = target.server().credential().await.unwrap();
    assert_eq!(held.username(), "alice");
}

#[tokio::test]
async fn concurrent_pushes_pair_exactly_once() {
    let (mut target, url) = start_target().await;

    let first_url = url.clone();
    let first = tokio::spawn(async move {
        source_client()
            .pair(&first_url, &Credential::new("alice", b"one".to_vec()))
            .await
    });
    let second_url = url.clone();
    let second = tokio::spawn(async move {
        source_client()
            .pair(&second_url, &Credential::new("bob", b"two".to_vec()))
            .await
    });
    let malformed = tokio::spawn(async move { post_empty_blob(&url).await });

    // Both well-formed pushes are acknowledged; only the first one wins.
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(malformed.await.unwrap(), reqwest::StatusCode::BAD_REQUEST);

    let credential = target.wait_timeout(WAIT).await.unwrap();
    assert!(credential.username() == "alice" || credential.username() == "bob");
    let held = target.server().credential().await.unwrap();
    assert_eq!(held, credential);
}

#[tokio::test]
async fn undecodable_blob_keeps_session_listening() {
    let (mut target, url) = start_target().await;

    let response = reqwest::Client::new()
        .post(&url)
        .form(&[
            ("action", "addUser"),
            ("userName", "alice"),
            ("clientKey", "CQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQk="),
            ("blob", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    let body: StatusResponse = response.json().await.unwrap();
    assert_eq!(body.status_error, "ERROR-LOGIN-FAILED");
    assert_eq!(target.state(), ReceiveState::AwaitingHandshake);

    source_client()
        .pair(&url, &Credential::new("alice", b"token".to_vec()))
        .await
        .unwrap();
    assert_eq!(target.wait_timeout(WAIT).await.unwrap().username(), "alice");
}

#[tokio::test]
async fn unknown_action_is_bad_request() {
    let (_target, url) = start_target().await;

    let response = reqwest::Client::new()
        .get(&url)
        .query(&[("action", "formatDisk")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_info_reports_active_user_after_pairing() {
    let (_target, url) = start_target().await;

    source_client()
        .pair(&url, &Credential::new("alice", b"token".to_vec()))
        .await
        .unwrap();

    let info = get_info(&url).await;
    assert_eq!(info["activeUser"], "alice");
}

#[tokio::test]
async fn received_credential_can_be_pushed_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");

    let config = SessionConfig::builder()
        .device_name("Speaker")
        .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .port(0)
        .advertise(false)
        .credential_path(&path)
        .build();
    let mut first_hop = ReceiveSession::new(config).start().await.unwrap();
    let first_url = format!("http://{}/", first_hop.local_addr());

    source_client()
        .pair(&first_url, &Credential::new("alice", b"token".to_vec()))
        .await
        .unwrap();
    first_hop.wait_timeout(WAIT).await.unwrap();

    let store = FileCredentialStore::new(&path);
    assert_eq!(store.load().await.unwrap().username(), "alice");

    let (mut second_hop, second_url) = start_target().await;
    let push = PushSession::from_store(
        SessionConfig::builder().device_name("Speaker").build(),
        &store,
    )
    .await
    .unwrap();
    push.connect(&DeviceEntry::new("Living Room", second_url))
        .await
        .unwrap();
    assert_eq!(push.state(), PushState::Paired);

    let relayed = second_hop.wait_timeout(WAIT).await.unwrap();
    assert_eq!(relayed.username(), "alice");
    assert_eq!(relayed.payload(), b"token");
}

#[tokio::test]
async fn stopped_target_fails_push_at_get_info() {
    let (target, url) = start_target().await;
    target.stop();
    drop(target);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = source_client()
        .pair(&url, &Credential::new("alice", b"token".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.step, HandshakeStep::GetInfo);
}

#[tokio::test]
async fn receive_deadline_expires_without_peer() {
    let (mut target, _url) = start_target().await;
    let result = target.wait_timeout(Duration::from_millis(50)).await;
    assert!(matches!(result, Err(Error::Timeout)));
    assert_eq!(target.state(), ReceiveState::Failed);
}

#[tokio::test]
async fn target_paired_without_a_waiter_stays_paired_after_stop() {
    let (target, url) = start_target().await;

    source_client()
        .pair(&url, &Credential::new("alice", b"token".to_vec()))
        .await
        .unwrap();
    assert_eq!(target.state(), ReceiveState::Paired);

    target.stop();
    assert_eq!(target.state(), ReceiveState::Paired);
    assert_eq!(target.server().credential().await.unwrap().username(), "alice");
}
