//! Protocol strictness and connection lifecycle

mod common;

use bytes::Bytes;
use common::{TestServer, DOMAIN, PASSWORD};
use glomail_rs::protocol::{Request, Response};
use std::time::Duration;
use tokio::time::timeout;

/// Wait for the server to hang up on `client`
async fn assert_disconnected(client: &mut glomail_rs::client::MailClient) {
    let next = timeout(Duration::from_secs(5), client.receive())
        .await
        .expect("server did not close the connection");

    match next {
        Ok(None) | Err(_) => {}
        Ok(Some(response)) => panic!("expected disconnect, got {:?}", response),
    }
}

#[tokio::test]
async fn test_unknown_header_disconnects_without_reply() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    client
        .send_frame(Bytes::from_static(br#"{"header": "FORMAT_DISK"}"#))
        .await
        .unwrap();

    assert_disconnected(&mut client).await;
}

#[tokio::test]
async fn test_malformed_frames_disconnect() {
    let server = TestServer::start().await;

    let frames: [&'static [u8]; 4] = [
        b"this is not json",
        br#"{"payload": {"username": "alice"}}"#,
        br#"{"header": "AUTH_LOGIN", "payload": {"username": "alice"}}"#,
        br#"{"header": "INBOX_READING_CHOICE", "payload": {"choice": "one"}}"#,
    ];

    for frame in frames {
        let mut client = server.client().await;
        client.send_frame(Bytes::from_static(frame)).await.unwrap();
        assert_disconnected(&mut client).await;
    }
}

#[tokio::test]
async fn test_anonymous_operations_disconnect() {
    let server = TestServer::start().await;

    for request in [
        Request::ListMail,
        Request::ReadMail { choice: 1 },
        Request::Stats,
        Request::Logout,
    ] {
        let mut client = server.client().await;
        client.send(&request).await.unwrap();
        assert_disconnected(&mut client).await;
    }
}

#[tokio::test]
async fn test_violation_does_not_affect_other_connections() {
    let server = TestServer::start().await;
    let mut alice = server.registered("alice").await;

    let mut rogue = server.client().await;
    rogue.send(&Request::Stats).await.unwrap();
    assert_disconnected(&mut rogue).await;

    assert_eq!(alice.stats().await.unwrap().count, 0);
}

#[tokio::test]
async fn test_logout_keeps_connection_open() {
    let server = TestServer::start().await;
    let mut client = server.registered("alice").await;

    client.logout().await.unwrap();
    assert_eq!(client.username(), None);

    // No acknowledgement: the next frame answers the login
    client.login("alice", PASSWORD).await.unwrap();
    assert!(client.list_mail().await.unwrap().is_empty());

    // After logging out again, mailbox access is a violation
    client.logout().await.unwrap();
    client.send(&Request::ListMail).await.unwrap();
    assert_disconnected(&mut client).await;
}

#[tokio::test]
async fn test_bye_closes_connection() {
    let server = TestServer::start().await;
    let mut client = server.registered("alice").await;

    client.send(&Request::Bye).await.unwrap();
    assert_disconnected(&mut client).await;

    // The account is still there for a new connection
    let mut again = server.client().await;
    again.login("alice", PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_peer_hangup_drops_session() {
    let server = TestServer::start().await;
    let client = server.registered("alice").await;
    drop(client);

    let mut bob = server.registered("bob").await;
    bob.send_mail(&format!("alice@{}", DOMAIN), "Still there?", "hello")
        .await
        .unwrap();

    let mut alice = server.client().await;
    alice.login("alice", PASSWORD).await.unwrap();
    assert_eq!(alice.list_mail().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_interleaved_clients() {
    let server = TestServer::start().await;
    let mut alice = server.registered("alice").await;
    let mut bob = server.registered("bob").await;

    // Both requests are in flight before either response is read
    alice.send(&Request::Stats).await.unwrap();
    bob.send(&Request::ListMail).await.unwrap();

    let bob_response = bob.receive().await.unwrap().unwrap();
    let alice_response = alice.receive().await.unwrap().unwrap();
    assert!(bob_response.is_ok());
    assert!(alice_response.is_ok());
}

#[tokio::test]
async fn test_error_response_wire_shape() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    client
        .send_frame(Bytes::from_static(
            br#"{"header": "AUTH_LOGIN", "payload": {"username": "ghost", "password": "Whatever123"}}"#,
        ))
        .await
        .unwrap();

    match client.receive().await.unwrap() {
        Some(Response::Error(message)) => assert!(message.contains("ghost")),
        other => panic!("expected ERROR, got {:?}", other),
    }
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let server = TestServer::start().await;
    let addr = server.addr;
    let mut alice = server.registered("alice").await;
    let mut anonymous = server.client().await;

    server.stop().await.unwrap();

    assert_disconnected(&mut alice).await;
    assert_disconnected(&mut anonymous).await;
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
