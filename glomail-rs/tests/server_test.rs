//! End-to-end mail flows over the wire

mod common;

use common::{entry_count, TestServer, DOMAIN, PASSWORD};
use glomail_rs::MailError;

fn rejected_with(result: glomail_rs::Result<()>, needle: &str) -> bool {
    matches!(result, Err(MailError::Rejected(message)) if message.contains(needle))
}

#[tokio::test]
async fn test_register_then_login() {
    let server = TestServer::start().await;

    let mut client = server.client().await;
    client.register("alice", PASSWORD).await.unwrap();
    assert_eq!(client.username(), Some("alice"));
    assert!(server.mailbox_dir("alice").join("passwd").is_file());
    client.bye().await.unwrap();

    let mut client = server.client().await;
    client.login("alice", PASSWORD).await.unwrap();
    assert!(client.list_mail().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_twice_keeps_original_digest() {
    let server = TestServer::start().await;
    let _alice = server.registered("alice").await;
    let passwd = server.mailbox_dir("alice").join("passwd");
    let digest = std::fs::read_to_string(&passwd).unwrap();

    let mut other = server.client().await;
    let result = other.register("alice", "AnotherPass2").await;
    assert!(rejected_with(result, "already exists"));
    assert_eq!(std::fs::read_to_string(&passwd).unwrap(), digest);

    // The failed attempt leaves the connection usable
    other.login("alice", PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_login_failures() {
    let server = TestServer::start().await;
    let _alice = server.registered("alice").await;

    let mut client = server.client().await;
    assert!(rejected_with(
        client.login("alice", "WrongPassword9").await,
        "Bad password"
    ));
    assert!(rejected_with(
        client.login("ghost", PASSWORD).await,
        "Unknown user"
    ));
    assert_eq!(client.username(), None);

    client.login("alice", PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_password_policy_over_the_wire() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert!(rejected_with(
        client.register("alice", "short1A").await,
        "Invalid credentials"
    ));
    assert!(rejected_with(
        client.register("alice", "alllowercase1234").await,
        "Invalid credentials"
    ));
    assert!(rejected_with(
        client.register("not allowed", PASSWORD).await,
        "Invalid credentials"
    ));
    assert!(!server.mailbox_dir("alice").exists());

    client.register("alice", "LongEnough1").await.unwrap();
}

#[tokio::test]
async fn test_send_list_read() {
    let server = TestServer::start().await;
    let mut alice = server.registered("alice").await;
    let mut bob = server.registered("bob").await;

    for subject in ["first", "second", "third"] {
        bob.send_mail(&format!("alice@{}", DOMAIN), subject, "Hello Alice")
            .await
            .unwrap();
    }

    let list = alice.list_mail().await.unwrap();
    assert_eq!(list.len(), 3);
    assert!(list[0].starts_with("#1 bob@glo2000.ca - third - "));
    assert!(list[1].starts_with("#2 bob@glo2000.ca - second - "));
    assert!(list[2].starts_with("#3 bob@glo2000.ca - first - "));
    assert!(list.iter().all(|line| !line.contains("passwd")));

    let email = alice.read_mail(3).await.unwrap();
    assert_eq!(email.subject, "first");
    assert_eq!(email.sender, "bob@glo2000.ca");
    assert_eq!(email.destination, "alice@glo2000.ca");
    assert_eq!(email.content, "Hello Alice");
    assert!(!email.date.is_empty());

    // Bob's own mailbox is untouched
    assert!(bob.list_mail().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_out_of_range() {
    let server = TestServer::start().await;
    let mut alice = server.registered("alice").await;
    alice
        .send_mail(&format!("alice@{}", DOMAIN), "note to self", "remember")
        .await
        .unwrap();

    for choice in [0, 2] {
        let result = alice.read_mail(choice).await.map(|_| ());
        assert!(rejected_with(result, "Invalid choice"));
    }

    assert_eq!(alice.read_mail(1).await.unwrap().subject, "note to self");
}

#[tokio::test]
async fn test_send_external_domain() {
    let server = TestServer::start().await;
    let mut alice = server.registered("alice").await;

    let result = alice
        .send_mail("user@otherdomain.example", "Hi", "Anyone there?")
        .await;
    assert!(rejected_with(result, "External domain rejected"));

    assert_eq!(entry_count(&server.lost_dir()), 0);
    // Only the credential file
    assert_eq!(entry_count(&server.mailbox_dir("alice")), 1);
}

#[tokio::test]
async fn test_send_unknown_local_user() {
    let server = TestServer::start().await;
    let mut alice = server.registered("alice").await;

    let result = alice
        .send_mail(&format!("ghost@{}", DOMAIN), "Boo", "Are you real?")
        .await;
    assert!(rejected_with(result, "Unknown recipient"));

    assert_eq!(entry_count(&server.lost_dir()), 1);
    assert_eq!(entry_count(&server.mailbox_dir("alice")), 1);
}

#[tokio::test]
async fn test_send_increments_recipient_count() {
    let server = TestServer::start().await;
    let mut alice = server.registered("alice").await;
    let mut bob = server.registered("bob").await;

    let before = alice.stats().await.unwrap().count;
    bob.send_mail(&format!("alice@{}", DOMAIN), "Ping", "pong?")
        .await
        .unwrap();

    assert_eq!(alice.stats().await.unwrap().count, before + 1);
    assert_eq!(alice.list_mail().await.unwrap().len(), before + 1);
}

#[tokio::test]
async fn test_stats_match_files_on_disk() {
    let server = TestServer::start().await;
    let mut alice = server.registered("alice").await;
    let mut bob = server.registered("bob").await;

    for (subject, body) in [("a", "x"), ("b", "yy"), ("c", "a much longer body")] {
        bob.send_mail(&format!("alice@{}", DOMAIN), subject, body)
            .await
            .unwrap();
    }

    let mut expected = 0;
    for entry in std::fs::read_dir(server.mailbox_dir("alice")).unwrap() {
        let entry = entry.unwrap();
        if entry.file_name() != "passwd" {
            expected += entry.metadata().unwrap().len();
        }
    }

    let stats = alice.stats().await.unwrap();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.size, expected);
}

#[tokio::test]
async fn test_forged_sender_is_rewritten() {
    let server = TestServer::start().await;
    let mut alice = server.registered("alice").await;

    // A client without a domain sends a bare username as sender
    let mut bob = server.client().await;
    bob.register("bob", PASSWORD).await.unwrap();
    let mut raw = glomail_rs::client::MailClient::connect(server.addr)
        .await
        .unwrap();
    raw.login("bob", PASSWORD).await.unwrap();
    raw.send_mail(&format!("alice@{}", DOMAIN), "Who am I", "guess")
        .await
        .unwrap();

    let email = alice.read_mail(1).await.unwrap();
    assert_eq!(email.sender, "bob@glo2000.ca");
}
