//! # Session Dispatch Tests
//!
//! Drive a session over a loopback socket and check what the device sees.

use std::time::Duration;

use rlpa_codec::Tag;
use rlpa_gateway::testing::{self, tags, text};
use rlpa_gateway::{ManagementApi, ModeKind, SessionResult};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);
const NO_LPAC: &str = "exit 0";

fn parse_credentials(message: &str) -> (String, String) {
    let mut lines = message.lines();
    let id = lines
        .next()
        .and_then(|l| l.strip_prefix("ManageID: "))
        .expect("ManageID line");
    let password = lines
        .next()
        .and_then(|l| l.strip_prefix("Password: "))
        .expect("Password line");
    (id.to_string(), password.to_string())
}

#[tokio::test]
async fn test_management_frame_issues_credentials() {
    // Arrange
    let ctx = testing::script_context(NO_LPAC);
    let mut conn = testing::connect(ctx.clone()).await.unwrap();

    // Act
    conn.device.send(Tag::Management, &[]).await.unwrap();
    let frame = timeout(WAIT, conn.device.recv())
        .await
        .expect("Should receive within timeout")
        .expect("Should have frame");

    // Assert
    assert_eq!(frame.tag, Tag::MessageBox);
    let (id, password) = parse_credentials(&text(&frame));
    assert_eq!(id.len(), 2);
    assert_eq!(password.len(), 2);
    assert_eq!(conn.session.mode_kind(), Some(ModeKind::Shell));
    assert_eq!(conn.session.id(), Some(id.clone()));
    assert!(ctx.sessions.authenticate(&id, &password));
    assert!(ctx.sessions.find(&id).is_some());
}

#[tokio::test]
async fn test_frame_split_across_reads() {
    let ctx = testing::script_context(NO_LPAC);
    let mut conn = testing::connect(ctx).await.unwrap();

    conn.device.send_raw(&[0x01]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    conn.device.send_raw(&[0x00]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    conn.device.send_raw(&[0x00]).await.unwrap();

    let frame = timeout(WAIT, conn.device.recv()).await.unwrap().unwrap();
    assert_eq!(frame.tag, Tag::MessageBox);
    assert!(text(&frame).starts_with("ManageID: "));
}

#[tokio::test]
async fn test_unimplemented_tag_closes_session() {
    let ctx = testing::script_context(NO_LPAC);
    let mut conn = testing::connect(ctx).await.unwrap();

    conn.device.send(Tag::Unknown(0x42), b"hello").await.unwrap();
    let frames = timeout(WAIT, conn.device.recv_until_close()).await.unwrap();

    assert_eq!(
        tags(&frames),
        vec![Tag::MessageBox, Tag::ApduUnlock, Tag::Close]
    );
    assert_eq!(text(&frames[0]), "Unimplemented command.");
    assert!(conn.device.recv().await.is_none());
    timeout(WAIT, conn.task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reboot_and_stray_apdu_are_ignored() {
    let ctx = testing::script_context(NO_LPAC);
    let mut conn = testing::connect(ctx).await.unwrap();

    conn.device.send(Tag::Reboot, &[]).await.unwrap();
    conn.device.send(Tag::Apdu, &[0x90, 0x00]).await.unwrap();
    conn.device.send(Tag::Management, &[]).await.unwrap();

    // The first thing the device hears back is the shell credential.
    let frame = timeout(WAIT, conn.device.recv()).await.unwrap().unwrap();
    assert_eq!(frame.tag, Tag::MessageBox);
    assert!(text(&frame).starts_with("ManageID: "));
    assert!(!conn.session.is_closing());
}

#[tokio::test]
async fn test_second_mode_select_ignored() {
    let ctx = testing::script_context(NO_LPAC);
    let mut conn = testing::connect(ctx).await.unwrap();

    conn.device.send(Tag::Management, &[]).await.unwrap();
    timeout(WAIT, conn.device.recv()).await.unwrap().unwrap();

    conn.device
        .send(Tag::DownloadProfile, b"LPA:1$smdp.example.com$MATCH")
        .await
        .unwrap();

    assert!(timeout(QUIET, conn.device.recv()).await.is_err());
    assert_eq!(conn.session.mode_kind(), Some(ModeKind::Shell));
    assert!(!conn.session.has_process());
}

#[tokio::test]
async fn test_oversized_frame_closes_session() {
    let ctx = testing::script_context(NO_LPAC);
    let mut conn = testing::connect(ctx).await.unwrap();

    // Apdu with a declared length of 509
    conn.device.send_raw(&[0xFE, 0xFD, 0x01]).await.unwrap();
    let frames = timeout(WAIT, conn.device.recv_until_close()).await.unwrap();

    assert_eq!(tags(&frames), vec![Tag::ApduUnlock, Tag::Close]);
    assert!(conn.device.recv().await.is_none());
    assert!(conn.session.is_closing());
}

#[tokio::test]
async fn test_device_hang_up_revokes_credentials() {
    let ctx = testing::script_context(NO_LPAC);
    let mut conn = testing::connect(ctx.clone()).await.unwrap();

    conn.device.send(Tag::Management, &[]).await.unwrap();
    let frame = timeout(WAIT, conn.device.recv()).await.unwrap().unwrap();
    let (id, password) = parse_credentials(&text(&frame));

    conn.device.hang_up().await.unwrap();
    timeout(WAIT, conn.task).await.unwrap().unwrap();

    assert!(conn.session.is_closing());
    assert!(!ctx.sessions.authenticate(&id, &password));
    assert!(ctx.sessions.find(&id).is_none());
    assert!(ctx.sessions.is_empty());
}

#[tokio::test]
async fn test_concurrent_close_runs_once() {
    let ctx = testing::script_context(NO_LPAC);
    let mut conn = testing::connect(ctx.clone()).await.unwrap();

    conn.device.send(Tag::Management, &[]).await.unwrap();
    timeout(WAIT, conn.device.recv()).await.unwrap().unwrap();

    let first = conn.session.clone();
    let second = conn.session.clone();
    tokio::join!(
        first.close(SessionResult::Finished),
        second.close(SessionResult::Error)
    );

    let frames = timeout(WAIT, conn.device.recv_until_close()).await.unwrap();
    assert_eq!(tags(&frames), vec![Tag::ApduUnlock, Tag::Close]);
    assert!(conn.device.recv().await.is_none());
    assert!(ctx.sessions.is_empty());

    // Later calls are no-ops.
    conn.session.close(SessionResult::Error).await;
    timeout(WAIT, conn.task).await.unwrap().unwrap();
}
