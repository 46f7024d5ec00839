//! # Management API End-to-End Tests
//!
//! A loopback device enters shell mode, then the HTTP router drives it
//! through the real session manager.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use rlpa_api::build_router;
use rlpa_codec::Tag;
use rlpa_gateway::testing::{self, tags, text};
use tokio::time::timeout;
use tower::ServiceExt;

const WAIT: Duration = Duration::from_secs(10);

const CHIP_INFO: &str = r#"
[ "$*" = "chip info" ] || echo "unexpected args: $*" >&2
echo '{"type":"apdu","payload":{"func":"transmit","param":"80e2910003bf2000"}}'
read rsp
echo '{"type":"lpa","payload":{"code":0,"message":"success","data":{"eidValue":"89049032"}}}'
"#;

async fn post(router: &Router, uri: &str, password: &str, body: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Password", password)
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_shell_session_over_http() {
    // Arrange: device enters shell mode and shows its credential
    let ctx = testing::script_context(CHIP_INFO);
    let mut conn = testing::connect(ctx.clone()).await.unwrap();
    conn.device.send(Tag::Management, &[]).await.unwrap();
    let frame = timeout(WAIT, conn.device.recv())
        .await
        .expect("Should receive within timeout")
        .expect("Should have credentials");
    let message = text(&frame);
    let mut lines = message.lines();
    let id = lines.next().unwrap().trim_start_matches("ManageID: ").to_string();
    let password = lines.next().unwrap().trim_start_matches("Password: ").to_string();

    let router = build_router(ctx.sessions.clone());

    // Act: lock, then run a command that needs one APDU
    let (status, _) = post(&router, &format!("/connect/{id}"), &password, "").await;
    assert_eq!(status, StatusCode::OK);

    let exec = {
        let router = router.clone();
        let uri = format!("/shell/{id}");
        let password = password.clone();
        tokio::spawn(async move {
            post(&router, &uri, &password, r#"{"type":0,"command":"chip info"}"#).await
        })
    };

    let lock = timeout(WAIT, conn.device.recv()).await.unwrap().unwrap();
    assert_eq!(lock.tag, Tag::ApduLock);
    let apdu = timeout(WAIT, conn.device.recv()).await.unwrap().unwrap();
    assert_eq!(apdu.tag, Tag::Apdu);
    conn.device.send(Tag::Apdu, &[0x90, 0x00]).await.unwrap();

    // Assert
    let (status, body) = timeout(WAIT, exec).await.unwrap().unwrap();
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["data"]["eidValue"], "89049032");

    let (status, body) = post(&router, &format!("/shell/{id}"), &password, r#"{"type":1}"#).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "Closed"));

    let frames = timeout(WAIT, conn.device.recv_until_close()).await.unwrap();
    assert_eq!(
        tags(&frames),
        vec![Tag::ApduUnlock, Tag::ApduUnlock, Tag::Close]
    );

    // The credential died with the session.
    let (status, _) = post(&router, &format!("/keepalive/{id}"), &password, "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
