//! Signaling router tests, mostly through axum's tower service interface.
//! The `serve` tests bind loopback sockets.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use loopcast_media::{MediaKind, Unpaced};
use loopcast_server::config::SignalingConfig;
use loopcast_server::session::SessionCoordinator;
use loopcast_server::signaling::{
    app, router, serve, Negotiated, SdpType, ServeError, SessionDescription, SignalingState,
    Transport, TransportError,
};
use loopcast_server::stats_sink::StatsSink;
use tokio::sync::oneshot;
use tower::ServiceExt;

use common::{deadline, Fixture};

const TOKEN: &str = "mingle";

/// Answers every offer with a canned description; keeps each session's
/// close trigger so tests can hang up.
#[derive(Clone, Default)]
struct MockTransport {
    hangups: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
    offers: Arc<Mutex<Vec<String>>>,
    refuse: bool,
}

impl Transport for MockTransport {
    async fn negotiate(&self, offer: SessionDescription) -> Result<Negotiated, TransportError> {
        self.offers.lock().unwrap().push(offer.sdp);
        if self.refuse {
            return Err(TransportError("no compatible codecs".into()));
        }
        let (tx, closed) = oneshot::channel();
        self.hangups.lock().unwrap().push(tx);
        Ok(Negotiated {
            answer: SessionDescription {
                kind: SdpType::Answer,
                sdp: "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n".into(),
            },
            audio: Arc::new(StatsSink::new(MediaKind::Audio)),
            video: Arc::new(StatsSink::new(MediaKind::Video)),
            closed,
        })
    }
}

fn coordinator(fx: &Fixture) -> SessionCoordinator {
    SessionCoordinator::with_pacer(
        fx.media.clone(),
        deadline(Duration::from_secs(30)),
        Arc::new(Unpaced),
    )
}

fn signaling(fx: &Fixture, transport: MockTransport) -> SignalingState<MockTransport> {
    SignalingState::new(coordinator(fx), transport, TOKEN)
}

fn offer_request(auth: Option<&str>, body: &str) -> Request<Body> {
    let mut req = Request::builder()
        .uri("/offer")
        .method("POST")
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        req = req.header("authorization", auth);
    }
    req.body(Body::from(body.to_owned())).unwrap()
}

const OFFER: &str = r#"{"type":"offer","sdp":"v=0\r\n"}"#;

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        let text = String::from_utf8_lossy(&bytes);
        panic!("not valid JSON: {text}");
    })
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn offer_without_token_is_unauthorized() {
    let fx = Fixture::new(350, 4);
    let transport = MockTransport::default();
    let state = signaling(&fx, transport.clone());
    let app = router(state.clone(), None);

    let resp = app.oneshot(offer_request(None, OFFER)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "unauthorized");
    assert!(transport.offers.lock().unwrap().is_empty());
    assert_eq!(state.active_sessions(), 0);
}

#[tokio::test]
async fn offer_with_wrong_token_is_unauthorized() {
    let fx = Fixture::new(350, 4);
    let app = router(signaling(&fx, MockTransport::default()), None);

    let resp = app
        .oneshot(offer_request(Some("Bearer mingle2"), OFFER))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_offer_is_bad_request() {
    let fx = Fixture::new(350, 4);
    let transport = MockTransport::default();
    let app = router(signaling(&fx, transport.clone()), None);

    let resp = app
        .clone()
        .oneshot(offer_request(Some("Bearer mingle"), "{not json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .oneshot(offer_request(
            Some("Bearer mingle"),
            r#"{"type":"answer","sdp":"v=0\r\n"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(transport.offers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn accepted_offer_returns_answer_and_registers_session() {
    let fx = Fixture::new(350, 4);
    let transport = MockTransport::default();
    let state = signaling(&fx, transport.clone());
    let app = router(state.clone(), None);

    let resp = app
        .clone()
        .oneshot(offer_request(Some("Bearer mingle"), OFFER))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["type"], "answer");
    assert!(body["sdp"].as_str().unwrap().starts_with("v=0"));
    assert_eq!(transport.offers.lock().unwrap().as_slice(), ["v=0\r\n"]);
    assert_eq!(state.active_sessions(), 1);

    let resp = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_sessions"], 1);

    let resp = app
        .clone()
        .oneshot(
            Request::get("/sessions")
                .header("authorization", "Bearer mingle")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(resp).await;
    assert_eq!(body[0]["state"], "streaming");

    // Peer hangs up: the session tears down and leaves the registry.
    transport.hangups.lock().unwrap().clear();
    wait_for(|| state.active_sessions() == 0).await;
}

#[tokio::test]
async fn sessions_listing_requires_token() {
    let fx = Fixture::new(350, 4);
    let app = router(signaling(&fx, MockTransport::default()), None);

    let resp = app
        .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_media_file_fails_without_negotiating() {
    let mut fx = Fixture::new(350, 4);
    fx.media.audio_path = fx.dir.path().join("absent.wav");
    let transport = MockTransport::default();
    let state = signaling(&fx, transport.clone());
    let app = router(state.clone(), None);

    let resp = app
        .oneshot(offer_request(Some("Bearer mingle"), OFFER))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(resp).await["error"]
        .as_str()
        .unwrap()
        .contains("absent.wav"));
    assert!(transport.offers.lock().unwrap().is_empty());
    assert_eq!(state.active_sessions(), 0);
}

#[tokio::test]
async fn transport_failure_creates_no_session() {
    let fx = Fixture::new(350, 4);
    let transport = MockTransport {
        refuse: true,
        ..Default::default()
    };
    let state = signaling(&fx, transport.clone());
    let app = router(state.clone(), None);

    let resp = app
        .oneshot(offer_request(Some("Bearer mingle"), OFFER))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(transport.offers.lock().unwrap().len(), 1);
    assert_eq!(state.active_sessions(), 0);
}

#[tokio::test]
async fn static_dir_is_served_as_fallback() {
    let fx = Fixture::new(350, 4);
    std::fs::write(fx.dir.path().join("index.html"), "<html>loopcast</html>").unwrap();
    let app = router(signaling(&fx, MockTransport::default()), Some(fx.dir.path()));

    let resp = app
        .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"<html>loopcast</html>");
}

// ── Config-driven serving ───────────────────────────────────────────

#[test]
fn app_refuses_to_mount_without_token() {
    let fx = Fixture::new(350, 4);
    let config = SignalingConfig::default();
    assert!(config.bearer_token.is_none());

    let result = app(&config, coordinator(&fx), MockTransport::default());
    assert!(matches!(result, Err(ServeError::MissingToken)));
}

#[tokio::test]
async fn app_uses_configured_token_and_static_dir() {
    let fx = Fixture::new(350, 4);
    std::fs::write(fx.dir.path().join("index.html"), "<html>loopcast</html>").unwrap();
    let config = SignalingConfig {
        bearer_token: Some("from-config".into()),
        static_dir: Some(fx.dir.path().to_path_buf()),
        ..SignalingConfig::default()
    };
    let (app, state) = app(&config, coordinator(&fx), MockTransport::default()).unwrap();

    let resp = app
        .clone()
        .oneshot(offer_request(Some("Bearer mingle"), OFFER))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(offer_request(Some("Bearer from-config"), OFFER))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(state.active_sessions(), 1);

    let resp = app
        .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn serve_binds_listen_address_and_shuts_down() {
    let fx = Fixture::new(350, 4);
    let config = SignalingConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        bearer_token: Some(TOKEN.into()),
        static_dir: None,
    };

    let result = serve(&config, coordinator(&fx), MockTransport::default(), async {}).await;
    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn serve_reports_address_in_use() {
    let fx = Fixture::new(350, 4);
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = SignalingConfig {
        listen: taken.local_addr().unwrap(),
        bearer_token: Some(TOKEN.into()),
        static_dir: None,
    };

    let result = serve(&config, coordinator(&fx), MockTransport::default(), async {}).await;
    assert!(matches!(result, Err(ServeError::Bind { .. })), "{result:?}");
}

#[tokio::test]
async fn serve_without_token_does_not_bind() {
    let fx = Fixture::new(350, 4);
    let config = SignalingConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        ..SignalingConfig::default()
    };

    let result = serve(&config, coordinator(&fx), MockTransport::default(), async {}).await;
    assert!(matches!(result, Err(ServeError::MissingToken)));
}
