#![allow(dead_code)]

//! Scripted upstreams shared by the integration tests.

use async_trait::async_trait;
use axum::{
    extract::Multipart,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image_relay::relay::{RelayError, Upstream};
use image_relay::ImagePayload;

pub const PROCESS_PATH: &str = "/process-image/";

/// What a [`ScriptedUpstream`] does with each call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Returns the image unchanged
    Echo,
    /// Returns fixed bytes with a fixed type
    Reply(ImagePayload),
    /// Answers with a non-success status
    Fail(u16),
    /// Never answers
    Stall,
    /// Cannot be reached
    Unreachable,
}

/// In-process upstream that counts calls and notices when a call is dropped
/// before finishing.
pub struct ScriptedUpstream {
    script: Script,
    calls: AtomicUsize,
    dropped: Arc<AtomicBool>,
}

impl ScriptedUpstream {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            dropped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// True once an in-flight call was abandoned by its caller.
    pub fn was_cancelled(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Sets its flag when dropped, unless disarmed first.
struct DropFlag {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn process(&self, image: ImagePayload) -> Result<ImagePayload, RelayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = DropFlag {
            flag: self.dropped.clone(),
            armed: true,
        };

        let outcome = match &self.script {
            Script::Echo => Ok(image),
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Fail(status) => Err(RelayError::UpstreamFailure { status: *status }),
            Script::Stall => std::future::pending().await,
            Script::Unreachable => Err(RelayError::UpstreamUnreachable(
                "connection refused".to_string(),
            )),
        };

        guard.armed = false;
        outcome
    }

    fn endpoint(&self) -> &str {
        "scripted://upstream"
    }
}

/// Serves `app` on an ephemeral local port and returns the processing URL.
pub async fn spawn_http_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}{}", addr, PROCESS_PATH)
}

/// A URL nothing is listening on.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}{}", addr, PROCESS_PATH)
}

/// HTTP upstream that sends back the uploaded `file` part with its own
/// content type. Answers 422 when the upload is not shaped as expected.
pub fn echo_router() -> Router {
    async fn echo(mut multipart: Multipart) -> Response {
        let mut reply = None;
        let mut parts = 0;

        while let Ok(Some(field)) = multipart.next_field().await {
            parts += 1;
            if field.name() != Some("file") || field.file_name() != Some("image.png") {
                continue;
            }
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            if let Ok(data) = field.bytes().await {
                reply = Some((content_type, data));
            }
        }

        match reply {
            Some((content_type, data)) if parts == 1 => {
                ([(header::CONTENT_TYPE, content_type)], data).into_response()
            }
            _ => StatusCode::UNPROCESSABLE_ENTITY.into_response(),
        }
    }

    Router::new().route(PROCESS_PATH, post(echo))
}

/// HTTP upstream that ignores the upload and answers with fixed content.
pub fn fixed_router(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Router {
    Router::new().route(
        PROCESS_PATH,
        post(move || {
            let body = body.clone();
            async move { (status, [(header::CONTENT_TYPE, content_type)], body) }
        }),
    )
}

/// HTTP upstream that waits before answering.
pub fn slow_router(delay: Duration) -> Router {
    Router::new().route(
        PROCESS_PATH,
        post(move || async move {
            tokio::time::sleep(delay).await;
            ([(header::CONTENT_TYPE, "image/png")], vec![0x89, b'P', b'N', b'G'])
        }),
    )
}
