//! # Relay Middleware
//!
//! Wraps every call to the processing service:
//!
//! 1. **Validate**: decode the caller's data URL, rejecting bad input before any network I/O
//! 2. **Encode**: hand the binary image to the [`Upstream`]
//! 3. **Await**: race the upstream call against the configured timeout
//! 4. **Classify**: log the outcome and return either the processed image or a [`RelayError`]
//!
//! Each invocation is one-shot. Nothing is retried and nothing is shared
//! between invocations except the upstream's connection pool, so any number
//! of relays can run at once.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let upstream = Arc::new(HttpUpstream::new(&config.upstream)?);
//! let relay = RelayMiddleware::new(upstream, config.upstream.timeout());
//!
//! let processed = relay.relay("data:image/png;base64,iVBORw0KGgo...").await?;
//! ```

use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::data_url::ImagePayload;
use crate::relay::client::Upstream;
use crate::relay::{ErrorKind, RelayError};

/// Where a relay invocation is. Only logged; there is no retry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Idle,
    Validating,
    Encoding,
    AwaitingUpstream,
    Succeeded,
    Failed(ErrorKind),
}

impl fmt::Display for RelayStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayStage::Idle => f.write_str("idle"),
            RelayStage::Validating => f.write_str("validating"),
            RelayStage::Encoding => f.write_str("encoding"),
            RelayStage::AwaitingUpstream => f.write_str("awaiting upstream"),
            RelayStage::Succeeded => f.write_str("succeeded"),
            RelayStage::Failed(kind) => write!(f, "failed ({})", kind),
        }
    }
}

/// Bridges one inbound image to one upstream call.
#[derive(Clone)]
pub struct RelayMiddleware {
    upstream: Arc<dyn Upstream>,
    timeout: Duration,
}

impl RelayMiddleware {
    pub fn new(upstream: Arc<dyn Upstream>, timeout: Duration) -> Self {
        Self { upstream, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn endpoint(&self) -> &str {
        self.upstream.endpoint()
    }

    /// Relays a data-URL image and returns the processed image as a data URL.
    ///
    /// # Errors
    ///
    /// * [`RelayError::BadInput`] - the input is not a usable data URL (no upstream call is made)
    /// * [`RelayError::Timeout`] - the upstream call exceeded the configured bound
    /// * [`RelayError::UpstreamFailure`] - the upstream answered with a non-success status
    /// * [`RelayError::UpstreamUnreachable`] - the upstream could not be reached
    pub async fn relay(&self, data_url: &str) -> Result<String, RelayError> {
        let request_id = begin_invocation();

        let image = match ImagePayload::from_data_url(data_url) {
            Ok(image) => image,
            Err(e) => {
                warn!("⚠️  Relay #{:08x} rejected input: {}", request_id, e);
                trace_stage(request_id, RelayStage::Failed(e.kind()));
                return Err(e);
            }
        };

        let processed = self.forward(request_id, image).await?;
        Ok(processed.to_data_url())
    }

    /// Relays an image that is already in binary form.
    ///
    /// An empty image is rejected as [`RelayError::BadInput`] without an
    /// upstream call.
    pub async fn relay_payload(&self, image: ImagePayload) -> Result<ImagePayload, RelayError> {
        let request_id = begin_invocation();

        if image.is_empty() {
            let e = RelayError::BadInput("the image is empty".into());
            warn!("⚠️  Relay #{:08x} rejected input: {}", request_id, e);
            trace_stage(request_id, RelayStage::Failed(e.kind()));
            return Err(e);
        }

        self.forward(request_id, image).await
    }

    async fn forward(&self, request_id: u32, image: ImagePayload) -> Result<ImagePayload, RelayError> {
        info!(
            "📤 Relay #{:08x} sending {} image ({} bytes) to {}",
            request_id,
            image.mime_type,
            image.len(),
            self.upstream.endpoint()
        );

        trace_stage(request_id, RelayStage::Encoding);
        let started = Instant::now();
        let call = self.upstream.process(image);
        trace_stage(request_id, RelayStage::AwaitingUpstream);

        // The losing branch is dropped: an expired timer drops the in-flight call.
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout {
                limit: self.timeout,
            }),
        };

        match outcome {
            Ok(processed) => {
                info!(
                    "✅ Relay #{:08x} complete: {} image ({} bytes) in {:.1}s",
                    request_id,
                    processed.mime_type,
                    processed.len(),
                    started.elapsed().as_secs_f64()
                );
                trace_stage(request_id, RelayStage::Succeeded);
                Ok(processed)
            }
            Err(e) => {
                match &e {
                    RelayError::UpstreamUnreachable(reason) => error!(
                        "❌ Relay #{:08x} could not reach {}: {}",
                        request_id,
                        self.upstream.endpoint(),
                        reason
                    ),
                    other => error!(
                        "❌ Relay #{:08x} failed after {:.1}s: {}",
                        request_id,
                        started.elapsed().as_secs_f64(),
                        other
                    ),
                }
                trace_stage(request_id, RelayStage::Failed(e.kind()));
                Err(e)
            }
        }
    }
}

/// Stages every invocation passes through before its input is accepted.
const ENTRY_STAGES: [RelayStage; 2] = [RelayStage::Idle, RelayStage::Validating];

/// Allocates a request id and traces the entry stages.
fn begin_invocation() -> u32 {
    let request_id = rand::random::<u32>();
    for stage in ENTRY_STAGES {
        trace_stage(request_id, stage);
    }
    request_id
}

fn trace_stage(request_id: u32, stage: RelayStage) {
    debug!("Relay #{:08x} {}", request_id, stage);
}
