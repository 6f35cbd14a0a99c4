//! # httpwatch-probe
//!
//! Bounded HTTP reachability probe.
//!
//! A probe is a single `GET` request against an application's root URL with
//! a hard timeout. The outcome is classified so the caller can log each
//! failure class at the right severity; the probe itself never fails and
//! never outlives its timeout by more than scheduling overhead.

use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tokio::time::timeout;

/// Classified result of one reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered with a 2xx status.
    Healthy(u16),
    /// The endpoint answered, but with a non-success status.
    Unhealthy(u16),
    /// The connection could not be established (refused, no route).
    Unreachable(String),
    /// No response within the probe timeout.
    TimedOut,
    /// Anything else went wrong while probing.
    Failed(String),
}

impl ProbeOutcome {
    /// Collapse the classification to the healthy/unhealthy bool the
    /// supervision loop acts on.
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy(_))
    }
}

/// Probe `endpoint` with a single bounded HTTP GET.
///
/// Network errors, timeouts, and malformed responses are all folded into a
/// [`ProbeOutcome`]; this function does not return errors and does not log -
/// severity decisions belong to the caller, which knows which application
/// the probe was for.
pub async fn probe_endpoint(endpoint: &str, probe_timeout: Duration) -> ProbeOutcome {
    let uri: Uri = match endpoint.parse() {
        Ok(uri) => uri,
        Err(e) => return ProbeOutcome::Failed(format!("invalid probe URI: {}", e)),
    };

    let client = Client::builder(TokioExecutor::new()).build_http();

    let request = match Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("User-Agent", "httpwatchd")
        .body(Empty::<Bytes>::new())
    {
        Ok(request) => request,
        Err(e) => return ProbeOutcome::Failed(format!("failed to build request: {}", e)),
    };

    match timeout(probe_timeout, client.request(request)).await {
        Ok(Ok(response)) => {
            let status = response.status();
            if status.is_success() {
                ProbeOutcome::Healthy(status.as_u16())
            } else {
                ProbeOutcome::Unhealthy(status.as_u16())
            }
        }
        Ok(Err(e)) if e.is_connect() => ProbeOutcome::Unreachable(e.to_string()),
        Ok(Err(e)) => ProbeOutcome::Failed(e.to_string()),
        Err(_) => ProbeOutcome::TimedOut,
    }
}
