//! Web API invoker with bounded retry.
//!
//! One remote call is classified into an explicit outcome instead of
//! retry-via-exception: reached-and-accepted, reached-and-rejected, or
//! never-reached. The invoker retries rejected and failed calls up to a
//! fixed bound with no delay between attempts; pacing lives at the stream
//! level, not here.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use slackline_core::{Error, Result};

/// Fixed retry bound per call.
const MAX_ATTEMPTS: usize = 3;

const API_BASE_URL: &str = "https://slack.com/api";

/// The classified result of one remote invocation.
#[derive(Debug)]
pub enum CallOutcome {
    /// The call reached the platform and was accepted.
    Success(Value),
    /// The call reached the platform but was rejected (`ok: false`).
    SoftFailure(String),
    /// The call never reached the platform, timed out, or returned an
    /// undecodable body.
    TransportFailure(Error),
}

/// Port for the raw request/response exchange, so the retry policy can be
/// tested without a network.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn call(&self, method: &str, params: &Value, timeout: Duration) -> Result<Value>;
}

/// Real transport: POST to `https://slack.com/api/<method>` with bearer
/// auth and form-encoded parameters.
pub struct HttpTransport {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl HttpTransport {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, API_BASE_URL)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .build()
            .expect("reqwest client build");
        Self {
            http,
            token: token.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn call(&self, method: &str, params: &Value, timeout: Duration) -> Result<Value> {
        let form = form_fields(params);

        let resp = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .timeout(timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{method}: {e}")))?;

        resp.json::<Value>()
            .await
            .map_err(|e| Error::Transport(format!("{method}: invalid response body: {e}")))
    }
}

/// Flatten a params object into form fields. String values go through
/// as-is; anything else (bools, numbers, attachment arrays) is sent as its
/// JSON text, which is what the platform expects for non-string fields.
fn form_fields(params: &Value) -> Vec<(String, String)> {
    let Some(map) = params.as_object() else {
        return Vec::new();
    };

    map.iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}

/// Executes remote calls with bounded retry and outcome classification.
pub struct ApiInvoker {
    transport: std::sync::Arc<dyn ApiTransport>,
}

impl ApiInvoker {
    pub fn new(transport: std::sync::Arc<dyn ApiTransport>) -> Self {
        Self { transport }
    }

    /// Invoke `method` with up to three attempts, retrying on rejection
    /// and transport failure. Success is never retried. An accepted
    /// response carrying a `warning` field is still a success; the
    /// advisory is logged.
    pub async fn invoke(&self, method: &str, params: Value, timeout: Duration) -> CallOutcome {
        let mut outcome = CallOutcome::TransportFailure(Error::Transport(format!(
            "{method}: no attempt made"
        )));

        for attempt in 1..=MAX_ATTEMPTS {
            match self.transport.call(method, &params, timeout).await {
                Ok(body) => {
                    if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
                        if let Some(advisory) = body.get("warning").and_then(Value::as_str) {
                            warn!(method, warning = advisory, "api call returned a warning");
                        }
                        return CallOutcome::Success(body);
                    }
                    let error = body
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    warn!(method, attempt, error, "api call did not return ok");
                    outcome = CallOutcome::SoftFailure(error.to_string());
                }
                Err(e) => {
                    warn!(method, attempt, error = %e, "api call failed");
                    outcome = CallOutcome::TransportFailure(e);
                }
            }
        }

        outcome
    }

    /// Like [`invoke`](Self::invoke), but exhaustion yields the caller's
    /// default instead of an error. Callers cannot tell "no data" from
    /// "call failed"; that collapse is deliberate.
    pub async fn invoke_or_default(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
        default: Value,
    ) -> Value {
        match self.invoke(method, params, timeout).await {
            CallOutcome::Success(body) => body,
            CallOutcome::SoftFailure(_) | CallOutcome::TransportFailure(_) => default,
        }
    }
}
