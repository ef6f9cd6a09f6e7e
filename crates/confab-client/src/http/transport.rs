//! Shared transport core.
//!
//! Every request built by the factory flows through [`Transport::execute`],
//! which applies an explicit middleware chain at the boundary: an outbound
//! stage (credential + user injection for API-prefixed paths) and an inbound
//! stage (envelope strip on success; classification, a single grouped
//! notification, and re-raise on failure).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::error::{TransportError, TransportResult, classify_reqwest_error};
use super::notify::{GroupedNotifier, LogNotifier, Notifier};
use super::url_template::stringify_value;
use super::{Params, to_params};
use crate::config::Config;

/// Path prefix of calls that receive credential and user injection.
pub const API_PREFIX: &str = "/chat";

/// A fully resolved outgoing call.
#[derive(Debug, Clone)]
pub struct HttpCall {
    pub method: Method,
    pub path: String,
    pub query: Params,
    pub body: Option<Params>,
    pub cancel: Option<CancellationToken>,
    pub timeout: Option<Duration>,
}

impl HttpCall {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Params::new(),
            body: None,
            cancel: None,
            timeout: None,
        }
    }
}

/// Shared HTTP client used by every factory-built request function.
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    user: String,
    api_key: Mutex<Option<String>>,
    notices: GroupedNotifier,
}

impl Transport {
    /// Creates a transport from configuration with the default log-backed
    /// notification sink.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::with_notifier(config, Arc::new(LogNotifier))
    }

    /// Creates a transport with a custom notification sink.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_notifier(config: &Config, notifier: Arc<dyn Notifier>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            api_key: Mutex::new(normalize_key(config.api_key.as_deref())),
            notices: GroupedNotifier::new(notifier),
        })
    }

    /// The user identity injected into API-prefixed calls.
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn has_api_key(&self) -> bool {
        self.lock_api_key().is_some()
    }

    /// Replaces the bearer credential; an empty key clears it.
    pub fn set_api_key(&self, key: &str) {
        *self
            .api_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = normalize_key(Some(key));
    }

    /// Executes a call through both middleware stages and decodes the
    /// unwrapped payload.
    ///
    /// # Errors
    /// Re-raises the classified failure after emitting one notification.
    pub async fn execute<T: DeserializeOwned>(&self, call: HttpCall) -> TransportResult<T> {
        let result = self.round_trip(call).await.and_then(|payload| {
            serde_json::from_value(payload).map_err(|err| {
                TransportError::unknown_with(format!("response decode failed: {err}"))
            })
        });

        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.notices.error(&err.message);
                Err(err)
            }
        }
    }

    /// Issues a bare GET without factory involvement.
    ///
    /// # Errors
    /// Re-raises the classified failure after emitting one notification.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> TransportResult<T> {
        self.execute(HttpCall::new(Method::GET, path)).await
    }

    /// Issues a bare POST with a typed JSON body.
    ///
    /// # Errors
    /// Re-raises the classified failure after emitting one notification.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> TransportResult<T> {
        let mut call = HttpCall::new(Method::POST, path);
        call.body = Some(to_params(body)?);
        self.execute(call).await
    }

    /// Issues a bare DELETE, ignoring any response body.
    ///
    /// # Errors
    /// Re-raises the classified failure after emitting one notification.
    pub async fn delete(&self, path: &str) -> TransportResult<()> {
        self.execute::<Value>(HttpCall::new(Method::DELETE, path))
            .await
            .map(|_| ())
    }

    /// Outbound stage: for API-prefixed paths, the user identity goes into
    /// query params for read-style methods and into the body otherwise,
    /// never overwriting a caller-supplied value. The bearer credential is
    /// attached at dispatch under the same prefix check.
    fn outbound(&self, call: &mut HttpCall) {
        if !call.path.starts_with(API_PREFIX) {
            return;
        }
        if call.method == Method::GET {
            if !call.query.contains_key("user") {
                call.query
                    .insert("user".to_string(), Value::String(self.user.clone()));
            }
        } else {
            let body = call.body.get_or_insert_with(Params::new);
            if !body.contains_key("user") {
                body.insert("user".to_string(), Value::String(self.user.clone()));
            }
        }
    }

    async fn round_trip(&self, mut call: HttpCall) -> TransportResult<Value> {
        self.outbound(&mut call);

        let url = format!("{}{}", self.base_url, call.path);
        let mut builder = self.http.request(call.method.clone(), url);

        if call.path.starts_with(API_PREFIX)
            && let Some(key) = self.lock_api_key()
        {
            builder = builder.bearer_auth(key);
        }
        if !call.query.is_empty() {
            builder = builder.query(&query_pairs(&call.query));
        }
        if let Some(body) = call.body.take() {
            builder = builder.json(&Value::Object(body));
        }
        if let Some(timeout) = call.timeout {
            builder = builder.timeout(timeout);
        }

        // Cancellation is honored at send time and mid-flight.
        let cancel = call.cancel.unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(TransportError::aborted());
        }

        tracing::debug!(
            target: "confab::http",
            method = %call.method,
            path = %call.path,
            "dispatching request"
        );

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(TransportError::aborted()),
            response = builder.send() => response.map_err(|e| classify_reqwest_error(&e))?,
        };

        let status = response.status();
        let text = tokio::select! {
            () = cancel.cancelled() => return Err(TransportError::aborted()),
            text = response.text() => text.map_err(|e| classify_reqwest_error(&e))?,
        };

        if !status.is_success() {
            return Err(TransportError::from_error_body(status.as_u16(), &text));
        }

        // Inbound success stage: strip the response envelope, return the
        // parsed payload only.
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|err| TransportError::unknown_with(format!("response parse failed: {err}")))
    }

    fn lock_api_key(&self) -> Option<String> {
        self.api_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn normalize_key(key: Option<&str>) -> Option<String> {
    key.map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

fn query_pairs(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), stringify_value(value)))
        .collect()
}
