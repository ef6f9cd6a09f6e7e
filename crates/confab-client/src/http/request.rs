//! Request factory: builds cancellable, typed request functions.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::transport::{HttpCall, Transport};
use super::url_template::resolve_path;
use super::{Params, TransportResult, merge_params, to_params};

/// Immutable defaults a request function is built with.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: Method,
    pub query: Params,
    pub body: Params,
    pub path: Params,
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: Params::new(),
            body: Params::new(),
            path: Params::new(),
            timeout: None,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl From<Method> for RequestConfig {
    fn from(method: Method) -> Self {
        Self::new(method)
    }
}

/// Per-invocation overrides; path params supplied here win over the
/// construction-time defaults.
#[derive(Debug, Clone, Default)]
pub struct CallOverrides {
    pub path: Params,
    pub timeout: Option<Duration>,
}

impl CallOverrides {
    /// Overrides with a single path parameter.
    pub fn path_param(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut path = Params::new();
        path.insert(key.into(), value.into());
        Self {
            path,
            timeout: None,
        }
    }
}

/// Cancels the most recently issued invocation of one request function.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    slot: Arc<Mutex<Option<CancellationToken>>>,
}

impl AbortHandle {
    /// Signals the transport to abandon the in-flight call, if any.
    /// The token carries no payload; the reason lands in the log stream.
    pub fn abort(&self, reason: &str) {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = slot.as_ref() {
            tracing::debug!(target: "confab::http", %reason, "aborting in-flight request");
            token.cancel();
        }
    }
}

/// A typed, cancellable request function bound to one URL template.
///
/// Each invocation allocates a fresh cancellation token and replaces the
/// previous one, so [`ApiRequest::abort`] only reaches the most recently
/// issued call. Overlapping invocations of the same function do not get
/// independent cancellation; callers that need that build separate
/// functions.
pub struct ApiRequest<P, T> {
    transport: Arc<Transport>,
    template: String,
    base: RequestConfig,
    slot: Arc<Mutex<Option<CancellationToken>>>,
    _marker: PhantomData<fn(P) -> T>,
}

impl<P: Serialize, T: DeserializeOwned> ApiRequest<P, T> {
    pub fn new(
        transport: Arc<Transport>,
        template: impl Into<String>,
        config: impl Into<RequestConfig>,
    ) -> Self {
        Self {
            transport,
            template: template.into(),
            base: config.into(),
            slot: Arc::new(Mutex::new(None)),
            _marker: PhantomData,
        }
    }

    /// Issues the request.
    ///
    /// For read-style methods the payload merges into query params, for
    /// mutating methods into the body; base-config values first, payload
    /// values second, payload wins on collision. Path placeholders resolve
    /// against the merged base + override path params.
    ///
    /// # Errors
    /// Propagates the classified transport failure.
    pub async fn call(
        &self,
        payload: Option<&P>,
        overrides: Option<CallOverrides>,
    ) -> TransportResult<T> {
        let overrides = overrides.unwrap_or_default();

        let token = CancellationToken::new();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());

        let path_params = merge_params(&self.base.path, overrides.path);
        let path = resolve_path(&self.template, &path_params);

        let payload_params = match payload {
            Some(payload) => to_params(payload)?,
            None => Params::new(),
        };

        let mut call = HttpCall::new(self.base.method.clone(), path);
        if self.base.method == Method::GET {
            call.query = merge_params(&self.base.query, payload_params);
        } else {
            call.query = self.base.query.clone();
            call.body = Some(merge_params(&self.base.body, payload_params));
        }
        call.cancel = Some(token);
        call.timeout = overrides.timeout.or(self.base.timeout);

        self.transport.execute(call).await
    }

    /// Cancels the most recently issued invocation.
    pub fn abort(&self, reason: &str) {
        self.abort_handle().abort(reason);
    }

    /// A clonable handle over the same single cancellation slot.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            slot: Arc::clone(&self.slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_config_from_method_has_empty_defaults() {
        let config = RequestConfig::from(Method::POST);
        assert_eq!(config.method, Method::POST);
        assert!(config.query.is_empty());
        assert!(config.body.is_empty());
        assert!(config.path.is_empty());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn call_overrides_path_param_builds_a_single_entry_bag() {
        let overrides = CallOverrides::path_param("message_id", "m-7");
        assert_eq!(overrides.path.get("message_id"), Some(&json!("m-7")));
        assert_eq!(overrides.path.len(), 1);
    }
}
