//! Generic HTTP request abstraction: URL templates, request factory,
//! transport with outbound/inbound middleware stages.

mod error;
mod notify;
mod request;
mod transport;
mod url_template;

pub use error::{TransportError, TransportErrorKind, TransportResult};
pub use notify::{GroupedNotifier, LogNotifier, Notifier};
pub use request::{AbortHandle, ApiRequest, CallOverrides, RequestConfig};
pub use transport::{API_PREFIX, HttpCall, Transport};
pub use url_template::resolve_path;

/// Loose key→value bag used for query params, body fields, and path params.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Serializes a typed payload into a parameter bag.
///
/// # Errors
/// Returns an error if the payload does not serialize to a JSON object.
pub fn to_params<P: serde::Serialize>(payload: &P) -> TransportResult<Params> {
    match serde_json::to_value(payload) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(TransportError::unknown_with(format!(
            "payload must serialize to an object, got {other}"
        ))),
        Err(err) => Err(TransportError::unknown_with(format!(
            "payload serialization failed: {err}"
        ))),
    }
}

/// Merges two parameter bags: `base` values first, `payload` values second.
/// On key collision the payload wins.
pub fn merge_params(base: &Params, payload: Params) -> Params {
    let mut merged = base.clone();
    merged.extend(payload);
    merged
}
