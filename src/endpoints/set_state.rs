use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::{json, Value};

use crate::error::RelayError;
use crate::protocol::{Request, ResponseEnvelope};
use crate::relay::RelayService;
use crate::state::sanitize;
use crate::storage::KeyValueStore;

/// Handle the set_state endpoint: validate the payload, sanitize it and
/// replace the state wholesale. Any failure leaves the previous state
/// untouched (replace-or-noop).
pub fn handle<S: KeyValueStore, D: KeyValueStore>(
    relay: &mut RelayService<S, D>,
    request: &Request,
) -> Result<ResponseEnvelope> {
    // The payload parameter wins; the raw body is the fallback.
    let payload = match request.parameters.get("payload") {
        Some(payload) => Some(payload.clone()),
        None => request
            .body
            .as_ref()
            .map(|body| String::from_utf8_lossy(body).into_owned()),
    };

    let Some(payload) = payload else {
        return Ok(ResponseEnvelope::error(&RelayError::BadRequest(
            r#"missing or invalid "payload" (expected stringified JSON)"#.to_string(),
        )));
    };

    let parsed: Value = match serde_json::from_str(&payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Ok(ResponseEnvelope::error(&RelayError::Parse(e.to_string())));
        }
    };

    let state = sanitize(&parsed);
    let count = state.names.len();
    relay.replace_state(state);

    Ok(ResponseEnvelope::success(
        BTreeMap::from([("count".to_string(), count.to_string())]),
        json!({ "ok": true }).to_string().into_bytes(),
    ))
}
