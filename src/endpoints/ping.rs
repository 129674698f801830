use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::json;

use crate::protocol::ResponseEnvelope;
use crate::relay::RelayService;
use crate::state::now_ms;
use crate::storage::KeyValueStore;

/// Handle the ping endpoint: liveness probe carrying a strictly increasing
/// per-session sequence number, starting from 1.
pub fn handle<S: KeyValueStore, D: KeyValueStore>(
    relay: &mut RelayService<S, D>,
) -> Result<ResponseEnvelope> {
    let n = relay.next_ping();
    let body = json!({ "pong": true, "t": now_ms(), "n": n });

    Ok(ResponseEnvelope::success(
        BTreeMap::from([("n".to_string(), n.to_string())]),
        body.to_string().into_bytes(),
    ))
}
