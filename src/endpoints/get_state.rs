use std::collections::BTreeMap;

use anyhow::Result;

use crate::protocol::ResponseEnvelope;
use crate::relay::RelayService;
use crate::storage::KeyValueStore;

/// Handle the get_state endpoint: serialize the current state. No side
/// effects.
pub fn handle<S: KeyValueStore, D: KeyValueStore>(
    relay: &mut RelayService<S, D>,
) -> Result<ResponseEnvelope> {
    let state = relay.state();
    let body = serde_json::to_vec(state)?;

    Ok(ResponseEnvelope::success(
        BTreeMap::from([("count".to_string(), state.names.len().to_string())]),
        body,
    ))
}
